//! In-memory credential cache with an optional persisted copy
//!
//! The cache also carries the session *generation*: a counter bumped by
//! every [`TokenCache::clear`]. A refresh records the generation before it
//! goes to the network and stores its result with
//! [`TokenCache::set_if_current`], so a logout that lands while the refresh
//! is outstanding is never overwritten by the late result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatlab_common::time::Clock;
use chatlab_domain::Credential;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::error::AuthError;
use crate::state_ports::{load_json, save_json, StateStore};

struct Persistence {
    store: Arc<dyn StateStore>,
    key: &'static str,
}

/// Credential holder for one lifecycle
pub struct TokenCache {
    name: &'static str,
    clock: Arc<dyn Clock>,
    safety_margin: Duration,
    persistence: Option<Persistence>,
    current: RwLock<Option<Credential>>,
    // Serialises writers so the generation check and the write are atomic
    write_lock: Mutex<()>,
    generation: AtomicU64,
}

impl TokenCache {
    /// Create a cache; with `persistence` every write is mirrored to the
    /// state store under the given key
    #[must_use]
    pub fn new(
        name: &'static str,
        clock: Arc<dyn Clock>,
        safety_margin: Duration,
        persistence: Option<(Arc<dyn StateStore>, &'static str)>,
    ) -> Self {
        Self {
            name,
            clock,
            safety_margin,
            persistence: persistence.map(|(store, key)| Persistence { store, key }),
            current: RwLock::new(None),
            write_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Hydrate the in-memory copy from the persisted one
    ///
    /// Undecodable payloads are discarded. Returns the loaded credential.
    pub async fn load(&self) -> Result<Option<Credential>, AuthError> {
        let Some(persistence) = &self.persistence else {
            return Ok(self.get());
        };

        let _guard = self.write_lock.lock().await;
        let loaded: Option<Credential> =
            load_json(persistence.store.as_ref(), persistence.key).await?;
        if loaded.is_some() {
            debug!(cache = self.name, "loaded persisted credential");
        }
        (*self.current.write()).clone_from(&loaded);
        Ok(loaded)
    }

    #[must_use]
    pub fn get(&self) -> Option<Credential> {
        self.current.read().clone()
    }

    /// Store `credential` unconditionally
    pub async fn set(&self, credential: Credential) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock().await;
        self.write(credential).await
    }

    /// Store `credential` only if no clear happened since `generation` was
    /// read
    ///
    /// Returns `false` when the write was discarded.
    pub async fn set_if_current(
        &self,
        credential: Credential,
        generation: u64,
    ) -> Result<bool, AuthError> {
        let _guard = self.write_lock.lock().await;
        if self.generation() != generation {
            debug!(cache = self.name, generation, "discarding credential from a cleared session");
            return Ok(false);
        }
        self.write(credential).await?;
        Ok(true)
    }

    /// Drop the credential from memory and from the persisted copy
    pub async fn clear(&self) -> Result<(), AuthError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _guard = self.write_lock.lock().await;
        *self.current.write() = None;

        if let Some(persistence) = &self.persistence {
            persistence.store.remove(persistence.key).await?;
        }
        debug!(cache = self.name, "credential cleared");
        Ok(())
    }

    /// Current session generation
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether a credential exists and is outside the safety margin
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        let margin_ms = duration_ms(self.safety_margin);
        self.current
            .read()
            .as_ref()
            .is_some_and(|credential| !credential.expires_within(self.clock.now_ms(), margin_ms))
    }

    /// Whether the credential expires within `window`
    ///
    /// `false` when no credential is held.
    #[must_use]
    pub fn needs_renewal(&self, window: Duration) -> bool {
        let now_ms = self.clock.now_ms();
        self.current
            .read()
            .as_ref()
            .is_some_and(|credential| credential.expires_within(now_ms, duration_ms(window)))
    }

    /// Milliseconds until expiry; negative once expired
    #[must_use]
    pub fn time_until_expiry_ms(&self) -> Option<i64> {
        self.current
            .read()
            .as_ref()
            .map(|credential| credential.time_until_expiry_ms(self.clock.now_ms()))
    }

    #[must_use]
    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    async fn write(&self, credential: Credential) -> Result<(), AuthError> {
        if let Some(persistence) = &self.persistence {
            if let Err(err) =
                save_json(persistence.store.as_ref(), persistence.key, &credential).await
            {
                warn!(cache = self.name, error = %err, "failed to persist credential");
                return Err(err.into());
            }
        }
        *self.current.write() = Some(credential);
        Ok(())
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("name", &self.name)
            .field("credential", &*self.current.read())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

pub(crate) fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
