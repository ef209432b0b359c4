//! Configuration structures
//!
//! Loaded by `chatlab_infra::config`. Every section has serde defaults so a
//! config file only needs to name what it overrides.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AUTO_SYNC_DELAY_MINUTES, DEFAULT_AUTO_SYNC_MAX_RETRIES,
    DEFAULT_AUTO_SYNC_RETRY_DELAY_MINUTES, GOOGLE_AUTHORIZE_URL, GOOGLE_REVOKE_URL,
    GOOGLE_TOKEN_URL, GOOGLE_USERINFO_URL, IDENTITY_MAX_ATTEMPTS, IDENTITY_SAFETY_MARGIN_SECS,
    IDENTITY_TOKEN_TIMEOUT_MS, SCOPE_DRIVE_APPDATA, SCOPE_OPENID, SCOPE_USERINFO_EMAIL,
    SCOPE_USERINFO_PROFILE,
};
use crate::types::SyncSettings;

/// Deployment environment
///
/// Tags identity-backend requests so dev/staging/prod cookies never collide,
/// and decides whether the direct-provider OAuth fallback is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

crate::impl_domain_enum_conversions!(Environment {
    Development => "development" | "dev" | "local",
    Staging => "staging" | "stage",
    Production => "production" | "prod",
});

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub endpoints: EndpointsConfig,
    pub oauth: OAuthConfig,
    pub identity: IdentityConfig,
    pub auto_sync: AutoSyncConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        Self { environment, ..Self::default() }
    }

    /// Whether the direct-provider OAuth fallback is enabled
    #[must_use]
    pub fn direct_fallback_enabled(&self) -> bool {
        self.oauth.direct_fallback_enabled(self.environment)
    }
}

/// Base URLs of the three remote parties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Vault identity backend (`/auth/*` routes)
    pub identity_base_url: String,
    /// Chat Lab backend proxy (`/oauth/*` routes)
    pub oauth_proxy_base_url: String,
    pub google_token_url: String,
    pub google_revoke_url: String,
    pub google_userinfo_url: String,
    /// Seconds before an HTTP request is abandoned
    pub request_timeout_secs: u64,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            identity_base_url: "http://localhost:4000/api/v1".to_string(),
            oauth_proxy_base_url: "http://localhost:8118/fidu-chat-lab/api".to_string(),
            google_token_url: GOOGLE_TOKEN_URL.to_string(),
            google_revoke_url: GOOGLE_REVOKE_URL.to_string(),
            google_userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Google OAuth client configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Only used by the direct-provider fallback
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub required_scopes: Vec<String>,
    /// Whether a connectivity failure of the backend proxy may fall back to
    /// calling the provider directly with `client_secret`; unset means
    /// development only
    pub allow_direct_fallback: Option<bool>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            redirect_uri: "http://localhost:3000/oauth-callback".to_string(),
            authorize_url: GOOGLE_AUTHORIZE_URL.to_string(),
            required_scopes: default_scopes(),
            allow_direct_fallback: None,
        }
    }
}

impl OAuthConfig {
    /// Effective fallback gate for `environment`
    #[must_use]
    pub fn direct_fallback_enabled(&self, environment: Environment) -> bool {
        self.allow_direct_fallback.unwrap_or(environment == Environment::Development)
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("authorize_url", &self.authorize_url)
            .field("required_scopes", &self.required_scopes)
            .field("allow_direct_fallback", &self.allow_direct_fallback)
            .finish()
    }
}

fn default_scopes() -> Vec<String> {
    [SCOPE_OPENID, SCOPE_USERINFO_EMAIL, SCOPE_USERINFO_PROFILE, SCOPE_DRIVE_APPDATA]
        .iter()
        .map(|scope| (*scope).to_string())
        .collect()
}

/// Identity token acquisition parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub safety_margin_secs: u64,
    pub token_timeout_ms: u64,
    pub max_attempts: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            safety_margin_secs: IDENTITY_SAFETY_MARGIN_SECS,
            token_timeout_ms: IDENTITY_TOKEN_TIMEOUT_MS,
            max_attempts: IDENTITY_MAX_ATTEMPTS,
        }
    }
}

/// Auto-sync scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSyncConfig {
    pub delay_minutes: u32,
    pub max_retries: u32,
    pub retry_delay_minutes: u32,
}

impl Default for AutoSyncConfig {
    fn default() -> Self {
        Self {
            delay_minutes: DEFAULT_AUTO_SYNC_DELAY_MINUTES,
            max_retries: DEFAULT_AUTO_SYNC_MAX_RETRIES,
            retry_delay_minutes: DEFAULT_AUTO_SYNC_RETRY_DELAY_MINUTES,
        }
    }
}

impl AutoSyncConfig {
    /// Scheduler configuration for the user's saved delay
    #[must_use]
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self { delay_minutes: settings.auto_sync_delay_minutes, ..Self::default() }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.delay_minutes) * 60)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.retry_delay_minutes) * 60)
    }
}

/// Persisted client state location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON state file; in-memory state when unset
    pub state_path: Option<PathBuf>,
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
