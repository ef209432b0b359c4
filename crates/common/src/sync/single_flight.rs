//! Single-flight execution
//!
//! The first caller of [`SingleFlight::run`] starts the operation; callers
//! arriving while it is outstanding await the same shared future instead of
//! starting their own. The slot is released when the flight settles, so the
//! next call after completion starts a fresh operation.
//!
//! The operation runs on its own tokio task, so it settles and frees the
//! slot even when every caller gives up early (a timed-out waiter, a
//! dropped request). Must be called from within a tokio runtime.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::trace;

struct Flight<T> {
    id: u64,
    future: Shared<BoxFuture<'static, T>>,
}

/// Coalesces concurrent calls into one shared in-flight operation
pub struct SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    name: &'static str,
    slot: Arc<Mutex<Option<Flight<T>>>>,
    next_id: AtomicU64,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name, slot: Arc::new(Mutex::new(None)), next_id: AtomicU64::new(1) }
    }

    /// Run `operation`, or join the flight that is already outstanding
    ///
    /// `operation` is only invoked when no flight is in progress.
    ///
    /// # Panics
    /// Resumes the operation's panic in every waiter, and panics if the
    /// runtime cancels the operation's task while shutting down.
    pub async fn run<F, Fut>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let future = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(flight) => {
                    trace!(flight = self.name, "joining in-flight operation");
                    flight.future.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let future = self.spawn(id, operation());
                    *slot = Some(Flight { id, future: future.clone() });
                    trace!(flight = self.name, id, "started new operation");
                    future
                }
            }
        };

        future.await
    }

    /// Await the outstanding flight, if any, without starting a new one
    pub async fn join(&self) -> Option<T> {
        let future = self.slot.lock().as_ref()?.future.clone();
        Some(future.await)
    }

    /// Whether an operation is currently outstanding
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Drive `operation` on its own task; the task frees the slot before
    /// handing the output to waiters
    fn spawn<Fut>(&self, id: u64, operation: Fut) -> Shared<BoxFuture<'static, T>>
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let slot = Arc::clone(&self.slot);
        let name = self.name;
        let task = tokio::spawn(async move {
            let output = operation.await;
            release(&slot, id);
            trace!(flight = name, id, "operation settled");
            output
        });

        async move {
            match task.await {
                Ok(output) => output,
                Err(err) => match err.try_into_panic() {
                    Ok(payload) => std::panic::resume_unwind(payload),
                    Err(err) => panic!("{name} flight cancelled: {err}"),
                },
            }
        }
        .boxed()
        .shared()
    }
}

fn release<T>(slot: &Mutex<Option<Flight<T>>>, id: u64)
where
    T: Clone + Send + Sync + 'static,
{
    let mut slot = slot.lock();
    if slot.as_ref().is_some_and(|flight| flight.id == id) {
        *slot = None;
    }
}

impl<T> std::fmt::Debug for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("name", &self.name)
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}
