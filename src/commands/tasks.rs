use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Join point for deferred work that outlives its HTTP response.
///
/// Handlers spawn through this instead of a bare `tokio::spawn`, and the
/// server drains it on shutdown so pending follow-ups are still delivered.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.lock();
        // Reap finished tasks so the set does not grow without bound.
        while let Some(done) = set.try_join_next() {
            if let Err(e) = done {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        set.spawn(task);
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Wait for every task spawned so far, including ones spawned while
    /// draining.
    pub async fn drain(&self) {
        loop {
            let mut set = std::mem::take(&mut *self.lock());
            if set.is_empty() {
                return;
            }
            debug!(pending = set.len(), "draining background tasks");
            while let Some(done) = set.join_next().await {
                if let Err(e) = done {
                    warn!(error = %e, "background task ended abnormally");
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        // A panic while holding the lock cannot leave the set inconsistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
