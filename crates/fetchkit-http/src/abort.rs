//! Cancellation handle

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

type AbortCallback = Box<dyn FnOnce() + Send>;

/// Owner side of a cancellation handle
///
/// Couples a [`AbortSignal`] that transports observe with an explicit
/// [`abort`](AbortController::abort) trigger. Callbacks registered with
/// [`on_abort`](AbortController::on_abort) run once, on the first abort.
#[derive(Clone, Default)]
pub struct AbortController {
    token: CancellationToken,
    callbacks: Arc<Mutex<Vec<AbortCallback>>>,
}

impl fmt::Debug for AbortController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortController")
            .field("aborted", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl AbortController {
    /// Fresh, not yet aborted controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal observed by the request this controller guards
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            token: self.token.clone(),
        }
    }

    /// Register a callback run when the controller is aborted
    ///
    /// Registering on an already aborted controller runs the callback immediately.
    pub fn on_abort<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut callbacks = self.callbacks.lock();
        if self.token.is_cancelled() {
            drop(callbacks);
            callback();
        } else {
            callbacks.push(Box::new(callback));
        }
    }

    /// Cancel the signal and run the registered callbacks
    ///
    /// Idempotent: only the first call has an effect.
    pub fn abort(&self) {
        let callbacks = {
            let mut callbacks = self.callbacks.lock();
            if self.token.is_cancelled() {
                return;
            }
            self.token.cancel();
            std::mem::take(&mut *callbacks)
        };

        tracing::trace!("Abort controller fired {} callbacks", callbacks.len());
        for callback in callbacks {
            callback();
        }
    }

    /// Whether [`abort`](AbortController::abort) was called
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Observer side of a cancellation handle
#[derive(Debug, Clone)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    /// Whether the owning controller was aborted
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the owning controller is aborted
    pub async fn aborted(&self) {
        self.token.cancelled().await
    }
}
