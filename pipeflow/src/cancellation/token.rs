//! Between-step abort signal.

use parking_lot::Mutex;
use tracing::warn;

/// Invoked once with the cancellation reason.
pub type CancelCallback = Box<dyn FnOnce(&str) + Send>;

/// Cooperative cancellation shared between the engine and its caller.
///
/// The stage runner checks the token before launching each step; a step that
/// is already running is awaited. The first reason wins.
#[derive(Default)]
pub struct CancellationToken {
    reason: Mutex<Option<String>>,
    callbacks: Mutex<Vec<CancelCallback>>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    ///
    /// Returns `false` if the token was already cancelled, in which case the
    /// original reason is kept and no callback runs again.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        {
            let mut slot = self.reason.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason.clone());
        }

        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        for callback in callbacks {
            notify(callback, &reason);
        }
        true
    }

    /// Registers a callback for cancellation. Runs it now if already cancelled.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce(&str) + Send + 'static,
    {
        let mut callbacks = self.callbacks.lock();
        match self.reason() {
            Some(reason) => {
                drop(callbacks);
                notify(Box::new(callback), &reason);
            }
            None => callbacks.push(Box::new(callback)),
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.reason.lock().is_some()
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }
}

fn notify(callback: CancelCallback, reason: &str) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(reason))) {
        warn!("Cancellation callback panicked: {:?}", e);
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("reason", &self.reason())
            .field("pending_callbacks", &self.callbacks.lock().len())
            .finish()
    }
}
