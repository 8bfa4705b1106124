//! A cloneable handle for controlling a session from external code.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle onto a running session.
///
/// All fields are `Arc`-wrapped, so cloning is cheap. The handle can stop an
/// in-flight turn from another task; stopping while idle is a no-op.
#[derive(Clone)]
pub struct SessionHandle {
    cancel: Arc<Mutex<CancellationToken>>,
    is_running: Arc<AtomicBool>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Abort the current turn's network stream, if any.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Whether a turn is currently in flight.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Install a fresh cancellation token and mark the session running.
    pub(crate) fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        self.is_running.store(true, Ordering::Release);
        token
    }

    /// Mark the session idle again.
    pub(crate) fn finish(&self) {
        self.is_running.store(false, Ordering::Release);
    }
}
