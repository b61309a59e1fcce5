//! Request-scoped cancellation
//!
//! Every engine checks the token before each solve and each step. Timeouts
//! are enforced by the gateway and propagate as cancellation.

use crate::errors::{Result, SimError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation token shared between a request handler and the
/// workers it fans out to.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail fast with `SimErrorKind::Cancelled` when the token has fired
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SimError::cancelled())
        } else {
            Ok(())
        }
    }
}
