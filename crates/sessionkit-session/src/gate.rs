//! Single-flight guard for session-mutating operations.
//!
//! The gate is one busy flag. Acquiring it hands back a [`GatePermit`];
//! dropping the permit clears the flag. Because release happens in `Drop`,
//! every exit path releases the gate: success, failure, an early `return`,
//! or a panicking task.
//!
//! ```text
//!   try_acquire("authenticate") ──→ Ok(permit)     busy = true
//!   try_acquire("logout")       ──→ Err(Busy)      (ignored, not queued)
//!   drop(permit)                                   busy = false
//! ```
//!
//! The permit is `Send`, so it can ride along with a spawned network task
//! and come back with its completion. The orchestrator drops it only after
//! the completion has been applied, which keeps the flag set for the whole
//! operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::SessionError;

/// The busy flag shared between the gate and its outstanding permit.
///
/// `Clone` shares the same flag, so a clone can be used to observe
/// `is_busy` from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct OperationGate {
    busy: Arc<AtomicBool>,
}

impl OperationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically checks-and-sets the busy flag.
    ///
    /// `op` names the operation for logs and for the error.
    ///
    /// # Errors
    /// [`SessionError::Busy`] if another permit is outstanding.
    pub fn try_acquire(&self, op: &'static str) -> Result<GatePermit, SessionError> {
        // compare_exchange only succeeds if the flag was false, so two
        // racing callers cannot both win.
        match self.busy.compare_exchange(
            false,
            true,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                debug!(op, "gate acquired");
                Ok(GatePermit {
                    busy: Arc::clone(&self.busy),
                    op,
                })
            }
            Err(_) => Err(SessionError::Busy { requested: op }),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the gate. Releases it on drop.
#[derive(Debug)]
#[must_use = "dropping the permit releases the gate immediately"]
pub struct GatePermit {
    busy: Arc<AtomicBool>,
    op: &'static str,
}

impl GatePermit {
    /// The operation this permit was acquired for.
    pub fn op(&self) -> &'static str {
        self.op
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        debug!(op = self.op, "gate released");
    }
}
