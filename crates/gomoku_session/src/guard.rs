//! In-flight latch: at most one outstanding operation per pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// A per-pipeline "operation pending" latch.
///
/// [`InFlight::try_begin`] checks and sets the latch in one atomic step
/// before any asynchronous call is issued. The returned [`FlightGuard`]
/// releases it on drop, so every exit path (success, error, early return,
/// task cancellation) clears it.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    name: &'static str,
    busy: Arc<AtomicBool>,
}

impl InFlight {
    /// Creates an idle latch; `name` labels log lines.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claims the latch, or returns `None` if an operation is already pending.
    pub fn try_begin(&self) -> Option<FlightGuard> {
        match self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Some(FlightGuard {
                name: self.name,
                busy: Arc::clone(&self.busy),
            }),
            Err(_) => {
                debug!(pipeline = self.name, "Operation already in flight");
                None
            }
        }
    }

    /// Whether an operation is pending.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of a claimed [`InFlight`] latch; releases it when dropped.
#[derive(Debug)]
#[must_use = "the latch is released as soon as the guard is dropped"]
pub struct FlightGuard {
    name: &'static str,
    busy: Arc<AtomicBool>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        debug!(pipeline = self.name, "Operation settled");
    }
}
