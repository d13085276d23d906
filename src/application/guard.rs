//! Single-flight protection for the controller.
//!
//! Only one custody-mutating call may run per controller. A second call,
//! including one made by the router from inside an in-flight swap, is
//! refused immediately instead of waiting.

use crate::error::{Result, SwapError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the controller busy until the returned guard is dropped.
    ///
    /// The guard owns its flag, so it can travel with the work onto another
    /// task and keep the controller busy until that work is done.
    pub fn acquire(&self) -> Result<FlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| SwapError::SwapInFlight)?;
        trace!("flight acquired");
        Ok(FlightGuard {
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

pub struct FlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        trace!("flight released");
    }
}
