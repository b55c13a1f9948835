use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use super::Scheduler;

/// Opaque completion token handed back through the scheduler.
///
/// With [`EventScheduler`] the value is an event mask, one bit per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(pub u32);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Cooperative scheduler backed by a pending-event bitmask.
#[derive(Debug, Default)]
pub struct EventScheduler {
    pending: AtomicU32,
}

impl EventScheduler {
    pub fn new() -> Self {
        EventScheduler::default()
    }

    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    /// Drains and returns every pending event.
    pub fn take(&self) -> u32 {
        self.pending.swap(0, Ordering::AcqRel)
    }
}

impl Scheduler for EventScheduler {
    fn schedule(&self, callback: CallbackId) {
        trace!("scheduling event {}", callback);
        self.pending.fetch_or(callback.0, Ordering::AcqRel);
    }
}
