use parking_lot::Mutex;

use crate::platform::{CallbackId, Delay, Scheduler};

/// Delay that returns immediately and remembers every request.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    calls: Mutex<Vec<u32>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        RecordingDelay::default()
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().clone()
    }

    /// How many delays of exactly `us` were requested.
    pub fn count(&self, us: u32) -> usize {
        self.calls.lock().iter().filter(|&&c| c == us).count()
    }
}

impl Delay for RecordingDelay {
    fn delay_us(&self, us: u32) {
        self.calls.lock().push(us);
    }
}

/// Scheduler that keeps every callback in arrival order.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<CallbackId>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        RecordingScheduler::default()
    }

    pub fn scheduled(&self) -> Vec<CallbackId> {
        self.scheduled.lock().clone()
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule(&self, callback: CallbackId) {
        self.scheduled.lock().push(callback);
    }
}
