use std::thread;
use std::time::Duration;

use super::Delay;

/// Sleeps the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_us(&self, us: u32) {
        if us > 0 {
            thread::sleep(Duration::from_micros(u64::from(us)));
        }
    }
}
