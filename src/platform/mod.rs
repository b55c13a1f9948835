//! Collaborators the transaction engine calls into.
//!
//! The engine only ever talks to these through the traits below; the
//! implementations in this module are the ones the host binary runs with.

mod delay;
mod energy;
mod scheduler;

pub use self::delay::StdDelay;
pub use self::energy::{EnergyMode, SleepGovernor};
pub use self::scheduler::{CallbackId, EventScheduler};

/// Keeps the processor out of sleep states that would stop a peripheral.
pub trait EnergyGovernor {
    /// Forbid entering `floor` or anything deeper.
    fn forbid(&self, floor: EnergyMode);

    /// Drop one earlier `forbid` of `floor`.
    fn permit(&self, floor: EnergyMode);
}

/// Defers a completion callback to task context.
pub trait Scheduler {
    fn schedule(&self, callback: CallbackId);
}

/// Blocking fixed-duration delay.
pub trait Delay {
    fn delay_us(&self, us: u32);
}

impl<T: EnergyGovernor + ?Sized> EnergyGovernor for &T {
    fn forbid(&self, floor: EnergyMode) {
        (**self).forbid(floor)
    }

    fn permit(&self, floor: EnergyMode) {
        (**self).permit(floor)
    }
}

impl<T: Scheduler + ?Sized> Scheduler for &T {
    fn schedule(&self, callback: CallbackId) {
        (**self).schedule(callback)
    }
}

impl<T: Delay + ?Sized> Delay for &T {
    fn delay_us(&self, us: u32) {
        (**self).delay_us(us)
    }
}
