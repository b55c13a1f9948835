//! Host-side stand-ins for the hardware the engine drives.

mod peripheral;
mod recorder;
mod si7021;

pub use self::peripheral::{BusOp, SimPeripheral};
pub use self::recorder::{RecordingDelay, RecordingScheduler};
pub use self::si7021::Si7021;

use crate::bus::{Error, I2cRegisters, Master, PeripheralId, Result, RwBit};
use crate::platform::{Delay, EnergyGovernor, Scheduler};

/// The slave side of the simulated bus.
pub trait SlaveDevice {
    /// Whether the device acknowledges a header carrying `address`.
    /// The address is always 7 bits, the direction bit has been split off.
    fn address(&mut self, address: u8, rw: RwBit) -> bool;

    /// Accepts a data byte from the master. `false` NACKs it.
    fn write(&mut self, byte: u8) -> bool;

    /// Next byte the device shifts out.
    fn read(&mut self) -> u8;

    /// STOP seen on the bus.
    fn stop(&mut self) {}
}

/// Plays interrupt controller: services `peripheral` for as long as `sim`
/// holds its interrupt line high. Returns the number of vector entries.
pub fn pump<R, E, S, D>(
    master: &Master<R, E, S, D>,
    peripheral: PeripheralId,
    sim: &SimPeripheral,
    limit: usize,
) -> Result<usize>
where
    R: I2cRegisters,
    E: EnergyGovernor,
    S: Scheduler,
    D: Delay,
{
    let mut steps = 0;
    while sim.irq_pending() {
        if steps >= limit {
            return Err(Error::Runaway { peripheral, steps });
        }
        master.on_interrupt(peripheral)?;
        steps += 1;
    }
    trace!("{}: line quiet after {} interrupts", peripheral, steps);
    Ok(steps)
}
