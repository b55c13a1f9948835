mod descriptor;
mod error;
mod machine;
mod master;
mod registers;
mod reset;
mod rw_bit;

pub use self::descriptor::{Descriptor, Destination, Event, Request, State, MAX_PAYLOAD};
pub use self::error::{Error, Result};
pub use self::master::Master;
pub use self::registers::{Command, Interrupts, PeripheralId, Route};
pub use self::reset::bus_reset;
pub use self::rw_bit::{split_header, RwBit, SlaveAddress};

/// Register-level access to one I2C peripheral.
///
/// Reads and writes have hardware side effects: writing `transmit` shifts a
/// byte onto the bus, reading `receive` pops the receive buffer.
pub trait I2cRegisters {
    /// Write the CMD register.
    fn command(&mut self, cmd: Command);

    /// Read IF.
    fn flags(&self) -> Interrupts;

    /// Write IFS.
    fn set_flags(&mut self, flags: Interrupts);

    /// Write IFC.
    fn clear_flags(&mut self, flags: Interrupts);

    /// Read IEN.
    fn enabled(&self) -> Interrupts;

    /// Write IEN.
    fn set_enabled(&mut self, sources: Interrupts);

    /// Write TXDATA.
    fn transmit(&mut self, byte: u8);

    /// Read RXDATA.
    fn receive(&mut self) -> u8;

    /// Whether the STATE register reports the bus state machine as idle.
    fn is_idle(&self) -> bool;

    /// Arm the peripheral's line at the interrupt controller.
    fn enable_irq(&mut self);

    fn enable_clock(&mut self);

    fn route(&mut self, route: &Route);
}
