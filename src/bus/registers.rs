use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Bits of the CMD register. Writing a bit issues the command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Command: u32 {
        const START = 1 << 0;
        const STOP = 1 << 1;
        const ACK = 1 << 2;
        const NACK = 1 << 3;
        const CONT = 1 << 4;
        const ABORT = 1 << 5;
        const CLEARTX = 1 << 6;
        const CLEARPC = 1 << 7;
    }
}

bitflags! {
    /// Interrupt sources, laid out the same way in IF, IFS, IFC and IEN.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupts: u32 {
        const START = 1 << 0;
        const RSTART = 1 << 1;
        const ADDR = 1 << 2;
        const TXC = 1 << 3;
        const TXBL = 1 << 4;
        const RXDATAV = 1 << 5;
        const ACK = 1 << 6;
        const NACK = 1 << 7;
        const MSTOP = 1 << 8;
        const ARBLOST = 1 << 9;
        const BUSERR = 1 << 10;
        const BUSHOLD = 1 << 11;
        const TXOF = 1 << 12;
        const RXUF = 1 << 13;
        const BITO = 1 << 14;
        const CLTO = 1 << 15;
        const SSTOP = 1 << 16;
        const RXFULL = 1 << 17;
        const CLERR = 1 << 18;

        /// Sources the transaction state machine listens to.
        const TRANSACTION = Self::ACK.bits()
            | Self::NACK.bits()
            | Self::RXDATAV.bits()
            | Self::MSTOP.bits();
    }
}

/// The two physical bus units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeripheralId {
    I2c0,
    I2c1,
}

impl PeripheralId {
    pub const ALL: [PeripheralId; 2] = [PeripheralId::I2c0, PeripheralId::I2c1];

    pub fn index(self) -> usize {
        match self {
            PeripheralId::I2c0 => 0,
            PeripheralId::I2c1 => 1,
        }
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            PeripheralId::I2c0 => "I2C0",
            PeripheralId::I2c1 => "I2C1",
        })
    }
}

/// Pin route locations and enables, applied once when a peripheral is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Route {
    pub sda_location: u32,
    pub scl_location: u32,
    pub sda_enable: bool,
    pub scl_enable: bool,
}
