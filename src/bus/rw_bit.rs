use std::convert;
use std::fmt;

use super::{Error, Result};

impl fmt::Display for RwBit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &RwBit::Write => f.write_str("Write"),
            &RwBit::Read => f.write_str("Read"),
        }
    }
}

/// Direction bit carried in the least significant bit of an address header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RwBit {
    Write = 0,
    Read = 1,
}

impl convert::From<u8> for RwBit {
    fn from(value: u8) -> Self {
        match value {
            0 => RwBit::Write,
            1 => RwBit::Read,
            _ => {
                error!("Unexpected value {:b} for rw bit, assuming read", value);
                RwBit::Read
            }
        }
    }
}

/// A validated 7-bit slave address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveAddress(u8);

impl SlaveAddress {
    /// Accepts 7-bit addresses outside the two reserved blocks
    /// `0b0000_0xxx` and `0b1111_xxx`.
    pub fn new(address: u8) -> Result<Self> {
        match address {
            0x00..=0x07 | 0x78..=0xFF => Err(Error::InvalidAddress(address)),
            _ => Ok(SlaveAddress(address)),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// 8-bit header: address in the upper seven bits, direction in bit 0.
    pub fn header(self, rw: RwBit) -> u8 {
        (self.0 << 1) | rw as u8
    }
}

impl fmt::Display for SlaveAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Splits a header byte back into its address and direction.
pub fn split_header(header: u8) -> (u8, RwBit) {
    (header >> 1, RwBit::from(header & 0x1))
}
