use super::SlaveDevice;
use crate::bus::RwBit;
use crate::sensor;

/// Behavioural model of an Si7021 answering no hold master mode commands.
///
/// While a conversion runs the sensor NACKs its read header; the master is
/// expected to keep polling until the result is ready.
#[derive(Debug, Clone)]
pub struct Si7021 {
    address: u8,
    humidity: u16,
    temperature: u16,
    /// Read headers NACKed after each measure command.
    conversion_polls: u32,
    header_nacks: u32,
    command_nacks: u32,
    converting: u32,
    output: [u8; 3],
    position: usize,
    measured: bool,
}

impl Si7021 {
    pub fn new(humidity: u16) -> Self {
        Si7021 {
            address: sensor::SI7021_ADDRESS,
            humidity,
            temperature: 0x6658,
            conversion_polls: 0,
            header_nacks: 0,
            command_nacks: 0,
            converting: 0,
            output: [0; 3],
            position: 0,
            measured: false,
        }
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_temperature(mut self, temperature: u16) -> Self {
        self.temperature = temperature;
        self
    }

    /// Read headers to NACK while each conversion is in progress.
    pub fn with_conversion_polls(mut self, polls: u32) -> Self {
        self.conversion_polls = polls;
        self
    }

    /// Write headers to NACK before the sensor answers at all.
    pub fn with_header_nacks(mut self, nacks: u32) -> Self {
        self.header_nacks = nacks;
        self
    }

    /// Command bytes to NACK before one is accepted.
    pub fn with_command_nacks(mut self, nacks: u32) -> Self {
        self.command_nacks = nacks;
        self
    }

    fn latch(&mut self, raw: u16) {
        let [msb, lsb] = raw.to_be_bytes();
        self.output = [msb, lsb, crc8(&[msb, lsb])];
        self.position = 0;
        self.converting = self.conversion_polls;
        self.measured = true;
    }
}

impl SlaveDevice for Si7021 {
    fn address(&mut self, address: u8, rw: RwBit) -> bool {
        if address != self.address {
            return false;
        }

        match rw {
            RwBit::Write if self.header_nacks > 0 => {
                self.header_nacks -= 1;
                false
            }
            RwBit::Write => true,
            RwBit::Read if !self.measured => false,
            RwBit::Read if self.converting > 0 => {
                self.converting -= 1;
                trace!("si7021: still converting, {} polls left", self.converting);
                false
            }
            RwBit::Read => true,
        }
    }

    fn write(&mut self, byte: u8) -> bool {
        if self.command_nacks > 0 {
            self.command_nacks -= 1;
            return false;
        }

        match byte {
            sensor::MEASURE_RH_NO_HOLD => self.latch(self.humidity),
            sensor::MEASURE_TEMP_NO_HOLD => self.latch(self.temperature),
            _ => {
                warn!("si7021: unsupported command {:#04x}", byte);
                return false;
            }
        }
        true
    }

    fn read(&mut self) -> u8 {
        let byte = self.output.get(self.position).copied().unwrap_or(0xFF);
        self.position += 1;
        byte
    }

    fn stop(&mut self) {
        if self.position > 0 {
            self.measured = false;
        }
    }
}

/// CRC-8 with polynomial x^8 + x^5 + x^4 + 1, initial value zero.
fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &byte| {
        (0..8).fold(crc ^ byte, |crc, _| {
            if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            }
        })
    })
}
