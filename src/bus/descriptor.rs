use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::registers::PeripheralId;
use super::rw_bit::SlaveAddress;
use super::{Error, Result};
use crate::platform::CallbackId;
use crate::sensor;

/// Widest payload the destination accumulator holds.
pub const MAX_PAYLOAD: usize = 4;

/// Progress of one read transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Address+write header sent, waiting for the slave to claim it.
    RequestResource,
    /// Measure command sent.
    CommandTransmitted,
    /// Repeated START and address+read header sent.
    DataRequested,
    DataReceiving,
    /// NACK+STOP issued, waiting for the STOP to complete.
    StopPending,
}

/// Hardware events the state machine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Ack,
    Nack,
    RxData,
    Stop,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Event::Ack => "ACK",
            Event::Nack => "NACK",
            Event::RxData => "RXDATAV",
            Event::Stop => "MSTOP",
        })
    }
}

/// Caller-owned storage the received payload is accumulated into.
///
/// Clones share the same cell, so the caller keeps one handle and the
/// transaction writes through the other.
#[derive(Debug, Clone, Default)]
pub struct Destination(Arc<AtomicU32>);

impl Destination {
    pub fn new() -> Self {
        Destination::default()
    }

    pub fn value(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn clear(&self) {
        self.0.store(0, Ordering::Release);
    }

    /// Places `byte` so that the byte arriving while `remaining` bytes are
    /// still outstanding ends up at bit `remaining * 8`.
    fn merge(&self, byte: u8, remaining: usize) {
        self.0
            .fetch_or(u32::from(byte) << (8 * remaining), Ordering::AcqRel);
    }
}

/// Everything a caller supplies to arm a transaction.
#[derive(Debug, Clone)]
pub struct Request {
    pub peripheral: PeripheralId,
    pub slave_address: u8,
    /// Command byte written after the slave claims the write header.
    pub command: u8,
    pub length: usize,
    pub destination: Destination,
    pub callback: CallbackId,
}

impl Request {
    /// Relative humidity measurement from an Si7021 in no hold master mode.
    pub fn measure_humidity(
        peripheral: PeripheralId,
        destination: Destination,
        callback: CallbackId,
    ) -> Self {
        Request {
            peripheral,
            slave_address: sensor::SI7021_ADDRESS,
            command: sensor::MEASURE_RH_NO_HOLD,
            length: sensor::MEASUREMENT_LEN,
            destination,
            callback,
        }
    }
}

/// The live per-peripheral transaction record.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub(crate) peripheral: PeripheralId,
    pub(crate) state: State,
    pub(crate) busy: bool,
    pub(crate) slave_address: SlaveAddress,
    pub(crate) command: u8,
    pub(crate) destination: Destination,
    pub(crate) bytes_remaining: usize,
    pub(crate) callback: CallbackId,
    /// NACKs seen in the current state, reset on every state change.
    pub(crate) retries: u32,
}

impl Descriptor {
    /// Validates a request and seeds a fresh, busy descriptor from it.
    pub(crate) fn arm(request: &Request) -> Result<Self> {
        let slave_address = SlaveAddress::new(request.slave_address)?;
        if request.length == 0 || request.length > MAX_PAYLOAD {
            return Err(Error::InvalidLength(request.length));
        }

        Ok(Descriptor {
            peripheral: request.peripheral,
            state: State::RequestResource,
            busy: true,
            slave_address,
            command: request.command,
            destination: request.destination.clone(),
            bytes_remaining: request.length,
            callback: request.callback,
            retries: 0,
        })
    }

    pub fn peripheral(&self) -> PeripheralId {
        self.peripheral
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn bytes_remaining(&self) -> usize {
        self.bytes_remaining
    }

    pub(crate) fn advance(&mut self, next: State) {
        trace!(
            "{}: {:?} -> {:?}",
            self.peripheral,
            self.state,
            next
        );
        self.state = next;
        self.retries = 0;
    }

    /// Consumes one received byte. Returns the count still outstanding.
    pub(crate) fn store(&mut self, byte: u8) -> usize {
        self.bytes_remaining -= 1;
        self.destination.merge(byte, self.bytes_remaining);
        self.bytes_remaining
    }
}
