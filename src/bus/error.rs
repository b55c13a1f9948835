use thiserror::Error;

use super::descriptor::{Event, State};
use super::registers::{Interrupts, PeripheralId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An interrupt arrived in a state that does not expect it.
    #[error("{peripheral}: unexpected {event} interrupt in state {state:?}")]
    ProtocolViolation {
        peripheral: PeripheralId,
        state: State,
        event: Event,
    },

    #[error("{peripheral}: {event} interrupt with no transaction armed")]
    Spurious { peripheral: PeripheralId, event: Event },

    /// The hardware reported a busy bus while a new transaction was armed.
    #[error("{peripheral}: bus state machine is not idle, previous transaction leaked")]
    NotIdle { peripheral: PeripheralId },

    #[error("{peripheral}: interrupt flags {flags:?} still raised after clearing")]
    FlagsNotCleared {
        peripheral: PeripheralId,
        flags: Interrupts,
    },

    #[error("{peripheral}: flag {flag:?} did not latch during register check")]
    RegisterCheck {
        peripheral: PeripheralId,
        flag: Interrupts,
    },

    #[error("{peripheral}: no STOP observed after {polls} polls during bus reset")]
    ResetStall { peripheral: PeripheralId, polls: u32 },

    #[error("{peripheral}: still busy after {polls} polls")]
    BusyTimeout { peripheral: PeripheralId, polls: u32 },

    #[error("{peripheral}: slave NACKed {attempts} times in state {state:?}")]
    NackLimit {
        peripheral: PeripheralId,
        state: State,
        attempts: u32,
    },

    #[error("invalid slave address {0:#04x}")]
    InvalidAddress(u8),

    #[error("cannot receive {0} bytes into a 4 byte destination")]
    InvalidLength(usize),

    #[error("interrupt line of {peripheral} still pending after {steps} services")]
    Runaway { peripheral: PeripheralId, steps: usize },
}
