use crate::platform::EnergyMode;

/// Engine tunables. `Default` matches the firmware this engine ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Delay after every command write, needed by the peripheral's
    /// read-while-modify synchronisation.
    pub settle_us: u32,
    /// NACKs tolerated per state before the transaction is abandoned.
    /// `None` retries forever.
    pub nack_retry_limit: Option<u32>,
    /// MSTOP polls during a bus reset before giving up.
    pub reset_poll_limit: u32,
    /// Polls of the busy flag before `begin_transaction` gives up.
    pub busy_poll_limit: u32,
    pub busy_poll_interval_us: u32,
    /// Energy mode the processor must stay out of while a transaction runs.
    pub energy_floor: EnergyMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            settle_us: 80_000,
            nack_retry_limit: None,
            reset_poll_limit: 100_000,
            busy_poll_limit: 10_000,
            busy_poll_interval_us: 100,
            energy_floor: EnergyMode::Em2,
        }
    }
}
