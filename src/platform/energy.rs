use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use super::EnergyGovernor;

/// Processor energy modes, shallowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EnergyMode {
    Em0 = 0,
    Em1 = 1,
    Em2 = 2,
    Em3 = 3,
    Em4 = 4,
}

impl EnergyMode {
    const ALL: [EnergyMode; 5] = [
        EnergyMode::Em0,
        EnergyMode::Em1,
        EnergyMode::Em2,
        EnergyMode::Em3,
        EnergyMode::Em4,
    ];
}

impl fmt::Display for EnergyMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EM{}", *self as u8)
    }
}

/// Reference-counted sleep blocker.
///
/// Every `forbid(mode)` bumps the count for `mode`; the deepest mode the
/// processor may enter is the one just above the shallowest blocked mode.
#[derive(Debug, Default)]
pub struct SleepGovernor {
    blocks: [AtomicU32; 5],
    forbids: AtomicU32,
    permits: AtomicU32,
}

impl SleepGovernor {
    pub fn new() -> Self {
        SleepGovernor::default()
    }

    pub fn blocks(&self, mode: EnergyMode) -> u32 {
        self.blocks[mode as usize].load(Ordering::Acquire)
    }

    /// Deepest mode currently allowed.
    pub fn deepest_allowed(&self) -> EnergyMode {
        EnergyMode::ALL
            .iter()
            .copied()
            .find(|mode| self.blocks(*mode) > 0)
            .map(|blocked| match blocked {
                EnergyMode::Em0 => EnergyMode::Em0,
                EnergyMode::Em1 => EnergyMode::Em0,
                EnergyMode::Em2 => EnergyMode::Em1,
                EnergyMode::Em3 => EnergyMode::Em2,
                EnergyMode::Em4 => EnergyMode::Em3,
            })
            .unwrap_or(EnergyMode::Em4)
    }

    /// Total `forbid` calls seen.
    pub fn forbids(&self) -> u32 {
        self.forbids.load(Ordering::Acquire)
    }

    /// Total `permit` calls seen.
    pub fn permits(&self) -> u32 {
        self.permits.load(Ordering::Acquire)
    }
}

impl EnergyGovernor for SleepGovernor {
    fn forbid(&self, floor: EnergyMode) {
        let count = self.blocks[floor as usize].fetch_add(1, Ordering::AcqRel) + 1;
        self.forbids.fetch_add(1, Ordering::AcqRel);
        debug!("{} blocked ({} holders)", floor, count);
    }

    fn permit(&self, floor: EnergyMode) {
        self.permits.fetch_add(1, Ordering::AcqRel);
        let released = self.blocks[floor as usize].fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |count| count.checked_sub(1),
        );

        match released {
            Ok(count) => debug!("{} unblocked ({} holders)", floor, count - 1),
            Err(_) => warn!("{} unblocked without a matching block", floor),
        }
    }
}
