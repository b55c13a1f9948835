use super::registers::{Command, Interrupts, PeripheralId};
use super::I2cRegisters;
use super::{Error, Result};

/// Forces a peripheral back to bus idle, whatever it was doing.
///
/// IEN is saved on entry and restored on every exit, failed ones included,
/// so the call leaves the enabled interrupt sources as it found them. Gives
/// up with [`Error::ResetStall`] when the START+STOP cycle is not confirmed
/// within `poll_limit` polls.
pub fn bus_reset<R: I2cRegisters>(
    peripheral: PeripheralId,
    regs: &mut R,
    poll_limit: u32,
) -> Result<()> {
    trace!("{}: bus reset", peripheral);

    regs.command(Command::ABORT);

    let saved = regs.enabled();
    regs.set_enabled(Interrupts::empty());
    let result = reset_cycle(peripheral, regs, poll_limit);
    regs.set_enabled(saved);
    result
}

/// Everything between masking and unmasking the peripheral's sources.
fn reset_cycle<R: I2cRegisters>(
    peripheral: PeripheralId,
    regs: &mut R,
    poll_limit: u32,
) -> Result<()> {
    regs.clear_flags(Interrupts::all());

    let leftover = regs.flags();
    if !leftover.is_empty() {
        error!("{}: flags {:?} survived a clear", peripheral, leftover);
        return Err(Error::FlagsNotCleared {
            peripheral,
            flags: leftover,
        });
    }

    regs.command(Command::CLEARTX);
    regs.clear_flags(Interrupts::MSTOP);

    // START and STOP in one write clocks a reset cycle onto the bus
    regs.command(Command::START | Command::STOP);

    let mut polls = 0;
    while !regs.flags().contains(Interrupts::MSTOP) {
        polls += 1;
        if polls >= poll_limit {
            error!("{}: bus reset stalled after {} polls", peripheral, polls);
            return Err(Error::ResetStall { peripheral, polls });
        }
        std::hint::spin_loop();
    }

    // the reset cycle raises START/MSTOP as a side effect
    regs.clear_flags(Interrupts::all());
    regs.command(Command::ABORT);

    debug!("{}: bus idle after {} polls", peripheral, polls);
    Ok(())
}
