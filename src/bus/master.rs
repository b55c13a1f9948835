use std::cell::RefCell;

use critical_section::Mutex;

use super::descriptor::{Descriptor, Request};
use super::registers::{Command, Interrupts, PeripheralId, Route};
use super::I2cRegisters;
use super::reset::bus_reset;
use super::rw_bit::RwBit;
use super::{Error, Result};
use crate::config::Config;
use crate::platform::{Delay, EnergyGovernor, Scheduler};

/// One peripheral's registers and its live transaction slot.
pub(crate) struct Channel<R> {
    pub(crate) id: PeripheralId,
    pub(crate) regs: R,
    pub(crate) descriptor: Option<Descriptor>,
}

impl<R> Channel<R> {
    fn is_busy(&self) -> bool {
        self.descriptor.as_ref().map_or(false, |d| d.busy)
    }
}

/// Registry of both I2C peripherals and the services their transactions use.
///
/// Built once at startup. Task code calls [`Master::begin_transaction`];
/// the interrupt vectors call [`Master::on_interrupt`]. Every touch of a
/// channel happens inside a critical section.
pub struct Master<R, E, S, D> {
    channels: [Mutex<RefCell<Channel<R>>>; 2],
    pub(crate) config: Config,
    pub(crate) energy: E,
    pub(crate) scheduler: S,
    pub(crate) delay: D,
}

impl<R, E, S, D> Master<R, E, S, D>
where
    R: I2cRegisters,
    E: EnergyGovernor,
    S: Scheduler,
    D: Delay,
{
    pub fn new(i2c0: R, i2c1: R, energy: E, scheduler: S, delay: D, config: Config) -> Self {
        let channel = |id, regs| {
            Mutex::new(RefCell::new(Channel {
                id,
                regs,
                descriptor: None,
            }))
        };

        Master {
            channels: [
                channel(PeripheralId::I2c0, i2c0),
                channel(PeripheralId::I2c1, i2c1),
            ],
            config,
            energy,
            scheduler,
            delay,
        }
    }

    pub(crate) fn channel(&self, id: PeripheralId) -> &Mutex<RefCell<Channel<R>>> {
        &self.channels[id.index()]
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Brings a peripheral up: clock, register check, pin routing, bus reset.
    pub fn open(&self, id: PeripheralId, route: &Route) -> Result<()> {
        info!("{}: opening", id);

        critical_section::with(|cs| {
            let mut channel = self.channel(id).borrow_ref_mut(cs);
            let regs = &mut channel.regs;

            regs.enable_clock();

            // make sure the flag registers respond before trusting them
            if !regs.flags().contains(Interrupts::START) {
                regs.set_flags(Interrupts::START);
                if !regs.flags().contains(Interrupts::START) {
                    return Err(Error::RegisterCheck {
                        peripheral: id,
                        flag: Interrupts::START,
                    });
                }
            } else {
                regs.clear_flags(Interrupts::START);
                if regs.flags().contains(Interrupts::START) {
                    return Err(Error::RegisterCheck {
                        peripheral: id,
                        flag: Interrupts::START,
                    });
                }
            }

            regs.route(route);
            bus_reset(id, regs, self.config.reset_poll_limit)
        })
    }

    /// Arms a read transaction and returns once the START is on the bus.
    ///
    /// Waits, with interrupts enabled between polls, for any transaction
    /// already running on the same peripheral to complete. Completion is
    /// reported later through the scheduler.
    pub fn begin_transaction(&self, request: &Request) -> Result<()> {
        let id = request.peripheral;
        let descriptor = Descriptor::arm(request)?;
        let header = descriptor.slave_address.header(RwBit::Write);
        let mut descriptor = Some(descriptor);
        let slot = self.channel(id);

        let mut polls = 0;
        loop {
            let armed = critical_section::with(|cs| -> Result<bool> {
                let mut channel = slot.borrow_ref_mut(cs);
                if channel.is_busy() {
                    return Ok(false);
                }

                if !channel.regs.is_idle() {
                    error!("{}: hardware not idle when arming", id);
                    return Err(Error::NotIdle { peripheral: id });
                }

                self.energy.forbid(self.config.energy_floor);
                request.destination.clear();
                channel.descriptor = descriptor.take();
                channel.regs.set_enabled(Interrupts::TRANSACTION);
                channel.regs.enable_irq();
                self.delay.delay_us(self.config.settle_us);
                Ok(true)
            })?;

            if armed {
                break;
            }

            polls += 1;
            if polls >= self.config.busy_poll_limit {
                warn!("{}: gave up waiting after {} polls", id, polls);
                return Err(Error::BusyTimeout {
                    peripheral: id,
                    polls,
                });
            }
            self.delay.delay_us(self.config.busy_poll_interval_us);
        }

        critical_section::with(|cs| {
            let mut channel = slot.borrow_ref_mut(cs);
            channel.regs.command(Command::START);
            channel.regs.transmit(header);
        });

        debug!(
            "{}: transaction to {:#04x} started ({} byte read)",
            id, request.slave_address, request.length
        );
        Ok(())
    }

    pub fn is_busy(&self, id: PeripheralId) -> bool {
        critical_section::with(|cs| self.channel(id).borrow_ref(cs).is_busy())
    }

    /// Snapshot of the live descriptor, if a transaction was ever armed.
    pub fn descriptor(&self, id: PeripheralId) -> Option<Descriptor> {
        critical_section::with(|cs| self.channel(id).borrow_ref(cs).descriptor.clone())
    }

    /// Runs `f` on a peripheral's registers inside a critical section.
    pub fn with_registers<T>(&self, id: PeripheralId, f: impl FnOnce(&mut R) -> T) -> T {
        critical_section::with(|cs| f(&mut self.channel(id).borrow_ref_mut(cs).regs))
    }
}
