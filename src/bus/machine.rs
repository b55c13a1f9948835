//! Interrupt side of a transaction.
//!
//! One vector entry acknowledges every raised, enabled flag and then runs
//! the ACK, NACK, RXDATAV and MSTOP handlers, in that order, for each one
//! that was set.

use super::descriptor::{Descriptor, Event, State};
use super::master::{Channel, Master};
use super::registers::{Command, Interrupts, PeripheralId};
use super::I2cRegisters;
use super::reset::bus_reset;
use super::rw_bit::RwBit;
use super::{Error, Result};
use crate::platform::{Delay, EnergyGovernor, Scheduler};

/// How the Completion Path ends a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Done,
    Abandoned,
}

fn violation(peripheral: PeripheralId, state: State, event: Event) -> Error {
    error!("{}: {} not expected in {:?}", peripheral, event, state);
    Error::ProtocolViolation {
        peripheral,
        state,
        event,
    }
}

/// Looks up the running transaction. Events with none running are spurious.
fn live(
    peripheral: PeripheralId,
    descriptor: &mut Option<Descriptor>,
    event: Event,
) -> Result<&mut Descriptor> {
    descriptor.as_mut().filter(|d| d.busy).ok_or_else(|| {
        error!("{}: {} with no transaction armed", peripheral, event);
        Error::Spurious { peripheral, event }
    })
}

impl<R, E, S, D> Master<R, E, S, D>
where
    R: I2cRegisters,
    E: EnergyGovernor,
    S: Scheduler,
    D: Delay,
{
    /// Interrupt entry point for one peripheral.
    pub fn on_interrupt(&self, id: PeripheralId) -> Result<()> {
        critical_section::with(|cs| {
            let mut channel = self.channel(id).borrow_ref_mut(cs);
            let channel = &mut *channel;

            let raised = channel.regs.flags() & channel.regs.enabled();
            channel.regs.clear_flags(raised);
            trace!("{}: interrupt {:?}", id, raised);

            if raised.contains(Interrupts::ACK) {
                self.on_ack(channel)?;
            }
            if raised.contains(Interrupts::NACK) {
                self.on_nack(channel)?;
            }
            if raised.contains(Interrupts::RXDATAV) {
                self.on_rx_data(channel)?;
            }
            if raised.contains(Interrupts::MSTOP) {
                self.on_stop(channel)?;
            }
            Ok(())
        })
    }

    /// I2C0 vector.
    pub fn i2c0_irq(&self) -> Result<()> {
        self.on_interrupt(PeripheralId::I2c0)
    }

    /// I2C1 vector.
    pub fn i2c1_irq(&self) -> Result<()> {
        self.on_interrupt(PeripheralId::I2c1)
    }

    fn settle(&self) {
        self.delay.delay_us(self.config.settle_us);
    }

    fn on_ack(&self, channel: &mut Channel<R>) -> Result<()> {
        let Channel {
            id,
            regs,
            descriptor,
        } = channel;
        let d = live(*id, descriptor, Event::Ack)?;

        match d.state {
            State::RequestResource => {
                regs.transmit(d.command);
                d.advance(State::CommandTransmitted);
            }
            State::CommandTransmitted => {
                regs.command(Command::START);
                regs.transmit(d.slave_address.header(RwBit::Read));
                d.advance(State::DataRequested);
            }
            State::DataRequested => {
                d.advance(State::DataReceiving);
            }
            state => return Err(violation(*id, state, Event::Ack)),
        }

        self.settle();
        Ok(())
    }

    fn on_nack(&self, channel: &mut Channel<R>) -> Result<()> {
        let Channel {
            id,
            regs,
            descriptor,
        } = channel;
        let d = live(*id, descriptor, Event::Nack)?;

        let (cmd, byte) = match d.state {
            State::RequestResource => (Command::START, d.slave_address.header(RwBit::Write)),
            State::CommandTransmitted => (Command::CONT, d.command),
            State::DataRequested => (Command::START, d.slave_address.header(RwBit::Read)),
            state => return Err(violation(*id, state, Event::Nack)),
        };

        if let Some(limit) = self.config.nack_retry_limit {
            if d.retries >= limit {
                let (state, attempts) = (d.state, d.retries);
                warn!(
                    "{}: abandoning transaction after {} NACKs in {:?}",
                    id, attempts, state
                );
                if let Err(reset) = self.complete(*id, regs, d, Outcome::Abandoned) {
                    error!("{}: bus reset after abandoning failed: {}", id, reset);
                }
                self.settle();
                return Err(Error::NackLimit {
                    peripheral: *id,
                    state,
                    attempts,
                });
            }
        }

        d.retries += 1;
        debug!("{}: NACK in {:?}, retry {}", id, d.state, d.retries);
        regs.command(cmd);
        regs.transmit(byte);

        self.settle();
        Ok(())
    }

    fn on_rx_data(&self, channel: &mut Channel<R>) -> Result<()> {
        let Channel {
            id,
            regs,
            descriptor,
        } = channel;

        if let Some(d) = descriptor
            .as_mut()
            .filter(|d| d.busy && d.state == State::DataReceiving)
        {
            let byte = regs.receive();
            let remaining = d.store(byte);
            trace!("{}: received {:#04x}, {} to go", id, byte, remaining);

            if remaining > 0 {
                regs.command(Command::ACK);
            } else {
                regs.command(Command::NACK);
                d.advance(State::StopPending);
                regs.command(Command::STOP);
            }
        }

        self.settle();
        Ok(())
    }

    fn on_stop(&self, channel: &mut Channel<R>) -> Result<()> {
        let Channel {
            id,
            regs,
            descriptor,
        } = channel;
        let d = live(*id, descriptor, Event::Stop)?;

        if d.state != State::StopPending {
            return Err(violation(*id, d.state, Event::Stop));
        }

        let completed = self.complete(*id, regs, d, Outcome::Done);
        self.settle();
        completed
    }

    /// Completion Path: release the slot and the energy floor, hand the
    /// callback over, then leave the bus idle for whoever is next.
    fn complete(
        &self,
        id: PeripheralId,
        regs: &mut R,
        d: &mut Descriptor,
        outcome: Outcome,
    ) -> Result<()> {
        d.busy = false;
        self.energy.permit(self.config.energy_floor);

        if outcome == Outcome::Done {
            info!(
                "{}: transaction complete, value {:#x}",
                id,
                d.destination.value()
            );
            self.scheduler.schedule(d.callback);
        }

        bus_reset(id, regs, self.config.reset_poll_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Destination, Request, Route};
    use crate::config::Config;
    use crate::emulation::{BusOp, RecordingDelay, RecordingScheduler, SimPeripheral};
    use crate::platform::{CallbackId, EnergyMode, SleepGovernor};

    const SETTLE: u32 = 7;
    const CALLBACK: CallbackId = CallbackId(0b100);

    type TestMaster<'a> =
        Master<SimPeripheral, &'a SleepGovernor, &'a RecordingScheduler, &'a RecordingDelay>;

    struct Rig {
        i2c0: SimPeripheral,
        i2c1: SimPeripheral,
        governor: SleepGovernor,
        scheduler: RecordingScheduler,
        delay: RecordingDelay,
        destination: Destination,
    }

    impl Rig {
        fn new() -> Self {
            Rig {
                i2c0: SimPeripheral::new(),
                i2c1: SimPeripheral::new(),
                governor: SleepGovernor::new(),
                scheduler: RecordingScheduler::new(),
                delay: RecordingDelay::new(),
                destination: Destination::new(),
            }
        }

        fn master(&self, config: Config) -> TestMaster<'_> {
            Master::new(
                self.i2c0.clone(),
                self.i2c1.clone(),
                &self.governor,
                &self.scheduler,
                &self.delay,
                config,
            )
        }

        fn request(&self, length: usize) -> Request {
            Request {
                peripheral: PeripheralId::I2c0,
                slave_address: 0x40,
                command: 0xF5,
                length,
                destination: self.destination.clone(),
                callback: CALLBACK,
            }
        }

        /// Raises `flags` on I2C0 and enters its vector once.
        fn event(&self, master: &TestMaster<'_>, flags: Interrupts) -> Result<()> {
            self.i2c0.raise(flags);
            master.on_interrupt(PeripheralId::I2c0)
        }

        fn state(&self, master: &TestMaster<'_>) -> State {
            master.descriptor(PeripheralId::I2c0).unwrap().state()
        }
    }

    fn config() -> Config {
        Config {
            settle_us: SETTLE,
            nack_retry_limit: None,
            reset_poll_limit: 10,
            busy_poll_limit: 3,
            busy_poll_interval_us: 1,
            energy_floor: EnergyMode::Em2,
        }
    }

    #[test]
    fn begin_arms_interrupts_and_sends_write_header() {
        let rig = Rig::new();
        let master = rig.master(config());

        master.begin_transaction(&rig.request(2)).unwrap();

        assert!(master.is_busy(PeripheralId::I2c0));
        assert!(!master.is_busy(PeripheralId::I2c1));
        assert!(rig.i2c0.irq_enabled());
        assert_eq!(rig.state(&master), State::RequestResource);
        assert_eq!(rig.governor.blocks(EnergyMode::Em2), 1);
        assert_eq!(rig.delay.calls(), vec![SETTLE]);
        assert_eq!(
            master.descriptor(PeripheralId::I2c0).unwrap().peripheral(),
            PeripheralId::I2c0
        );
        assert_eq!(
            rig.i2c0.log(),
            vec![
                BusOp::Enable(Interrupts::TRANSACTION),
                BusOp::Command(Command::START),
                BusOp::Transmit(0x80),
            ]
        );
    }

    #[test]
    fn two_byte_read_completes_through_every_state() {
        let rig = Rig::new();
        let master = rig.master(config());
        master.begin_transaction(&rig.request(2)).unwrap();
        rig.i2c0.clear_log();

        rig.event(&master, Interrupts::ACK).unwrap();
        assert_eq!(rig.state(&master), State::CommandTransmitted);
        rig.event(&master, Interrupts::ACK).unwrap();
        assert_eq!(rig.state(&master), State::DataRequested);
        rig.event(&master, Interrupts::ACK).unwrap();
        assert_eq!(rig.state(&master), State::DataReceiving);

        rig.i2c0.deliver(0xAB);
        master.on_interrupt(PeripheralId::I2c0).unwrap();
        assert_eq!(
            master.descriptor(PeripheralId::I2c0).unwrap().bytes_remaining(),
            1
        );
        rig.i2c0.deliver(0x12);
        master.on_interrupt(PeripheralId::I2c0).unwrap();
        assert_eq!(rig.state(&master), State::StopPending);

        // the STOP command makes the peripheral raise MSTOP
        assert!(rig.i2c0.irq_pending());
        master.i2c0_irq().unwrap();

        assert_eq!(rig.destination.value(), 0xAB12);
        assert!(!master.is_busy(PeripheralId::I2c0));
        assert_eq!(rig.scheduler.scheduled(), vec![CALLBACK]);
        assert_eq!(rig.governor.forbids(), 1);
        assert_eq!(rig.governor.permits(), 1);
        assert_eq!(rig.governor.blocks(EnergyMode::Em2), 0);
        assert_eq!(
            rig.i2c0.log(),
            vec![
                BusOp::Transmit(0xF5),
                BusOp::Command(Command::START),
                BusOp::Transmit(0x81),
                BusOp::Command(Command::ACK),
                BusOp::Command(Command::NACK),
                BusOp::Command(Command::STOP),
                BusOp::Command(Command::ABORT),
                BusOp::Enable(Interrupts::empty()),
                BusOp::Command(Command::CLEARTX),
                BusOp::Command(Command::START | Command::STOP),
                BusOp::Command(Command::ABORT),
                BusOp::Enable(Interrupts::TRANSACTION),
            ]
        );
    }

    #[test]
    fn read_header_ack_and_first_byte_in_one_entry() {
        let rig = Rig::new();
        let master = rig.master(config());
        master.begin_transaction(&rig.request(1)).unwrap();
        rig.event(&master, Interrupts::ACK).unwrap();
        rig.event(&master, Interrupts::ACK).unwrap();

        rig.i2c0.deliver(0x5A);
        rig.event(&master, Interrupts::ACK).unwrap();

        assert_eq!(rig.state(&master), State::StopPending);
        assert_eq!(rig.destination.value(), 0x5A);
    }

    #[test]
    fn each_byte_lands_below_the_previous_one() {
        let rig = Rig::new();
        let master = rig.master(config());
        master.begin_transaction(&rig.request(4)).unwrap();
        for _ in 0..3 {
            rig.event(&master, Interrupts::ACK).unwrap();
        }

        let mut seen = Vec::new();
        for byte in [0x01, 0x02, 0x03, 0x04] {
            rig.i2c0.deliver(byte);
            master.on_interrupt(PeripheralId::I2c0).unwrap();
            seen.push(
                master
                    .descriptor(PeripheralId::I2c0)
                    .unwrap()
                    .bytes_remaining(),
            );
        }

        assert_eq!(seen, vec![3, 2, 1, 0]);
        assert_eq!(rig.destination.value(), 0x0102_0304);
    }

    #[test]
    fn nack_in_request_resource_resends_write_header() {
        let rig = Rig::new();
        let master = rig.master(config());
        master.begin_transaction(&rig.request(2)).unwrap();
        rig.i2c0.clear_log();

        rig.event(&master, Interrupts::NACK).unwrap();
        rig.event(&master, Interrupts::NACK).unwrap();

        assert_eq!(rig.state(&master), State::RequestResource);
        assert_eq!(
            rig.i2c0.log(),
            vec![
                BusOp::Command(Command::START),
                BusOp::Transmit(0x80),
                BusOp::Command(Command::START),
                BusOp::Transmit(0x80),
            ]
        );
    }

    #[test]
    fn nack_in_command_transmitted_costs_exactly_one_step() {
        let rig = Rig::new();
        let master = rig.master(config());
        master.begin_transaction(&rig.request(2)).unwrap();
        rig.event(&master, Interrupts::ACK).unwrap();
        rig.i2c0.clear_log();

        rig.event(&master, Interrupts::NACK).unwrap();
        assert_eq!(rig.state(&master), State::CommandTransmitted);
        rig.event(&master, Interrupts::ACK).unwrap();
        assert_eq!(rig.state(&master), State::DataRequested);

        assert_eq!(
            rig.i2c0.log(),
            vec![
                BusOp::Command(Command::CONT),
                BusOp::Transmit(0xF5),
                BusOp::Command(Command::START),
                BusOp::Transmit(0x81),
            ]
        );
    }

    #[test]
    fn nack_in_data_requested_resends_read_header() {
        let rig = Rig::new();
        let master = rig.master(config());
        master.begin_transaction(&rig.request(2)).unwrap();
        rig.event(&master, Interrupts::ACK).unwrap();
        rig.event(&master, Interrupts::ACK).unwrap();
        rig.i2c0.clear_log();

        rig.event(&master, Interrupts::NACK).unwrap();

        assert_eq!(rig.state(&master), State::DataRequested);
        assert_eq!(
            rig.i2c0.log(),
            vec![BusOp::Command(Command::START), BusOp::Transmit(0x81)]
        );
    }

    #[test]
    fn events_out_of_order_are_protocol_violations() {
        let rig = Rig::new();
        let master = rig.master(config());
        master.begin_transaction(&rig.request(2)).unwrap();

        let err = rig.event(&master, Interrupts::MSTOP).unwrap_err();
        assert!(matches!(
            err,
            Error::ProtocolViolation {
                state: State::RequestResource,
                event: Event::Stop,
                ..
            }
        ));

        for _ in 0..3 {
            rig.event(&master, Interrupts::ACK).unwrap();
        }
        let err = rig.event(&master, Interrupts::ACK).unwrap_err();
        assert!(matches!(
            err,
            Error::ProtocolViolation {
                state: State::DataReceiving,
                event: Event::Ack,
                ..
            }
        ));
        let err = rig.event(&master, Interrupts::NACK).unwrap_err();
        assert!(matches!(
            err,
            Error::ProtocolViolation {
                event: Event::Nack,
                ..
            }
        ));
    }

    #[test]
    fn received_byte_outside_data_receiving_is_ignored() {
        let rig = Rig::new();
        let master = rig.master(config());
        master.begin_transaction(&rig.request(2)).unwrap();
        rig.i2c0.clear_log();

        rig.i2c0.deliver(0xEE);
        master.on_interrupt(PeripheralId::I2c0).unwrap();

        assert_eq!(rig.state(&master), State::RequestResource);
        assert_eq!(rig.destination.value(), 0);
        assert!(rig.i2c0.log().is_empty());
    }

    #[test]
    fn interrupt_without_transaction_is_spurious() {
        let rig = Rig::new();
        let master = rig.master(config());
        master.with_registers(PeripheralId::I2c1, |regs| {
            regs.set_enabled(Interrupts::TRANSACTION)
        });
        rig.i2c1.raise(Interrupts::ACK);

        let err = master.i2c1_irq().unwrap_err();
        assert!(matches!(
            err,
            Error::Spurious {
                peripheral: PeripheralId::I2c1,
                event: Event::Ack
            }
        ));
    }

    #[test]
    fn flags_not_enabled_are_left_raised() {
        let rig = Rig::new();
        let master = rig.master(config());
        master.begin_transaction(&rig.request(2)).unwrap();

        rig.event(&master, Interrupts::ACK | Interrupts::BUSERR).unwrap();

        assert_eq!(rig.i2c0.flags(), Interrupts::BUSERR);
        assert_eq!(rig.state(&master), State::CommandTransmitted);
    }

    #[test]
    fn every_handler_settles_once() {
        let rig = Rig::new();
        let master = rig.master(config());
        master.begin_transaction(&rig.request(1)).unwrap();

        rig.event(&master, Interrupts::NACK).unwrap();
        rig.event(&master, Interrupts::ACK).unwrap();
        rig.event(&master, Interrupts::ACK).unwrap();
        rig.i2c0.deliver(0x01);
        rig.event(&master, Interrupts::ACK).unwrap();
        master.on_interrupt(PeripheralId::I2c0).unwrap();

        // begin, NACK, three ACKs, one byte, MSTOP
        assert_eq!(rig.delay.count(SETTLE), 7);
    }

    #[test]
    fn second_begin_waits_for_busy_and_gives_up() {
        let rig = Rig::new();
        let master = rig.master(config());
        master.begin_transaction(&rig.request(2)).unwrap();

        let mut second = rig.request(1);
        second.callback = CallbackId(0b1);
        let err = master.begin_transaction(&second).unwrap_err();

        assert!(matches!(err, Error::BusyTimeout { polls: 3, .. }));
        let live = master.descriptor(PeripheralId::I2c0).unwrap();
        assert_eq!(live.bytes_remaining(), 2);
        assert_eq!(rig.governor.forbids(), 1);
        assert_eq!(rig.delay.count(1), 2);
    }

    #[test]
    fn begin_refuses_a_bus_that_is_not_idle() {
        let rig = Rig::new();
        let master = rig.master(config());
        rig.i2c0.force_busy(true);

        let err = master.begin_transaction(&rig.request(2)).unwrap_err();

        assert!(matches!(err, Error::NotIdle { .. }));
        assert_eq!(rig.governor.forbids(), 0);
        assert!(!master.is_busy(PeripheralId::I2c0));
    }

    #[test]
    fn nack_ceiling_abandons_without_callback() {
        let rig = Rig::new();
        let master = rig.master(Config {
            nack_retry_limit: Some(1),
            ..config()
        });
        master.begin_transaction(&rig.request(2)).unwrap();

        rig.event(&master, Interrupts::NACK).unwrap();
        let err = rig.event(&master, Interrupts::NACK).unwrap_err();

        assert!(matches!(
            err,
            Error::NackLimit {
                state: State::RequestResource,
                attempts: 1,
                ..
            }
        ));
        assert!(!master.is_busy(PeripheralId::I2c0));
        assert!(rig.scheduler.scheduled().is_empty());
        assert_eq!(rig.governor.permits(), 1);
        assert!(rig.i2c0.is_idle());
        // begin, the retried NACK, the abandoning NACK
        assert_eq!(rig.delay.count(SETTLE), 3);
    }

    #[test]
    fn abandoning_reports_nack_limit_even_when_reset_stalls() {
        let rig = Rig::new();
        let master = rig.master(Config {
            nack_retry_limit: Some(0),
            ..config()
        });
        master.begin_transaction(&rig.request(2)).unwrap();
        rig.i2c0.stall_stop(true);

        let err = rig.event(&master, Interrupts::NACK).unwrap_err();

        assert!(matches!(err, Error::NackLimit { attempts: 0, .. }));
        assert!(!master.is_busy(PeripheralId::I2c0));
        assert_eq!(rig.i2c0.enabled(), Interrupts::TRANSACTION);
        assert_eq!(rig.delay.count(SETTLE), 2);
    }

    #[test]
    fn failed_completion_still_settles() {
        let rig = Rig::new();
        let master = rig.master(config());
        master.begin_transaction(&rig.request(1)).unwrap();
        for _ in 0..3 {
            rig.event(&master, Interrupts::ACK).unwrap();
        }
        rig.i2c0.stall_stop(true);
        rig.i2c0.deliver(0x42);
        master.on_interrupt(PeripheralId::I2c0).unwrap();
        assert_eq!(rig.state(&master), State::StopPending);

        let err = rig.event(&master, Interrupts::MSTOP).unwrap_err();

        assert!(matches!(err, Error::ResetStall { polls: 10, .. }));
        assert!(!master.is_busy(PeripheralId::I2c0));
        assert_eq!(rig.scheduler.scheduled(), vec![CALLBACK]);
        assert_eq!(rig.i2c0.enabled(), Interrupts::TRANSACTION);
        // begin, three ACKs, the byte, the failed MSTOP
        assert_eq!(rig.delay.count(SETTLE), 6);
    }

    #[test]
    fn retry_count_resets_when_state_advances() {
        let rig = Rig::new();
        let master = rig.master(Config {
            nack_retry_limit: Some(1),
            ..config()
        });
        master.begin_transaction(&rig.request(2)).unwrap();

        rig.event(&master, Interrupts::NACK).unwrap();
        rig.event(&master, Interrupts::ACK).unwrap();
        rig.event(&master, Interrupts::NACK).unwrap();

        assert_eq!(rig.state(&master), State::CommandTransmitted);
        assert!(master.is_busy(PeripheralId::I2c0));
    }

    #[test]
    fn open_checks_registers_routes_and_resets() {
        let rig = Rig::new();
        let master = rig.master(config());
        let route = Route {
            sda_location: 15,
            scl_location: 15,
            sda_enable: true,
            scl_enable: true,
        };

        master.open(PeripheralId::I2c1, &route).unwrap();

        assert!(rig.i2c1.clock_enabled());
        assert_eq!(rig.i2c1.current_route(), route);
        assert!(rig.i2c1.flags().is_empty());
        assert!(rig.i2c1.is_idle());
        assert!(!rig.i2c0.clock_enabled());
    }
}
