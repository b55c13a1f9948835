use std::sync::Arc;

use parking_lot::Mutex;

use super::SlaveDevice;
use crate::bus::{split_header, Command, I2cRegisters, Interrupts, Route, RwBit};

/// A register write seen by the simulated peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Command(Command),
    Transmit(u8),
    Enable(Interrupts),
}

/// What the simulated bus is doing from the slave's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// START issued, next transmitted byte is a header.
    Header,
    Writing,
    Reading,
    /// Master NACKed the last byte it wanted.
    Ending,
}

struct Inner {
    flags: Interrupts,
    stuck: Interrupts,
    enabled: Interrupts,
    rx: u8,
    irq_enabled: bool,
    clock_enabled: bool,
    route: Route,
    stall_stop: bool,
    force_busy: bool,
    phase: Phase,
    log: Vec<BusOp>,
    device: Option<Box<dyn SlaveDevice + Send>>,
}

/// In-memory I2C register block with an optional slave attached to its bus.
///
/// Clones share the same registers, so a test can keep a handle while the
/// engine owns another.
#[derive(Clone)]
pub struct SimPeripheral {
    inner: Arc<Mutex<Inner>>,
}

impl Default for SimPeripheral {
    fn default() -> Self {
        SimPeripheral::new()
    }
}

impl SimPeripheral {
    /// A peripheral with nothing attached. Writes are recorded but never
    /// answered, so tests raise every event themselves.
    pub fn new() -> Self {
        SimPeripheral {
            inner: Arc::new(Mutex::new(Inner {
                flags: Interrupts::empty(),
                stuck: Interrupts::empty(),
                enabled: Interrupts::empty(),
                rx: 0,
                irq_enabled: false,
                clock_enabled: false,
                route: Route::default(),
                stall_stop: false,
                force_busy: false,
                phase: Phase::Idle,
                log: Vec::new(),
                device: None,
            })),
        }
    }

    pub fn with_device<T: SlaveDevice + Send + 'static>(device: T) -> Self {
        let sim = SimPeripheral::new();
        sim.inner.lock().device = Some(Box::new(device));
        sim
    }

    /// Every CMD, TXDATA and IEN write so far.
    pub fn log(&self) -> Vec<BusOp> {
        self.inner.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.inner.lock().log.clear();
    }

    /// Raises interrupt flags as if the hardware had.
    pub fn raise(&self, flags: Interrupts) {
        self.inner.lock().flags |= flags;
    }

    /// Puts a byte into RXDATA and raises RXDATAV.
    pub fn deliver(&self, byte: u8) {
        let mut inner = self.inner.lock();
        inner.rx = byte;
        inner.flags |= Interrupts::RXDATAV;
    }

    /// Stops the peripheral from ever reporting a completed STOP.
    pub fn stall_stop(&self, stall: bool) {
        self.inner.lock().stall_stop = stall;
    }

    /// Flags that read back as set no matter what is cleared.
    pub fn stick_flags(&self, flags: Interrupts) {
        self.inner.lock().stuck = flags;
    }

    /// Makes the STATE register report a busy bus.
    pub fn force_busy(&self, busy: bool) {
        self.inner.lock().force_busy = busy;
    }

    /// Whether the interrupt line is armed and an enabled flag is raised.
    pub fn irq_pending(&self) -> bool {
        let inner = self.inner.lock();
        inner.irq_enabled && inner.flags.intersects(inner.enabled)
    }

    pub fn irq_enabled(&self) -> bool {
        self.inner.lock().irq_enabled
    }

    pub fn clock_enabled(&self) -> bool {
        self.inner.lock().clock_enabled
    }

    pub fn current_route(&self) -> Route {
        self.inner.lock().route
    }
}

impl Inner {
    fn stop(&mut self) {
        if let Some(device) = self.device.as_mut() {
            device.stop();
        }
        if !self.stall_stop {
            self.flags |= Interrupts::MSTOP;
        }
        self.phase = Phase::Idle;
    }

    fn read_next(&mut self) {
        if let Some(device) = self.device.as_mut() {
            self.rx = device.read();
            self.flags |= Interrupts::RXDATAV;
        }
    }

    fn header(&mut self, byte: u8) {
        let (address, rw) = split_header(byte);
        let acked = match self.device.as_mut() {
            Some(device) => device.address(address, rw),
            None => return,
        };

        if !acked {
            trace!("sim: header {:#04x} NACKed", byte);
            self.flags |= Interrupts::NACK;
            return;
        }

        self.flags |= Interrupts::ACK;
        match rw {
            RwBit::Write => self.phase = Phase::Writing,
            RwBit::Read => {
                self.phase = Phase::Reading;
                self.read_next();
            }
        }
    }

    fn data(&mut self, byte: u8) {
        let acked = match self.device.as_mut() {
            Some(device) => device.write(byte),
            None => return,
        };
        self.flags |= if acked {
            Interrupts::ACK
        } else {
            Interrupts::NACK
        };
    }
}

impl I2cRegisters for SimPeripheral {
    fn command(&mut self, cmd: Command) {
        let mut inner = self.inner.lock();
        inner.log.push(BusOp::Command(cmd));

        if cmd.contains(Command::ABORT) {
            inner.phase = Phase::Idle;
        }
        if cmd.contains(Command::START | Command::STOP) {
            if !inner.stall_stop {
                inner.flags |= Interrupts::START | Interrupts::MSTOP;
            }
            inner.phase = Phase::Idle;
            return;
        }
        if cmd.contains(Command::ACK) && inner.phase == Phase::Reading {
            inner.read_next();
        }
        if cmd.contains(Command::NACK) && inner.phase == Phase::Reading {
            inner.phase = Phase::Ending;
        }
        if cmd.contains(Command::START) {
            inner.phase = Phase::Header;
        }
        if cmd.contains(Command::STOP) {
            inner.stop();
        }
    }

    fn flags(&self) -> Interrupts {
        let inner = self.inner.lock();
        inner.flags | inner.stuck
    }

    fn set_flags(&mut self, flags: Interrupts) {
        self.inner.lock().flags |= flags;
    }

    fn clear_flags(&mut self, flags: Interrupts) {
        self.inner.lock().flags.remove(flags);
    }

    fn enabled(&self) -> Interrupts {
        self.inner.lock().enabled
    }

    fn set_enabled(&mut self, sources: Interrupts) {
        let mut inner = self.inner.lock();
        inner.enabled = sources;
        inner.log.push(BusOp::Enable(sources));
    }

    fn transmit(&mut self, byte: u8) {
        let mut inner = self.inner.lock();
        inner.log.push(BusOp::Transmit(byte));

        match inner.phase {
            Phase::Header => inner.header(byte),
            Phase::Writing => inner.data(byte),
            phase => warn!("sim: byte {:#04x} written while {:?}", byte, phase),
        }
    }

    fn receive(&mut self) -> u8 {
        let mut inner = self.inner.lock();
        inner.flags.remove(Interrupts::RXDATAV);
        inner.rx
    }

    fn is_idle(&self) -> bool {
        let inner = self.inner.lock();
        !inner.force_busy && inner.phase == Phase::Idle
    }

    fn enable_irq(&mut self) {
        self.inner.lock().irq_enabled = true;
    }

    fn enable_clock(&mut self) {
        self.inner.lock().clock_enabled = true;
    }

    fn route(&mut self, route: &Route) {
        self.inner.lock().route = *route;
    }
}
