#[macro_use]
extern crate log;

use std::process;

use clap::{Parser, ValueEnum};

use i2c_master::bus::{Destination, Master, PeripheralId, Request, Result, Route};
use i2c_master::emulation::{self, Si7021, SimPeripheral};
use i2c_master::platform::{CallbackId, EventScheduler, SleepGovernor, StdDelay};
use i2c_master::{logging, sensor, Config};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Bus {
    I2c0,
    I2c1,
    Both,
}

/// Reads humidity from emulated Si7021 sensors through the interrupt-driven
/// I2C master.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Peripheral(s) to measure on
    #[arg(long, value_enum, default_value = "both")]
    bus: Bus,

    /// Measurements per peripheral
    #[arg(short = 'n', long, default_value_t = 3)]
    samples: u32,

    /// Humidity the emulated sensors report, in %RH
    #[arg(long, default_value_t = 45.0)]
    humidity: f32,

    /// Read headers each sensor NACKs while converting
    #[arg(long, default_value_t = 2)]
    conversion_polls: u32,

    /// Delay after each command write, in microseconds
    #[arg(long, default_value_t = 80_000)]
    settle_us: u32,

    /// NACKs tolerated per state before a transaction is abandoned
    #[arg(long)]
    nack_limit: Option<u32>,

    /// Verbosity, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Interrupt services allowed per transaction before the line is declared stuck.
const PUMP_LIMIT: usize = 1_000;

fn callback_for(id: PeripheralId) -> CallbackId {
    CallbackId(1 << id.index())
}

fn run(args: &Args) -> Result<()> {
    let config = Config {
        settle_us: args.settle_us,
        nack_retry_limit: args.nack_limit,
        ..Config::default()
    };

    let raw = sensor::humidity_code(args.humidity);
    let sim = |id: PeripheralId| {
        trace!("{}: attaching Si7021 reporting {:#06x}", id, raw);
        SimPeripheral::with_device(Si7021::new(raw).with_conversion_polls(args.conversion_polls))
    };
    let (i2c0, i2c1) = (sim(PeripheralId::I2c0), sim(PeripheralId::I2c1));

    let governor = SleepGovernor::new();
    let scheduler = EventScheduler::new();
    let master = Master::new(
        i2c0.clone(),
        i2c1.clone(),
        &governor,
        &scheduler,
        StdDelay,
        config,
    );

    debug!("engine config {:?}", master.config());

    let peripherals: Vec<(PeripheralId, &SimPeripheral)> = match args.bus {
        Bus::I2c0 => vec![(PeripheralId::I2c0, &i2c0)],
        Bus::I2c1 => vec![(PeripheralId::I2c1, &i2c1)],
        Bus::Both => vec![(PeripheralId::I2c0, &i2c0), (PeripheralId::I2c1, &i2c1)],
    };

    let route = Route {
        sda_location: 15,
        scl_location: 15,
        sda_enable: true,
        scl_enable: true,
    };
    for &(id, _) in &peripherals {
        master.open(id, &route)?;
    }

    for sample in 0..args.samples {
        for &(id, sim) in &peripherals {
            let destination = Destination::new();
            let request = Request::measure_humidity(id, destination.clone(), callback_for(id));

            master.begin_transaction(&request)?;
            debug!("{}: deepest sleep allowed {}", id, governor.deepest_allowed());
            let interrupts = emulation::pump(&master, id, sim, PUMP_LIMIT)?;

            let events = scheduler.take();
            if events & callback_for(id).0 == 0 {
                warn!("{}: transaction finished without a callback", id);
                continue;
            }

            let raw = destination.value() as u16;
            println!(
                "{} sample {}: raw {:#06x} -> {:.1} %RH ({} interrupts)",
                id,
                sample,
                raw,
                sensor::relative_humidity(raw),
                interrupts
            );
        }
    }

    info!(
        "done, {} forbids / {} permits, deepest sleep allowed {}",
        governor.forbids(),
        governor.permits(),
        governor.deepest_allowed()
    );
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(error) = logging::setup(args.verbose) {
        eprintln!("Error: could not set up logging: {}", error);
        process::exit(2);
    }

    trace!("Setting up main");

    match run(&args) {
        Ok(()) => {}
        Err(error) => {
            error!("{}", error);
            eprintln!("Error: {}", error);
            process::exit(1);
        }
    }
}
