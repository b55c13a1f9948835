//! Interrupt-driven I2C master for reading an Si7021 over either of two
//! peripherals.
//!
//! Task code arms a transaction with [`bus::Master::begin_transaction`] and
//! carries on; the peripheral's interrupt vector drives it through
//! [`bus::Master::on_interrupt`] until the STOP completes and the request's
//! callback is handed to the [`platform::Scheduler`].

#[macro_use]
extern crate log;

pub mod bus;
pub mod config;
pub mod emulation;
pub mod logging;
pub mod platform;
pub mod sensor;

pub use crate::config::Config;
