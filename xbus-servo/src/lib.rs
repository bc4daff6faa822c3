//! XBus Servo Master Driver
//!
//! Drives JR PROPO XBus servos from the master side of the half-duplex
//! serial bus:
//!
//! - [`registry::ChannelRegistry`] keeps the registered channels encoded as
//!   a ready-to-send ModeA broadcast.
//! - [`engine::CommandEngine`] owns the serial port and direction pin,
//!   emits broadcasts and runs Set/Get/Status exchanges.
//! - [`servo::XBusServo`] combines the two behind one API.
//! - [`shared::SharedXBus`] lets a periodic broadcast task skip a period
//!   instead of waiting while the bus is in use.
//!
//! The broadcast schedule itself is left to the application: call
//! [`XBusServo::emit`] every [`XBusConfig::interval_ms`] milliseconds.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod servo;
pub mod shared;

#[cfg(test)]
mod mock;

pub use config::XBusConfig;
pub use engine::{Emission, ExchangeState};
pub use error::{Result, XBusError};
pub use registry::ChannelRegistry;
pub use servo::XBusServo;
pub use shared::SharedXBus;

pub use xbus_hal::{DirectionPin, HalDirectionPin, NoDirectionPin, Uart, UartConfig};
pub use xbus_protocol::{
    Command, Mode, Order, ParamIndex, ServoModel, ValueSize, SERVO_2100_US, SERVO_900_US,
    SERVO_NEUTRAL,
};
