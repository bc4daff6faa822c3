//! XBus Hardware Abstraction Layer
//!
//! This crate defines the two hardware collaborators the XBus driver needs:
//! a serial port and an optional bus direction pin. Chip-specific HALs (or
//! host-side test doubles) implement these traits so the same driver code
//! runs on any UART.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application / periodic broadcast task  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  xbus-servo (registry + command engine) │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  xbus-hal (this crate - traits)         │
//! └─────────────────────────────────────────┘
//!         │                       │
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  UART driver  │       │   GPIO pin    │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::UartTx`], [`uart::UartRx`], [`uart::Uart`] - Serial communication
//! - [`gpio::OutputPin`], [`gpio::DirectionPin`] - Half-duplex direction control

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use gpio::{DirectionPin, HalDirectionPin, NoDirectionPin, OutputPin};
pub use uart::{Uart, UartConfig, UartRx, UartTx};
