//! Bus configuration
//!
//! The XBus line settings are fixed by the protocol; only the number of
//! servo slots is normally chosen per application.

use xbus_hal::uart::{UartConfig, XBUS_BAUDRATE, XBUS_RX_TIMEOUT_MS};
use xbus_protocol::{MAX_SERVO_NUM, XBUS_INTERVAL_MS};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct XBusConfig {
    /// Requested servo slots; clamped to 1..=50 when buffers are sized
    pub max_servos: usize,
    /// Line rate in bits per second
    pub baudrate: u32,
    /// Receive window for each stage of a command reply
    pub rx_timeout_ms: u32,
    /// Broadcast period the external scheduler should use
    pub interval_ms: u32,
}

impl Default for XBusConfig {
    fn default() -> Self {
        Self {
            max_servos: MAX_SERVO_NUM,
            baudrate: XBUS_BAUDRATE,
            rx_timeout_ms: XBUS_RX_TIMEOUT_MS,
            interval_ms: XBUS_INTERVAL_MS,
        }
    }
}

impl XBusConfig {
    /// Default line settings with room for `max_servos` channels
    pub fn with_max_servos(max_servos: usize) -> Self {
        Self {
            max_servos,
            ..Self::default()
        }
    }

    /// Number of channel slots actually allocated
    pub fn channel_capacity(&self) -> usize {
        self.max_servos.clamp(1, MAX_SERVO_NUM)
    }

    /// Serial settings for [`xbus_hal::Uart::configure`]
    pub fn uart_config(&self) -> UartConfig {
        UartConfig {
            baudrate: self.baudrate,
            rx_timeout_ms: self.rx_timeout_ms,
            ..UartConfig::default()
        }
    }
}
