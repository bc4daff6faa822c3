//! Driver error type
//!
//! Every registry and command operation reports failure through
//! [`XBusError`]. None of them are fatal and none are retried here; retry
//! policy belongs to the caller.

use core::fmt;

use xbus_protocol::FrameError;

/// Errors reported by the XBus driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum XBusError {
    /// Registry already holds its maximum number of channels
    CapacityExceeded,
    /// Channel ID is already registered
    DuplicateChannel,
    /// Registry has no channels to remove
    EmptyRegistry,
    /// Channel ID is not registered
    ChannelNotFound,
    /// Servo rejected the order
    Unsupported,
    /// Operation requires a transmit-only bus (no direction pin)
    RestrictedTopology,
    /// Frame buffers could not be allocated
    OutOfMemory,
    /// No reply within the receive window
    Timeout,
    /// Reply frame failed validation
    CrcError,
    /// Serial port reported a transmit or configuration failure
    Serial,
}

impl fmt::Display for XBusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            XBusError::CapacityExceeded => "servo count at maximum",
            XBusError::DuplicateChannel => "channel already added",
            XBusError::EmptyRegistry => "no servos registered",
            XBusError::ChannelNotFound => "channel not found",
            XBusError::Unsupported => "order not supported by servo",
            XBusError::RestrictedTopology => "not allowed with a direction pin",
            XBusError::OutOfMemory => "frame buffer allocation failed",
            XBusError::Timeout => "no reply from servo",
            XBusError::CrcError => "reply failed CRC check",
            XBusError::Serial => "serial port failure",
        };
        f.write_str(msg)
    }
}

impl From<FrameError> for XBusError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::BufferTooSmall => XBusError::OutOfMemory,
            FrameError::TemplateFull => XBusError::CapacityExceeded,
            FrameError::Unsupported => XBusError::Unsupported,
            FrameError::InvalidChecksum | FrameError::InvalidLength | FrameError::InvalidFrame => {
                XBusError::CrcError
            }
        }
    }
}

/// Result alias used throughout the driver
pub type Result<T> = core::result::Result<T, XBusError>;
