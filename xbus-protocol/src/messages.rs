//! Command, order and device identifiers of the XBus protocol
//!
//! A command frame carries one [`Command`] and one [`Order`]. The order
//! selects which servo parameter is read or written and fixes the size of
//! the data field (1 or 2 bytes).

use crate::frame::FrameError;

/// Broadcast period in milliseconds
pub const XBUS_INTERVAL_MS: u32 = 14;

/// Position value for a 900 µs pulse
pub const SERVO_900_US: u16 = 0x1249;

/// Position value for a 1500 µs pulse (center)
pub const SERVO_NEUTRAL: u16 = 0x7FFF;

/// Position value for a 2100 µs pulse
pub const SERVO_2100_US: u16 = 0xEDB6;

/// Highest channel count the ModeA packet can carry
pub const MAX_SERVO_NUM: usize = 50;

/// Highest servo sub-ID (upper two bits of the channel byte)
pub const MAX_SERVO_SUB_ID: u8 = 3;

/// Channel ID bits within a channel byte
pub const CHANNEL_ID_MASK: u8 = 0x3F;

/// Channel 0 addresses every servo on the bus; nobody answers
pub const BROADCAST_CHANNEL: u8 = 0;

/// Base of the product ID range used by XBus servos
pub const SERVO_PRODUCT_ID_BASE: u16 = 0x0200;

/// Mask a raw channel byte down to its 6-bit channel ID
#[inline]
pub fn channel_id(raw: u8) -> u8 {
    raw & CHANNEL_ID_MASK
}

/// Command byte of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// Write a parameter
    Set = 0x20,
    /// Read a parameter
    Get = 0x21,
    /// Read a status value
    Status = 0x22,
    /// Multi-channel position broadcast
    ModeA = 0xA4,
}

impl Command {
    /// Get the command as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create a command from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x20 => Some(Command::Set),
            0x21 => Some(Command::Get),
            0x22 => Some(Command::Status),
            0xA4 => Some(Command::ModeA),
            _ => None,
        }
    }
}

/// Width of the data field of a command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValueSize {
    One,
    Two,
}

impl ValueSize {
    /// Number of data bytes on the wire
    pub fn bytes(self) -> usize {
        match self {
            ValueSize::One => 1,
            ValueSize::Two => 2,
        }
    }
}

/// Parameter selector for Set/Get/Status commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Order {
    /// Device mode, see [`Mode`]
    Mode = 0x01,
    /// Channel ID
    Id = 0x03,
    /// Firmware version (get only)
    Version = 0x04,
    /// Product ID (get only), see [`ServoModel`]
    Product = 0x05,
    /// Reply marker: the servo does not support the requested order
    Unsupported = 0x06,
    /// Reset a parameter (set only)
    Reset = 0x07,
    /// Store parameters (set only), see [`ParamIndex`]
    ParamWrite = 0x08,
    Reverse = 0x10,
    Neutral = 0x11,
    HighTravel = 0x12,
    LowTravel = 0x13,
    HighLimit = 0x14,
    LowLimit = 0x15,
    PGain = 0x16,
    IGain = 0x17,
    DGain = 0x18,
    DeadBand = 0x19,
    PowerOffset = 0x1A,
    AlarmLevel = 0x1B,
    AlarmDelay = 0x1C,
    Angle180 = 0x1D,
    SlowStart = 0x1E,
    StopMode = 0x1F,
    /// Current position (get only)
    CurrentPosition = 0x20,
    /// Current power draw (get only)
    CurrentPower = 0x21,
    SpeedLimit = 0x22,
    MaxInteger = 0x23,
}

impl Order {
    /// Get the order as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create an order from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        let order = match value {
            0x01 => Order::Mode,
            0x03 => Order::Id,
            0x04 => Order::Version,
            0x05 => Order::Product,
            0x06 => Order::Unsupported,
            0x07 => Order::Reset,
            0x08 => Order::ParamWrite,
            0x10 => Order::Reverse,
            0x11 => Order::Neutral,
            0x12 => Order::HighTravel,
            0x13 => Order::LowTravel,
            0x14 => Order::HighLimit,
            0x15 => Order::LowLimit,
            0x16 => Order::PGain,
            0x17 => Order::IGain,
            0x18 => Order::DGain,
            0x19 => Order::DeadBand,
            0x1A => Order::PowerOffset,
            0x1B => Order::AlarmLevel,
            0x1C => Order::AlarmDelay,
            0x1D => Order::Angle180,
            0x1E => Order::SlowStart,
            0x1F => Order::StopMode,
            0x20 => Order::CurrentPosition,
            0x21 => Order::CurrentPower,
            0x22 => Order::SpeedLimit,
            0x23 => Order::MaxInteger,
            _ => return None,
        };
        Some(order)
    }

    /// Width of the data field this order carries
    pub fn value_size(self) -> ValueSize {
        use Order::*;

        match self {
            Version | Product | Reset | ParamWrite | Reverse | Neutral | HighTravel
            | LowTravel | HighLimit | LowLimit | PowerOffset | AlarmDelay | CurrentPosition
            | MaxInteger => ValueSize::Two,
            _ => ValueSize::One,
        }
    }
}

impl TryFrom<u8> for Order {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Order::from_u8(value).ok_or(FrameError::InvalidFrame)
    }
}

/// Device operating mode (value of [`Order::Mode`])
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// Normal servo operation
    Operate = 0x01,
    /// Waiting for a new channel ID
    IdSet = 0x02,
}

impl Mode {
    /// Get the mode as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Parameter index for [`Order::ParamWrite`] and [`Order::Reset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ParamIndex {
    Unused0 = 0x0000,
    AllDataWithId = 0x0001,
    AllDataWithoutId = 0x0002,
    ServoId = 0x0003,
    Reversed = 0x0004,
    NeutralOffset = 0x0005,
    TravelHigh = 0x0006,
    TravelLow = 0x0007,
    LimitHigh = 0x0008,
    LimitLow = 0x0009,
    PGainDiff = 0x000A,
    IGainDiff = 0x000B,
    DGainDiff = 0x000C,
    DeadBandDiff = 0x000D,
    PowerOffsetDiff = 0x000E,
    AlarmLevel = 0x000F,
    AlarmDelay = 0x0010,
    Angle180 = 0x0011,
    SlowStart = 0x0012,
    StopMode = 0x0013,
    SpeedLimit = 0x0014,
    MaxIntegerDiff = 0x0015,
}

impl ParamIndex {
    /// Get the index as a command value
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Known XBus servo models, keyed by product ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ServoModel {
    Nx8921 = 0x0200,
    Nx3421 = 0x0201,
    Nx588 = 0x0202,
    Nx8925 = 0x0203,
    Nx3425 = 0x0204,
    Nx6421 = 0x0205,
    Nxr89 = 0x0206,
    Nxr34 = 0x0207,
    Nxb8921 = 0x0208,
    Nxb8925 = 0x0209,
    Nxb89g = 0x020A,
}

impl ServoModel {
    /// Look up a model from the value of an [`Order::Product`] reply
    pub fn from_product_id(id: u16) -> Option<Self> {
        use ServoModel::*;

        const MODELS: [ServoModel; 11] = [
            Nx8921, Nx3421, Nx588, Nx8925, Nx3425, Nx6421, Nxr89, Nxr34, Nxb8921, Nxb8925,
            Nxb89g,
        ];
        let index = id.checked_sub(SERVO_PRODUCT_ID_BASE)? as usize;
        MODELS.get(index).copied()
    }

    /// Product ID reported by this model
    pub fn product_id(self) -> u16 {
        self as u16
    }
}
