//! XBus Servo Protocol
//!
//! This crate defines the wire format spoken between an XBus master and
//! JR PROPO XBus servos on a half-duplex 250 kbps serial line.
//!
//! # Protocol Overview
//!
//! Two packet kinds share the wire:
//! - a **ModeA broadcast** carrying the target position of every registered
//!   channel, sent periodically (every 14 ms) with no reply, and
//! - **command frames** (Set/Get/Status) addressed to one servo, which
//!   answers with a frame of the same layout.
//!
//! Every frame ends with a table-driven CRC-8 ([`crc`]). The layouts and
//! the persistent broadcast template live in [`frame`]; command and order
//! codes in [`messages`].

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

pub mod crc;
pub mod frame;
pub mod messages;

pub use crc::{crc8, crc_step, is_valid_frame};
pub use frame::{
    ChannelEntry, ChannelTemplate, CommandRequest, CommandResponse, FrameBuffer, FrameError,
    CMD_FRAME_SIZE, MAX_FRAME_SIZE,
};
pub use messages::{
    channel_id, Command, Mode, Order, ParamIndex, ServoModel, ValueSize, BROADCAST_CHANNEL,
    MAX_SERVO_NUM, SERVO_2100_US, SERVO_900_US, SERVO_NEUTRAL, XBUS_INTERVAL_MS,
};
