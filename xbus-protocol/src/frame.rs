//! Frame layouts of the XBus protocol
//!
//! Broadcast (ModeA) frame, kept as a persistent template:
//! ```text
//! ┌──────┬─────┬─────┬──────┬────┬─────┬────────┬────────┬─────┬─────┐
//! │ 0xA4 │ LEN │ KEY │ TYPE │ ID │ RSV │ POS_HI │ POS_LO │ ... │ CRC │
//! └──────┴─────┴─────┴──────┴────┴─────┴────────┴────────┴─────┴─────┘
//!  header (4B)                 one 4-byte entry per channel       1B
//! ```
//! `LEN = 2 + 4 * channels`; the frame on the wire is `LEN + 3` bytes.
//!
//! Command frame (request and reply share the layout):
//! ```text
//! ┌─────┬─────┬─────┬────┬───────┬───────┬─────────┬─────┐
//! │ CMD │ LEN │ KEY │ ID │ ORDER │ DATA1 │ (DATA2) │ CRC │
//! └─────┴─────┴─────┴────┴───────┴───────┴─────────┴─────┘
//! ```
//! `LEN = data bytes + 3`. The CRC covers every preceding byte, so a valid
//! frame checks to zero over its full length.

use heapless::Vec;

use crate::crc::{crc8, is_valid_frame};
use crate::messages::{channel_id, Command, Order, ValueSize, MAX_SERVO_NUM};

/// Broadcast header size (CMD, LEN, KEY, TYPE)
pub const HEADER_SIZE: usize = 4;

/// Size of one channel entry in the broadcast frame
pub const ENTRY_SIZE: usize = 4;

/// Largest command frame (two data bytes)
pub const CMD_FRAME_SIZE: usize = 8;

/// Largest frame either packet kind can need
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_SERVO_NUM * ENTRY_SIZE + 1;

const OFFSET_COMMAND: usize = 0;
const OFFSET_LENGTH: usize = 1;
const OFFSET_KEY: usize = 2;
const OFFSET_TYPE: usize = 3;
const OFFSET_CHANNEL: usize = 3;
const OFFSET_ORDER: usize = 4;
const OFFSET_DATA: usize = 5;

/// Bytes of a frame not counted by its LEN field (CMD, LEN, CRC)
const LENGTH_OVERHEAD: usize = 3;

/// Fixed-capacity byte buffer for one frame
pub type FrameBuffer = Vec<u8, MAX_FRAME_SIZE>;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Buffer too small for encoding, or requested capacity too large
    BufferTooSmall,
    /// Every channel slot of the template is in use
    TemplateFull,
    /// LEN field disagrees with the bytes available
    InvalidLength,
    /// Whole-frame CRC is not zero
    InvalidChecksum,
    /// Reply order field carries the unsupported marker
    Unsupported,
    /// Invalid frame structure
    InvalidFrame,
}

/// Buffer size for a template holding `max_channels` entries
///
/// Never smaller than a command frame, since the same buffer size is used
/// for command exchanges.
pub const fn buffer_size(max_channels: usize) -> usize {
    let size = HEADER_SIZE + max_channels * ENTRY_SIZE + 1;
    if size < CMD_FRAME_SIZE {
        CMD_FRAME_SIZE
    } else {
        size
    }
}

/// Allocate a zeroed frame buffer sized for `max_channels`
pub fn allocate(max_channels: usize) -> Result<FrameBuffer, FrameError> {
    let mut buffer = FrameBuffer::new();
    buffer
        .resize(buffer_size(max_channels), 0)
        .map_err(|_| FrameError::BufferTooSmall)?;
    Ok(buffer)
}

/// Total frame size announced by a LEN field
#[inline]
pub fn frame_len(length_field: u8) -> usize {
    length_field as usize + LENGTH_OVERHEAD
}

/// One registered servo slot of the broadcast template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelEntry {
    /// 6-bit channel ID
    pub channel_id: u8,
    /// Target position, see [`crate::SERVO_NEUTRAL`]
    pub position: u16,
}

impl ChannelEntry {
    /// Create an entry, masking the channel ID
    pub fn new(channel: u8, position: u16) -> Self {
        Self {
            channel_id: channel_id(channel),
            position,
        }
    }
}

/// Broadcast packet kept encoded in place
///
/// Entries are densely packed in insertion order. The length field and the
/// trailing CRC are rewritten after every change, so [`as_bytes`] is always
/// a transmittable frame.
///
/// [`as_bytes`]: ChannelTemplate::as_bytes
#[derive(Debug, Clone)]
pub struct ChannelTemplate {
    buffer: FrameBuffer,
    count: usize,
    max_channels: usize,
}

impl ChannelTemplate {
    /// Create an empty template with room for `max_channels` entries
    pub fn new(max_channels: usize) -> Result<Self, FrameError> {
        let mut buffer = allocate(max_channels)?;
        buffer[OFFSET_COMMAND] = Command::ModeA.as_u8();
        buffer[OFFSET_KEY] = 0x00;
        buffer[OFFSET_TYPE] = 0x00;

        let mut template = Self {
            buffer,
            count: 0,
            max_channels,
        };
        template.seal();
        Ok(template)
    }

    /// Number of registered entries
    pub fn count(&self) -> usize {
        self.count
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.max_channels
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count >= self.max_channels
    }

    /// Value of the LEN header byte
    pub fn length_field(&self) -> u8 {
        self.buffer[OFFSET_LENGTH]
    }

    /// Trailing CRC byte
    pub fn checksum(&self) -> u8 {
        self.buffer[self.crc_offset()]
    }

    /// The encoded frame, header through trailing CRC
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..frame_len(self.length_field())]
    }

    /// Entry stored at `slot`
    pub fn entry(&self, slot: usize) -> Option<ChannelEntry> {
        if slot >= self.count {
            return None;
        }
        let offset = Self::entry_offset(slot);
        Some(ChannelEntry {
            channel_id: self.buffer[offset],
            position: u16::from_be_bytes([self.buffer[offset + 2], self.buffer[offset + 3]]),
        })
    }

    /// Entries in slot order
    pub fn entries(&self) -> impl Iterator<Item = ChannelEntry> + '_ {
        (0..self.count).filter_map(move |slot| self.entry(slot))
    }

    /// Slot holding `channel` (masked before comparing)
    pub fn find(&self, channel: u8) -> Option<usize> {
        let id = channel_id(channel);
        (0..self.count).find(|&slot| self.buffer[Self::entry_offset(slot)] == id)
    }

    /// Append an entry at the end
    ///
    /// Does not check for duplicate IDs; that is the registry's job.
    pub fn push(&mut self, entry: ChannelEntry) -> Result<usize, FrameError> {
        if self.is_full() {
            return Err(FrameError::TemplateFull);
        }
        let slot = self.count;
        let offset = Self::entry_offset(slot);
        let [hi, lo] = entry.position.to_be_bytes();
        self.buffer[offset..offset + ENTRY_SIZE].copy_from_slice(&[
            channel_id(entry.channel_id),
            0x00,
            hi,
            lo,
        ]);
        self.count += 1;
        self.seal();
        Ok(slot)
    }

    /// Remove the entry at `slot`, closing the gap
    pub fn remove(&mut self, slot: usize) -> Option<ChannelEntry> {
        let removed = self.entry(slot)?;
        let start = Self::entry_offset(slot);
        let end = Self::entry_offset(self.count);
        self.buffer.copy_within(start + ENTRY_SIZE..end, start);
        self.count -= 1;
        self.seal();
        Some(removed)
    }

    /// Overwrite the position stored at `slot`
    pub fn set_position(&mut self, slot: usize, position: u16) -> bool {
        if slot >= self.count {
            return false;
        }
        let offset = Self::entry_offset(slot);
        self.buffer[offset + 2..offset + 4].copy_from_slice(&position.to_be_bytes());
        self.seal();
        true
    }

    fn entry_offset(slot: usize) -> usize {
        HEADER_SIZE + slot * ENTRY_SIZE
    }

    fn crc_offset(&self) -> usize {
        Self::entry_offset(self.count)
    }

    /// Rewrite LEN and the trailing CRC for the current entry count
    fn seal(&mut self) {
        self.buffer[OFFSET_LENGTH] = (2 + self.count * ENTRY_SIZE) as u8;
        let crc_offset = self.crc_offset();
        self.buffer[crc_offset] = crc8(&self.buffer[..crc_offset]);
    }
}

/// A Set/Get/Status request addressed to one servo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandRequest {
    pub command: Command,
    /// Raw channel byte; 0 addresses every servo and expects no reply
    pub channel_id: u8,
    pub order: Order,
    /// Only the low 8 or 16 bits are sent, per `size`
    pub value: i32,
    pub size: ValueSize,
}

impl CommandRequest {
    /// Create a request, taking the data width from the order
    pub fn new(command: Command, channel_id: u8, order: Order, value: i32) -> Self {
        Self::with_size(command, channel_id, order, value, order.value_size())
    }

    /// Create a request with an explicit data width
    pub fn with_size(
        command: Command,
        channel_id: u8,
        order: Order,
        value: i32,
        size: ValueSize,
    ) -> Self {
        Self {
            command,
            channel_id,
            order,
            value,
            size,
        }
    }

    /// Value of the LEN byte
    pub fn length_field(&self) -> u8 {
        (self.size.bytes() + 3) as u8
    }

    /// Encoded frame size in bytes
    pub fn frame_len(&self) -> usize {
        frame_len(self.length_field())
    }

    /// Encode this request into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let len = self.frame_len();
        if buffer.len() < len {
            return Err(FrameError::BufferTooSmall);
        }

        buffer[OFFSET_COMMAND] = self.command.as_u8();
        buffer[OFFSET_LENGTH] = self.length_field();
        buffer[OFFSET_KEY] = 0x00;
        buffer[OFFSET_CHANNEL] = self.channel_id;
        buffer[OFFSET_ORDER] = self.order.as_u8();
        match self.size {
            ValueSize::One => buffer[OFFSET_DATA] = self.value as u8,
            ValueSize::Two => buffer[OFFSET_DATA..OFFSET_DATA + 2]
                .copy_from_slice(&(self.value as u16).to_be_bytes()),
        }
        buffer[len - 1] = crc8(&buffer[..len - 1]);

        Ok(len)
    }
}

/// A validated reply from a servo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandResponse {
    pub command: u8,
    pub channel_id: u8,
    pub order: u8,
    /// Decoded data field; one-byte values are sign-extended
    pub value: i32,
}

impl CommandResponse {
    /// Validate and decode a reply frame
    ///
    /// The CRC is checked first; the unsupported marker is only trusted on
    /// a frame that passed it.
    pub fn parse(frame: &[u8], size: ValueSize) -> Result<Self, FrameError> {
        if frame.len() < LENGTH_OVERHEAD {
            return Err(FrameError::InvalidLength);
        }
        let len = frame_len(frame[OFFSET_LENGTH]);
        if frame.len() < len {
            return Err(FrameError::InvalidLength);
        }
        let frame = &frame[..len];

        if !is_valid_frame(frame) {
            return Err(FrameError::InvalidChecksum);
        }
        if len <= OFFSET_ORDER {
            return Err(FrameError::InvalidFrame);
        }
        if frame[OFFSET_ORDER] == Order::Unsupported.as_u8() {
            return Err(FrameError::Unsupported);
        }
        if len < OFFSET_DATA + size.bytes() + 1 {
            return Err(FrameError::InvalidLength);
        }

        Ok(Self {
            command: frame[OFFSET_COMMAND],
            channel_id: frame[OFFSET_CHANNEL],
            order: frame[OFFSET_ORDER],
            value: decode_value(&frame[OFFSET_DATA..], size),
        })
    }
}

/// Decode a data field
///
/// One-byte values are signed (`0x80..=0xFF` are negative); two-byte values
/// are unsigned big-endian.
///
/// # Panics
///
/// If `data` is shorter than `size`.
pub(crate) fn decode_value(data: &[u8], size: ValueSize) -> i32 {
    match size {
        ValueSize::One => data[0] as i8 as i32,
        ValueSize::Two => u16::from_be_bytes([data[0], data[1]]) as i32,
    }
}
