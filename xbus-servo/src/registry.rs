//! Channel registry
//!
//! Owns the broadcast template: the set of registered servo channels and
//! their target positions, kept encoded as a ready-to-send ModeA frame.
//! Every mutation rewrites the length field and trailing CRC and raises
//! the dirty flag so the next broadcast picks up the change.
//!
//! Channel IDs are masked to 6 bits on every call, so callers may pass a
//! raw channel byte. Lookups are linear; the registry never holds more
//! than 50 entries.

use xbus_protocol::{channel_id, ChannelEntry, ChannelTemplate, MAX_SERVO_NUM};

use crate::error::{Result, XBusError};

/// Registered servo channels and their broadcast template
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    template: ChannelTemplate,
    dirty: bool,
}

impl ChannelRegistry {
    /// Create an empty registry
    ///
    /// `max_servos` is clamped to `1..=50`.
    pub fn new(max_servos: usize) -> Result<Self> {
        let capacity = max_servos.clamp(1, MAX_SERVO_NUM);
        let template = ChannelTemplate::new(capacity).map_err(|_| XBusError::OutOfMemory)?;
        Ok(Self {
            template,
            dirty: false,
        })
    }

    /// Register a channel at the end of the broadcast
    pub fn add(&mut self, channel: u8, initial_value: u16) -> Result<()> {
        if self.template.is_full() {
            return Err(XBusError::CapacityExceeded);
        }
        let id = channel_id(channel);
        if self.template.find(id).is_some() {
            return Err(XBusError::DuplicateChannel);
        }

        let slot = self.template.push(ChannelEntry::new(id, initial_value))?;
        self.dirty = true;
        debug!("channel {} added at slot {}", id, slot);
        Ok(())
    }

    /// Unregister a channel; later channels move down one slot
    pub fn remove(&mut self, channel: u8) -> Result<()> {
        if self.template.is_empty() {
            return Err(XBusError::EmptyRegistry);
        }
        let id = channel_id(channel);
        let slot = self.template.find(id).ok_or(XBusError::ChannelNotFound)?;

        self.template.remove(slot);
        self.dirty = true;
        debug!("channel {} removed from slot {}", id, slot);
        Ok(())
    }

    /// Update the target position of a registered channel
    pub fn set(&mut self, channel: u8, value: u16) -> Result<()> {
        let id = channel_id(channel);
        let slot = self.template.find(id).ok_or(XBusError::ChannelNotFound)?;

        self.template.set_position(slot, value);
        self.dirty = true;
        trace!("channel {} position {=u16:#x}", id, value);
        Ok(())
    }

    /// Target position of a registered channel
    pub fn position(&self, channel: u8) -> Option<u16> {
        let slot = self.template.find(channel)?;
        self.template.entry(slot).map(|entry| entry.position)
    }

    pub fn contains(&self, channel: u8) -> bool {
        self.template.find(channel).is_some()
    }

    /// Number of registered channels
    pub fn len(&self) -> usize {
        self.template.count()
    }

    pub fn is_empty(&self) -> bool {
        self.template.is_empty()
    }

    /// Maximum number of channels, after clamping
    pub fn capacity(&self) -> usize {
        self.template.capacity()
    }

    /// Registered channels in broadcast order
    pub fn entries(&self) -> impl Iterator<Item = ChannelEntry> + '_ {
        self.template.entries()
    }

    /// The encoded broadcast frame
    pub fn as_bytes(&self) -> &[u8] {
        self.template.as_bytes()
    }

    pub fn template(&self) -> &ChannelTemplate {
        &self.template
    }

    /// True if the template changed since the last broadcast copy
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Force the next broadcast to re-copy the template
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear the dirty flag, returning its previous value
    pub(crate) fn take_dirty(&mut self) -> bool {
        core::mem::replace(&mut self.dirty, false)
    }
}
