//! Command/response engine and broadcast emitter
//!
//! Owns the serial port, the optional direction pin and the transmit
//! mirror buffer. The mirror is the outbound buffer for broadcasts (a copy
//! of the registry's template) and the scratch buffer for command
//! exchanges.
//!
//! # Command exchange
//!
//! ```text
//! Idle → Sending ─┬─ channel 0 ──────────────────────────────────→ Idle
//!                 └→ AwaitingEcho → AwaitingResponseHeader
//!                      → AwaitingResponseBody → Validating ──────→ Idle
//! ```
//!
//! The wire is half-duplex, so the request is read back as an echo before
//! the reply. The direction pin is returned to transmit on every exit path.

use core::ops::Range;

use xbus_hal::{DirectionPin, Uart, UartConfig};
use xbus_protocol::frame::{self, FrameBuffer};
use xbus_protocol::{CommandRequest, CommandResponse, BROADCAST_CHANNEL};

use crate::error::{Result, XBusError};
use crate::registry::ChannelRegistry;

/// Byte offset of the LEN field in any frame
const OFFSET_LENGTH: usize = 1;

/// Bytes of a reply read before its LEN field is known
const REPLY_HEADER_SIZE: usize = 2;

/// Progress of the current command exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExchangeState {
    /// No exchange in progress
    Idle,
    /// Request being written to the wire
    Sending,
    /// Reading back our own request from the shared wire
    AwaitingEcho,
    /// Reading the reply's command and length bytes
    AwaitingResponseHeader,
    /// Reading the reply body and CRC
    AwaitingResponseBody,
    /// Checking CRC and unsupported marker
    Validating,
}

/// Outcome of one broadcast period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Emission {
    /// The ModeA frame was written
    Sent,
    /// No channels registered, nothing written
    Empty,
    /// The bus was in use; this period was skipped
    Busy,
}

/// Serial side of the driver
pub struct CommandEngine<S, D> {
    serial: S,
    direction: Option<D>,
    mirror: FrameBuffer,
    state: ExchangeState,
}

impl<S: Uart, D: DirectionPin> CommandEngine<S, D> {
    /// Create an engine whose mirror fits a `max_servos` broadcast
    ///
    /// `max_servos` must already be clamped to the protocol ceiling.
    pub fn new(serial: S, direction: Option<D>, max_servos: usize) -> Result<Self> {
        let mirror = frame::allocate(max_servos).map_err(|_| XBusError::OutOfMemory)?;
        Ok(Self {
            serial,
            direction,
            mirror,
            state: ExchangeState::Idle,
        })
    }

    /// Configure the serial port and put the bus in transmit mode
    pub fn begin(&mut self, config: &UartConfig) -> Result<()> {
        if let Some(pin) = self.direction.as_mut() {
            pin.configure_output();
        }
        self.serial
            .configure(config)
            .map_err(|_| XBusError::Serial)
    }

    /// Close the serial port and release the direction pin
    pub fn end(&mut self) {
        self.serial.close();
        if let Some(pin) = self.direction.as_mut() {
            pin.release_to_input();
        }
    }

    /// Give back the serial port and direction pin
    pub fn into_parts(self) -> (S, Option<D>) {
        (self.serial, self.direction)
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    pub fn direction_pin(&self) -> Option<&D> {
        self.direction.as_ref()
    }

    /// True unless the bus is transmit-only
    pub fn has_direction_pin(&self) -> bool {
        self.direction.is_some()
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Write one ModeA broadcast
    ///
    /// Re-copies the template into the mirror only when the registry is
    /// dirty. Never touches the direction pin: nobody answers a broadcast.
    pub fn emit(&mut self, registry: &mut ChannelRegistry) -> Result<Emission> {
        if registry.is_empty() {
            return Ok(Emission::Empty);
        }
        if registry.is_dirty() {
            let template = registry.as_bytes();
            if template.len() > self.mirror.len() {
                warn!("template of {} bytes exceeds mirror", template.len());
                return Err(XBusError::OutOfMemory);
            }
            self.mirror[..template.len()].copy_from_slice(template);
            registry.take_dirty();
        }

        let len = frame::frame_len(self.mirror[OFFSET_LENGTH]);
        self.serial
            .write_blocking(&self.mirror[..len])
            .map_err(|_| XBusError::Serial)?;
        trace!("broadcast {} channels", registry.len());
        Ok(Emission::Sent)
    }

    /// Run one command exchange and return the servo's value
    ///
    /// The request overwrites the mirror, so the registry is marked dirty
    /// before anything is sent. Requests to channel 0 expect no reply and
    /// return the value that was sent.
    pub fn send_command(
        &mut self,
        registry: &mut ChannelRegistry,
        request: &CommandRequest,
    ) -> Result<i32> {
        let result = self.exchange(registry, request);
        self.state = ExchangeState::Idle;

        if let Err(err) = result {
            warn!(
                "channel {} order {} failed: {}",
                request.channel_id, request.order, err
            );
        }
        result
    }

    fn exchange(&mut self, registry: &mut ChannelRegistry, request: &CommandRequest) -> Result<i32> {
        self.state = ExchangeState::Sending;
        let sent = request.encode(&mut self.mirror)?;
        registry.mark_dirty();

        let stale = self.serial.discard_input();
        if stale > 0 {
            debug!("discarded {} stale bytes", stale);
        }
        if let Err(err) = self.transmit(sent) {
            self.set_transmit();
            return Err(err);
        }

        if let Some(pin) = self.direction.as_mut() {
            pin.set_receive();
        }
        if request.channel_id == BROADCAST_CHANNEL {
            self.set_transmit();
            return Ok(request.value);
        }

        let received = self.receive(sent);
        self.set_transmit();
        let len = received?;

        self.state = ExchangeState::Validating;
        let response = CommandResponse::parse(&self.mirror[..len], request.size)?;
        trace!(
            "channel {} order {=u8:#x} -> {}",
            response.channel_id,
            response.order,
            response.value
        );
        Ok(response.value)
    }

    fn transmit(&mut self, len: usize) -> Result<()> {
        self.serial
            .write_blocking(&self.mirror[..len])
            .map_err(|_| XBusError::Serial)?;
        self.serial.flush().map_err(|_| XBusError::Serial)
    }

    /// Read echo, reply header and reply body; returns the reply length
    fn receive(&mut self, sent: usize) -> Result<usize> {
        self.state = ExchangeState::AwaitingEcho;
        self.read_stage(0..sent)?;

        self.state = ExchangeState::AwaitingResponseHeader;
        self.read_stage(0..REPLY_HEADER_SIZE)?;

        let len = frame::frame_len(self.mirror[OFFSET_LENGTH]);
        if len > self.mirror.len() {
            warn!("reply length {} exceeds buffer", len);
            return Err(XBusError::CrcError);
        }

        self.state = ExchangeState::AwaitingResponseBody;
        self.read_stage(REPLY_HEADER_SIZE..len)?;
        Ok(len)
    }

    /// One timeout-bounded read; zero bytes means the servo went quiet
    fn read_stage(&mut self, range: Range<usize>) -> Result<usize> {
        let count = self
            .serial
            .read_blocking(&mut self.mirror[range])
            .map_err(|_| XBusError::Serial)?;
        if count == 0 {
            return Err(XBusError::Timeout);
        }
        Ok(count)
    }

    fn set_transmit(&mut self) {
        if let Some(pin) = self.direction.as_mut() {
            pin.set_transmit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{reply, MockPin, MockSerial};
    use xbus_hal::OutputPin;
    use xbus_protocol::{Command, Order, SERVO_NEUTRAL};

    fn engine(serial: MockSerial) -> (CommandEngine<MockSerial, MockPin>, ChannelRegistry) {
        let mut engine = CommandEngine::new(serial, Some(MockPin::default()), 3).unwrap();
        engine.begin(&UartConfig::default()).unwrap();
        (engine, ChannelRegistry::new(3).unwrap())
    }

    fn pin_history(engine: &CommandEngine<MockSerial, MockPin>) -> &[bool] {
        &engine.direction_pin().unwrap().history
    }

    #[test]
    fn test_begin_configures_port_and_pin() {
        let (engine, _) = engine(MockSerial::new());
        assert_eq!(engine.serial().config, Some(UartConfig::default()));
        assert!(engine.direction_pin().unwrap().output);
        assert!(engine.direction_pin().unwrap().is_set_low());
    }

    #[test]
    fn test_emit_empty_registry_writes_nothing() {
        let (mut engine, mut registry) = engine(MockSerial::new());
        assert_eq!(engine.emit(&mut registry), Ok(Emission::Empty));
        assert!(engine.serial().written.is_empty());
    }

    #[test]
    fn test_emit_copies_template_when_dirty() {
        let (mut engine, mut registry) = engine(MockSerial::new());
        registry.add(5, SERVO_NEUTRAL).unwrap();

        assert_eq!(engine.emit(&mut registry), Ok(Emission::Sent));
        assert!(!registry.is_dirty());
        assert_eq!(engine.serial().written[0], registry.as_bytes());

        // Clean template: mirror is replayed as-is
        assert_eq!(engine.emit(&mut registry), Ok(Emission::Sent));
        assert_eq!(engine.serial().written[1], registry.as_bytes());

        // Broadcasts never turn the bus around
        assert_eq!(pin_history(&engine), &[false]);
    }

    #[test]
    fn test_emit_after_command_recopies_template() {
        let (mut engine, mut registry) = engine(MockSerial::new());
        registry.add(5, SERVO_NEUTRAL).unwrap();
        engine.emit(&mut registry).unwrap();

        let request = CommandRequest::new(Command::Set, 0, Order::Mode, 1);
        engine.send_command(&mut registry, &request).unwrap();
        assert!(registry.is_dirty());

        engine.emit(&mut registry).unwrap();
        assert_eq!(engine.serial().written.last().unwrap(), registry.as_bytes());
    }

    #[test]
    fn test_emit_registry_larger_than_mirror() {
        let mut engine: CommandEngine<MockSerial, MockPin> =
            CommandEngine::new(MockSerial::new(), None, 1).unwrap();
        let mut registry = ChannelRegistry::new(3).unwrap();
        for channel in 1..=3 {
            registry.add(channel, SERVO_NEUTRAL).unwrap();
        }

        assert_eq!(engine.emit(&mut registry), Err(XBusError::OutOfMemory));
        assert!(engine.serial().written.is_empty());
        assert!(registry.is_dirty());

        // Shrinking back to what the mirror holds recovers
        registry.remove(3).unwrap();
        registry.remove(2).unwrap();
        assert_eq!(engine.emit(&mut registry), Ok(Emission::Sent));
        assert_eq!(engine.serial().written[0], registry.as_bytes());
    }

    #[test]
    fn test_emit_serial_failure() {
        let mut serial = MockSerial::new();
        serial.fail_writes = true;
        let (mut engine, mut registry) = engine(serial);
        registry.add(1, 0).unwrap();
        assert_eq!(engine.emit(&mut registry), Err(XBusError::Serial));
    }

    #[test]
    fn test_broadcast_channel_needs_no_reply() {
        let (mut engine, mut registry) = engine(MockSerial::new());
        let request = CommandRequest::new(Command::Set, 0, Order::Id, 7);

        assert_eq!(engine.send_command(&mut registry, &request), Ok(7));
        let body = [0x20, 0x04, 0x00, 0x00, 0x03, 0x07];
        assert_eq!(&engine.serial().written[0][..6], &body);
        assert_eq!(engine.serial().written[0][6], xbus_protocol::crc8(&body));
        assert_eq!(engine.serial().flushes, 1);
        assert_eq!(engine.serial().reads, 0);
        assert_eq!(pin_history(&engine), &[false, true, false]);
        assert_eq!(engine.state(), ExchangeState::Idle);
    }

    #[test]
    fn test_get_two_byte_value() {
        let mut serial = MockSerial::with_echo();
        serial.queue_reply(&reply(Command::Get, 5, Order::Version.as_u8(), &[0x01, 0x23]));
        let (mut engine, mut registry) = engine(serial);

        let request = CommandRequest::new(Command::Get, 5, Order::Version, 0);
        assert_eq!(engine.send_command(&mut registry, &request), Ok(0x0123));
        assert_eq!(pin_history(&engine), &[false, true, false]);
        assert_eq!(engine.state(), ExchangeState::Idle);
        assert!(engine.serial().incoming.is_empty());
    }

    #[test]
    fn test_get_one_byte_value_sign_extended() {
        let mut serial = MockSerial::with_echo();
        serial.queue_reply(&reply(Command::Get, 5, Order::PGain.as_u8(), &[0x80]));
        let (mut engine, mut registry) = engine(serial);

        let request = CommandRequest::new(Command::Get, 5, Order::PGain, 0);
        assert_eq!(engine.send_command(&mut registry, &request), Ok(-128));
    }

    #[test]
    fn test_stale_input_is_discarded() {
        let mut serial = MockSerial::with_echo();
        serial.incoming.extend([0xFF, 0x00, 0x13]);
        serial.queue_reply(&reply(Command::Get, 5, Order::Id.as_u8(), &[0x05]));
        let (mut engine, mut registry) = engine(serial);

        let request = CommandRequest::new(Command::Get, 5, Order::Id, 0);
        assert_eq!(engine.send_command(&mut registry, &request), Ok(5));
    }

    #[test]
    fn test_timeout_on_echo() {
        let (mut engine, mut registry) = engine(MockSerial::new());
        let request = CommandRequest::new(Command::Get, 5, Order::Id, 0);

        assert_eq!(
            engine.send_command(&mut registry, &request),
            Err(XBusError::Timeout)
        );
        assert!(engine.direction_pin().unwrap().is_set_low());
        assert_eq!(engine.serial().reads, 1);
    }

    #[test]
    fn test_timeout_on_reply_header() {
        let (mut engine, mut registry) = engine(MockSerial::with_echo());
        let request = CommandRequest::new(Command::Get, 5, Order::Id, 0);

        assert_eq!(
            engine.send_command(&mut registry, &request),
            Err(XBusError::Timeout)
        );
        assert_eq!(engine.serial().reads, 2);
        assert_eq!(pin_history(&engine), &[false, true, false]);
    }

    #[test]
    fn test_timeout_on_reply_body() {
        let mut serial = MockSerial::with_echo();
        serial.queue_reply(&[0x21, 0x04]);
        let (mut engine, mut registry) = engine(serial);
        let request = CommandRequest::new(Command::Get, 5, Order::Id, 0);

        assert_eq!(
            engine.send_command(&mut registry, &request),
            Err(XBusError::Timeout)
        );
        assert_eq!(engine.serial().reads, 3);
        assert!(engine.direction_pin().unwrap().is_set_low());
    }

    #[test]
    fn test_corrupt_reply_is_crc_error() {
        let mut frame = reply(Command::Get, 5, Order::Id.as_u8(), &[0x05]);
        let last = frame.len() - 1;
        frame[last] ^= 0x5A;
        let mut serial = MockSerial::with_echo();
        serial.queue_reply(&frame);
        let (mut engine, mut registry) = engine(serial);

        let request = CommandRequest::new(Command::Get, 5, Order::Id, 0);
        assert_eq!(
            engine.send_command(&mut registry, &request),
            Err(XBusError::CrcError)
        );
        assert!(engine.direction_pin().unwrap().is_set_low());
    }

    #[test]
    fn test_unsupported_reply() {
        let mut serial = MockSerial::with_echo();
        serial.queue_reply(&reply(Command::Status, 5, Order::Unsupported.as_u8(), &[0x00]));
        let (mut engine, mut registry) = engine(serial);

        let request = CommandRequest::new(Command::Status, 5, Order::AlarmLevel, 0);
        assert_eq!(
            engine.send_command(&mut registry, &request),
            Err(XBusError::Unsupported)
        );
    }

    #[test]
    fn test_oversized_reply_length_rejected() {
        let mut serial = MockSerial::with_echo();
        serial.queue_reply(&[0x21, 0xF0, 0x00, 0x05]);
        let (mut engine, mut registry) = engine(serial);

        let request = CommandRequest::new(Command::Get, 5, Order::Id, 0);
        assert_eq!(
            engine.send_command(&mut registry, &request),
            Err(XBusError::CrcError)
        );
        assert!(engine.direction_pin().unwrap().is_set_low());
    }

    #[test]
    fn test_transmit_failure_restores_pin() {
        let mut serial = MockSerial::new();
        serial.fail_writes = true;
        let (mut engine, mut registry) = engine(serial);

        let request = CommandRequest::new(Command::Get, 5, Order::Id, 0);
        assert_eq!(
            engine.send_command(&mut registry, &request),
            Err(XBusError::Serial)
        );
        assert!(engine.direction_pin().unwrap().is_set_low());
        assert_eq!(engine.state(), ExchangeState::Idle);
    }

    #[test]
    fn test_end_releases_hardware() {
        let (mut engine, _) = engine(MockSerial::new());
        engine.end();
        let (serial, pin) = engine.into_parts();
        assert!(serial.closed);
        assert!(pin.unwrap().released);
    }
}
