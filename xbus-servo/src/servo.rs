//! XBus master driver
//!
//! [`XBusServo`] ties the channel registry to the command engine. Typical
//! use:
//!
//! ```ignore
//! let mut bus = XBusServo::with_direction_pin(uart, dir_pin, XBusConfig::with_max_servos(4))?;
//! bus.begin()?;
//! bus.add_servo(1, SERVO_NEUTRAL)?;
//!
//! // every 14 ms, from the application's ticker
//! bus.emit()?;
//!
//! let version = bus.get_command(1, Order::Version)?;
//! ```
//!
//! Command exchanges block for up to three receive timeouts. A periodic
//! emitter running from another task should go through
//! [`SharedXBus`](crate::shared::SharedXBus) instead of sharing this type
//! directly.

use xbus_hal::{DirectionPin, NoDirectionPin, Uart};
use xbus_protocol::{
    Command, CommandRequest, Mode, Order, ServoModel, ValueSize, BROADCAST_CHANNEL,
};

use crate::config::XBusConfig;
use crate::engine::{CommandEngine, Emission, ExchangeState};
use crate::error::{Result, XBusError};
use crate::registry::ChannelRegistry;

/// XBus master: registered channels plus the serial side
pub struct XBusServo<S, D = NoDirectionPin> {
    config: XBusConfig,
    registry: ChannelRegistry,
    engine: CommandEngine<S, D>,
}

impl<S: Uart> XBusServo<S, NoDirectionPin> {
    /// Create a transmit-only bus (no direction pin, no replies)
    pub fn transmit_only(serial: S, config: XBusConfig) -> Result<Self> {
        Self::new(serial, None, config)
    }
}

impl<S: Uart, D: DirectionPin> XBusServo<S, D> {
    /// Create a bus that turns the wire around with `pin`
    pub fn with_direction_pin(serial: S, pin: D, config: XBusConfig) -> Result<Self> {
        Self::new(serial, Some(pin), config)
    }

    /// Create a bus, allocating template and mirror for
    /// `config.max_servos` channels (clamped to 1..=50)
    pub fn new(serial: S, direction: Option<D>, config: XBusConfig) -> Result<Self> {
        let capacity = config.channel_capacity();
        let registry = ChannelRegistry::new(capacity)?;
        let engine = CommandEngine::new(serial, direction, capacity)?;
        Ok(Self {
            config,
            registry,
            engine,
        })
    }

    /// Open the serial port and drive the direction pin to transmit
    pub fn begin(&mut self) -> Result<()> {
        self.engine.begin(&self.config.uart_config())?;
        info!(
            "xbus started: {} slots, {} bps",
            self.registry.capacity(),
            self.config.baudrate
        );
        Ok(())
    }

    /// Close the serial port, release the direction pin and hand both back
    pub fn end(mut self) -> (S, Option<D>) {
        self.engine.end();
        self.engine.into_parts()
    }

    /// Register a channel in the broadcast
    pub fn add_servo(&mut self, channel: u8, initial_value: u16) -> Result<()> {
        self.registry.add(channel, initial_value)
    }

    /// Remove a channel from the broadcast
    pub fn remove_servo(&mut self, channel: u8) -> Result<()> {
        self.registry.remove(channel)
    }

    /// Set the target position broadcast for a channel
    pub fn set_servo(&mut self, channel: u8, value: u16) -> Result<()> {
        self.registry.set(channel, value)
    }

    /// Write one position broadcast; call every [`XBusConfig::interval_ms`]
    pub fn emit(&mut self) -> Result<Emission> {
        self.engine.emit(&mut self.registry)
    }

    /// Run one raw command exchange
    ///
    /// `channel` is sent as-is, sub-ID bits included. Channel 0 reaches
    /// every servo, gets no reply and returns `value`.
    pub fn send_command(
        &mut self,
        command: Command,
        channel: u8,
        order: Order,
        value: i32,
        size: ValueSize,
    ) -> Result<i32> {
        let request = CommandRequest::with_size(command, channel, order, value, size);
        self.engine.send_command(&mut self.registry, &request)
    }

    /// Write a servo parameter; returns the value the servo echoes back
    pub fn set_command(&mut self, channel: u8, order: Order, value: i32) -> Result<i32> {
        self.send_command(Command::Set, channel, order, value, order.value_size())
    }

    /// Read a servo parameter
    pub fn get_command(&mut self, channel: u8, order: Order) -> Result<i32> {
        self.send_command(Command::Get, channel, order, 0, order.value_size())
    }

    /// Read a servo status value
    pub fn status_command(&mut self, channel: u8, order: Order) -> Result<i32> {
        self.send_command(Command::Status, channel, order, 0, order.value_size())
    }

    /// Write a parameter to every servo on a transmit-only bus
    pub fn set_command_tx_only(&mut self, order: Order, value: i32) -> Result<()> {
        self.require_transmit_only()?;
        self.set_command(BROADCAST_CHANNEL, order, value)?;
        Ok(())
    }

    /// Move the servo at `old_id` to `new_id`
    ///
    /// Two exchanges: switch the servo into ID-set mode, then write the
    /// new ID. If the second one fails the servo stays in ID-set mode
    /// under its old ID.
    pub fn set_channel_id(&mut self, old_id: u8, new_id: u8) -> Result<()> {
        self.set_command(old_id, Order::Mode, Mode::IdSet.as_u8() as i32)?;
        self.set_command(old_id, Order::Id, new_id as i32)?;
        debug!("channel {} now answers as {}", old_id, new_id);
        Ok(())
    }

    /// Give the only servo on a transmit-only bus a new channel ID
    pub fn set_channel_id_tx_only(&mut self, new_id: u8) -> Result<()> {
        self.require_transmit_only()?;
        self.set_channel_id(BROADCAST_CHANNEL, new_id)
    }

    /// Read and decode a servo's product ID
    ///
    /// `Ok(None)` for a product ID outside the known model range.
    pub fn servo_model(&mut self, channel: u8) -> Result<Option<ServoModel>> {
        let id = self.get_command(channel, Order::Product)?;
        Ok(ServoModel::from_product_id(id as u16))
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn config(&self) -> &XBusConfig {
        &self.config
    }

    pub fn serial(&self) -> &S {
        self.engine.serial()
    }

    pub fn serial_mut(&mut self) -> &mut S {
        self.engine.serial_mut()
    }

    pub fn direction_pin(&self) -> Option<&D> {
        self.engine.direction_pin()
    }

    /// Progress of the current command exchange
    pub fn exchange_state(&self) -> ExchangeState {
        self.engine.state()
    }

    fn require_transmit_only(&self) -> Result<()> {
        if self.engine.has_direction_pin() {
            return Err(XBusError::RestrictedTopology);
        }
        Ok(())
    }
}
