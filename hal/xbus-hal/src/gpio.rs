//! GPIO pin abstractions
//!
//! The XBus wire is half-duplex. Boards with a separate driver/receiver
//! stage use a direction pin: high selects receive, low selects transmit.
//! Boards without one run in transmit-only mode.

/// Digital output pin
pub trait OutputPin {
    /// Set the pin high (logic 1)
    fn set_high(&mut self);

    /// Set the pin low (logic 0)
    fn set_low(&mut self);

    /// Set the pin to a specific state
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }

    /// Check if the pin is currently set high
    fn is_set_high(&self) -> bool;

    /// Check if the pin is currently set low
    fn is_set_low(&self) -> bool {
        !self.is_set_high()
    }
}

/// Bus direction pin
///
/// An output pin with a lifecycle: switched to output (transmit, low)
/// when the bus starts and handed back as an input when it stops.
pub trait DirectionPin: OutputPin {
    /// Make the pin an output and drive it to transmit mode
    fn configure_output(&mut self);

    /// Return the pin to a high-impedance input
    fn release_to_input(&mut self);

    /// Turn the bus around to listen for a reply
    fn set_receive(&mut self) {
        self.set_high();
    }

    /// Turn the bus around to drive the wire
    fn set_transmit(&mut self) {
        self.set_low();
    }

    /// Check if the bus is currently turned around for receive
    fn is_receiving(&self) -> bool {
        self.is_set_high()
    }
}

/// Placeholder for transmit-only topologies
///
/// Uninhabited: a bus typed with this pin can never hold one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDirectionPin {}

impl OutputPin for NoDirectionPin {
    fn set_high(&mut self) {
        match *self {}
    }

    fn set_low(&mut self) {
        match *self {}
    }

    fn is_set_high(&self) -> bool {
        match *self {}
    }
}

impl DirectionPin for NoDirectionPin {
    fn configure_output(&mut self) {
        match *self {}
    }

    fn release_to_input(&mut self) {
        match *self {}
    }
}

/// Direction pin backed by an `embedded-hal` output
///
/// `embedded-hal` pins cannot change mode at runtime, so releasing leaves
/// the pin driving low (transmit), which is also the bus idle state.
/// Pin errors are ignored; GPIO writes are infallible on every supported
/// chip.
#[derive(Debug)]
pub struct HalDirectionPin<P> {
    pin: P,
    high: bool,
}

impl<P: embedded_hal::digital::OutputPin> HalDirectionPin<P> {
    /// Wrap an `embedded-hal` output pin
    pub fn new(pin: P) -> Self {
        Self { pin, high: false }
    }

    /// Unwrap the underlying pin
    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: embedded_hal::digital::OutputPin> OutputPin for HalDirectionPin<P> {
    fn set_high(&mut self) {
        self.pin.set_high().ok();
        self.high = true;
    }

    fn set_low(&mut self) {
        self.pin.set_low().ok();
        self.high = false;
    }

    fn is_set_high(&self) -> bool {
        self.high
    }
}

impl<P: embedded_hal::digital::OutputPin> DirectionPin for HalDirectionPin<P> {
    fn configure_output(&mut self) {
        self.set_low();
    }

    fn release_to_input(&mut self) {
        self.set_low();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    #[derive(Default)]
    struct LevelPin {
        level: bool,
        writes: u8,
    }

    impl embedded_hal::digital::ErrorType for LevelPin {
        type Error = Infallible;
    }

    impl embedded_hal::digital::OutputPin for LevelPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.level = false;
            self.writes += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.level = true;
            self.writes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_hal_pin_turnaround() {
        let mut pin = HalDirectionPin::new(LevelPin::default());

        pin.configure_output();
        assert!(pin.is_set_low());
        assert!(!pin.is_receiving());

        pin.set_receive();
        assert!(pin.is_receiving());

        pin.set_transmit();
        assert!(pin.is_set_low());

        let inner = pin.into_inner();
        assert!(!inner.level);
        assert_eq!(inner.writes, 3);
    }

    #[test]
    fn test_set_state() {
        let mut pin = HalDirectionPin::new(LevelPin::default());
        pin.set_state(true);
        assert!(pin.is_set_high());
        pin.set_state(false);
        assert!(pin.is_set_low());
    }

    #[test]
    fn test_release_leaves_transmit_level() {
        let mut pin = HalDirectionPin::new(LevelPin::default());
        pin.set_receive();
        pin.release_to_input();
        assert!(!pin.into_inner().level);
    }
}
