//! UART serial communication abstractions
//!
//! Provides the blocking serial traits the XBus driver is written against.
//! Receive calls are bounded by the timeout configured through
//! [`Uart::configure`]; there is no other cancellation mechanism.

/// XBus line rate in bits per second
pub const XBUS_BAUDRATE: u32 = 250_000;

/// Receive timeout used while waiting for a servo reply
pub const XBUS_RX_TIMEOUT_MS: u32 = 300;

/// UART transmitter
pub trait UartTx {
    /// Error type for transmit operations
    type Error;

    /// Write data to the UART
    ///
    /// Blocks until all data has been queued or an error occurs.
    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Block until every queued byte has left the shift register
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// UART receiver
pub trait UartRx {
    /// Error type for receive operations
    type Error;

    /// Read data from the UART
    ///
    /// Blocks until `buf` is filled or the receive timeout elapses, and
    /// returns the number of bytes actually stored. A return of `0` means
    /// nothing arrived within the timeout.
    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Pop one already-buffered byte without waiting
    fn try_read_byte(&mut self) -> Option<u8>;

    /// Discard every byte currently buffered on the receiver
    ///
    /// Returns the number of bytes dropped.
    fn discard_input(&mut self) -> usize {
        let mut dropped = 0;
        while self.try_read_byte().is_some() {
            dropped += 1;
        }
        dropped
    }
}

/// Combined UART interface
///
/// A single peripheral providing both directions on the shared bus wire,
/// plus the open/close lifecycle.
pub trait Uart: UartTx + UartRx {
    /// Apply line settings and the receive timeout, enabling the peripheral
    fn configure(&mut self, config: &UartConfig) -> Result<(), <Self as UartTx>::Error>;

    /// Disable the peripheral
    fn close(&mut self);
}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Upper bound on a single blocking read, in milliseconds
    pub rx_timeout_ms: u32,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baudrate: XBUS_BAUDRATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            rx_timeout_ms: XBUS_RX_TIMEOUT_MS,
        }
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Seven,
    Eight,
    Nine,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}
