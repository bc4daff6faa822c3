//! Test doubles for the serial port and direction pin

use std::collections::VecDeque;

use xbus_hal::{DirectionPin, OutputPin, Uart, UartConfig, UartRx, UartTx};
use xbus_protocol::{crc8, Command};

/// Scripted serial port
///
/// Every write is recorded. With `echo` set, written bytes are looped back
/// onto the receive queue the way the shared half-duplex wire does; the
/// next queued reply follows them.
#[derive(Debug, Default)]
pub struct MockSerial {
    pub config: Option<UartConfig>,
    pub closed: bool,
    pub written: Vec<Vec<u8>>,
    pub incoming: VecDeque<u8>,
    pub replies: VecDeque<Vec<u8>>,
    pub echo: bool,
    pub fail_writes: bool,
    pub flushes: usize,
    pub reads: usize,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_echo() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    /// Queue bytes delivered after the next write
    pub fn queue_reply(&mut self, bytes: &[u8]) {
        self.replies.push_back(bytes.to_vec());
    }
}

impl UartTx for MockSerial {
    type Error = ();

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), ()> {
        if self.fail_writes {
            return Err(());
        }
        self.written.push(data.to_vec());
        if self.echo {
            self.incoming.extend(data.iter().copied());
        }
        if let Some(reply) = self.replies.pop_front() {
            self.incoming.extend(reply);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ()> {
        self.flushes += 1;
        Ok(())
    }
}

impl UartRx for MockSerial {
    type Error = ();

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        self.reads += 1;
        let mut count = 0;
        while count < buf.len() {
            match self.incoming.pop_front() {
                Some(byte) => buf[count] = byte,
                None => break,
            }
            count += 1;
        }
        Ok(count)
    }

    fn try_read_byte(&mut self) -> Option<u8> {
        self.incoming.pop_front()
    }
}

impl Uart for MockSerial {
    fn configure(&mut self, config: &UartConfig) -> Result<(), ()> {
        self.config = Some(*config);
        self.closed = false;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Direction pin recording every level it is driven to
#[derive(Debug, Default)]
pub struct MockPin {
    pub high: bool,
    pub output: bool,
    pub released: bool,
    pub history: Vec<bool>,
}

impl OutputPin for MockPin {
    fn set_high(&mut self) {
        self.high = true;
        self.history.push(true);
    }

    fn set_low(&mut self) {
        self.high = false;
        self.history.push(false);
    }

    fn is_set_high(&self) -> bool {
        self.high
    }
}

impl DirectionPin for MockPin {
    fn configure_output(&mut self) {
        self.output = true;
        self.released = false;
        self.set_low();
    }

    fn release_to_input(&mut self) {
        self.output = false;
        self.released = true;
    }
}

/// Build a servo reply frame with a valid CRC
pub fn reply(command: Command, channel: u8, order: u8, data: &[u8]) -> Vec<u8> {
    let mut frame = vec![command.as_u8(), data.len() as u8 + 3, 0x00, channel, order];
    frame.extend_from_slice(data);
    frame.push(crc8(&frame));
    frame
}
