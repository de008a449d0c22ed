//! embedded-io transport adapters.
//!
//! The driver polls; it never blocks inside a read. [`IoSerial`] therefore
//! asks `ReadReady` before every read so a blocking `Read` implementation is
//! only called when it will return immediately. Transport errors are logged
//! and counted, then reported to the driver as "no data" or "not written",
//! which the command layer turns into a timeout.

use embedded_io::{Read, ReadReady, Write};

use crate::hal::serial::{SerialPort, SerialWrite};
use crate::log::warn;

/// [`SerialPort`] over an `embedded-io` UART
#[derive(Debug)]
pub struct IoSerial<T> {
    io: T,
    errors: u32,
}

impl<T> IoSerial<T> {
    /// Wrap a UART
    pub const fn new(io: T) -> Self {
        Self { io, errors: 0 }
    }

    /// Transport errors seen so far
    pub fn errors(&self) -> u32 {
        self.errors
    }

    /// Borrow the UART
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.io
    }

    /// Give back the UART
    pub fn release(self) -> T {
        self.io
    }

    fn record_error(&mut self) {
        self.errors = self.errors.wrapping_add(1);
    }
}

impl<T: Write> SerialWrite for IoSerial<T> {
    fn write_bytes(&mut self, data: &[u8]) -> usize {
        match self.io.write(data) {
            Ok(n) => n,
            Err(_) => {
                warn!("uart write failed");
                self.record_error();
                0
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> bool {
        if self.io.write_all(data).is_err() || self.io.flush().is_err() {
            warn!("uart write failed");
            self.record_error();
            return false;
        }
        true
    }
}

impl<T: Read + ReadReady + Write> SerialPort for IoSerial<T> {
    fn available(&mut self) -> bool {
        match self.io.read_ready() {
            Ok(ready) => ready,
            Err(_) => {
                self.record_error();
                false
            }
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        (self.read(&mut byte) == 1).then_some(byte[0])
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        if buf.is_empty() || !self.available() {
            return 0;
        }
        match self.io.read(buf) {
            Ok(n) => n,
            Err(_) => {
                warn!("uart read failed");
                self.record_error();
                0
            }
        }
    }
}

/// [`SerialWrite`] over an `embedded-io` write half
///
/// Pairs with [`BufferedSerial`](crate::sync::BufferedSerial) when the
/// receive side is fed from an interrupt.
#[derive(Debug)]
pub struct IoTx<T> {
    io: T,
}

impl<T: Write> IoTx<T> {
    /// Wrap a write half
    pub const fn new(io: T) -> Self {
        Self { io }
    }

    /// Give back the write half
    pub fn release(self) -> T {
        self.io
    }
}

impl<T: Write> SerialWrite for IoTx<T> {
    fn write_bytes(&mut self, data: &[u8]) -> usize {
        self.io.write(data).unwrap_or(0)
    }

    fn write_all(&mut self, data: &[u8]) -> bool {
        self.io.write_all(data).is_ok() && self.io.flush().is_ok()
    }
}
