//! Serial transport traits.
//!
//! The driver talks to the modem over a byte stream it does not own. These
//! traits are the only contract it needs: a non-blocking "is there a byte"
//! check, a single-byte read and a bulk write.

use super::clock::{Clock, Deadline};

/// Write half of the modem UART
pub trait SerialWrite {
    /// Write `data` to the transport, returning the number of bytes accepted
    fn write_bytes(&mut self, data: &[u8]) -> usize;

    /// Write all of `data`, returning `true` if every byte was accepted
    fn write_all(&mut self, data: &[u8]) -> bool {
        let mut written = 0;
        while written < data.len() {
            let n = self.write_bytes(&data[written..]);
            if n == 0 {
                return false;
            }
            written += n;
        }
        true
    }
}

/// Full-duplex modem UART
///
/// All reads are non-blocking. Bounded waiting is done by the driver with a
/// [`Clock`].
pub trait SerialPort: SerialWrite {
    /// Returns `true` if at least one byte can be read without blocking
    fn available(&mut self) -> bool;

    /// Read one byte, or `None` if nothing is buffered
    fn read_byte(&mut self) -> Option<u8>;

    /// Read as many buffered bytes as fit into `buf`
    ///
    /// The default implementation is built on [`read_byte`](Self::read_byte).
    /// Transports with a FIFO or DMA buffer should override it.
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.read_byte() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }
}

impl<T: SerialWrite + ?Sized> SerialWrite for &mut T {
    fn write_bytes(&mut self, data: &[u8]) -> usize {
        (**self).write_bytes(data)
    }
}

impl<T: SerialPort + ?Sized> SerialPort for &mut T {
    fn available(&mut self) -> bool {
        (**self).available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }
}

/// Fill `buf` from the transport until it is full or `timeout_ms` elapses.
///
/// Returns the number of bytes stored. A short count means the deadline hit.
pub fn read_within<S, C>(serial: &mut S, clock: &mut C, buf: &mut [u8], timeout_ms: u32) -> usize
where
    S: SerialPort + ?Sized,
    C: Clock + ?Sized,
{
    let deadline = Deadline::start(clock, timeout_ms);
    let mut filled = 0;
    while filled < buf.len() {
        if serial.available() {
            filled += serial.read(&mut buf[filled..]);
        } else if deadline.expired(clock) {
            break;
        }
    }
    filled
}

/// Read and discard `amount` bytes, giving up after `timeout_ms`.
///
/// Used to keep the stream aligned when a frame cannot be stored.
pub fn drain_within<S, C>(serial: &mut S, clock: &mut C, amount: usize, timeout_ms: u32) -> usize
where
    S: SerialPort + ?Sized,
    C: Clock + ?Sized,
{
    let mut scratch = [0u8; 64];
    let deadline = Deadline::start(clock, timeout_ms);
    let mut drained = 0;
    while drained < amount {
        if serial.available() {
            let want = (amount - drained).min(scratch.len());
            drained += serial.read(&mut scratch[..want]);
        } else if deadline.expired(clock) {
            break;
        }
    }
    drained
}
