//! Interrupt-fed receive path.
//!
//! A UART RX interrupt pushes bytes into an [`IsrRxBuffer`]; the polling
//! driver drains it through [`BufferedSerial`]. Transmission stays on the
//! caller's write half and is never touched from the ISR.

use heapless::Deque;

use super::primitives::CriticalSectionCell;
use crate::hal::serial::{SerialPort, SerialWrite};

struct Ring<const N: usize> {
    bytes: Deque<u8, N>,
    overruns: u32,
}

/// Single-producer byte ring shared between a UART ISR and the driver.
///
/// When the ring is full, new bytes are dropped and counted. A dropped byte
/// inside a `+IPD` payload desynchronizes framing, so size the ring for the
/// largest burst the modem can send between two polls.
pub struct IsrRxBuffer<const N: usize> {
    ring: CriticalSectionCell<Ring<N>>,
}

impl<const N: usize> IsrRxBuffer<N> {
    /// Create an empty ring (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self {
            ring: CriticalSectionCell::new(Ring {
                bytes: Deque::new(),
                overruns: 0,
            }),
        }
    }

    /// Store one received byte. Returns `false` if the ring was full.
    #[inline]
    pub fn push_from_isr(&self, byte: u8) -> bool {
        self.ring.with(|ring| {
            if ring.bytes.push_back(byte).is_ok() {
                true
            } else {
                ring.overruns = ring.overruns.wrapping_add(1);
                false
            }
        })
    }

    /// Store a burst of received bytes, returning how many fit.
    pub fn extend_from_isr(&self, data: &[u8]) -> usize {
        self.ring.with(|ring| {
            let mut stored = 0;
            for &byte in data {
                if ring.bytes.push_back(byte).is_err() {
                    ring.overruns = ring.overruns.wrapping_add((data.len() - stored) as u32);
                    break;
                }
                stored += 1;
            }
            stored
        })
    }

    /// Take the oldest byte
    #[inline]
    pub fn pop(&self) -> Option<u8> {
        self.ring.with(|ring| ring.bytes.pop_front())
    }

    /// Move as many bytes as fit into `buf` in one critical section
    pub fn pop_into(&self, buf: &mut [u8]) -> usize {
        self.ring.with(|ring| {
            let mut n = 0;
            while n < buf.len() {
                match ring.bytes.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            n
        })
    }

    /// Bytes waiting
    pub fn len(&self) -> usize {
        self.ring.with_ref(|ring| ring.bytes.len())
    }

    /// Returns `true` if nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.ring.with_ref(|ring| ring.bytes.is_empty())
    }

    /// Bytes dropped because the ring was full
    pub fn overruns(&self) -> u32 {
        self.ring.with_ref(|ring| ring.overruns)
    }

    /// Drop everything buffered and reset the overrun count
    pub fn clear(&self) {
        self.ring.with(|ring| {
            ring.bytes.clear();
            ring.overruns = 0;
        });
    }
}

impl<const N: usize> Default for IsrRxBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Modem transport reading from an [`IsrRxBuffer`] and writing to `T`
pub struct BufferedSerial<'a, T, const N: usize> {
    rx: &'a IsrRxBuffer<N>,
    tx: T,
}

impl<'a, T: SerialWrite, const N: usize> BufferedSerial<'a, T, N> {
    /// Pair an RX ring with a write half
    pub const fn new(rx: &'a IsrRxBuffer<N>, tx: T) -> Self {
        Self { rx, tx }
    }

    /// The RX ring this transport drains
    pub fn rx(&self) -> &'a IsrRxBuffer<N> {
        self.rx
    }

    /// Give back the write half
    pub fn release(self) -> T {
        self.tx
    }
}

impl<T: SerialWrite, const N: usize> SerialWrite for BufferedSerial<'_, T, N> {
    fn write_bytes(&mut self, data: &[u8]) -> usize {
        self.tx.write_bytes(data)
    }
}

impl<T: SerialWrite, const N: usize> SerialPort for BufferedSerial<'_, T, N> {
    fn available(&mut self) -> bool {
        !self.rx.is_empty()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        self.rx.pop_into(buf)
    }
}

#[cfg(test)]
#[allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    #[derive(Default)]
    struct Sink(Vec<u8>);

    impl SerialWrite for Sink {
        fn write_bytes(&mut self, data: &[u8]) -> usize {
            self.0.extend_from_slice(data);
            data.len()
        }
    }

    #[test]
    fn bytes_come_out_in_order() {
        let rx: IsrRxBuffer<8> = IsrRxBuffer::new();
        assert!(rx.push_from_isr(b'O'));
        assert!(rx.push_from_isr(b'K'));
        assert_eq!(rx.len(), 2);
        assert_eq!(rx.pop(), Some(b'O'));
        assert_eq!(rx.pop(), Some(b'K'));
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn full_ring_counts_overruns() {
        let rx: IsrRxBuffer<4> = IsrRxBuffer::new();
        assert_eq!(rx.extend_from_isr(b"abcdef"), 4);
        assert_eq!(rx.overruns(), 2);
        assert!(!rx.push_from_isr(b'g'));
        assert_eq!(rx.overruns(), 3);

        rx.clear();
        assert!(rx.is_empty());
        assert_eq!(rx.overruns(), 0);
    }

    #[test]
    fn buffered_serial_reads_ring_and_writes_through() {
        static RX: IsrRxBuffer<32> = IsrRxBuffer::new();
        RX.extend_from_isr(b"0,CONNECT\r\n");

        let mut serial = BufferedSerial::new(&RX, Sink::default());
        assert!(serial.available());
        assert_eq!(serial.read_byte(), Some(b'0'));

        let mut buf = [0u8; 16];
        let n = serial.read(&mut buf);
        assert_eq!(&buf[..n], b",CONNECT\r\n");
        assert!(!serial.available());

        assert!(serial.write_all(b"AT\r\n"));
        assert_eq!(serial.release().0, b"AT\r\n");
    }

    #[test]
    fn driver_runs_over_buffered_serial() {
        use crate::driver::config::DriverConfig;
        use crate::driver::esp::EspAt;
        use crate::driver::events::{LinkEvent, PollEvent};
        use crate::testing::{MockClock, MockDelay};

        let rx: IsrRxBuffer<64> = IsrRxBuffer::new();
        let clock = MockClock::new();
        let delay = MockDelay::new(clock.clone());
        let serial = BufferedSerial::new(&rx, Sink::default());
        let mut esp: EspAt<_, _, _, 1024, 4> = EspAt::new(serial, clock, delay, DriverConfig::new());

        rx.extend_from_isr(b"3,CONNECT\r\n");
        assert_eq!(esp.poll(50), Ok(PollEvent::LinkChanged(LinkEvent::Connected(3))));
        assert!(esp.is_connected(3));
    }
}
