//! ISR-safe driver slot using critical sections.
//!
//! [`EspAt`] needs its UART, clock and delay at construction, so it cannot
//! be built in a `static` initializer. [`SharedDriver`] starts empty and is
//! filled once with [`install`](SharedDriver::install).

use embedded_hal::delay::DelayNs;

use super::primitives::CriticalSectionCell;
use crate::driver::esp::EspAt;
use crate::hal::clock::Clock;
use crate::hal::serial::SerialPort;
use crate::internal::constants::{DEFAULT_QUEUE_PACKETS, SOCKET_BUFSIZE};

/// ISR-safe driver wrapper using critical sections.
///
/// All access goes through `critical_section::with()`, disabling interrupts
/// for the duration of the closure. Keep closures short: a blocking socket
/// call inside [`with`](Self::with) holds interrupts off for its whole
/// timeout, so feed the UART through [`BufferedSerial`](super::BufferedSerial)
/// only when calls are made outside the critical section.
///
/// # Example
///
/// ```ignore
/// static ESP: SharedDriver<Uart, Tick, Delay> = SharedDriver::new();
///
/// ESP.install(EspAt::new(uart, tick, delay, DriverConfig::new()));
/// let pending = ESP.with(|esp| esp.pending(0));
/// ```
pub struct SharedDriver<
    S,
    C,
    D,
    const QUEUE_BYTES: usize = SOCKET_BUFSIZE,
    const QUEUE_PACKETS: usize = DEFAULT_QUEUE_PACKETS,
> {
    inner: CriticalSectionCell<Option<EspAt<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>>>,
}

impl<S, C, D, const QUEUE_BYTES: usize, const QUEUE_PACKETS: usize>
    SharedDriver<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>
{
    /// Create an empty slot (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self {
            inner: CriticalSectionCell::new(None),
        }
    }

    /// Returns `true` once a driver has been installed
    pub fn is_installed(&self) -> bool {
        self.inner.with_ref(Option::is_some)
    }
}

impl<S, C, D, const QUEUE_BYTES: usize, const QUEUE_PACKETS: usize>
    SharedDriver<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>
where
    S: SerialPort,
    C: Clock,
    D: DelayNs,
{
    /// Move a driver into the slot, returning the one it replaces.
    pub fn install(
        &self,
        driver: EspAt<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>,
    ) -> Option<EspAt<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>> {
        self.inner.with(|slot| slot.replace(driver))
    }

    /// Take the driver back out, leaving the slot empty.
    pub fn take(&self) -> Option<EspAt<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>> {
        self.inner.with(Option::take)
    }

    /// Execute a closure with exclusive access to the driver.
    ///
    /// Returns `None` if no driver is installed.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut EspAt<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>) -> R,
    {
        self.inner.with(|slot| slot.as_mut().map(f))
    }

    /// Try to execute a closure, returning `None` if the driver is already
    /// borrowed or not installed.
    #[inline]
    pub fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut EspAt<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>) -> R,
    {
        self.inner.try_with(|slot| slot.as_mut().map(f)).flatten()
    }
}

impl<S, C, D, const QUEUE_BYTES: usize, const QUEUE_PACKETS: usize> Default
    for SharedDriver<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>
{
    fn default() -> Self {
        Self::new()
    }
}

/// Shared driver with the default 16 KiB queue
pub type SharedDriverDefault<S, C, D> =
    SharedDriver<S, C, D, SOCKET_BUFSIZE, DEFAULT_QUEUE_PACKETS>;
