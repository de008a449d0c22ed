//! Platform Abstraction
//!
//! The driver needs three things from the platform:
//!
//! - [`serial`]: a byte transport to the modem ([`SerialPort`])
//! - [`clock`]: a monotonic millisecond tick ([`Clock`])
//! - a delay source, taken directly as `embedded_hal::delay::DelayNs`
//!
//! Pass the UART, timer and delay from your HAL (e.g. `esp_hal::uart::Uart`
//! through the `embedded-io` adapter, `esp_hal::delay::Delay`).

pub mod clock;
pub mod serial;

pub use clock::{Clock, Deadline};
pub use serial::{SerialPort, SerialWrite, drain_within, read_within};
