//! ESP AT-command Wi-Fi Driver
//!
//! A `no_std`, `no_alloc` driver for ESP8266/ESP32 modules running the
//! Espressif AT firmware, attached to the host over a UART.
//!
//! The modem owns the TCP/IP stack. This crate turns its line-oriented AT
//! dialogue into a BSD-style socket API while coping with unsolicited
//! `+IPD`, `<id>,CONNECT` and `<id>,CLOSED` notifications that arrive in the
//! middle of command replies.
//!
//! # Architecture
//!
//! 1. **Platform Layer** ([`hal`]): serial transport and millisecond clock traits
//! 2. **Protocol Layer** ([`driver`]): AT command exchange, `+IPD` framing,
//!    link-state tracking and the bounded inbound packet queue
//! 3. **Socket Layer** ([`driver::socket`]): `open`/`bind`/`listen`/`accept`/
//!    `connect`/`send`/`recv`/`close` over the modem's five links
//!
//! Everything runs on one thread of control. Every blocking operation is a
//! bounded polling loop driven by [`EspAt::poll`].
//!
//! # Features
//!
//! - `defmt`: Enable defmt logging and formatting for public types
//! - `critical-section`: Enable ISR-safe [`sync::SharedDriver`] and the
//!   interrupt-fed RX ring
//! - `embedded-io`: Adapt any `embedded-io` UART as the modem transport
//!
//! # Example
//!
//! ```ignore
//! use ph_esp_at::{DriverConfig, EspAtDefault, Protocol, WifiMode};
//! use core::net::{Ipv4Addr, SocketAddrV4};
//!
//! let mut esp = EspAtDefault::new(uart, clock, delay, DriverConfig::new());
//! esp.init()?;
//! esp.set_wifi_mode(WifiMode::Station)?;
//! esp.join("my-network", "secret")?;
//!
//! let mut sock = esp.socket_open(Protocol::Tcp)?;
//! esp.socket_connect(&mut sock, SocketAddrV4::new(Ipv4Addr::new(93, 184, 216, 34), 80))?;
//! esp.socket_send(&sock, b"GET / HTTP/1.0\r\n\r\n")?;
//!
//! let mut buf = [0u8; 512];
//! let n = esp.socket_recv(&sock, &mut buf)?;
//! esp.socket_close(sock)?;
//! ```
//!
//! # Memory Requirements
//!
//! With the default configuration (16 KiB packet arena, 32 packet slots):
//! - About 21 KiB for the driver context, placed wherever the caller puts it

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live here; thresholds and config are in Cargo.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements
)]

// =============================================================================
// Modules
// =============================================================================

// Logging shim (defmt or nothing); must come first so the macros are in scope
mod log;

pub mod driver;
pub mod hal;

// Internal implementation details (pub(crate) only)
mod internal;

#[cfg(feature = "embedded-io")]
#[cfg_attr(docsrs, doc(cfg(feature = "embedded-io")))]
pub mod integration;

#[cfg(feature = "critical-section")]
#[cfg_attr(docsrs, doc(cfg(feature = "critical-section")))]
pub mod sync;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::config::{DhcpMode, DriverConfig, IpdFormat, Protocol, State, WifiMode};
pub use driver::error::{
    AtError, AtResult, Error, FrameError, FrameResult, QueueError, QueueResult, Result,
    SocketError, SocketResult,
};
pub use driver::esp::{EspAt, EspAtDefault, EspAtLarge, EspAtSmall};
pub use driver::events::{LinkEvent, PollEvent};
pub use driver::socket::{Socket, SocketOption, SocketOptionName};
pub use driver::wifi::{ApInfo, FirmwareVersion, StationConfig};
pub use hal::{Clock, SerialPort, SerialWrite};

// Re-export sync types when critical-section is enabled
#[cfg(feature = "critical-section")]
pub use sync::{BufferedSerial, IsrRxBuffer, SharedDriver};

// Re-export transport adapters when embedded-io is enabled
#[cfg(feature = "embedded-io")]
pub use integration::embedded_io::{IoSerial, IoTx};

/// Shared driver constants.
///
/// Protocol limits and default timeouts, grouped here to keep the top-level
/// facade focused on driver types.
pub mod constants {
    pub use crate::internal::constants::{
        // Timing
        ACCEPT_TIMEOUT_MS,
        ATE0_TIMEOUT_MS,
        // Protocol limits
        CIPSEND_MAX,
        // Buffers
        DEFAULT_QUEUE_PACKETS,
        DOMAIN_MAX,
        DOMAIN_TIMEOUT_MS,
        KEEPALIVE_MAX,
        LOGIN_TIMEOUT_MS,
        PACKET_HEADER_SIZE,
        PACKET_TIMEOUT_MS,
        READ_TIMEOUT_MS,
        RESET_SETTLE_MS,
        SOCKET_BUFSIZE,
        // Links
        SOCKET_COUNT,
        WIFI_TIMEOUT_MS,
    };
}

// =============================================================================
// Macro Helpers
// =============================================================================

/// Declare a static, ISR-safe driver slot.
///
/// Expands to an empty [`sync::SharedDriver`] static; install the driver into
/// it once the UART, clock and delay exist.
///
/// # Examples
///
/// ```ignore
/// ph_esp_at::esp_static!(ESP, Uart0, TickClock, Delay);
///
/// ESP.install(EspAt::new(uart, clock, delay, DriverConfig::new()));
/// ESP.with(|esp| esp.init()).unwrap();
/// ```
#[cfg(feature = "critical-section")]
#[macro_export]
macro_rules! esp_static {
    ($name:ident, $serial:ty, $clock:ty, $delay:ty) => {
        $crate::esp_static!($name, $serial, $clock, $delay, 16384, 32);
    };
    ($name:ident, $serial:ty, $clock:ty, $delay:ty, $bytes:expr, $packets:expr) => {
        static $name: $crate::sync::SharedDriver<$serial, $clock, $delay, $bytes, $packets> =
            $crate::sync::SharedDriver::new();
    };
}
