//! Core driver components for ESP AT-command Wi-Fi modems.
//!
//! This module contains the driver context and everything it is built from:
//!
//! - [`config`] - Configuration types and builder patterns
//! - [`error`] - Error types and result aliases
//! - [`esp`] - The [`EspAt`] driver context and its event pump
//! - [`link`] - Per-link connection state and the accept FIFO
//! - [`events`] - Unsolicited `CONNECT`/`CLOSED` detection
//! - [`packet`] - Bounded inbound packet queue
//! - [`ipd`] - `+IPD` frame header grammar
//! - [`wifi`] - Control-plane command replies
//! - [`socket`] - BSD-style socket handles
//!
//! # Example
//!
//! ```ignore
//! use ph_esp_at::driver::{DriverConfig, IpdFormat};
//!
//! let config = DriverConfig::new()
//!     .with_ipd_format(IpdFormat::IdLengthRemote)
//!     .with_read_timeout_ms(1000);
//! ```

// Submodules
pub mod buffer;
pub mod config;
pub mod error;
pub mod esp;
pub mod events;
pub mod ipd;
pub mod link;
pub mod packet;
pub mod socket;
pub mod wifi;

mod at;
mod connection;

// Re-exports for convenience
pub use config::{DhcpMode, DriverConfig, IpdFormat, Protocol, State, WifiMode};
pub use error::{
    AtError, AtResult, Error, FrameError, FrameResult, QueueError, QueueResult, Result,
    SocketError, SocketResult,
};
pub use esp::{EspAt, EspAtDefault, EspAtLarge, EspAtSmall};
pub use events::{LinkEvent, PollEvent};
pub use socket::{Socket, SocketOption, SocketOptionName};
pub use wifi::{ApInfo, FirmwareVersion, StationConfig};
