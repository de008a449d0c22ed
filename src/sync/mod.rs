//! Synchronization and Concurrency Support
//!
//! The driver itself is single-threaded: it polls the UART and owns all of
//! its state. This module provides the pieces needed when the UART is fed
//! from an interrupt handler or the driver lives in a `static`:
//!
//! - **Primitives** (`primitives`): Low-level synchronization types
//!   - [`CriticalSectionCell`] - ISR-safe interior mutability
//!
//! - **Shared Wrapper** (`shared`): ISR-safe driver slot
//!   - [`SharedDriver`] - Critical-section protected [`EspAt`](crate::EspAt)
//!
//! - **Buffered Serial** (`serial`): Interrupt-fed receive path
//!   - [`IsrRxBuffer`] - Single-producer RX ring filled from the UART ISR
//!   - [`BufferedSerial`] - [`SerialPort`](crate::SerialPort) over the ring
//!
//! # Feature Flags
//!
//! - `critical-section`: Enables this module
//!
//! # Example
//!
//! ```ignore
//! use ph_esp_at::sync::{BufferedSerial, IsrRxBuffer};
//!
//! static RX: IsrRxBuffer<2048> = IsrRxBuffer::new();
//!
//! #[interrupt]
//! fn UART1() {
//!     while let Some(byte) = uart_fifo_pop() {
//!         RX.push_from_isr(byte);
//!     }
//! }
//!
//! let serial = BufferedSerial::new(&RX, uart_tx);
//! let mut esp = EspAtDefault::new(serial, clock, delay, DriverConfig::new());
//! ```

mod primitives;
mod serial;
mod shared;

pub use primitives::CriticalSectionCell;
pub use serial::{BufferedSerial, IsrRxBuffer};
pub use shared::{SharedDriver, SharedDriverDefault};
