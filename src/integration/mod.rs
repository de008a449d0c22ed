//! External Stack Integrations
//!
//! - **embedded-io** (`embedded_io`): Use any `embedded-io` 0.6 UART as the
//!   modem transport
//!   - [`IoSerial`] - full-duplex [`SerialPort`](crate::SerialPort)
//!   - [`IoTx`] - write half for [`BufferedSerial`](crate::sync::BufferedSerial)
//!   - Requires `embedded-io` feature
//!
//! # Example
//!
//! ```ignore
//! // esp-hal blocking UART implements embedded_io::{Read, ReadReady, Write}
//! let uart = Uart::new(peripherals.UART1, uart_config)?.with_rx(rx).with_tx(tx);
//! let serial = IoSerial::new(uart);
//! let mut esp = EspAtDefault::new(serial, clock, delay, DriverConfig::new());
//! ```

pub mod embedded_io;

pub use embedded_io::{IoSerial, IoTx};
