//! Testing utilities and mock implementations
//!
//! Host-side stand-ins for the modem UART, the millisecond clock and the
//! delay source, so the driver can be exercised end to end without hardware.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::driver::config::DriverConfig;
use crate::driver::esp::EspAt;
use crate::hal::clock::Clock;
use crate::hal::serial::{SerialPort, SerialWrite};

// =============================================================================
// Mock Modem
// =============================================================================

#[derive(Debug, Default)]
struct ModemState {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    /// Bytes written since the last scripted reply fired
    pending: Vec<u8>,
    /// Current partial command line
    line: Vec<u8>,
    lines: Vec<String>,
    script: VecDeque<(Vec<u8>, Vec<u8>)>,
    tx_limit: Option<usize>,
}

/// Scripted ESP modem
///
/// Replies are queued with [`expect`](Self::expect): once the bytes written
/// since the previous reply end with the expected text, the reply is made
/// readable. Expectations fire strictly in order. Unsolicited traffic is
/// injected with [`push_rx`](Self::push_rx).
///
/// The handle is cheap to clone; clones share state, so a test can keep one
/// while the driver owns another.
///
/// # Example
///
/// ```ignore
/// let modem = MockModem::new();
/// modem.expect("AT+CIPMUX=1", "\r\nOK\r\n");
/// modem.push_rx(b"0,CONNECT\r\n");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockModem {
    state: Rc<RefCell<ModemState>>,
}

impl MockModem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to the command line `cmd` (CRLF is appended) with `reply`
    pub fn expect(&self, cmd: &str, reply: &str) {
        let mut needle = Vec::from(cmd.as_bytes());
        needle.extend_from_slice(b"\r\n");
        self.expect_raw(&needle, reply.as_bytes());
    }

    /// Reply with `reply` once the written stream ends with `needle`
    pub fn expect_raw(&self, needle: &[u8], reply: &[u8]) {
        self.state
            .borrow_mut()
            .script
            .push_back((needle.to_vec(), reply.to_vec()));
    }

    /// Make `data` readable immediately
    pub fn push_rx(&self, data: &[u8]) {
        self.state.borrow_mut().rx.extend(data.iter().copied());
    }

    /// Every byte the driver wrote
    pub fn tx(&self) -> Vec<u8> {
        self.state.borrow().tx.clone()
    }

    /// CRLF-terminated lines the driver wrote, without the CRLF
    pub fn lines(&self) -> Vec<String> {
        self.state.borrow().lines.clone()
    }

    /// Lines that look like AT commands
    pub fn commands(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.starts_with("AT"))
            .collect()
    }

    /// Number of expectations that have not fired yet
    pub fn unmet(&self) -> usize {
        self.state.borrow().script.len()
    }

    /// Bytes still waiting to be read by the driver
    pub fn rx_len(&self) -> usize {
        self.state.borrow().rx.len()
    }

    /// Accept at most `limit` more bytes (`None` = unlimited)
    pub fn set_tx_limit(&self, limit: Option<usize>) {
        self.state.borrow_mut().tx_limit = limit;
    }

    pub fn clear_log(&self) {
        let mut state = self.state.borrow_mut();
        state.tx.clear();
        state.lines.clear();
    }
}

impl SerialWrite for MockModem {
    fn write_bytes(&mut self, data: &[u8]) -> usize {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let accepted = match state.tx_limit {
            Some(limit) => data.len().min(limit),
            None => data.len(),
        };
        if let Some(limit) = state.tx_limit.as_mut() {
            *limit -= accepted;
        }

        for &b in &data[..accepted] {
            state.tx.push(b);
            state.pending.push(b);
            state.line.push(b);
            if state.line.ends_with(b"\r\n") {
                let len = state.line.len() - 2;
                let line = String::from_utf8_lossy(&state.line[..len]).into_owned();
                state.lines.push(line);
                state.line.clear();
            }

            let fire = match state.script.front() {
                Some((needle, _)) => state.pending.ends_with(needle),
                None => false,
            };
            if fire {
                if let Some((_, reply)) = state.script.pop_front() {
                    state.rx.extend(reply);
                }
                state.pending.clear();
                // Raw payloads after a prompt are not command lines.
                state.line.clear();
            }
        }
        accepted
    }
}

impl SerialPort for MockModem {
    fn available(&mut self) -> bool {
        !self.state.borrow().rx.is_empty()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.state.borrow_mut().rx.pop_front()
    }
}

// =============================================================================
// Mock Clock and Delay
// =============================================================================

/// Millisecond clock that advances by one tick on every read
///
/// Busy-wait loops therefore always terminate. Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    ticks: Rc<Cell<u32>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at `tick` (useful for wraparound tests)
    pub fn starting_at(tick: u32) -> Self {
        let clock = Self::new();
        clock.ticks.set(tick);
        clock
    }

    /// Current tick without advancing
    pub fn now(&self) -> u32 {
        self.ticks.get()
    }

    pub fn advance(&self, ms: u32) {
        self.ticks.set(self.ticks.get().wrapping_add(ms));
    }
}

impl Clock for MockClock {
    fn now_ms(&mut self) -> u32 {
        self.advance(1);
        self.ticks.get()
    }
}

/// Delay that advances a [`MockClock`] and records the total time
#[derive(Debug, Clone, Default)]
pub struct MockDelay {
    clock: MockClock,
    total_ns: Rc<Cell<u64>>,
}

impl MockDelay {
    pub fn new(clock: MockClock) -> Self {
        Self {
            clock,
            total_ns: Rc::new(Cell::new(0)),
        }
    }

    /// Total requested delay in nanoseconds
    pub fn total_ns(&self) -> u64 {
        self.total_ns.get()
    }

    /// Total requested delay in milliseconds
    pub fn total_ms(&self) -> u64 {
        self.total_ns.get() / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        let before = self.total_ns.get() / 1_000_000;
        self.total_ns.set(self.total_ns.get() + u64::from(ns));
        let after = self.total_ns.get() / 1_000_000;
        self.clock.advance((after - before) as u32);
    }
}

// =============================================================================
// Driver Fixtures
// =============================================================================

/// Driver type used throughout the unit tests (small queue)
pub type TestDriver = EspAt<MockModem, MockClock, MockDelay, 4096, 16>;

/// Mocks shared with a [`TestDriver`]
pub struct Harness {
    pub modem: MockModem,
    pub clock: MockClock,
    pub delay: MockDelay,
}

/// Build an uninitialized driver wired to fresh mocks
pub fn driver_with(config: DriverConfig) -> (TestDriver, Harness) {
    let modem = MockModem::new();
    let clock = MockClock::new();
    let delay = MockDelay::new(clock.clone());
    let driver = EspAt::new(modem.clone(), clock.clone(), delay.clone(), config);
    (
        driver,
        Harness {
            modem,
            clock,
            delay,
        },
    )
}

/// Script the replies `init` expects with remote info enabled
pub fn expect_init(modem: &MockModem) {
    modem.expect("ATE0", "ATE0\r\n\r\nOK\r\n");
    modem.expect("AT+CIPMUX=1", "\r\nOK\r\n");
    modem.expect("AT+CIPDINFO=1", "\r\nOK\r\n");
}

/// Build a driver that has completed `init` (multiplexed, remote info on)
pub fn ready_driver() -> (TestDriver, Harness) {
    let (mut driver, harness) = driver_with(DriverConfig::new());
    expect_init(&harness.modem);
    driver.init().expect("init");
    harness.modem.clear_log();
    (driver, harness)
}

/// Script a successful `AT+CIPSTART` for link `id`
pub fn expect_connect(modem: &MockModem, id: u8, proto: &str, ip: &str, port: u16) {
    modem.expect(
        &std::format!("AT+CIPSTART={id},\"{proto}\",\"{ip}\",{port}"),
        &std::format!("{id},CONNECT\r\n\r\nOK\r\n"),
    );
}

/// Script a successful `AT+CIPSEND` of `payload` on link `id`
pub fn expect_send(modem: &MockModem, id: u8, payload: &[u8], after: &[u8]) {
    modem.expect(
        &std::format!("AT+CIPSEND={id},{}", payload.len()),
        "\r\nOK\r\n> ",
    );
    let mut reply = std::format!("\r\nRecv {} bytes\r\n\r\nSEND OK\r\n", payload.len()).into_bytes();
    reply.extend_from_slice(after);
    modem.expect_raw(payload, &reply);
}

/// `+IPD` frame with remote info
pub fn ipd_frame(id: u8, ip: &str, port: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = std::format!("\r\n+IPD,{id},{},{ip},{port}:", payload.len()).into_bytes();
    frame.extend_from_slice(payload);
    frame
}
