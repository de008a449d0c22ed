//! AT command exchange
//!
//! A command is one formatted line followed by CRLF. The reply is read byte by
//! byte into the response buffer until one of the caller's success or failure
//! terminators appears at its end. While waiting, unsolicited traffic is
//! handled in-line:
//!
//! - `<id>,CONNECT` / `<id>,CLOSED` update the link tracker
//! - a `+IPD` frame is parsed and its payload queued, so data arriving during a
//!   command is neither lost nor mistaken for the reply

use core::fmt::{self, Write as _};

use embedded_hal::delay::DelayNs;
use heapless::String;

use super::error::{AtError, AtResult};
use super::esp::EspAt;
use super::events;
use super::ipd::{self, IPD_PREFIX};
use crate::hal::clock::{Clock, Deadline};
use crate::hal::serial::SerialPort;
use crate::internal::constants::COMMAND_BUF_SIZE;
use crate::log::{debug, trace, warn};

/// Longest `+IPD` header (after the prefix) captured during a command wait
const IPD_HEADER_MAX: usize = 48;

const OK: &[u8] = b"OK\r\n";
const READY: &[u8] = b"ready\r\n";
const NO_CHANGE: &[u8] = b"no change\r\n";
const ERROR: &[u8] = b"ERROR\r\n";
const FAIL: &[u8] = b"FAIL\r\n";
const PROMPT: &[u8] = b">";

/// Reply endings that complete a command
#[derive(Debug, Clone, Copy)]
pub(crate) struct Terminators<'a> {
    /// Endings that mean success
    pub ok: &'a [&'a [u8]],
    /// Endings that mean the modem rejected the command
    pub fail: &'a [&'a [u8]],
}

impl Terminators<'static> {
    /// `OK` or `ready`, failing on `ERROR`
    pub(crate) const DEFAULT: Self = Self {
        ok: &[OK, READY],
        fail: &[ERROR],
    };

    /// `AT+CWMODE=` also answers `no change`
    pub(crate) const MODE_CHANGE: Self = Self {
        ok: &[OK, NO_CHANGE],
        fail: &[ERROR],
    };

    /// `AT+CWJAP=` fails with `FAIL`
    pub(crate) const JOIN: Self = Self {
        ok: &[OK],
        fail: &[ERROR, FAIL],
    };

    /// `AT+CIPSEND=` prompt
    pub(crate) const PROMPT: Self = Self {
        ok: &[PROMPT],
        fail: &[ERROR],
    };
}

impl<S, C, D, const QUEUE_BYTES: usize, const QUEUE_PACKETS: usize>
    EspAt<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>
where
    S: SerialPort,
    C: Clock,
    D: DelayNs,
{
    /// Send a command with the default terminators and timeout
    pub(crate) fn command(&mut self, args: fmt::Arguments<'_>) -> AtResult<()> {
        let timeout = self.config.command_timeout_ms;
        self.send_cmd(args, &Terminators::DEFAULT, timeout)
    }

    /// Format `args` as a command line, send it and wait for a terminator.
    pub(crate) fn send_cmd(
        &mut self,
        args: fmt::Arguments<'_>,
        terminators: &Terminators<'_>,
        timeout_ms: u32,
    ) -> AtResult<()> {
        let mut line: String<COMMAND_BUF_SIZE> = String::new();
        if line.write_fmt(args).is_err() || line.push_str("\r\n").is_err() {
            return Err(AtError::CommandOverflow);
        }
        if self.config.trace_commands {
            debug!("> {}", line.as_str());
        }

        if !self.serial.write_all(line.as_bytes()) {
            warn!("modem did not accept command");
            return Err(AtError::Timeout);
        }

        let result = self.wait_reply(terminators, timeout_ms);
        if self.config.trace_commands {
            debug!("< {=[u8]:a}", self.response.as_bytes());
        }
        result
    }

    /// Read until the response buffer ends with a terminator.
    ///
    /// The buffer slides when full, so long replies keep their tail.
    pub(crate) fn wait_reply(&mut self, terminators: &Terminators<'_>, timeout_ms: u32) -> AtResult<()> {
        self.response.clear();
        let deadline = Deadline::start(&mut self.clock, timeout_ms);
        let mut ipd_at: Option<usize> = None;

        loop {
            if deadline.expired(&mut self.clock) {
                trace!("no reply within {} ms", timeout_ms);
                return Err(AtError::Timeout);
            }
            let Some(byte) = self.serial.read_byte() else {
                continue;
            };
            if byte == 0 {
                continue;
            }

            let dropped = self.response.push_sliding(byte);
            if dropped > 0 {
                ipd_at = ipd_at.and_then(|at| at.checked_sub(dropped));
            }

            if let Some(event) = events::scan_tail(self.response.as_bytes()) {
                self.apply_link_event(event);
                continue;
            }

            if let Some(start) = ipd_at {
                if byte == b':' {
                    ipd_at = None;
                    self.capture_frame(start);
                } else if self.response.len() - start > IPD_PREFIX.len() + IPD_HEADER_MAX {
                    warn!("discarding overlong +IPD header");
                    ipd_at = None;
                }
                continue;
            }
            if self.response.ends_with(IPD_PREFIX) {
                ipd_at = Some(self.response.len() - IPD_PREFIX.len());
                continue;
            }

            if terminators.ok.iter().any(|t| self.response.ends_with(t)) {
                return Ok(());
            }
            if terminators.fail.iter().any(|t| self.response.ends_with(t)) {
                return Err(AtError::ModemError);
            }
        }
    }

    /// Queue the frame whose header starts at `start` in the response buffer
    /// and cut it from the reply.
    fn capture_frame(&mut self, start: usize) {
        let bytes = self.response.as_bytes();
        let fields = &bytes[start + IPD_PREFIX.len()..bytes.len() - 1];
        let parsed = ipd::parse_header(fields, self.ipd_format);
        self.response.truncate(start);

        match parsed {
            Ok(header) if header.len > 0 => {
                let id = header.link_id(self.default_link_id());
                self.handle_packet(id, header.len, header.remote);
            }
            Ok(_) => {}
            Err(e) => warn!("bad +IPD header during command: {}", e),
        }
    }

    /// Bytes of the last command reply
    pub fn response(&self) -> &[u8] {
        self.response.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::config::DriverConfig;
    use crate::testing::{driver_with, ipd_frame, ready_driver};

    #[test]
    fn ok_reply_completes_command() {
        let (mut esp, h) = ready_driver();
        h.modem.expect("AT", "\r\nOK\r\n");
        assert_eq!(esp.command(format_args!("AT")), Ok(()));
        assert_eq!(h.modem.commands(), ["AT"]);
    }

    #[test]
    fn error_reply_is_modem_error() {
        let (mut esp, h) = ready_driver();
        h.modem.expect("AT+CIPSTO=5", "\r\nERROR\r\n");
        assert_eq!(esp.command(format_args!("AT+CIPSTO={}", 5)), Err(AtError::ModemError));
    }

    #[test]
    fn silence_times_out() {
        let (mut esp, _h) = driver_with(DriverConfig::new().with_command_timeout_ms(25));
        assert_eq!(esp.command(format_args!("AT")), Err(AtError::Timeout));
    }

    #[test]
    fn overlong_command_is_rejected_before_sending() {
        let (mut esp, h) = ready_driver();
        let long = [b'x'; COMMAND_BUF_SIZE];
        let long = core::str::from_utf8(&long).unwrap();
        assert_eq!(
            esp.command(format_args!("AT+CWJAP=\"{}\"", long)),
            Err(AtError::CommandOverflow)
        );
        assert!(h.modem.tx().is_empty());
    }

    #[test]
    fn custom_terminators() {
        let (mut esp, h) = ready_driver();
        h.modem.expect("AT+CWMODE=1", "\r\nno change\r\n");
        let timeout = esp.config.command_timeout_ms;
        assert_eq!(
            esp.send_cmd(format_args!("AT+CWMODE=1"), &Terminators::MODE_CHANGE, timeout),
            Ok(())
        );

        h.modem.expect("AT+CWJAP=\"a\",\"b\"", "+CWJAP:1\r\n\r\nFAIL\r\n");
        assert_eq!(
            esp.send_cmd(format_args!("AT+CWJAP=\"a\",\"b\""), &Terminators::JOIN, timeout),
            Err(AtError::ModemError)
        );
    }

    #[test]
    fn link_events_during_wait_update_tracker() {
        let (mut esp, h) = ready_driver();
        h.modem.expect("AT", "\r\n2,CONNECT\r\n\r\nOK\r\n");
        esp.command(format_args!("AT")).unwrap();
        assert!(esp.is_connected(2));
    }

    #[test]
    fn ipd_during_wait_is_queued_not_returned() {
        let (mut esp, h) = ready_driver();
        let mut reply = ipd_frame(1, "10.0.0.2", 5000, b"OK\r\nsneaky");
        reply.extend_from_slice(b"\r\nOK\r\n");
        h.modem.expect_raw(b"AT+CIFSR\r\n", &reply);

        esp.command(format_args!("AT+CIFSR")).unwrap();
        assert_eq!(esp.pending(1), 10);
        assert!(!esp.response().windows(6).any(|w| w == b"sneaky"));
        assert!(!esp.response().windows(4).any(|w| w == b"+IPD"));
    }

    #[test]
    fn nul_bytes_are_ignored() {
        let (mut esp, h) = ready_driver();
        h.modem.expect_raw(b"AT\r\n", b"\r\nO\0K\r\n");
        assert_eq!(esp.command(format_args!("AT")), Ok(()));
    }
}
