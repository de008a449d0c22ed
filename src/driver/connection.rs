//! Link-level operations
//!
//! Opening, closing and writing modem links, plus the single `AT+CIPSERVER`
//! listener and its accept wait. These work on raw link ids; the socket
//! façade maps handles onto them.

use core::net::SocketAddrV4;

use embedded_hal::delay::DelayNs;

use super::at::Terminators;
use super::config::Protocol;
use super::error::{AtError, AtResult, Error, Result, SocketError};
use super::esp::EspAt;
use super::events::PollEvent;
use crate::hal::clock::{Clock, Deadline};
use crate::hal::serial::SerialPort;
use crate::internal::constants::{
    ACCEPT_IDLE_DELAY_MS, ACCEPT_SETTLE_INTERVAL_MS, ACCEPT_SETTLE_POLLS, CIPSEND_MAX,
    CONNECT_ATTEMPTS, SEND_ATTEMPTS, SEND_DRAIN_TIMEOUT_MS, SOCKET_COUNT,
};
use crate::internal::text;
use crate::log::{debug, info, warn};

const ALREADY_CONNECTED: &[u8] = b"ALREADY CONNECTED";

impl<S, C, D, const QUEUE_BYTES: usize, const QUEUE_PACKETS: usize>
    EspAt<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>
where
    S: SerialPort,
    C: Clock,
    D: DelayNs,
{
    // =========================================================================
    // Open / Close
    // =========================================================================

    /// Open a TCP link to `remote`. `keepalive` is in seconds, 0 to omit.
    pub fn open_tcp(&mut self, id: u8, remote: SocketAddrV4, keepalive: u16) -> Result<()> {
        self.open_link(id, Protocol::Tcp, remote, keepalive)
    }

    /// Open a UDP link to `remote` from `local_port` (0 lets the modem pick).
    pub fn open_udp(&mut self, id: u8, remote: SocketAddrV4, local_port: u16) -> Result<()> {
        self.open_link(id, Protocol::Udp, remote, local_port)
    }

    /// `AT+CIPSTART` with one retry.
    ///
    /// When the modem still holds the link (`ALREADY CONNECTED`) it is closed
    /// before the second attempt. Packets left over from a previous use of
    /// `id` are purged first.
    pub(crate) fn open_link(
        &mut self,
        id: u8,
        proto: Protocol,
        remote: SocketAddrV4,
        extra: u16,
    ) -> Result<()> {
        if id as usize >= SOCKET_COUNT {
            return Err(SocketError::InvalidAddress.into());
        }
        if self.table.is_open(id) {
            return Err(SocketError::AlreadyConnected.into());
        }

        self.packets.clear(id);
        // Marked open first so our own CONNECT is not taken for an inbound one.
        self.table.open(id, proto);

        let mut result = Err(AtError::Timeout);
        for attempt in 1..=CONNECT_ATTEMPTS {
            result = self.cipstart(id, proto, remote, extra);
            if result.is_ok() {
                break;
            }
            warn!("CIPSTART link {} attempt {} failed", id, attempt);
            if self.sock_already {
                self.sock_already = false;
                if let Err(e) = self.command(format_args!("AT+CIPCLOSE={id}")) {
                    warn!("modem refused to close link {}: {}", id, e);
                }
                self.links.set_closed(id);
                self.packets.clear(id);
            }
        }

        match result {
            Ok(()) => {
                info!("link {} open ({})", id, proto);
                Ok(())
            }
            Err(e) => {
                self.table.reset(id);
                Err(e.into())
            }
        }
    }

    fn cipstart(&mut self, id: u8, proto: Protocol, remote: SocketAddrV4, extra: u16) -> AtResult<()> {
        let kind = proto.as_at_str();
        let (ip, port) = (remote.ip(), remote.port());
        let result = if extra > 0 {
            self.command(format_args!("AT+CIPSTART={id},\"{kind}\",\"{ip}\",{port},{extra}"))
        } else {
            self.command(format_args!("AT+CIPSTART={id},\"{kind}\",\"{ip}\",{port}"))
        };
        if result.is_err() && text::find(self.response.as_bytes(), ALREADY_CONNECTED).is_some() {
            self.sock_already = true;
        }
        result
    }

    /// Close link `id`.
    ///
    /// `AT+CIPCLOSE` is only sent if the tracker does not already report the
    /// link closed, or when `force` is set. Local state is released whatever
    /// the modem answers; the command result is returned for information.
    pub fn close_link(&mut self, id: u8, force: bool) -> Result<()> {
        let result = if force || !self.links.is_closed(id) {
            self.command(format_args!("AT+CIPCLOSE={id}")).map_err(Error::from)
        } else {
            Ok(())
        };

        self.links.set_closed(id);
        self.table.reset(id);
        self.packets.clear(id);
        self.accept_queue.remove(id);
        debug!("link {} released", id);
        result
    }

    // =========================================================================
    // Send
    // =========================================================================

    /// Send `data` on link `id`.
    ///
    /// TCP payloads above the `AT+CIPSEND` limit go out in chunks. A UDP
    /// datagram above it is rejected before anything is sent. Each chunk is
    /// tried twice; if a chunk fails after earlier chunks went out, the byte
    /// count sent so far is returned.
    pub fn send_link(&mut self, id: u8, proto: Protocol, data: &[u8]) -> Result<usize> {
        if proto == Protocol::Udp && data.len() > CIPSEND_MAX {
            warn!("UDP datagram of {} bytes exceeds {}", data.len(), CIPSEND_MAX);
            return Err(SocketError::ProtocolLimitExceeded.into());
        }

        if !self.links.is_usable(id) {
            return Err(SocketError::NotConnected.into());
        }

        let mut sent = 0;
        for chunk in data.chunks(CIPSEND_MAX) {
            let mut result = Err(Error::Socket(SocketError::NotConnected));
            for _ in 0..SEND_ATTEMPTS {
                if !self.links.is_usable(id) {
                    result = Err(SocketError::NotConnected.into());
                    break;
                }
                result = self.cipsend(id, chunk);
                if result.is_ok() {
                    break;
                }
            }

            match result {
                Ok(()) => sent += chunk.len(),
                Err(e) if sent > 0 => {
                    warn!("link {} send stopped after {} bytes: {}", id, sent, e);
                    return Ok(sent);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(sent)
    }

    /// One `AT+CIPSEND` exchange, then drain whatever the modem says next.
    fn cipsend(&mut self, id: u8, chunk: &[u8]) -> Result<()> {
        let timeout = self.config.command_timeout_ms;
        self.send_cmd(
            format_args!("AT+CIPSEND={id},{}", chunk.len()),
            &Terminators::PROMPT,
            timeout,
        )?;
        if !self.serial.write_all(chunk) {
            return Err(AtError::Timeout.into());
        }

        let mut timeout = self.config.read_timeout_ms;
        loop {
            match self.poll(timeout) {
                Ok(PollEvent::Idle) => break,
                Ok(_) => timeout = SEND_DRAIN_TIMEOUT_MS,
                Err(e) => {
                    debug!("drain after send: {}", e);
                    break;
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Server
    // =========================================================================

    /// `AT+CIPSERVER=1,<port>`. Only one listener can exist.
    pub fn start_server(&mut self, port: u16) -> Result<()> {
        if self.server_active {
            return Err(SocketError::ServerBusy.into());
        }
        self.command(format_args!("AT+CIPSERVER=1,{port}"))?;
        self.server_active = true;
        self.server_port = port;
        info!("listening on port {}", port);
        Ok(())
    }

    /// `AT+CIPSERVER=0`.
    ///
    /// The listener is forgotten and pending accepts dropped even if the modem
    /// rejects the command.
    pub fn stop_server(&mut self) -> Result<()> {
        let result = self.command(format_args!("AT+CIPSERVER=0"));
        self.server_active = false;
        self.server_port = 0;
        self.accept_queue.clear();
        result.map_err(Error::from)
    }

    /// Wait for an inbound connection and return its link id.
    ///
    /// Blocks until a link is pending, unless
    /// [`DriverConfig::accept_deadline_ms`](super::config::DriverConfig) is
    /// set. Fails with [`SocketError::NotListening`] once no server is active.
    pub(crate) fn accept_link(&mut self) -> Result<u8> {
        let deadline = self
            .config
            .accept_deadline_ms
            .map(|ms| Deadline::start(&mut self.clock, ms));

        loop {
            if !self.server_active {
                return Err(SocketError::NotListening.into());
            }
            if let Some(id) = self.accept_queue.pop() {
                self.settle_accepted(id);
                return Ok(id);
            }
            if deadline.is_some_and(|d| d.expired(&mut self.clock)) {
                return Err(AtError::Timeout.into());
            }

            let timeout = self.config.accept_poll_ms;
            match self.poll(timeout) {
                Ok(PollEvent::Idle) => self.delay.delay_ms(ACCEPT_IDLE_DELAY_MS),
                Ok(_) => {}
                // A bad frame on some other link must not end the wait.
                Err(Error::Frame(e)) => {
                    warn!("ignoring bad frame while accepting: {}", e);
                    self.delay.delay_ms(ACCEPT_IDLE_DELAY_MS);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Give a freshly accepted link time to settle, returning early if the
    /// peer already went away.
    fn settle_accepted(&mut self, id: u8) {
        for _ in 0..ACCEPT_SETTLE_POLLS {
            if self.links.is_closed(id) {
                break;
            }
            self.delay.delay_ms(ACCEPT_SETTLE_INTERVAL_MS);
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::net::Ipv4Addr;
    use std::vec::Vec;

    use super::*;
    use crate::driver::config::DriverConfig;
    use crate::testing::{driver_with, expect_connect, expect_init, expect_send, ipd_frame, ready_driver};

    fn addr(a: u8, b: u8, c: u8, d: u8, port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(a, b, c, d), port)
    }

    #[test]
    fn open_tcp_marks_link_connected() {
        let (mut esp, h) = ready_driver();
        expect_connect(&h.modem, 0, "TCP", "192.168.1.10", 80);
        esp.open_tcp(0, addr(192, 168, 1, 10, 80), 0).unwrap();

        assert!(esp.is_connected(0));
        assert!(esp.table.is_open(0));
        assert_eq!(esp.pending_accepts(), 0);
        assert_eq!(esp.open_tcp(0, addr(192, 168, 1, 10, 80), 0), Err(SocketError::AlreadyConnected.into()));
    }

    #[test]
    fn open_passes_keepalive_and_local_port() {
        let (mut esp, h) = ready_driver();
        h.modem.expect("AT+CIPSTART=1,\"TCP\",\"10.0.0.1\",443,60", "1,CONNECT\r\n\r\nOK\r\n");
        h.modem.expect("AT+CIPSTART=2,\"UDP\",\"10.0.0.2\",53,5353", "2,CONNECT\r\n\r\nOK\r\n");
        esp.open_tcp(1, addr(10, 0, 0, 1, 443), 60).unwrap();
        esp.open_udp(2, addr(10, 0, 0, 2, 53), 5353).unwrap();
        assert_eq!(h.modem.unmet(), 0);
    }

    #[test]
    fn already_connected_closes_and_retries() {
        let (mut esp, h) = ready_driver();
        h.modem.expect(
            "AT+CIPSTART=3,\"TCP\",\"10.0.0.1\",80",
            "ALREADY CONNECTED\r\n\r\nERROR\r\n",
        );
        h.modem.expect("AT+CIPCLOSE=3", "3,CLOSED\r\n\r\nOK\r\n");
        expect_connect(&h.modem, 3, "TCP", "10.0.0.1", 80);

        esp.open_tcp(3, addr(10, 0, 0, 1, 80), 0).unwrap();
        assert_eq!(
            h.modem.commands(),
            [
                "AT+CIPSTART=3,\"TCP\",\"10.0.0.1\",80",
                "AT+CIPCLOSE=3",
                "AT+CIPSTART=3,\"TCP\",\"10.0.0.1\",80",
            ]
        );
        assert!(esp.is_connected(3));
    }

    #[test]
    fn failed_open_releases_link() {
        let (mut esp, h) = ready_driver();
        for _ in 0..2 {
            h.modem.expect("AT+CIPSTART=0,\"TCP\",\"10.0.0.9\",80", "\r\nERROR\r\nCLOSED\r\n");
        }
        assert_eq!(
            esp.open_tcp(0, addr(10, 0, 0, 9, 80), 0),
            Err(Error::At(AtError::ModemError))
        );
        assert!(!esp.table.is_open(0));
        assert_eq!(h.modem.commands().len(), 2);
    }

    #[test]
    fn close_skips_command_when_already_closed() {
        let (mut esp, h) = ready_driver();
        esp.packets.push(4, b"stale", None).unwrap();

        esp.close_link(4, false).unwrap();
        assert!(h.modem.commands().is_empty());
        assert_eq!(esp.pending(4), 0);
        assert_eq!(esp.heap_usage(), 0);

        // Closing twice is harmless.
        esp.close_link(4, false).unwrap();
        assert!(h.modem.commands().is_empty());
    }

    #[test]
    fn close_connected_link_sends_cipclose_and_purges() {
        let (mut esp, h) = ready_driver();
        expect_connect(&h.modem, 1, "TCP", "10.0.0.1", 80);
        esp.open_tcp(1, addr(10, 0, 0, 1, 80), 0).unwrap();
        h.modem.push_rx(&ipd_frame(1, "10.0.0.1", 80, b"data"));
        esp.poll(100).unwrap();
        assert_eq!(esp.pending(1), 4);

        h.modem.expect("AT+CIPCLOSE=1", "1,CLOSED\r\n\r\nOK\r\n");
        esp.close_link(1, false).unwrap();
        assert!(esp.is_closed(1));
        assert!(!esp.table.is_open(1));
        assert_eq!(esp.pending(1), 0);
    }

    #[test]
    fn close_releases_state_even_if_modem_silent() {
        let (mut esp, h) = driver_with(DriverConfig::new().with_command_timeout_ms(20));
        expect_init(&h.modem);
        esp.init().unwrap();
        h.modem.push_rx(b"2,CONNECT\r\n");
        esp.poll(20).unwrap();
        esp.packets.push(2, b"x", None).unwrap();

        assert_eq!(esp.close_link(2, false), Err(Error::At(AtError::Timeout)));
        assert!(esp.is_closed(2));
        assert_eq!(esp.packet_count(), 0);
    }

    #[test]
    fn oversized_udp_is_rejected_without_io() {
        let (mut esp, h) = ready_driver();
        h.modem.push_rx(b"0,CONNECT\r\n");
        esp.poll(20).unwrap();

        let data = [0u8; CIPSEND_MAX + 1];
        assert_eq!(
            esp.send_link(0, Protocol::Udp, &data),
            Err(SocketError::ProtocolLimitExceeded.into())
        );
        assert!(h.modem.tx().is_empty());
    }

    #[test]
    fn send_on_closed_link_fails_without_io() {
        let (mut esp, h) = ready_driver();
        assert_eq!(
            esp.send_link(0, Protocol::Tcp, b"hi"),
            Err(SocketError::NotConnected.into())
        );
        assert!(h.modem.tx().is_empty());
    }

    #[test]
    fn large_tcp_send_is_chunked() {
        let (mut esp, h) = ready_driver();
        expect_connect(&h.modem, 0, "TCP", "10.0.0.1", 80);
        esp.open_tcp(0, addr(10, 0, 0, 1, 80), 0).unwrap();

        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        expect_send(&h.modem, 0, &data[..2048], b"");
        expect_send(&h.modem, 0, &data[2048..4096], b"");
        expect_send(&h.modem, 0, &data[4096..], b"");

        assert_eq!(esp.send_link(0, Protocol::Tcp, &data), Ok(5000));
        let sends: Vec<_> = h
            .modem
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("AT+CIPSEND"))
            .collect();
        assert_eq!(sends, ["AT+CIPSEND=0,2048", "AT+CIPSEND=0,2048", "AT+CIPSEND=0,904"]);
        assert_eq!(h.modem.unmet(), 0);
    }

    #[test]
    fn send_retries_a_rejected_chunk_once() {
        let (mut esp, h) = ready_driver();
        expect_connect(&h.modem, 0, "TCP", "10.0.0.1", 80);
        esp.open_tcp(0, addr(10, 0, 0, 1, 80), 0).unwrap();

        h.modem.expect("AT+CIPSEND=0,3", "\r\nbusy s...\r\n\r\nERROR\r\n");
        expect_send(&h.modem, 0, b"abc", b"");
        assert_eq!(esp.send_link(0, Protocol::Tcp, b"abc"), Ok(3));
    }

    #[test]
    fn partial_send_reports_bytes_sent() {
        let (mut esp, h) = ready_driver();
        expect_connect(&h.modem, 0, "TCP", "10.0.0.1", 80);
        esp.open_tcp(0, addr(10, 0, 0, 1, 80), 0).unwrap();

        let data = [7u8; 3000];
        // The peer closes right after the first chunk.
        expect_send(&h.modem, 0, &data[..2048], b"0,CLOSED\r\n");
        assert_eq!(esp.send_link(0, Protocol::Tcp, &data), Ok(2048));
    }

    #[test]
    fn reply_during_send_is_queued() {
        let (mut esp, h) = ready_driver();
        expect_connect(&h.modem, 0, "TCP", "10.0.0.1", 80);
        esp.open_tcp(0, addr(10, 0, 0, 1, 80), 0).unwrap();

        expect_send(&h.modem, 0, b"ping", &ipd_frame(0, "10.0.0.1", 80, b"pong"));
        esp.send_link(0, Protocol::Tcp, b"ping").unwrap();
        assert_eq!(esp.pending(0), 4);
    }

    #[test]
    fn server_lifecycle_and_accept() {
        let (mut esp, h) = ready_driver();
        h.modem.expect("AT+CIPSERVER=1,8080", "\r\nOK\r\n");
        esp.start_server(8080).unwrap();
        assert_eq!(esp.start_server(8081), Err(SocketError::ServerBusy.into()));

        h.modem.push_rx(b"0,CONNECT\r\n");
        assert_eq!(esp.accept_link(), Ok(0));
        // A connected link waits out the full settle period.
        assert!(h.delay.total_ms() >= u64::from(ACCEPT_SETTLE_POLLS * ACCEPT_SETTLE_INTERVAL_MS));

        h.modem.expect("AT+CIPSERVER=0", "\r\nOK\r\n");
        esp.stop_server().unwrap();
        assert!(!esp.server_active());
        assert_eq!(esp.accept_link(), Err(SocketError::NotListening.into()));
    }

    #[test]
    fn accept_returns_early_for_closed_link() {
        let (mut esp, h) = ready_driver();
        h.modem.expect("AT+CIPSERVER=1,80", "\r\nOK\r\n");
        esp.start_server(80).unwrap();

        h.modem.push_rx(b"1,CONNECT\r\n");
        esp.poll(20).unwrap();
        h.modem.push_rx(b"2,CONNECT\r\n");
        esp.poll(20).unwrap();
        esp.links.set_closed(2);
        // Link 1 is first in line.
        assert_eq!(esp.accept_link(), Ok(1));
        let before = h.delay.total_ms();
        assert_eq!(esp.accept_link(), Ok(2));
        assert_eq!(h.delay.total_ms(), before);
    }

    #[test]
    fn accept_survives_garbled_frame() {
        let (mut esp, h) = ready_driver();
        h.modem.expect("AT+CIPSERVER=1,80", "\r\nOK\r\n");
        esp.start_server(80).unwrap();

        h.modem.push_rx(b"+IPD,0,zz,1.2.3.4,80:\r\n1,CONNECT\r\n");
        assert_eq!(esp.accept_link(), Ok(1));
    }

    #[test]
    fn empty_send_on_closed_link_fails() {
        let (mut esp, h) = ready_driver();
        expect_connect(&h.modem, 0, "TCP", "10.0.0.1", 80);
        esp.open_tcp(0, addr(10, 0, 0, 1, 80), 0).unwrap();
        assert_eq!(esp.send_link(0, Protocol::Tcp, b""), Ok(0));

        h.modem.push_rx(b"0,CLOSED\r\n");
        esp.poll(20).unwrap();
        assert_eq!(esp.send_link(0, Protocol::Tcp, b""), Err(SocketError::NotConnected.into()));
        assert!(h.modem.commands().iter().all(|c| !c.starts_with("AT+CIPSEND")));
    }

    #[test]
    fn accept_deadline_times_out() {
        let (mut esp, h) = driver_with(
            DriverConfig::new()
                .with_accept_deadline_ms(Some(100))
                .with_accept_poll_ms(10),
        );
        h.modem.expect("AT+CIPSERVER=1,80", "\r\nOK\r\n");
        esp.start_server(80).unwrap();
        assert_eq!(esp.accept_link(), Err(AtError::Timeout.into()));
    }
}
