//! ESP AT driver context
//!
//! [`EspAt`] owns the modem transport and every piece of driver state: the
//! reply and frame buffers, link tracker, accept FIFO, link and slot tables
//! and the inbound packet queue. There is no global state; two drivers on two
//! UARTs are fully independent.
//!
//! The implementation is split by concern:
//!
//! - this module: construction, `init`/`reset`, the [`poll`](EspAt::poll)
//!   pump and the packet queue read path
//! - `at`: command/response exchange
//! - `wifi`: control-plane commands
//! - `connection`: link open/close/send and the server
//! - `socket`: the BSD-style socket façade

use core::net::SocketAddrV4;

use embedded_hal::delay::DelayNs;

use super::buffer::ScratchBuffer;
use super::config::{DriverConfig, IpdFormat, State};
use super::error::{AtError, Error, FrameError, Result};
use super::events::{self, LinkEvent, PollEvent};
use super::ipd::{self, IPD_PREFIX};
use super::link::{AcceptQueue, LinkTable, LinkTracker};
use super::packet::PacketQueue;
use super::socket::SlotTable;
use crate::hal::clock::{Clock, Deadline};
use crate::hal::serial::{SerialPort, drain_within, read_within};
use crate::internal::constants::{
    DEFAULT_QUEUE_PACKETS, FRAME_BUF_SIZE, RESET_ATTEMPTS, RESET_SETTLE_MS, RESPONSE_BUF_SIZE,
    SOCKET_BUFSIZE, SOCKET_COUNT,
};
use crate::log::{debug, info, trace, warn};

/// ESP AT-command Wi-Fi driver
///
/// # Type Parameters
///
/// * `S` - Modem UART ([`SerialPort`])
/// * `C` - Millisecond clock ([`Clock`])
/// * `D` - Delay source (`embedded_hal::delay::DelayNs`)
/// * `QUEUE_BYTES` - Inbound packet queue budget (default: 16384)
/// * `QUEUE_PACKETS` - Maximum queued packets (default: 32)
///
/// # Memory Usage
///
/// Roughly `QUEUE_BYTES + 4 KB` for reply/frame buffers and tables.
///
/// # Example
///
/// ```ignore
/// use ph_esp_at::{DriverConfig, EspAt, Protocol};
///
/// let mut wifi: EspAt<_, _, _> = EspAt::new(uart, || now_ms(), delay, DriverConfig::new());
/// wifi.init()?;
/// wifi.join("my-ssid", "secret")?;
///
/// let mut sock = wifi.socket_open(Protocol::Tcp)?;
/// wifi.socket_connect(&mut sock, "93.184.216.34:80".parse()?)?;
/// wifi.socket_send(&sock, b"GET / HTTP/1.0\r\n\r\n")?;
/// let n = wifi.socket_recv(&sock, &mut buf)?;
/// wifi.socket_close(sock)?;
/// ```
pub struct EspAt<
    S,
    C,
    D,
    const QUEUE_BYTES: usize = SOCKET_BUFSIZE,
    const QUEUE_PACKETS: usize = DEFAULT_QUEUE_PACKETS,
> {
    pub(crate) serial: S,
    pub(crate) clock: C,
    pub(crate) delay: D,
    pub(crate) config: DriverConfig,
    pub(crate) state: State,
    /// Last command reply
    pub(crate) response: ScratchBuffer<RESPONSE_BUF_SIZE>,
    /// Bytes accumulated by `poll` up to a frame header
    pub(crate) frame: ScratchBuffer<FRAME_BUF_SIZE>,
    pub(crate) links: LinkTracker,
    pub(crate) accept_queue: AcceptQueue,
    pub(crate) table: LinkTable,
    pub(crate) slots: SlotTable,
    pub(crate) packets: PacketQueue<QUEUE_BYTES, QUEUE_PACKETS>,
    pub(crate) server_active: bool,
    pub(crate) server_port: u16,
    /// Last `CIPSTART` reply said `ALREADY CONNECTED`
    pub(crate) sock_already: bool,
    pub(crate) ipd_format: IpdFormat,
}

impl<S, C, D, const QUEUE_BYTES: usize, const QUEUE_PACKETS: usize>
    EspAt<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>
where
    S: SerialPort,
    C: Clock,
    D: DelayNs,
{
    /// Create a driver. No bytes are exchanged until [`init`](Self::init).
    pub fn new(serial: S, clock: C, delay: D, config: DriverConfig) -> Self {
        Self {
            serial,
            clock,
            delay,
            config,
            state: State::Uninitialized,
            response: ScratchBuffer::new(),
            frame: ScratchBuffer::new(),
            links: LinkTracker::new(),
            accept_queue: AcceptQueue::new(),
            table: LinkTable::new(),
            slots: SlotTable::new(),
            packets: PacketQueue::new(),
            server_active: false,
            server_port: 0,
            sock_already: false,
            ipd_format: config.ipd_format,
        }
    }

    /// Release the transport, clock and delay
    pub fn free(self) -> (S, C, D) {
        (self.serial, self.clock, self.delay)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Bring the modem into the state the driver relies on.
    ///
    /// Turns echo off, enables multiplexed links and, if configured, remote
    /// info in `+IPD` headers. When the configured format is
    /// [`IpdFormat::Auto`] and the modem acknowledges `AT+CIPDINFO`, the
    /// header layout is fixed from then on; otherwise it keeps being inferred
    /// per frame.
    ///
    /// Driver link state and queued packets are discarded. Socket slots are
    /// left alone since live [`Socket`](crate::Socket) handles own them.
    pub fn init(&mut self) -> Result<()> {
        self.reset_state();

        let timeout = self.config.echo_off_timeout_ms;
        self.set_echo_timeout(false, timeout)?;
        self.set_mux(true)?;

        let remote = self.config.remote_info;
        let remote_ok = match self.set_remote_info(remote) {
            Ok(()) => true,
            Err(e) => {
                warn!("AT+CIPDINFO rejected: {}", e);
                false
            }
        };

        self.ipd_format = match self.config.ipd_format {
            IpdFormat::Auto if remote_ok => IpdFormat::from_flags(true, remote),
            other => other,
        };
        self.state = State::Ready;
        info!("ESP AT driver ready");
        Ok(())
    }

    /// Restart the modem with `AT+RST` and discard all driver link state.
    ///
    /// `AT+RST` is attempted twice. Whatever the outcome, the driver waits for
    /// the modem to boot, throws away its boot output and purges queued
    /// packets, pending accepts and link tables. [`init`](Self::init) must be
    /// called again afterwards.
    pub fn reset(&mut self) -> Result<()> {
        let mut result = Err(AtError::Timeout);
        for attempt in 1..=RESET_ATTEMPTS {
            result = self.restart();
            if result.is_ok() {
                break;
            }
            warn!("AT+RST attempt {} failed", attempt);
        }

        self.delay.delay_ms(RESET_SETTLE_MS);
        self.discard_input();
        self.reset_state();
        result.map_err(Error::from)
    }

    fn reset_state(&mut self) {
        self.state = State::Uninitialized;
        self.response.clear();
        self.frame.clear();
        self.links = LinkTracker::new();
        self.accept_queue.clear();
        self.table.reset_all();
        self.packets.clear_all();
        self.server_active = false;
        self.server_port = 0;
        self.sock_already = false;
        self.ipd_format = self.config.ipd_format;
    }

    /// Drop whatever the modem has sent so far
    fn discard_input(&mut self) {
        let mut scratch = [0u8; 64];
        while self.serial.available() {
            if self.serial.read(&mut scratch) == 0 {
                break;
            }
        }
    }

    // =========================================================================
    // State Queries
    // =========================================================================

    /// Active configuration
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Lifecycle state
    pub fn state(&self) -> State {
        self.state
    }

    /// `+IPD` layout in effect
    pub fn ipd_format(&self) -> IpdFormat {
        self.ipd_format
    }

    /// Returns `true` if link `id` last reported `CONNECT`
    pub fn is_connected(&self, id: u8) -> bool {
        self.links.is_connected(id)
    }

    /// Returns `true` if link `id` is closed
    pub fn is_closed(&self, id: u8) -> bool {
        self.links.is_closed(id)
    }

    /// Returns `true` while a `AT+CIPSERVER` listener is registered
    pub fn server_active(&self) -> bool {
        self.server_active
    }

    /// Inbound connections waiting for `accept`
    pub fn pending_accepts(&self) -> usize {
        self.accept_queue.len()
    }

    /// Unread bytes queued for link `id`
    pub fn pending(&self, id: u8) -> usize {
        self.packets.pending(id)
    }

    /// Bytes charged against the packet queue budget
    pub fn heap_usage(&self) -> usize {
        self.packets.heap_usage()
    }

    /// Number of queued packets
    pub fn packet_count(&self) -> usize {
        self.packets.packet_count()
    }

    // =========================================================================
    // Event Pump
    // =========================================================================

    pub(crate) fn default_link_id(&self) -> u8 {
        if (self.config.default_link_id as usize) < SOCKET_COUNT {
            self.config.default_link_id
        } else {
            0
        }
    }

    /// Apply a link notification to the tracker and the accept FIFO.
    pub(crate) fn apply_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected(id) => {
                self.links.set_connected(id);
                if self.server_active && !self.table.is_open(id) && !self.accept_queue.push(id) {
                    trace!("link {} already pending accept", id);
                }
            }
            LinkEvent::Closed(id) => {
                self.links.set_closed(id);
                self.accept_queue.remove(id);
            }
        }
        debug!("link event {}", event);
    }

    /// Read the modem stream for up to `timeout_ms` and process what arrives.
    ///
    /// Returns as soon as a link notification is seen or one `+IPD` frame has
    /// been consumed. `Idle` means nothing of interest arrived, which is the
    /// normal outcome of an idle link.
    ///
    /// # Errors
    ///
    /// A `+IPD,` prefix without a complete header yields
    /// [`FrameError::IncompleteHeader`]; unparsable fields yield
    /// [`FrameError::MalformedHeader`] or [`FrameError::InvalidLinkId`]. In
    /// those cases the payload bytes stay on the wire.
    pub fn poll(&mut self, timeout_ms: u32) -> Result<PollEvent> {
        self.frame.clear();
        let deadline = Deadline::start(&mut self.clock, timeout_ms);
        let mut ipd_at: Option<usize> = None;

        loop {
            if deadline.expired(&mut self.clock) {
                break;
            }
            let Some(byte) = self.serial.read_byte() else {
                continue;
            };
            if byte == 0 {
                continue;
            }
            if !self.frame.push(byte) {
                break;
            }

            if let Some(event) = events::scan_tail(self.frame.as_bytes()) {
                self.apply_link_event(event);
                return Ok(PollEvent::LinkChanged(event));
            }

            match ipd_at {
                None if self.frame.ends_with(IPD_PREFIX) => {
                    ipd_at = Some(self.frame.len() - IPD_PREFIX.len());
                }
                Some(_) if byte == b':' => break,
                // Status lines between frames are not kept.
                None if byte == b'\n' => self.frame.clear(),
                _ => {}
            }
            if self.frame.is_full() {
                break;
            }
        }

        let Some(start) = ipd_at else {
            return Ok(PollEvent::Idle);
        };
        let bytes = self.frame.as_bytes();
        if !bytes.ends_with(b":") {
            warn!("incomplete +IPD header");
            return Err(FrameError::IncompleteHeader.into());
        }
        let fields = &bytes[start + IPD_PREFIX.len()..bytes.len() - 1];
        let header = ipd::parse_header(fields, self.ipd_format)?;

        let id = header.link_id(self.default_link_id());
        let queued = header.len > 0 && self.handle_packet(id, header.len, header.remote).1;
        Ok(PollEvent::FrameReceived {
            id,
            len: header.len,
            queued,
        })
    }

    /// Consume one `+IPD` payload of `amount` bytes from the wire.
    ///
    /// If the queue cannot admit the packet the bytes are read and discarded
    /// so the stream stays aligned. A payload cut short by the packet timeout
    /// is discarded as well. Returns the number of bytes consumed and whether
    /// the packet was queued.
    pub(crate) fn handle_packet(
        &mut self,
        id: u8,
        amount: usize,
        remote: Option<SocketAddrV4>,
    ) -> (usize, bool) {
        let timeout = self.config.packet_timeout_ms;
        match self.packets.reserve(id, amount, remote) {
            Ok(mut slot) => {
                let read = read_within(&mut self.serial, &mut self.clock, slot.payload_mut(), timeout);
                if read == amount {
                    slot.commit();
                    trace!("queued {} bytes for link {}", amount, id);
                    (read, true)
                } else {
                    warn!("frame for link {} truncated: {}/{}", id, read, amount);
                    (read, false)
                }
            }
            Err(e) => {
                warn!("dropping {} bytes for link {}: {}", amount, id, e);
                let drained = drain_within(&mut self.serial, &mut self.clock, amount, timeout);
                (drained, false)
            }
        }
    }

    /// Read queued data for link `id`, pumping the wire while none is queued.
    ///
    /// Returns the bytes copied and the sender recorded with the packet.
    /// `Ok(0)` means the link is closed and nothing is left; a quiet but open
    /// link yields [`AtError::Timeout`].
    pub(crate) fn recv_queued(
        &mut self,
        id: u8,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(usize, Option<SocketAddrV4>)> {
        if buf.is_empty() {
            return Ok((0, None));
        }
        loop {
            if let Some(read) = self.packets.dequeue(id, buf) {
                return Ok(read);
            }
            if self.links.is_closed(id) {
                return Ok((0, None));
            }
            match self.poll(timeout_ms)? {
                PollEvent::Idle => return Err(AtError::Timeout.into()),
                PollEvent::FrameReceived { .. } | PollEvent::LinkChanged(_) => {}
            }
        }
    }
}

/// Default configuration: 16 KB queue, 32 packets
pub type EspAtDefault<S, C, D> = EspAt<S, C, D, SOCKET_BUFSIZE, DEFAULT_QUEUE_PACKETS>;

/// Small configuration: 4 KB queue, 8 packets
pub type EspAtSmall<S, C, D> = EspAt<S, C, D, 4096, 8>;

/// Large configuration: 32 KB queue, 64 packets
pub type EspAtLarge<S, C, D> = EspAt<S, C, D, 32768, 64>;
