//! Socket façade
//!
//! BSD-style sockets on top of the modem's five links. A [`Socket`] owns one
//! link id (its slot) from `socket_open` until `socket_close`; slots are never
//! shared between live handles. The modem supports a single listener, which
//! does not occupy a link: `socket_listen` hands the listener's slot back so
//! that inbound connections can use every id.
//!
//! # Example
//!
//! ```ignore
//! let mut server = wifi.socket_open(Protocol::Tcp)?;
//! wifi.socket_bind(&mut server, SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 80))?;
//! wifi.socket_listen(&mut server, 1)?;
//!
//! let (client, _) = wifi.socket_accept(&server)?;
//! let n = wifi.socket_recv(&client, &mut buf)?;
//! wifi.socket_send(&client, &buf[..n])?;
//! wifi.socket_close(client)?;
//! ```

use core::net::{Ipv4Addr, SocketAddrV4};

use embedded_hal::delay::DelayNs;

use super::config::Protocol;
use super::error::{Result, SocketError, SocketResult};
use super::esp::EspAt;
use crate::hal::clock::Clock;
use crate::hal::serial::SerialPort;
use crate::internal::constants::{KEEPALIVE_MAX, SOCKET_COUNT};
use crate::log::{debug, warn};

/// Address reported for peers the modem does not identify
const UNSPECIFIED: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);

// =============================================================================
// Slot Table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct SlotInfo {
    open: bool,
    local_port: u16,
}

/// Ownership of link ids by socket handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotTable {
    slots: [SlotInfo; SOCKET_COUNT],
}

impl SlotTable {
    /// All slots free
    pub const fn new() -> Self {
        Self {
            slots: [SlotInfo {
                open: false,
                local_port: 0,
            }; SOCKET_COUNT],
        }
    }

    /// Claim the lowest free slot
    pub fn claim(&mut self) -> Option<u8> {
        let id = self.slots.iter().position(|s| !s.open)?;
        self.slots[id] = SlotInfo {
            open: true,
            local_port: 0,
        };
        Some(id as u8)
    }

    /// Claim slot `id`, returning `false` if it is taken or out of range
    pub fn claim_id(&mut self, id: u8) -> bool {
        match self.slots.get_mut(id as usize) {
            Some(slot) if !slot.open => {
                *slot = SlotInfo {
                    open: true,
                    local_port: 0,
                };
                true
            }
            _ => false,
        }
    }

    /// Free slot `id`
    pub fn release(&mut self, id: u8) {
        if let Some(slot) = self.slots.get_mut(id as usize) {
            *slot = SlotInfo::default();
        }
    }

    /// Returns `true` if `id` is owned by a handle
    pub fn is_open(&self, id: u8) -> bool {
        self.slots.get(id as usize).is_some_and(|s| s.open)
    }

    /// Number of owned slots
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.open).count()
    }

    /// Local port bound to `id` (0 = none)
    pub fn local_port(&self, id: u8) -> u16 {
        self.slots.get(id as usize).map_or(0, |s| s.local_port)
    }

    fn set_local_port(&mut self, id: u8, port: u16) {
        if let Some(slot) = self.slots.get_mut(id as usize) {
            slot.local_port = port;
        }
    }

    /// Returns `true` if another owned slot is bound to `port`
    pub fn port_in_use(&self, port: u16, except: u8) -> bool {
        self.slots
            .iter()
            .enumerate()
            .any(|(id, s)| s.open && s.local_port == port && id != except as usize)
    }
}

// =============================================================================
// Socket Handle
// =============================================================================

/// Socket option value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketOption {
    /// TCP keepalive interval in seconds (0 = off, at most 7200)
    KeepAlive(u16),
}

/// Socket option selector for [`EspAt::getsockopt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketOptionName {
    /// TCP keepalive interval
    KeepAlive,
}

/// Socket handle
///
/// Not `Clone`: a handle is the single owner of its link slot. Closing it
/// with [`EspAt::socket_close`] consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct Socket {
    id: u8,
    proto: Protocol,
    peer: Option<SocketAddrV4>,
    local: Option<SocketAddrV4>,
    connected: bool,
    keepalive: u16,
    accepted: bool,
    listening: bool,
}

impl Socket {
    const fn new(id: u8, proto: Protocol) -> Self {
        Self {
            id,
            proto,
            peer: None,
            local: None,
            connected: false,
            keepalive: 0,
            accepted: false,
            listening: false,
        }
    }

    /// Link id owned by this handle
    pub const fn id(&self) -> u8 {
        self.id
    }

    /// Transport protocol
    pub const fn protocol(&self) -> Protocol {
        self.proto
    }

    /// Remote address given to `connect`/`sendto`
    pub const fn peer_addr(&self) -> Option<SocketAddrV4> {
        self.peer
    }

    /// Address given to `bind`
    pub const fn local_addr(&self) -> Option<SocketAddrV4> {
        self.local
    }

    /// Returns `true` once connected (or accepted)
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns `true` for handles returned by `accept`
    pub const fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Returns `true` for the listening handle
    pub const fn is_listening(&self) -> bool {
        self.listening
    }

    /// Apply `option`.
    ///
    /// Only TCP keepalive exists, and the modem takes it at connect time, so it
    /// can only be changed before `connect`.
    pub fn set_option(&mut self, option: SocketOption) -> SocketResult<()> {
        if self.proto != Protocol::Tcp {
            return Err(SocketError::Unsupported);
        }
        match option {
            SocketOption::KeepAlive(secs) => {
                if self.connected || u32::from(secs) > KEEPALIVE_MAX {
                    return Err(SocketError::InvalidOption);
                }
                self.keepalive = secs;
            }
        }
        Ok(())
    }

    /// Current value of option `name`
    pub fn option(&self, name: SocketOptionName) -> SocketResult<SocketOption> {
        if self.proto != Protocol::Tcp {
            return Err(SocketError::Unsupported);
        }
        match name {
            SocketOptionName::KeepAlive => Ok(SocketOption::KeepAlive(self.keepalive)),
        }
    }
}

fn check_remote(addr: SocketAddrV4) -> SocketResult<()> {
    if addr.ip().is_unspecified() || addr.port() == 0 {
        return Err(SocketError::InvalidAddress);
    }
    Ok(())
}

// =============================================================================
// Socket Operations
// =============================================================================

impl<S, C, D, const QUEUE_BYTES: usize, const QUEUE_PACKETS: usize>
    EspAt<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>
where
    S: SerialPort,
    C: Clock,
    D: DelayNs,
{
    /// Create a socket, claiming the lowest free link id
    pub fn socket_open(&mut self, proto: Protocol) -> Result<Socket> {
        let id = self.slots.claim().ok_or(SocketError::NoFreeSlot)?;
        debug!("socket {} opened", id);
        Ok(Socket::new(id, proto))
    }

    /// Close `socket` and free its slot.
    ///
    /// The slot and all queued data are released even if the modem does not
    /// confirm the close. Closing the listener stops the server.
    pub fn socket_close(&mut self, socket: Socket) -> Result<()> {
        if socket.listening {
            return self.stop_server();
        }
        let result = self.close_link(socket.id, false);
        self.slots.release(socket.id);
        debug!("socket {} closed", socket.id);
        result
    }

    /// Set the local address. Only the port is used by the modem.
    pub fn socket_bind(&mut self, socket: &mut Socket, addr: SocketAddrV4) -> Result<()> {
        if socket.connected || socket.listening {
            return Err(SocketError::AlreadyConnected.into());
        }
        // TCP only records the address; the modem assigns TCP source ports.
        if socket.proto == Protocol::Udp {
            let port = addr.port();
            if port != 0 && self.slots.port_in_use(port, socket.id) {
                return Err(SocketError::AddressInUse.into());
            }
            self.slots.set_local_port(socket.id, port);
        }
        socket.local = Some(addr);
        Ok(())
    }

    /// Start the modem's TCP server on the bound port.
    ///
    /// The modem picks its own backlog; `backlog` is accepted for
    /// compatibility only. On success the socket's slot is released.
    pub fn socket_listen(&mut self, socket: &mut Socket, backlog: usize) -> Result<()> {
        if socket.proto != Protocol::Tcp {
            return Err(SocketError::Unsupported.into());
        }
        if socket.connected || socket.listening {
            return Err(SocketError::AlreadyConnected.into());
        }
        let port = socket
            .local
            .map(|a| a.port())
            .filter(|&p| p != 0)
            .ok_or(SocketError::InvalidAddress)?;

        self.start_server(port)?;
        self.slots.release(socket.id);
        socket.listening = true;
        debug!("socket listening on {}, backlog {} ignored", port, backlog);
        Ok(())
    }

    /// Connect to `addr` (TCP) or fix the datagram destination (UDP).
    ///
    /// TCP passes the socket's keepalive, UDP its bound local port.
    pub fn socket_connect(&mut self, socket: &mut Socket, addr: SocketAddrV4) -> Result<()> {
        check_remote(addr)?;
        if socket.listening {
            return Err(SocketError::Unsupported.into());
        }
        if socket.connected {
            return Err(SocketError::AlreadyConnected.into());
        }

        let extra = match socket.proto {
            Protocol::Tcp => socket.keepalive,
            Protocol::Udp => self.slots.local_port(socket.id),
        };
        self.open_link(socket.id, socket.proto, addr, extra)?;
        socket.connected = true;
        socket.peer = Some(addr);
        Ok(())
    }

    /// Wait for an inbound connection on the listening `server`.
    ///
    /// The modem does not report the peer, so the returned address is
    /// `0.0.0.0:0`. A pending link whose id is already owned by a local
    /// handle is closed and skipped.
    pub fn socket_accept(&mut self, server: &Socket) -> Result<(Socket, SocketAddrV4)> {
        if !server.listening {
            return Err(SocketError::NotListening.into());
        }
        loop {
            let id = self.accept_link()?;
            if self.slots.claim_id(id) {
                self.table.open(id, Protocol::Tcp);
                let mut socket = Socket::new(id, Protocol::Tcp);
                socket.local = server.local;
                socket.connected = true;
                socket.accepted = true;
                debug!("accepted link {}", id);
                return Ok((socket, UNSPECIFIED));
            }

            warn!("inbound link {} collides with a local socket", id);
            if let Err(e) = self.close_link(id, true) {
                warn!("closing link {} failed: {}", id, e);
            }
        }
    }

    /// Send on a connected socket, returning the bytes sent
    pub fn socket_send(&mut self, socket: &Socket, data: &[u8]) -> Result<usize> {
        if !socket.connected {
            return Err(SocketError::NotConnected.into());
        }
        self.send_link(socket.id, socket.proto, data)
    }

    /// Receive into `buf`.
    ///
    /// `Ok(0)` means the peer closed and nothing is left. A quiet link fails
    /// with [`AtError::Timeout`](super::error::AtError::Timeout) after the
    /// configured read timeout.
    pub fn socket_recv(&mut self, socket: &Socket, buf: &mut [u8]) -> Result<usize> {
        if !socket.connected {
            return Err(SocketError::NotConnected.into());
        }
        let timeout = self.config.read_timeout_ms;
        self.recv_queued(socket.id, buf, timeout).map(|(n, _)| n)
    }

    /// Send to `addr`, reconnecting first if the socket points elsewhere
    pub fn socket_sendto(&mut self, socket: &mut Socket, addr: SocketAddrV4, data: &[u8]) -> Result<usize> {
        check_remote(addr)?;
        if socket.connected && socket.peer != Some(addr) {
            if let Err(e) = self.close_link(socket.id, false) {
                warn!("closing link {} before redirect failed: {}", socket.id, e);
            }
            socket.connected = false;
        }
        if !socket.connected {
            self.socket_connect(socket, addr)?;
        }
        self.socket_send(socket, data)
    }

    /// Receive into `buf` along with the sender.
    ///
    /// The sender comes from the frame header when the modem reports it,
    /// otherwise it is the connected peer, otherwise `0.0.0.0:0`.
    pub fn socket_recvfrom(&mut self, socket: &Socket, buf: &mut [u8]) -> Result<(usize, SocketAddrV4)> {
        if !socket.connected {
            return Err(SocketError::NotConnected.into());
        }
        let timeout = self.config.read_timeout_ms;
        let (n, remote) = self.recv_queued(socket.id, buf, timeout)?;
        Ok((n, remote.or(socket.peer).unwrap_or(UNSPECIFIED)))
    }

    /// Set a socket option (see [`Socket::set_option`])
    pub fn setsockopt(&mut self, socket: &mut Socket, option: SocketOption) -> Result<()> {
        socket.set_option(option).map_err(Into::into)
    }

    /// Read a socket option (see [`Socket::option`])
    pub fn getsockopt(&self, socket: &Socket, name: SocketOptionName) -> Result<SocketOption> {
        socket.option(name).map_err(Into::into)
    }

    /// Number of link ids owned by socket handles
    pub fn open_sockets(&self) -> usize {
        self.slots.open_count()
    }
}
