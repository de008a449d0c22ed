//! Per-link connection state.
//!
//! Three small tables describe the modem's five multiplexed links:
//!
//! - [`LinkTracker`]: connect/close bitmasks driven by `n,CONNECT` and
//!   `n,CLOSED` notifications
//! - [`AcceptQueue`]: ids of inbound connections waiting for `accept`
//! - [`LinkTable`]: links this driver opened with `AT+CIPSTART`

use heapless::Deque;

use super::config::Protocol;
use crate::internal::constants::{ALL_LINKS_MASK, SOCKET_COUNT};

/// Connect/close state of every link as reported by the modem
///
/// For every id at most one of the two bits is set. After construction all
/// links are closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkTracker {
    connected: u32,
    closed: u32,
}

impl Default for LinkTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkTracker {
    /// All links closed
    pub const fn new() -> Self {
        Self {
            connected: 0,
            closed: ALL_LINKS_MASK,
        }
    }

    const fn bit(id: u8) -> u32 {
        if (id as usize) < SOCKET_COUNT {
            1 << id
        } else {
            0
        }
    }

    /// Returns `true` if `id` last reported `CONNECT`
    pub const fn is_connected(&self, id: u8) -> bool {
        self.connected & Self::bit(id) != 0
    }

    /// Returns `true` if `id` last reported `CLOSED` (or never connected)
    pub const fn is_closed(&self, id: u8) -> bool {
        self.closed & Self::bit(id) != 0
    }

    /// Mark `id` connected
    pub fn set_connected(&mut self, id: u8) {
        let bit = Self::bit(id);
        self.connected |= bit;
        self.closed &= !bit;
    }

    /// Mark `id` closed
    pub fn set_closed(&mut self, id: u8) {
        let bit = Self::bit(id);
        self.closed |= bit;
        self.connected &= !bit;
    }

    /// Returns `true` if data can be sent on `id`
    pub const fn is_usable(&self, id: u8) -> bool {
        self.is_connected(id) && !self.is_closed(id)
    }

    /// Raw connect bitmask
    pub const fn connected_mask(&self) -> u32 {
        self.connected
    }

    /// Raw close bitmask
    pub const fn closed_mask(&self) -> u32 {
        self.closed
    }
}

/// FIFO of inbound link ids waiting for `accept`
///
/// An id appears at most once.
#[derive(Debug, Default)]
pub struct AcceptQueue {
    ids: Deque<u8, SOCKET_COUNT>,
}

impl AcceptQueue {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self { ids: Deque::new() }
    }

    /// Queue `id` unless it is already pending
    pub fn push(&mut self, id: u8) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push_back(id).is_ok()
    }

    /// Oldest pending id
    pub fn pop(&mut self) -> Option<u8> {
        self.ids.pop_front()
    }

    /// Drop `id` if pending
    pub fn remove(&mut self, id: u8) {
        let pending = self.ids.len();
        for _ in 0..pending {
            if let Some(other) = self.ids.pop_front() {
                if other != id {
                    // Capacity is never exceeded: we just popped an element.
                    let _ = self.ids.push_back(other);
                }
            }
        }
    }

    /// Returns `true` if `id` is pending
    pub fn contains(&self, id: u8) -> bool {
        self.ids.iter().any(|&other| other == id)
    }

    /// Number of pending ids
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Bookkeeping for one link opened with `AT+CIPSTART`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkInfo {
    /// Link opened by this driver and not yet closed
    pub open: bool,
    /// Protocol used to open it
    pub proto: Protocol,
}

/// Links this driver opened itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkTable {
    links: [LinkInfo; SOCKET_COUNT],
}

impl LinkTable {
    /// Every link unopened
    pub const fn new() -> Self {
        Self {
            links: [LinkInfo {
                open: false,
                proto: Protocol::Tcp,
            }; SOCKET_COUNT],
        }
    }

    /// Info for `id`, if in range
    pub fn get(&self, id: u8) -> Option<&LinkInfo> {
        self.links.get(id as usize)
    }

    /// Returns `true` if `id` was opened locally and not closed
    pub fn is_open(&self, id: u8) -> bool {
        self.get(id).is_some_and(|l| l.open)
    }

    /// Record that `id` was opened with `proto`
    pub fn open(&mut self, id: u8, proto: Protocol) {
        if let Some(link) = self.links.get_mut(id as usize) {
            *link = LinkInfo { open: true, proto };
        }
    }

    /// Forget `id`
    pub fn reset(&mut self, id: u8) {
        if let Some(link) = self.links.get_mut(id as usize) {
            *link = LinkInfo::default();
        }
    }

    /// Forget every link
    pub fn reset_all(&mut self) {
        *self = Self::new();
    }
}
