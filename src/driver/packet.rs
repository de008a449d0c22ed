//! Inbound Packet Queue
//!
//! Payloads of `+IPD` frames wait here until the owning socket reads them.
//! Storage is a single byte arena with payloads packed back to back in
//! arrival order, plus a bounded list of packet headers.
//!
//! # Accounting
//!
//! Every queued packet is charged [`PACKET_HEADER_SIZE`] bytes plus its
//! remaining payload. A packet is admitted only if the charge keeps the total
//! within `BYTES`; the caller must then drain the frame from the wire itself.
//! Because the queue owns all storage, usage is exact: it returns to zero
//! when the last packet is consumed.
//!
//! # Ordering
//!
//! Packets of one link are returned in arrival order. A partial read removes
//! bytes from the front of the oldest packet and compacts the arena, so the
//! next read continues exactly where the previous one stopped.

use core::net::SocketAddrV4;

use heapless::Vec;

use super::error::{QueueError, QueueResult};
use crate::internal::constants::PACKET_HEADER_SIZE;

#[derive(Debug, Clone, Copy)]
struct PacketHeader {
    id: u8,
    start: usize,
    len: usize,
    remote: Option<SocketAddrV4>,
}

/// Bounded FIFO of received payloads, keyed by link id
///
/// # Type Parameters
///
/// * `BYTES` - Byte budget covering payloads and per-packet overhead
/// * `PACKETS` - Maximum number of queued packets
#[derive(Debug)]
pub struct PacketQueue<const BYTES: usize, const PACKETS: usize> {
    arena: [u8; BYTES],
    headers: Vec<PacketHeader, PACKETS>,
    /// End of the packed payload region
    used: usize,
}

impl<const BYTES: usize, const PACKETS: usize> Default for PacketQueue<BYTES, PACKETS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const BYTES: usize, const PACKETS: usize> PacketQueue<BYTES, PACKETS> {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            arena: [0; BYTES],
            headers: Vec::new(),
            used: 0,
        }
    }

    /// Bytes charged against the budget
    pub fn heap_usage(&self) -> usize {
        self.headers.len() * PACKET_HEADER_SIZE + self.used
    }

    /// Byte budget
    pub const fn capacity(&self) -> usize {
        BYTES
    }

    /// Number of queued packets across all links
    pub fn packet_count(&self) -> usize {
        self.headers.len()
    }

    /// Returns `true` if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Unread bytes queued for `id`
    pub fn pending(&self, id: u8) -> usize {
        self.headers
            .iter()
            .filter(|h| h.id == id)
            .map(|h| h.len)
            .sum()
    }

    /// Check whether a packet of `amount` bytes would be admitted
    pub fn admit(&self, amount: usize) -> QueueResult<()> {
        if self.heap_usage() + PACKET_HEADER_SIZE + amount > BYTES {
            return Err(QueueError::ResourceExhausted);
        }
        if self.headers.is_full() {
            return Err(QueueError::QueueFull);
        }
        Ok(())
    }

    /// Reserve room for a packet of `amount` bytes.
    ///
    /// The packet becomes visible only after [`PacketSlot::commit`]; dropping
    /// the slot discards it.
    pub fn reserve(
        &mut self,
        id: u8,
        amount: usize,
        remote: Option<SocketAddrV4>,
    ) -> QueueResult<PacketSlot<'_, BYTES, PACKETS>> {
        self.admit(amount)?;
        Ok(PacketSlot {
            queue: self,
            id,
            len: amount,
            remote,
        })
    }

    /// Copy `payload` into the queue as one packet
    pub fn push(&mut self, id: u8, payload: &[u8], remote: Option<SocketAddrV4>) -> QueueResult<()> {
        let mut slot = self.reserve(id, payload.len(), remote)?;
        slot.payload_mut().copy_from_slice(payload);
        slot.commit();
        Ok(())
    }

    /// Read from the oldest packet of `id` into `out`.
    ///
    /// A packet that fits is returned whole and removed; otherwise `out` is
    /// filled and the rest stays queued. Returns `None` if nothing is queued
    /// for `id`.
    pub fn dequeue(&mut self, id: u8, out: &mut [u8]) -> Option<(usize, Option<SocketAddrV4>)> {
        let index = self.headers.iter().position(|h| h.id == id)?;
        let header = self.headers[index];
        let n = header.len.min(out.len());
        out[..n].copy_from_slice(&self.arena[header.start..header.start + n]);

        if n == header.len {
            self.headers.remove(index);
        } else {
            self.headers[index].len -= n;
        }
        self.compact(header.start, n);
        Some((n, header.remote))
    }

    /// Drop every packet queued for `id`
    pub fn clear(&mut self, id: u8) {
        while let Some(index) = self.headers.iter().position(|h| h.id == id) {
            let header = self.headers.remove(index);
            self.compact(header.start, header.len);
        }
    }

    /// Drop every packet
    pub fn clear_all(&mut self) {
        self.headers.clear();
        self.used = 0;
    }

    /// Remove `len` bytes at `start` from the arena and shift later payloads.
    fn compact(&mut self, start: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.arena.copy_within(start + len..self.used, start);
        self.used -= len;
        for header in self.headers.iter_mut() {
            if header.start > start {
                header.start -= len;
            }
        }
    }
}

/// Room for one packet, handed out by [`PacketQueue::reserve`]
pub struct PacketSlot<'a, const BYTES: usize, const PACKETS: usize> {
    queue: &'a mut PacketQueue<BYTES, PACKETS>,
    id: u8,
    len: usize,
    remote: Option<SocketAddrV4>,
}

impl<const BYTES: usize, const PACKETS: usize> PacketSlot<'_, BYTES, PACKETS> {
    /// Payload area to fill
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let start = self.queue.used;
        &mut self.queue.arena[start..start + self.len]
    }

    /// Append the packet to the queue
    pub fn commit(self) {
        let header = PacketHeader {
            id: self.id,
            start: self.queue.used,
            len: self.len,
            remote: self.remote,
        };
        // Admission already checked that a header slot is free.
        if self.queue.headers.push(header).is_ok() {
            self.queue.used += self.len;
        }
    }
}
