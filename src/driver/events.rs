//! Unsolicited link notifications.
//!
//! The firmware interleaves `<id>,CONNECT` and `<id>,CLOSED` lines with
//! command replies and data frames at any byte boundary. [`scan_tail`] is run
//! after every byte appended to a receive buffer and reports a token on the
//! byte that completes it, so each notification is seen exactly once.

use crate::internal::constants::SOCKET_COUNT;

const CONNECT: &[u8] = b",CONNECT";
const CLOSED: &[u8] = b",CLOSED";

/// Link state change reported by the modem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// `<id>,CONNECT`
    Connected(u8),
    /// `<id>,CLOSED`
    Closed(u8),
}

impl LinkEvent {
    /// Link id the event refers to
    pub const fn id(&self) -> u8 {
        match *self {
            LinkEvent::Connected(id) | LinkEvent::Closed(id) => id,
        }
    }
}

/// Outcome of one [`poll`](crate::EspAt::poll) of the serial stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollEvent {
    /// Nothing of interest arrived before the timeout
    Idle,
    /// A `+IPD` frame was consumed from the wire
    FrameReceived {
        /// Link the frame belongs to
        id: u8,
        /// Payload length announced by the header
        len: usize,
        /// `false` if the payload was drained because the queue was full
        queued: bool,
    },
    /// A link connected or closed
    LinkChanged(LinkEvent),
}

/// Check whether `buf` ends with a complete link notification.
pub fn scan_tail(buf: &[u8]) -> Option<LinkEvent> {
    let (token_len, closed) = if buf.ends_with(CONNECT) {
        (CONNECT.len(), false)
    } else if buf.ends_with(CLOSED) {
        (CLOSED.len(), true)
    } else {
        return None;
    };

    let digit_at = buf.len().checked_sub(token_len + 1)?;
    let digit = buf[digit_at];
    if !digit.is_ascii_digit() {
        return None;
    }
    // Reject multi-digit prefixes such as "10,CLOSED".
    if digit_at > 0 && buf[digit_at - 1].is_ascii_digit() {
        return None;
    }
    let id = digit - b'0';
    if id as usize >= SOCKET_COUNT {
        return None;
    }
    Some(if closed {
        LinkEvent::Closed(id)
    } else {
        LinkEvent::Connected(id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(stream: &[u8]) -> heapless::Vec<LinkEvent, 8> {
        let mut events = heapless::Vec::new();
        for end in 1..=stream.len() {
            if let Some(ev) = scan_tail(&stream[..end]) {
                events.push(ev).unwrap();
            }
        }
        events
    }

    #[test]
    fn detects_each_token_once() {
        let events = feed(b"\r\n0,CONNECT\r\n\r\nOK\r\n2,CLOSED\r\n");
        assert_eq!(events.as_slice(), &[LinkEvent::Connected(0), LinkEvent::Closed(2)]);
    }

    #[test]
    fn token_split_across_reads_is_found() {
        let mut buf = heapless::Vec::<u8, 32>::new();
        let mut seen = None;
        for chunk in [&b"\r\n3,CON"[..], &b"NECT\r\n"[..]] {
            for &b in chunk {
                buf.push(b).unwrap();
                if let Some(ev) = scan_tail(&buf) {
                    seen = Some(ev);
                }
            }
        }
        assert_eq!(seen, Some(LinkEvent::Connected(3)));
    }

    #[test]
    fn ignores_out_of_range_and_bare_tokens() {
        assert_eq!(scan_tail(b"5,CONNECT"), None);
        assert_eq!(scan_tail(b"12,CLOSED"), None);
        assert_eq!(scan_tail(b"CLOSED"), None);
        assert_eq!(scan_tail(b",CLOSED"), None);
        assert_eq!(scan_tail(b"4,CLOSED"), Some(LinkEvent::Closed(4)));
    }

    #[test]
    fn event_id() {
        assert_eq!(LinkEvent::Connected(1).id(), 1);
        assert_eq!(LinkEvent::Closed(4).id(), 4);
    }
}
