//! Bounded byte accumulator used for AT replies and `+IPD` headers.

/// Fixed-capacity byte buffer filled one byte at a time
///
/// Two fill policies exist: [`push`](Self::push) refuses bytes once full
/// (frame headers), [`push_sliding`](Self::push_sliding) drops the oldest
/// half to make room (command replies, where only the tail matters for
/// terminator matching).
#[derive(Debug, Clone)]
pub struct ScratchBuffer<const N: usize> {
    data: [u8; N],
    len: usize,
}

impl<const N: usize> Default for ScratchBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ScratchBuffer<N> {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self {
            data: [0; N],
            len: 0,
        }
    }

    /// Capacity in bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of buffered bytes
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing is buffered
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if no more bytes fit
    pub const fn is_full(&self) -> bool {
        self.len == N
    }

    /// Buffered bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Discard everything
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Keep only the first `len` bytes
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// Append one byte. Returns `false` (and stores nothing) when full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len == N {
            return false;
        }
        self.data[self.len] = byte;
        self.len += 1;
        true
    }

    /// Append one byte, discarding the oldest half of the buffer if full.
    ///
    /// Returns the number of bytes discarded from the front.
    pub fn push_sliding(&mut self, byte: u8) -> usize {
        let mut dropped = 0;
        if self.len == N {
            dropped = N / 2;
            self.data.copy_within(dropped..N, 0);
            self.len -= dropped;
        }
        if self.len < N {
            self.data[self.len] = byte;
            self.len += 1;
        }
        dropped
    }

    /// Returns `true` if the buffered bytes end with `suffix`
    pub fn ends_with(&self, suffix: &[u8]) -> bool {
        self.as_bytes().ends_with(suffix)
    }

    /// Position of the first occurrence of `needle`
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        crate::internal::text::find(self.as_bytes(), needle)
    }

    /// Returns `true` if `needle` occurs anywhere in the buffer
    pub fn contains(&self, needle: &[u8]) -> bool {
        self.find(needle).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_stops_when_full() {
        let mut buf = ScratchBuffer::<4>::new();
        for b in b"abcd" {
            assert!(buf.push(*b));
        }
        assert!(buf.is_full());
        assert!(!buf.push(b'e'));
        assert_eq!(buf.as_bytes(), b"abcd");
    }

    #[test]
    fn sliding_keeps_the_tail() {
        let mut buf = ScratchBuffer::<8>::new();
        for b in b"01234567" {
            assert_eq!(buf.push_sliding(*b), 0);
        }
        assert_eq!(buf.push_sliding(b'8'), 4);
        assert_eq!(buf.as_bytes(), b"45678");
        assert!(buf.ends_with(b"678"));
    }

    #[test]
    fn find_and_truncate() {
        let mut buf = ScratchBuffer::<32>::new();
        for b in b"\r\nOK\r\n+IPD,0,4:" {
            buf.push(*b);
        }
        let at = buf.find(b"+IPD,").unwrap();
        assert_eq!(at, 6);
        buf.truncate(at);
        assert_eq!(buf.as_bytes(), b"\r\nOK\r\n");
        assert!(buf.contains(b"OK"));
        buf.clear();
        assert!(buf.is_empty());
    }
}
