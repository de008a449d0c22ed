//! Byte-string token helpers for AT replies.
//!
//! Replies are ASCII but not guaranteed UTF-8, so everything here works on
//! `&[u8]` and returns sub-slices of its input.

use core::net::Ipv4Addr;

use super::constants::INT_FIELD_MAX;

/// Position of the first occurrence of `needle` in `haystack`
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Bytes between the first `start` marker and the following `end` marker
pub(crate) fn between<'a>(haystack: &'a [u8], start: &[u8], end: &[u8]) -> Option<&'a [u8]> {
    let from = find(haystack, start)? + start.len();
    let len = find(&haystack[from..], end)?;
    Some(&haystack[from..from + len])
}

/// Bytes between the first `open` and the next `close`, plus the remainder
/// after `close`
pub(crate) fn between_chars(haystack: &[u8], open: u8, close: u8) -> Option<(&[u8], &[u8])> {
    let from = haystack.iter().position(|&b| b == open)? + 1;
    let len = haystack[from..].iter().position(|&b| b == close)?;
    Some((&haystack[from..from + len], &haystack[from + len + 1..]))
}

/// Strip one pair of surrounding double quotes
pub(crate) fn unquote(field: &[u8]) -> &[u8] {
    match field {
        [b'"', inner @ .., b'"'] => inner,
        other => other,
    }
}

/// Strip trailing CR/LF and spaces
pub(crate) fn trim_end(field: &[u8]) -> &[u8] {
    let end = field
        .iter()
        .rposition(|b| !matches!(b, b'\r' | b'\n' | b' '))
        .map_or(0, |p| p + 1);
    &field[..end]
}

/// Unsigned decimal field. Rejects empty, non-digit or overlong input.
pub(crate) fn parse_uint(field: &[u8]) -> Option<u32> {
    if field.is_empty() || field.len() > INT_FIELD_MAX {
        return None;
    }
    field.iter().try_fold(0u32, |acc, &b| {
        if b.is_ascii_digit() {
            Some(acc * 10 + u32::from(b - b'0'))
        } else {
            None
        }
    })
}

/// Signed decimal field
pub(crate) fn parse_int(field: &[u8]) -> Option<i32> {
    match field {
        [b'-', digits @ ..] => parse_uint(digits).map(|v| -(v as i32)),
        digits => parse_uint(digits).map(|v| v as i32),
    }
}

/// Dotted-quad IPv4 address, optionally quoted
pub(crate) fn parse_ipv4(field: &[u8]) -> Option<Ipv4Addr> {
    let field = unquote(field);
    let mut octets = [0u8; 4];
    let mut parts = field.split(|&b| b == b'.');
    for octet in &mut octets {
        let part = parts.next()?;
        if part.len() > 3 {
            return None;
        }
        *octet = u8::try_from(parse_uint(part)?).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}

fn hex_nibble(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Colon-separated MAC address (`18:fe:34:a1:b2:c3`), optionally quoted
pub(crate) fn parse_mac(field: &[u8]) -> Option<[u8; 6]> {
    let field = unquote(field);
    let mut mac = [0u8; 6];
    let mut parts = field.split(|&b| b == b':');
    for byte in &mut mac {
        match parts.next()? {
            [hi, lo] => *byte = (hex_nibble(*hi)? << 4) | hex_nibble(*lo)?,
            _ => return None,
        }
    }
    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}
