//! `+IPD` data frame headers.
//!
//! A frame is announced as `+IPD,<fields>:` followed by exactly `len` raw
//! payload bytes. The fields present depend on the firmware configuration
//! (see [`IpdFormat`]).

use core::net::SocketAddrV4;

use super::config::IpdFormat;
use super::error::{FrameError, FrameResult};
use crate::internal::constants::{IP_STR_MAX, SOCKET_COUNT};
use crate::internal::text;

/// Frame announcement prefix
pub const IPD_PREFIX: &[u8] = b"+IPD,";

/// Parsed `+IPD` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpdHeader {
    /// Link id, absent in single-connection mode
    pub id: Option<u8>,
    /// Payload length
    pub len: usize,
    /// Sender, present when remote info is enabled
    pub remote: Option<SocketAddrV4>,
}

impl IpdHeader {
    /// Link id, falling back to `default` for single-connection frames
    pub fn link_id(&self, default: u8) -> u8 {
        self.id.unwrap_or(default)
    }
}

/// Resolve `Auto` to a concrete layout from the number of commas.
fn detect(fields: &[u8]) -> FrameResult<IpdFormat> {
    match fields.iter().filter(|&&b| b == b',').count() {
        0 => Ok(IpdFormat::Length),
        1 => Ok(IpdFormat::IdLength),
        2 => Ok(IpdFormat::LengthRemote),
        3 | 4 => Ok(IpdFormat::IdLengthRemote),
        _ => Err(FrameError::MalformedHeader),
    }
}

fn link_id(field: &[u8]) -> FrameResult<u8> {
    let id = text::parse_uint(field).ok_or(FrameError::MalformedHeader)?;
    if id as usize >= SOCKET_COUNT {
        return Err(FrameError::InvalidLinkId);
    }
    Ok(id as u8)
}

fn length(field: &[u8]) -> FrameResult<usize> {
    text::parse_uint(field)
        .map(|len| len as usize)
        .ok_or(FrameError::MalformedHeader)
}

fn remote(ip: &[u8], port: &[u8]) -> FrameResult<SocketAddrV4> {
    if ip.len() > IP_STR_MAX {
        return Err(FrameError::MalformedHeader);
    }
    let ip = text::parse_ipv4(ip).ok_or(FrameError::MalformedHeader)?;
    let port = text::parse_uint(port)
        .and_then(|p| u16::try_from(p).ok())
        .ok_or(FrameError::MalformedHeader)?;
    Ok(SocketAddrV4::new(ip, port))
}

/// Parse the header fields between `+IPD,` and `:` (both excluded).
///
/// With a fixed `format` the field count must match it; `Auto` infers the
/// layout per frame. The `IdLengthRemote` layout tolerates one trailing
/// field, which some firmware versions append.
pub fn parse_header(fields: &[u8], format: IpdFormat) -> FrameResult<IpdHeader> {
    let format = match format {
        IpdFormat::Auto => detect(fields)?,
        fixed => fixed,
    };

    let mut it = fields.split(|&b| b == b',');
    let mut next = || it.next().ok_or(FrameError::MalformedHeader);

    let header = match format {
        IpdFormat::Length => IpdHeader {
            id: None,
            len: length(next()?)?,
            remote: None,
        },
        IpdFormat::IdLength => IpdHeader {
            id: Some(link_id(next()?)?),
            len: length(next()?)?,
            remote: None,
        },
        IpdFormat::LengthRemote => {
            let len = length(next()?)?;
            IpdHeader {
                id: None,
                len,
                remote: Some(remote(next()?, next()?)?),
            }
        }
        IpdFormat::IdLengthRemote | IpdFormat::Auto => {
            let id = link_id(next()?)?;
            let len = length(next()?)?;
            let ip = next()?;
            let port = next()?;
            let _trailing = next();
            IpdHeader {
                id: Some(id),
                len,
                remote: Some(remote(ip, port)?),
            }
        }
    };

    if next().is_ok() {
        return Err(FrameError::MalformedHeader);
    }
    Ok(header)
}
