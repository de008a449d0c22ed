//! Control-plane AT commands
//!
//! Station management, addressing and DNS. Each query parses its reply out of
//! the response buffer right after the command completes.

use core::fmt;
use core::net::Ipv4Addr;

use embedded_hal::delay::DelayNs;
use heapless::String;

use super::at::Terminators;
use super::config::{DhcpMode, WifiMode};
use super::error::{AtError, AtResult};
use super::esp::EspAt;
use crate::hal::clock::Clock;
use crate::hal::serial::SerialPort;
use crate::internal::constants::{DOMAIN_MAX, KEEPALIVE_MAX};
use crate::internal::text;
use crate::log::info;

// =============================================================================
// Reply Types
// =============================================================================

/// `AT+GMR` version strings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareVersion {
    /// AT firmware version
    pub at: String<64>,
    /// SDK version
    pub sdk: String<64>,
}

/// Access point the station is joined to
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ApInfo {
    /// Network name
    pub ssid: String<32>,
    /// Access point MAC address
    pub bssid: [u8; 6],
    /// Wi-Fi channel
    pub channel: u8,
    /// Signal strength in dBm
    pub rssi: i8,
}

/// Station interface addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationConfig {
    /// Station address
    pub ip: Ipv4Addr,
    /// Default gateway
    pub gateway: Ipv4Addr,
    /// Subnet mask
    pub netmask: Ipv4Addr,
}

/// Quoted AT string argument with `"`, `,` and `\` escaped
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            if matches!(c, '"' | ',' | '\\') {
                f.write_str("\\")?;
            }
            fmt::Write::write_char(f, c)?;
        }
        Ok(())
    }
}

fn copy_str<const N: usize>(field: &[u8]) -> AtResult<String<N>> {
    let s = core::str::from_utf8(field).map_err(|_| AtError::InvalidResponse)?;
    let mut out = String::new();
    out.push_str(s).map_err(|()| AtError::InvalidResponse)?;
    Ok(out)
}

fn version_field<const N: usize>(reply: &[u8], label: &[u8]) -> AtResult<String<N>> {
    let at = text::find(reply, label).ok_or(AtError::InvalidResponse)?;
    let (value, _) =
        text::between_chars(&reply[at + label.len()..], b':', b'\r').ok_or(AtError::InvalidResponse)?;
    copy_str(value)
}

impl<S, C, D, const QUEUE_BYTES: usize, const QUEUE_PACKETS: usize>
    EspAt<S, C, D, QUEUE_BYTES, QUEUE_PACKETS>
where
    S: SerialPort,
    C: Clock,
    D: DelayNs,
{
    // =========================================================================
    // Basic
    // =========================================================================

    /// `AT`: check the modem answers
    pub fn at_test(&mut self) -> AtResult<()> {
        self.command(format_args!("AT"))
    }

    /// `ATE0` / `ATE1`
    pub fn set_echo(&mut self, enable: bool) -> AtResult<()> {
        let timeout = self.config.command_timeout_ms;
        self.set_echo_timeout(enable, timeout)
    }

    pub(crate) fn set_echo_timeout(&mut self, enable: bool, timeout_ms: u32) -> AtResult<()> {
        self.send_cmd(
            format_args!("ATE{}", u8::from(enable)),
            &Terminators::DEFAULT,
            timeout_ms,
        )
    }

    /// `AT+RST`: restart the modem.
    ///
    /// This only sends the command. Use [`reset`](Self::reset) to also drop
    /// driver state.
    pub fn restart(&mut self) -> AtResult<()> {
        self.command(format_args!("AT+RST"))
    }

    /// `AT+GMR`
    pub fn firmware_version(&mut self) -> AtResult<FirmwareVersion> {
        self.command(format_args!("AT+GMR"))?;
        let reply = self.response.as_bytes();
        Ok(FirmwareVersion {
            at: version_field(reply, b"AT version")?,
            sdk: version_field(reply, b"SDK version")?,
        })
    }

    /// `AT+CIPMUX`: multiplexed links on or off
    pub fn set_mux(&mut self, enable: bool) -> AtResult<()> {
        self.command(format_args!("AT+CIPMUX={}", u8::from(enable)))
    }

    /// `AT+CIPDINFO`: remote address in `+IPD` headers on or off
    pub fn set_remote_info(&mut self, enable: bool) -> AtResult<()> {
        self.command(format_args!("AT+CIPDINFO={}", u8::from(enable)))
    }

    /// `AT+CIPSTO`: idle timeout of server links in seconds (0..=7200)
    pub fn set_server_timeout(&mut self, secs: u16) -> AtResult<()> {
        if u32::from(secs) > KEEPALIVE_MAX {
            return Err(AtError::InvalidArgument);
        }
        self.command(format_args!("AT+CIPSTO={secs}"))
    }

    // =========================================================================
    // Station
    // =========================================================================

    /// `AT+CWMODE?`
    pub fn wifi_mode(&mut self) -> AtResult<WifiMode> {
        self.command(format_args!("AT+CWMODE?"))?;
        let value = text::between(self.response.as_bytes(), b"+CWMODE:", b"\r")
            .and_then(text::parse_uint)
            .ok_or(AtError::InvalidResponse)?;
        u8::try_from(value)
            .ok()
            .and_then(WifiMode::from_u8)
            .ok_or(AtError::InvalidResponse)
    }

    /// `AT+CWMODE=`
    pub fn set_wifi_mode(&mut self, mode: WifiMode) -> AtResult<()> {
        let timeout = self.config.command_timeout_ms;
        self.send_cmd(
            format_args!("AT+CWMODE={}", mode as u8),
            &Terminators::MODE_CHANGE,
            timeout,
        )
    }

    /// `AT+CWAUTOCONN`: rejoin the stored network at boot
    pub fn set_auto_connect(&mut self, enable: bool) -> AtResult<()> {
        self.command(format_args!("AT+CWAUTOCONN={}", u8::from(enable)))
    }

    /// `AT+CWJAP`: join a network
    pub fn join(&mut self, ssid: &str, password: &str) -> AtResult<()> {
        if ssid.is_empty() {
            return Err(AtError::InvalidArgument);
        }
        let timeout = self.config.join_timeout_ms;
        self.send_cmd(
            format_args!("AT+CWJAP=\"{}\",\"{}\"", Escaped(ssid), Escaped(password)),
            &Terminators::JOIN,
            timeout,
        )?;
        info!("joined access point");
        Ok(())
    }

    /// `AT+CWQAP`: leave the current network
    pub fn disconnect_ap(&mut self) -> AtResult<()> {
        self.command(format_args!("AT+CWQAP"))
    }

    /// `AT+CWJAP_CUR?`, or `None` when not joined
    pub fn ap_info(&mut self) -> AtResult<Option<ApInfo>> {
        self.command(format_args!("AT+CWJAP_CUR?"))?;
        let reply = self.response.as_bytes();
        if text::find(reply, b"No AP").is_some() {
            return Ok(None);
        }

        let fields =
            text::between(reply, b"+CWJAP_CUR:", b"\r\n\r\nOK").ok_or(AtError::InvalidResponse)?;
        let (ssid, rest) = text::between_chars(fields, b'"', b'"').ok_or(AtError::InvalidResponse)?;
        let (bssid, rest) = text::between_chars(rest, b'"', b'"').ok_or(AtError::InvalidResponse)?;

        let mut numbers = rest.split(|&b| b == b',').filter(|f| !f.is_empty());
        let channel = numbers
            .next()
            .and_then(text::parse_uint)
            .and_then(|c| u8::try_from(c).ok())
            .ok_or(AtError::InvalidResponse)?;
        let rssi = numbers
            .next()
            .map(text::trim_end)
            .and_then(text::parse_int)
            .and_then(|r| i8::try_from(r).ok())
            .ok_or(AtError::InvalidResponse)?;

        Ok(Some(ApInfo {
            ssid: copy_str(ssid)?,
            bssid: text::parse_mac(bssid).ok_or(AtError::InvalidResponse)?,
            channel,
            rssi,
        }))
    }

    /// `AT+CWDHCP`: enable or disable DHCP for `mode`
    pub fn set_dhcp(&mut self, mode: DhcpMode, enable: bool) -> AtResult<()> {
        self.command(format_args!("AT+CWDHCP={},{}", u8::from(enable), mode as u8))
    }

    /// `AT+CIPSTAMAC_CUR?`
    pub fn station_mac(&mut self) -> AtResult<[u8; 6]> {
        self.command(format_args!("AT+CIPSTAMAC_CUR?"))?;
        text::between(self.response.as_bytes(), b"+CIPSTAMAC_CUR:", b"\r")
            .and_then(text::parse_mac)
            .ok_or(AtError::InvalidResponse)
    }

    /// `AT+CIPSTA?`
    pub fn station_config(&mut self) -> AtResult<StationConfig> {
        self.command(format_args!("AT+CIPSTA?"))?;
        let fields = text::between(self.response.as_bytes(), b"+CIPSTA:", b"\r\n\r\nOK")
            .ok_or(AtError::InvalidResponse)?;

        let mut rest = fields;
        let mut addrs = [Ipv4Addr::UNSPECIFIED; 3];
        for addr in &mut addrs {
            let (value, tail) = text::between_chars(rest, b'"', b'"').ok_or(AtError::InvalidResponse)?;
            *addr = text::parse_ipv4(value).ok_or(AtError::InvalidResponse)?;
            rest = tail;
        }
        let [ip, gateway, netmask] = addrs;
        Ok(StationConfig { ip, gateway, netmask })
    }

    /// `AT+CIPSTA=`: static station addressing
    pub fn set_station_config(&mut self, config: &StationConfig) -> AtResult<()> {
        self.command(format_args!(
            "AT+CIPSTA=\"{}\",\"{}\",\"{}\"",
            config.ip, config.gateway, config.netmask
        ))
    }

    // =========================================================================
    // DNS
    // =========================================================================

    /// `AT+CIPDOMAIN`: resolve `domain` to an IPv4 address
    pub fn resolve(&mut self, domain: &str) -> AtResult<Ipv4Addr> {
        if domain.is_empty() || domain.len() > DOMAIN_MAX {
            return Err(AtError::InvalidArgument);
        }
        let timeout = self.config.domain_timeout_ms;
        self.send_cmd(
            format_args!("AT+CIPDOMAIN=\"{}\"", Escaped(domain)),
            &Terminators::DEFAULT,
            timeout,
        )?;
        text::between(self.response.as_bytes(), b"+CIPDOMAIN:", b"\r")
            .and_then(text::parse_ipv4)
            .ok_or(AtError::InvalidResponse)
    }

    /// `AT+CIPDNS_CUR?`: first configured DNS server
    pub fn dns(&mut self) -> AtResult<Ipv4Addr> {
        self.command(format_args!("AT+CIPDNS_CUR?"))?;
        text::between(self.response.as_bytes(), b"+CIPDNS_CUR:", b"\r")
            .and_then(text::parse_ipv4)
            .ok_or(AtError::InvalidResponse)
    }

    /// `AT+CIPDNS_CUR=`: use `server` when `enable`, otherwise the default
    pub fn set_dns(&mut self, server: Ipv4Addr, enable: bool) -> AtResult<()> {
        self.command(format_args!("AT+CIPDNS_CUR={},\"{server}\"", u8::from(enable)))
    }
}
