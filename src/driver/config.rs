//! Driver configuration and protocol enums.

use crate::internal::constants::{
    ACCEPT_TIMEOUT_MS, ATE0_TIMEOUT_MS, DOMAIN_TIMEOUT_MS, LOGIN_TIMEOUT_MS, PACKET_TIMEOUT_MS,
    READ_TIMEOUT_MS, WIFI_TIMEOUT_MS,
};

/// Transport protocol of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protocol {
    /// Stream socket (`"TCP"`)
    #[default]
    Tcp,
    /// Datagram socket (`"UDP"`)
    Udp,
}

impl Protocol {
    /// Keyword used in `AT+CIPSTART`
    pub const fn as_at_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

/// Layout of the `+IPD` header the firmware emits
///
/// The layout depends on `AT+CIPMUX` (link id present) and `AT+CIPDINFO`
/// (remote IP and port present). `Auto` infers it from the field count of
/// every header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IpdFormat {
    /// Infer from the number of commas in the header
    #[default]
    Auto,
    /// `+IPD,<len>:`
    Length,
    /// `+IPD,<id>,<len>:`
    IdLength,
    /// `+IPD,<len>,<ip>,<port>:`
    LengthRemote,
    /// `+IPD,<id>,<len>,<ip>,<port>:`
    IdLengthRemote,
}

impl IpdFormat {
    /// Fixed layout for the given mux and remote-info settings
    pub const fn from_flags(multiplexed: bool, remote_info: bool) -> Self {
        match (multiplexed, remote_info) {
            (false, false) => IpdFormat::Length,
            (true, false) => IpdFormat::IdLength,
            (false, true) => IpdFormat::LengthRemote,
            (true, true) => IpdFormat::IdLengthRemote,
        }
    }
}

/// Wi-Fi operating mode (`AT+CWMODE`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WifiMode {
    /// Station only
    Station = 1,
    /// Soft access point only
    SoftAp = 2,
    /// Station and soft access point
    StationSoftAp = 3,
}

impl WifiMode {
    /// Decode the numeric mode reported by `AT+CWMODE?`
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(WifiMode::Station),
            2 => Some(WifiMode::SoftAp),
            3 => Some(WifiMode::StationSoftAp),
            _ => None,
        }
    }
}

/// Interface selector for `AT+CWDHCP`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DhcpMode {
    /// Soft access point DHCP server
    SoftAp = 0,
    /// Station DHCP client
    Station = 1,
    /// Both interfaces
    Both = 2,
}

/// Driver lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// `init` has not completed
    #[default]
    Uninitialized,
    /// Modem configured and ready for sockets
    Ready,
}

/// Driver configuration
///
/// All timeouts are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverConfig {
    /// Default AT command response timeout
    pub command_timeout_ms: u32,
    /// `AT+CIPDOMAIN` response timeout
    pub domain_timeout_ms: u32,
    /// `ATE0` response timeout during init
    pub echo_off_timeout_ms: u32,
    /// `AT+CWJAP` response timeout
    pub join_timeout_ms: u32,
    /// Single poll window used by `recv` and the send drain
    pub read_timeout_ms: u32,
    /// Timeout for reading one `+IPD` payload
    pub packet_timeout_ms: u32,
    /// Single poll window while waiting in `accept`
    pub accept_poll_ms: u32,
    /// Give up `accept` after this long (`None` blocks until a client arrives)
    pub accept_deadline_ms: Option<u32>,
    /// `+IPD` header layout, or `Auto` to fix it during `init`
    pub ipd_format: IpdFormat,
    /// Request remote IP/port in `+IPD` headers (`AT+CIPDINFO=1`) at init
    pub remote_info: bool,
    /// Link id assigned to frames whose header carries none
    pub default_link_id: u8,
    /// Log every AT command sent
    pub trace_commands: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverConfig {
    /// Create a new configuration with defaults
    #[must_use]
    pub const fn new() -> Self {
        Self {
            command_timeout_ms: WIFI_TIMEOUT_MS,
            domain_timeout_ms: DOMAIN_TIMEOUT_MS,
            echo_off_timeout_ms: ATE0_TIMEOUT_MS,
            join_timeout_ms: LOGIN_TIMEOUT_MS,
            read_timeout_ms: READ_TIMEOUT_MS,
            packet_timeout_ms: PACKET_TIMEOUT_MS,
            accept_poll_ms: ACCEPT_TIMEOUT_MS,
            accept_deadline_ms: None,
            ipd_format: IpdFormat::Auto,
            remote_info: true,
            default_link_id: 0,
            trace_commands: false,
        }
    }

    // =========================================================================
    // Builder Methods
    // =========================================================================

    /// Set the default AT command timeout
    #[must_use]
    pub const fn with_command_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.command_timeout_ms = timeout_ms;
        self
    }

    /// Set the DNS resolution timeout
    #[must_use]
    pub const fn with_domain_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.domain_timeout_ms = timeout_ms;
        self
    }

    /// Set the echo-off timeout used during init
    #[must_use]
    pub const fn with_echo_off_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.echo_off_timeout_ms = timeout_ms;
        self
    }

    /// Set the access point join timeout
    #[must_use]
    pub const fn with_join_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.join_timeout_ms = timeout_ms;
        self
    }

    /// Set the read poll window
    #[must_use]
    pub const fn with_read_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.read_timeout_ms = timeout_ms;
        self
    }

    /// Set the payload read timeout
    #[must_use]
    pub const fn with_packet_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.packet_timeout_ms = timeout_ms;
        self
    }

    /// Set the accept poll window
    #[must_use]
    pub const fn with_accept_poll_ms(mut self, timeout_ms: u32) -> Self {
        self.accept_poll_ms = timeout_ms;
        self
    }

    /// Bound the total time `accept` waits for a client
    #[must_use]
    pub const fn with_accept_deadline_ms(mut self, deadline_ms: Option<u32>) -> Self {
        self.accept_deadline_ms = deadline_ms;
        self
    }

    /// Force a `+IPD` header layout
    #[must_use]
    pub const fn with_ipd_format(mut self, format: IpdFormat) -> Self {
        self.ipd_format = format;
        self
    }

    /// Request remote IP/port in `+IPD` headers at init
    #[must_use]
    pub const fn with_remote_info(mut self, enabled: bool) -> Self {
        self.remote_info = enabled;
        self
    }

    /// Set the link id used for frames without one
    #[must_use]
    pub const fn with_default_link_id(mut self, id: u8) -> Self {
        self.default_link_id = id;
        self
    }

    /// Log every AT command sent
    #[must_use]
    pub const fn with_trace_commands(mut self, enabled: bool) -> Self {
        self.trace_commands = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_modem_timings() {
        let config = DriverConfig::default();
        assert_eq!(config.command_timeout_ms, 10_000);
        assert_eq!(config.domain_timeout_ms, 15_000);
        assert_eq!(config.read_timeout_ms, 600);
        assert_eq!(config.packet_timeout_ms, 600);
        assert_eq!(config.accept_deadline_ms, None);
        assert_eq!(config.ipd_format, IpdFormat::Auto);
        assert_eq!(config.default_link_id, 0);
    }

    #[test]
    fn builder_chain() {
        let config = DriverConfig::new()
            .with_command_timeout_ms(2_000)
            .with_accept_deadline_ms(Some(5_000))
            .with_ipd_format(IpdFormat::IdLength)
            .with_remote_info(false)
            .with_trace_commands(true);

        assert_eq!(config.command_timeout_ms, 2_000);
        assert_eq!(config.accept_deadline_ms, Some(5_000));
        assert_eq!(config.ipd_format, IpdFormat::IdLength);
        assert!(!config.remote_info);
        assert!(config.trace_commands);
    }

    #[test]
    fn ipd_format_from_flags() {
        assert_eq!(IpdFormat::from_flags(false, false), IpdFormat::Length);
        assert_eq!(IpdFormat::from_flags(true, false), IpdFormat::IdLength);
        assert_eq!(IpdFormat::from_flags(false, true), IpdFormat::LengthRemote);
        assert_eq!(IpdFormat::from_flags(true, true), IpdFormat::IdLengthRemote);
    }

    #[test]
    fn wifi_mode_decode() {
        assert_eq!(WifiMode::from_u8(1), Some(WifiMode::Station));
        assert_eq!(WifiMode::from_u8(3), Some(WifiMode::StationSoftAp));
        assert_eq!(WifiMode::from_u8(0), None);
    }

    #[test]
    fn protocol_keywords() {
        assert_eq!(Protocol::Tcp.as_at_str(), "TCP");
        assert_eq!(Protocol::Udp.as_at_str(), "UDP");
    }
}
