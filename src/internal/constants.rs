//! Centralized Constants
//!
//! Single source of truth for the timeouts, buffer sizes and protocol limits
//! used by the AT driver.
//!
//! # Organization
//!
//! - **Link slots**: number of concurrent links the firmware multiplexes
//! - **Buffer sizes**: command, response, frame header and packet queue sizes
//! - **Timing**: command, data-plane and settle timeouts
//! - **Protocol limits**: `CIPSEND` chunk size, keepalive range
//!
//! AT command strings and terminators live with the code that issues them
//! (`driver/at.rs`, `driver/wifi.rs`, `driver/connection.rs`).

// =============================================================================
// Link Slots
// =============================================================================

/// Number of link ids the firmware multiplexes (`AT+CIPMUX=1`)
pub const SOCKET_COUNT: usize = 5;

/// Bitmask with one bit set per link slot
pub const ALL_LINKS_MASK: u32 = (1 << SOCKET_COUNT) - 1;

// =============================================================================
// Buffer Sizes
// =============================================================================

/// Byte budget of the inbound packet queue (payload plus per-packet overhead)
pub const SOCKET_BUFSIZE: usize = 16384;

/// Default maximum number of queued packets
pub const DEFAULT_QUEUE_PACKETS: usize = 32;

/// Accounting overhead charged per queued packet (link id, lengths, link)
pub const PACKET_HEADER_SIZE: usize = 16;

/// Maximum formatted AT command length (without CRLF)
pub const COMMAND_BUF_SIZE: usize = 1024;

/// Size of the response scratch buffer kept after every command
pub const RESPONSE_BUF_SIZE: usize = 1024;

/// Size of the frame header accumulation buffer used by `poll`
pub const FRAME_BUF_SIZE: usize = 3072;

/// Longest domain name accepted by `AT+CIPDOMAIN`
pub const DOMAIN_MAX: usize = 63;

/// Longest dotted-quad string accepted in a `+IPD` header
pub const IP_STR_MAX: usize = 19;

/// Longest integer field accepted by the token parser
pub const INT_FIELD_MAX: usize = 9;

// =============================================================================
// Timing Constants
// =============================================================================

/// Default AT command response timeout in milliseconds
pub const WIFI_TIMEOUT_MS: u32 = 10_000;

/// `AT+CIPDOMAIN` response timeout in milliseconds
pub const DOMAIN_TIMEOUT_MS: u32 = 15_000;

/// `ATE0` response timeout during init in milliseconds
pub const ATE0_TIMEOUT_MS: u32 = 10_000;

/// `AT+CWJAP` response timeout in milliseconds
pub const LOGIN_TIMEOUT_MS: u32 = 10_000;

/// Single `poll` window used by `recv` and after `CIPSEND`
pub const READ_TIMEOUT_MS: u32 = 600;

/// Single `poll` window used while waiting in `accept`
pub const ACCEPT_TIMEOUT_MS: u32 = 600;

/// Timeout for reading one `+IPD` payload
pub const PACKET_TIMEOUT_MS: u32 = 600;

/// Follow-up drain window after the first post-`CIPSEND` poll
pub const SEND_DRAIN_TIMEOUT_MS: u32 = 200;

/// Idle delay between empty accept polls
pub const ACCEPT_IDLE_DELAY_MS: u32 = 5;

/// Number of settle polls after a connection is accepted
pub const ACCEPT_SETTLE_POLLS: u32 = 50;

/// Interval between accept settle polls
pub const ACCEPT_SETTLE_INTERVAL_MS: u32 = 10;

/// Delay after `AT+RST` before the modem accepts commands again
pub const RESET_SETTLE_MS: u32 = 3_000;

// =============================================================================
// Protocol Limits
// =============================================================================

/// Largest payload a single `AT+CIPSEND` accepts
pub const CIPSEND_MAX: usize = 2048;

/// Largest TCP keepalive accepted by `AT+CIPSTART` (seconds)
pub const KEEPALIVE_MAX: u32 = 7200;

/// Attempts per `CIPSEND` chunk before giving up
pub const SEND_ATTEMPTS: u32 = 2;

/// `AT+RST` attempts made by `reset`
pub const RESET_ATTEMPTS: u32 = 2;

/// `AT+CIPSTART` attempts per connect
pub const CONNECT_ATTEMPTS: u32 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_mask_covers_all_slots() {
        assert_eq!(ALL_LINKS_MASK, 0x1f);
        assert_eq!(ALL_LINKS_MASK.count_ones() as usize, SOCKET_COUNT);
    }

    #[test]
    fn queue_budget_fits_one_max_chunk() {
        assert!(SOCKET_BUFSIZE > CIPSEND_MAX + PACKET_HEADER_SIZE);
    }
}
