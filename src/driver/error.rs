//! Error types for the ESP AT driver
//!
//! Errors are organized by the layer that produces them:
//! - [`AtError`]: command/response exchanges with the modem
//! - [`FrameError`]: `+IPD` data frame headers
//! - [`QueueError`]: inbound packet queue admission
//! - [`SocketError`]: socket façade state and argument checks
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most driver methods.

// =============================================================================
// AT Command Errors
// =============================================================================

/// AT command exchange errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AtError {
    /// No terminator seen before the deadline
    Timeout,
    /// Modem answered with `ERROR` or `FAIL`
    ModemError,
    /// Formatted command does not fit the command buffer
    CommandOverflow,
    /// Reply did not contain the expected fields
    InvalidResponse,
    /// Argument rejected before anything was sent
    InvalidArgument,
}

impl core::fmt::Display for AtError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AtError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AtError::Timeout => "response timed out",
            AtError::ModemError => "modem reported error",
            AtError::CommandOverflow => "command too long",
            AtError::InvalidResponse => "unexpected response format",
            AtError::InvalidArgument => "invalid command argument",
        }
    }
}

// =============================================================================
// Frame Errors
// =============================================================================

/// `+IPD` frame header errors
///
/// A header error leaves the payload bytes unread on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Header fields could not be parsed
    MalformedHeader,
    /// `+IPD,` seen but no `:` before timeout or buffer end
    IncompleteHeader,
    /// Link id outside the multiplexed range
    InvalidLinkId,
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FrameError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            FrameError::MalformedHeader => "malformed +IPD header",
            FrameError::IncompleteHeader => "incomplete +IPD header",
            FrameError::InvalidLinkId => "invalid link id",
        }
    }
}

// =============================================================================
// Queue Errors
// =============================================================================

/// Inbound packet queue admission errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    /// Byte budget would be exceeded
    ResourceExhausted,
    /// Packet slots exhausted
    QueueFull,
}

impl core::fmt::Display for QueueError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl QueueError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            QueueError::ResourceExhausted => "packet buffer exhausted",
            QueueError::QueueFull => "packet queue full",
        }
    }
}

// =============================================================================
// Socket Errors
// =============================================================================

/// Socket façade errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketError {
    /// All link slots are in use
    NoFreeSlot,
    /// Link is not connected
    NotConnected,
    /// Socket is already connected
    AlreadyConnected,
    /// Local port bound by another socket
    AddressInUse,
    /// Operation not supported for this protocol
    Unsupported,
    /// A server is already registered
    ServerBusy,
    /// Socket is not a listening server
    NotListening,
    /// Unusable address (unspecified IP or port 0)
    InvalidAddress,
    /// Option value out of range or not settable now
    InvalidOption,
    /// Payload exceeds a single datagram
    ProtocolLimitExceeded,
}

impl core::fmt::Display for SocketError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SocketError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SocketError::NoFreeSlot => "no free socket slot",
            SocketError::NotConnected => "socket not connected",
            SocketError::AlreadyConnected => "socket already connected",
            SocketError::AddressInUse => "address in use",
            SocketError::Unsupported => "operation not supported",
            SocketError::ServerBusy => "server already active",
            SocketError::NotListening => "socket not listening",
            SocketError::InvalidAddress => "invalid address",
            SocketError::InvalidOption => "invalid socket option",
            SocketError::ProtocolLimitExceeded => "payload exceeds protocol limit",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::At(AtError::Timeout)) => { /* retry later */ }
///     Err(Error::Socket(SocketError::NoFreeSlot)) => { /* close something */ }
///     Err(Error::Frame(_)) => { /* stream desync, consider reset() */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// AT command error
    At(AtError),
    /// `+IPD` frame error
    Frame(FrameError),
    /// Packet queue error
    Queue(QueueError),
    /// Socket error
    Socket(SocketError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::At(e) => write!(f, "at: {}", e.as_str()),
            Error::Frame(e) => write!(f, "frame: {}", e.as_str()),
            Error::Queue(e) => write!(f, "queue: {}", e.as_str()),
            Error::Socket(e) => write!(f, "socket: {}", e.as_str()),
        }
    }
}

impl From<AtError> for Error {
    fn from(e: AtError) -> Self {
        Error::At(e)
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Error::Frame(e)
    }
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Error::Queue(e)
    }
}

impl From<SocketError> for Error {
    fn from(e: SocketError) -> Self {
        Error::Socket(e)
    }
}

/// Result type alias for driver operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for AT command exchanges
pub type AtResult<T> = core::result::Result<T, AtError>;

/// Result type alias for `+IPD` header parsing
pub type FrameResult<T> = core::result::Result<T, FrameError>;

/// Result type alias for packet queue admission
pub type QueueResult<T> = core::result::Result<T, QueueError>;

/// Result type alias for socket façade checks
pub type SocketResult<T> = core::result::Result<T, SocketError>;

// =============================================================================
// Unit Tests
// =============================================================================
