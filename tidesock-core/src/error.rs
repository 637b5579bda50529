//! Error types for Tidesock
//!
//! This module defines all error types used throughout the Tidesock library.
//! Errors are designed to be ergonomic and provide clear context for debugging.

#![allow(missing_docs)]

use thiserror::Error;

/// Result type alias for Tidesock operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for Tidesock operations
#[derive(Error, Debug)]
pub enum Error {
    /// Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Frame errors
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Handshake errors
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// URL errors
    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection-level errors (dropped, short write, unexpected EOF)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation attempted on an endpoint with no live connection
    #[error("Endpoint is not connected")]
    NotConnected,
}

impl Error {
    /// Check whether this error is a non-blocking "no data yet" outcome
    /// rather than a real failure.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::WouldBlock)
    }
}

/// WebSocket protocol violations observed on the receive path
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    /// Server frames must arrive unmasked
    #[error("Received a masked frame from the server")]
    MaskedServerFrame,

    /// Continuation frame with no fragmented message in progress
    #[error("Unexpected continuation frame")]
    UnexpectedContinuation,

    /// New data frame while a fragmented message is still being assembled
    #[error("Expected continuation frame, got {0:?}")]
    ExpectedContinuation(crate::protocol::Opcode),
}

/// Frame parsing and encoding errors
#[derive(Error, Debug, Clone)]
pub enum FrameError {
    /// Insufficient data to parse frame
    #[error("Insufficient data: need {needed} bytes, have {have}")]
    InsufficientData { needed: usize, have: usize },

    /// Invalid opcode
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Reserved bits set
    #[error("Reserved bits set in frame")]
    ReservedBitsSet,

    /// Control frames cannot be fragmented
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload over the 125-byte limit
    #[error("Control frame payload too large: {len} bytes")]
    ControlPayloadTooLarge { len: usize },
}

/// Opening handshake errors
#[derive(Error, Debug, Clone)]
pub enum HandshakeError {
    /// Server answered with something other than 101 Switching Protocols
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),

    /// Missing required headers
    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    /// Accept key did not match the expected digest
    #[error("Invalid Sec-WebSocket-Accept - expected: {expected}, received: {received}")]
    InvalidAcceptKey { expected: String, received: String },

    /// Malformed response
    #[error("Invalid handshake response: {0}")]
    InvalidResponse(String),

    /// Server response exceeded the header size cap
    #[error("Handshake response too large")]
    ResponseTooLarge,
}

/// `ws`/`wss` URL parsing errors
#[derive(Error, Debug, Clone)]
pub enum UrlError {
    /// Scheme was not `ws` or `wss`
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// No host component present
    #[error("Missing host in URL")]
    MissingHost,

    /// Port component did not parse as a u16
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// Anything else that does not look like `scheme://host[:port]`
    #[error("Invalid URL: {0}")]
    InvalidFormat(String),
}

/// Configuration errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// WebSocket close codes as defined in RFC 6455
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// Normal closure
    Normal,
    /// Going away
    Away,
    /// Protocol error
    ProtocolError,
    /// Unsupported data
    Unsupported,
    /// Invalid frame payload data
    InvalidPayload,
    /// Policy violation
    PolicyViolation,
    /// Message too big
    TooBig,
    /// Internal error
    Internal,
    /// Any other code carried on the wire
    Other(u16),
}

impl CloseCode {
    /// Create a CloseCode from a u16
    pub fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::Away,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::Unsupported,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::TooBig,
            1011 => CloseCode::Internal,
            code => CloseCode::Other(code),
        }
    }

    /// Get the numeric value of the close code
    pub fn code(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::TooBig => 1009,
            CloseCode::Internal => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check if this close code indicates an error
    pub fn is_error(&self) -> bool {
        !matches!(self, CloseCode::Normal | CloseCode::Away)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_code_conversion() {
        assert_eq!(CloseCode::from_u16(1000), CloseCode::Normal);
        assert_eq!(CloseCode::from_u16(1011), CloseCode::Internal);
        assert_eq!(CloseCode::from_u16(4000), CloseCode::Other(4000));
        assert_eq!(CloseCode::from_u16(1002).code(), 1002);
        assert!(CloseCode::ProtocolError.is_error());
        assert!(!CloseCode::Normal.is_error());
    }

    #[test]
    fn test_would_block_detection() {
        let err = Error::Io(std::io::Error::from(std::io::ErrorKind::WouldBlock));
        assert!(err.is_would_block());

        let err = Error::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(!err.is_would_block());
        assert!(!Error::NotConnected.is_would_block());
    }

    #[test]
    fn test_error_display() {
        let err = Error::Protocol(ProtocolError::MaskedServerFrame);
        assert!(err.to_string().contains("masked frame"));
    }
}
