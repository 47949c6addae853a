//! Error types for the receive side of the WebSocket protocol.
//!
//! Every failure the receiver can report maps onto an RFC 6455 close code
//! via [`Error::close_code`]. Errors are terminal for the receiver that
//! produced them: after the `on_error` callback fires, the receiver is dead
//! and further input is discarded.

use thiserror::Error;

/// Result type alias for receiver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported through the receiver's `on_error` callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Generic protocol violation not covered by a more specific variant.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// RSV bits set without a negotiated extension that defines them.
    #[error("reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Reserved opcode used (0x3-0x7, 0xB-0xF).
    #[error("reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame with FIN=0 (RFC 6455 forbids fragmenting them).
    #[error("control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload exceeds the 125-byte ceiling.
    #[error("control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(u64),

    /// Continuation frame arrived with no message in flight.
    #[error("unexpected continuation frame")]
    UnexpectedContinuation,

    /// New data frame arrived while a fragmented message was still open.
    #[error("expected continuation frame")]
    ExpectedContinuation,

    /// Invalid UTF-8 in a text message or a close reason.
    #[error("invalid UTF-8 in text payload")]
    InvalidUtf8,

    /// Cumulative message payload exceeds the configured maximum.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Projected or observed payload size.
        size: u64,
        /// Configured cap.
        max: u64,
    },

    /// Failure inside the permessage-deflate collaborator.
    #[error("extension error: {0}")]
    Extension(String),
}

impl Error {
    /// The RFC 6455 close code this error maps to.
    ///
    /// Protocol-shape violations report 1002, bad payload data 1007, and
    /// size-cap violations 1009. Extension failures that are not size caps
    /// are corrupt-stream conditions and report 1007.
    #[must_use]
    pub fn close_code(&self) -> u16 {
        match self {
            Error::Protocol(_)
            | Error::ReservedBitsSet
            | Error::ReservedOpcode(_)
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::UnexpectedContinuation
            | Error::ExpectedContinuation => 1002,
            Error::InvalidUtf8 | Error::Extension(_) => 1007,
            Error::MessageTooLarge { .. } => 1009,
        }
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(_: std::string::FromUtf8Error) -> Self {
        Error::InvalidUtf8
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
