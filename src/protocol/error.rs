//! Error taxonomy for the wire protocol

use std::io;
use thiserror::Error;

/// Violations of the protocol itself, as opposed to transport failures
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Bad magic: expected {expected:#06x}, found {found:#06x}")]
    BadMagic { expected: u16, found: u16 },

    #[error("Unknown message type tag: {0}")]
    UnknownType(u16),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

/// Errors raised while encoding or decoding messages
#[derive(Error, Debug)]
pub enum WireError {
    #[error("Stream read error: {0}")]
    Read(#[source] io::Error),

    /// The stream ended inside a message that needs at least `needed` bytes
    #[error("Stream read error: stream ended before {needed} bytes were available")]
    Incomplete { needed: usize },

    #[error("Stream write error: {0}")]
    Write(#[source] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

pub type WireResult<T> = Result<T, WireError>;

/// How the application layer should react to a [`WireError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The transport failed; reconnecting and retrying the call may succeed
    Transport,
    /// The stream no longer lines up with message boundaries
    Desync,
    /// The peer speaks a protocol version this side does not know
    VersionSkew,
    /// A payload was internally inconsistent
    Corrupt,
}

impl WireError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        WireError::Protocol(ProtocolError::MalformedPayload(reason.into()))
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            WireError::Read(_) | WireError::Incomplete { .. } | WireError::Write(_) => {
                ErrorClass::Transport
            }
            WireError::Protocol(ProtocolError::BadMagic { .. }) => ErrorClass::Desync,
            WireError::Protocol(ProtocolError::UnknownType(_)) => ErrorClass::VersionSkew,
            WireError::Protocol(ProtocolError::MalformedPayload(_)) => ErrorClass::Corrupt,
        }
    }

    /// True when the stream ended before the requested bytes arrived
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            WireError::Incomplete { .. } => true,
            WireError::Read(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }

    /// Lower bound on the bytes, counted from the start of the message, that
    /// must be buffered before decoding can get further
    pub fn needed(&self) -> Option<usize> {
        match self {
            WireError::Incomplete { needed } => Some(*needed),
            _ => None,
        }
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, WireError::Protocol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let eof = WireError::Read(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert_eq!(eof.class(), ErrorClass::Transport);
        assert!(eof.is_end_of_stream());

        let short = WireError::Incomplete { needed: 12 };
        assert_eq!(short.class(), ErrorClass::Transport);
        assert!(short.is_end_of_stream());
        assert_eq!(short.needed(), Some(12));
        assert_eq!(eof.needed(), None);

        let magic = WireError::from(ProtocolError::BadMagic { expected: 1, found: 2 });
        assert_eq!(magic.class(), ErrorClass::Desync);
        assert!(!magic.is_end_of_stream());

        assert_eq!(
            WireError::from(ProtocolError::UnknownType(99)).class(),
            ErrorClass::VersionSkew
        );
        assert_eq!(WireError::malformed("bad").class(), ErrorClass::Corrupt);
    }

    #[test]
    fn test_bad_magic_display() {
        let err = ProtocolError::BadMagic { expected: 0xD00D, found: 0x00FF };
        assert_eq!(err.to_string(), "Bad magic: expected 0xd00d, found 0x00ff");
    }
}
