//! Error types for Calypso transactions

use calypso_apdu_core::{StatusWord, TransportError};
use derive_more::Display;
use thiserror::Error;

use crate::{
    commands::PoCommandRef,
    revision::PoRevision,
    sam::commands::SamCommandRef,
};

/// Result type for Calypso operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of a rejecting status word
///
/// Lets the caller decide between retrying, closing and cancelling without
/// matching raw status words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StatusKind {
    /// The access conditions of the file forbid the command
    #[display("access forbidden")]
    AccessForbidden,
    /// The targeted file is missing or of the wrong structure
    #[display("data access")]
    DataAccess,
    /// The record or offset lies outside the file
    #[display("data out of bounds")]
    DataOutOfBounds,
    /// P1, P2, Lc or the data field were rejected
    #[display("illegal parameter")]
    IllegalParameter,
    /// The command needs a session or key the card does not have
    #[display("security context")]
    SecurityContext,
    /// A signature, key or cryptogram was rejected
    #[display("security data")]
    SecurityData,
    /// The session modifications buffer is full
    #[display("session buffer overflow")]
    SessionBufferOverflow,
    /// Wrong or blocked PIN
    #[display("pin")]
    Pin,
    /// The application has been invalidated
    #[display("terminated")]
    Terminated,
    /// Any other status
    #[display("unknown")]
    Unknown,
}

impl StatusKind {
    /// Classify a status word returned by a portable object
    pub const fn classify(status: StatusWord) -> Self {
        match (status.sw1, status.sw2) {
            (0x69, 0x85) => Self::AccessForbidden,
            (0x69, 0x81) | (0x69, 0x86) | (0x6A, 0x82) => Self::DataAccess,
            (0x6A, 0x83) => Self::DataOutOfBounds,
            (0x67, 0x00) | (0x6A, 0x80) | (0x6A, 0x87) | (0x6B, 0x00) | (0x6D, 0x00) => {
                Self::IllegalParameter
            }
            (0x69, 0x82) | (0x6A, 0x88) => Self::SecurityContext,
            (0x69, 0x88) => Self::SecurityData,
            (0x64, 0x00) => Self::SessionBufferOverflow,
            (0x69, 0x83) => Self::Pin,
            (0x63, sw2) if (sw2 & 0xF0) == 0xC0 => Self::Pin,
            (0x62, 0x83) | (0x69, 0x84) => Self::Terminated,
            _ => Self::Unknown,
        }
    }
}

/// Error type for Calypso operations
#[derive(Debug, Error)]
pub enum Error {
    /// APDU encoding or decoding error
    #[error(transparent)]
    Apdu(calypso_apdu_core::Error),

    /// Transport failure while talking to the portable object
    #[error("Card transport error: {0}")]
    Transport(TransportError),

    /// A command parameter is empty, undersized or out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A session exchange does not fit one DIGEST UPDATE
    #[error("Session exchange of {length} bytes cannot be digested")]
    DigestTooLong {
        /// Length of the request or response
        length: usize,
    },

    /// The command does not exist for the bound revision
    #[error("{command} is not supported by revision {revision} cards")]
    UnsupportedCommand {
        /// Rejected command
        command: PoCommandRef,
        /// Revision the command was built for
        revision: PoRevision,
    },

    /// A raw command carries a class byte foreign to the bound revision
    #[error("Class byte {actual:#04X} does not match {expected:#04X}")]
    ClassMismatch {
        /// Class byte required by the revision
        expected: u8,
        /// Class byte found in the command
        actual: u8,
    },

    /// A command built for one revision was sent in a session of another
    #[error("Command built for revision {actual} used in a revision {expected} session")]
    RevisionMismatch {
        /// Revision of the running session
        expected: PoRevision,
        /// Revision the command was built for
        actual: PoRevision,
    },

    /// The application subtype maps to no known revision
    #[error("Unknown application subtype {0:#04X}")]
    UnknownApplicationSubtype(u8),

    /// Inconsistent transaction settings
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Settings could not be loaded
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// The portable object rejected a command
    #[error("{command} failed with status {status} ({kind}): {message}")]
    CardStatus {
        /// Command that was rejected
        command: PoCommandRef,
        /// Status word returned by the card
        status: StatusWord,
        /// Classification of the status word
        kind: StatusKind,
        /// Human readable description of the status word
        message: &'static str,
    },

    /// The SAM did not accept the card's session signature
    #[error("SAM rejected the card signature")]
    AuthenticationFailed,

    /// The SAM rejected a command
    #[error("SAM {command} failed with status {status}: {}", .status.description())]
    SamStatus {
        /// Command that was rejected
        command: SamCommandRef,
        /// Status word returned by the SAM
        status: StatusWord,
    },

    /// Transport failure while talking to the SAM
    #[error("SAM transport error: {0}")]
    SamTransport(#[source] TransportError),

    /// Operation invoked in a state that does not allow it
    #[error("Cannot {operation} while {state}")]
    IllegalState {
        /// Attempted operation
        operation: &'static str,
        /// State at the time of the call
        state: String,
    },

    /// A modifying command would overflow the session modifications buffer
    #[error("Session buffer overflow: {required} needed, {remaining} remaining")]
    SessionBufferOverflow {
        /// Units the command requires
        required: usize,
        /// Units left in the session
        remaining: usize,
    },

    /// The session key version is not in the authorized list
    #[error("Session key version {0:#04X} is not authorized")]
    UnauthorizedKvc(u8),

    /// Another session holds the shared SAM
    #[error("SAM is in use by another session")]
    SamBusy,

    /// The response data does not have the expected layout
    #[error("Invalid response: {0}")]
    InvalidResponse(&'static str),
}

impl Error {
    /// Create an invalid parameter error
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Build the card status error for a rejected command
    pub const fn card_status(command: PoCommandRef, status: StatusWord) -> Self {
        Self::CardStatus {
            command,
            status,
            kind: StatusKind::classify(status),
            message: status.description(),
        }
    }

    /// Create an illegal state error
    pub fn illegal_state(operation: &'static str, state: impl ToString) -> Self {
        Self::IllegalState {
            operation,
            state: state.to_string(),
        }
    }

    /// Convert a core error raised while exchanging with the SAM
    pub(crate) fn from_sam(err: calypso_apdu_core::Error) -> Self {
        match err {
            calypso_apdu_core::Error::Transport(e) => Self::SamTransport(e),
            other => Self::Apdu(other),
        }
    }

    /// Whether sending the same command again may succeed
    ///
    /// Only transient card transport failures qualify. A transaction never
    /// retries on its own; once a session is open any transport failure ends
    /// it, so retrying only makes sense before `open_session` succeeded.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_transient())
    }

    /// Whether the error came from a transport, card side or SAM side
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::SamTransport(_))
    }

    /// Classification of a card status error
    pub const fn status_kind(&self) -> Option<StatusKind> {
        match self {
            Self::CardStatus { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<calypso_apdu_core::Error> for Error {
    fn from(err: calypso_apdu_core::Error) -> Self {
        match err {
            calypso_apdu_core::Error::Transport(e) => Self::Transport(e),
            other => Self::Apdu(other),
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
