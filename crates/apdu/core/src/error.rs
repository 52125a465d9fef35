//! Core error type for APDU operations
//!
//! Every failure raised while encoding commands, decoding responses or moving
//! bytes through a [`CardTransport`](crate::CardTransport) ends up here.

use crate::transport::TransportError;

/// Result type for APDU operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure while exchanging an APDU
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response shorter than the two status bytes
    #[error("Incomplete response: {0} bytes")]
    IncompleteResponse(usize),

    /// Data field too long for a short APDU
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// Invalid command data
    #[error("Invalid command data: {0}")]
    InvalidCommandData(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_is_transparent() {
        let err = Error::from(TransportError::CardAbsent);
        assert_eq!(err.to_string(), "Card removed during exchange");
        assert!(matches!(err, Error::Transport(TransportError::CardAbsent)));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::IncompleteResponse(1).to_string(),
            "Incomplete response: 1 bytes"
        );
        assert_eq!(
            Error::InvalidCommandLength(256).to_string(),
            "Invalid command length: 256"
        );
    }
}
