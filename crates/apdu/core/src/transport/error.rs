//! Error types specific to card transport

use thiserror::Error;

/// Failure reported by a transport while exchanging raw APDU bytes
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection error
    #[error("Failed to connect to card")]
    Connection,

    /// Transmission error
    #[error("Failed to transmit data")]
    Transmission,

    /// The card left the reader field mid-exchange
    #[error("Card removed during exchange")]
    CardAbsent,

    /// No answer within the transport's deadline
    #[error("Operation timed out")]
    Timeout,

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a general other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }

    /// Whether the exchange may succeed if sent again on the same link
    ///
    /// A missing card or a broken connection never recovers by itself.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transmission | Self::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(TransportError::Timeout.is_transient());
        assert!(TransportError::Transmission.is_transient());
        assert!(!TransportError::CardAbsent.is_transient());
        assert!(!TransportError::other("reader unplugged").is_transient());
        assert_eq!(TransportError::other("reader unplugged").to_string(), "reader unplugged");
    }
}
