//! Transport traits for APDU communication with cards
//!
//! A transport moves raw APDU bytes between the terminal and one card or SAM.
//! Reader plugins implement [`CardTransport::do_transmit_raw`]; everything
//! above the byte level is provided here.

pub mod error;

use std::fmt;

use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, trace};

use crate::{Command, Response, Result};

/// Trait for basic card transports
///
/// A transport is responsible for sending and receiving raw APDU bytes.
/// It has no knowledge of sessions, revisions or Calypso semantics. Timeouts
/// are the transport's own concern and surface as [`TransportError::Timeout`].
pub trait CardTransport: Send + fmt::Debug {
    /// Send raw APDU bytes to the card and return the response bytes
    ///
    /// Logs both directions as hex at trace level, then delegates to
    /// [`do_transmit_raw`](Self::do_transmit_raw).
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode_upper(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode_upper(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = %e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Encode a command, exchange it and split the answer into data and status
    fn transmit(&mut self, command: &Command) -> Result<Response> {
        command.validate()?;
        let raw = self.transmit_raw(&command.to_bytes())?;
        Response::from_bytes(&raw)
    }
}

impl<T: CardTransport + ?Sized> CardTransport for &mut T {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command)
    }
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command)
    }
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct MockTransport {
    pub(crate) responses: Vec<Bytes>,
    pub(crate) commands: Vec<Bytes>,
    pub(crate) connected: bool,
}

#[cfg(test)]
impl MockTransport {
    pub(crate) fn new(responses: Vec<Bytes>) -> Self {
        Self {
            responses,
            commands: Vec::new(),
            connected: true,
        }
    }
}

#[cfg(test)]
impl CardTransport for MockTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::CardAbsent);
        }

        self.commands.push(Bytes::copy_from_slice(command));

        if self.responses.is_empty() {
            return Err(TransportError::Transmission);
        }
        Ok(self.responses.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use hex_literal::hex;

    #[test]
    fn test_transmit_splits_response() {
        let mut transport = MockTransport::new(vec![Bytes::from_static(&hex!("0102039000"))]);
        let response = transport
            .transmit(&Command::new(0x00, 0xB2, 0x01, 0x0C).with_le(0))
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.payload().as_ref(), hex!("010203"));
        assert_eq!(transport.commands[0].as_ref(), hex!("00B2010C00"));
    }

    #[test]
    fn test_transmit_through_reference() {
        let mut transport = MockTransport::new(vec![Bytes::from_static(&hex!("6A82"))]);
        let response = (&mut transport)
            .transmit(&Command::new(0x00, 0xA4, 0x04, 0x00))
            .unwrap();
        assert_eq!(response.status(), crate::StatusWord::new(0x6A, 0x82));
        assert_eq!(transport.commands.len(), 1);
    }

    #[test]
    fn test_transport_errors_propagate() {
        let mut transport = MockTransport::new(Vec::new());
        transport.connected = false;
        let err = transport
            .transmit(&Command::new(0x00, 0x84, 0x00, 0x00).with_le(4))
            .unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::CardAbsent)));
        assert!(transport.commands.is_empty());
    }

    #[test]
    fn test_invalid_command_is_not_sent() {
        let mut transport = MockTransport::new(vec![Bytes::from_static(&hex!("9000"))]);
        let command = Command::new_with_data(0x00, 0xDC, 0x01, 0x0C, Bytes::new());
        assert!(transport.transmit(&command).is_err());
        assert!(transport.commands.is_empty());
    }
}
