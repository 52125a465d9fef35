//! APDU response definitions
//!
//! This module provides the response type returned by a card or SAM, split
//! into data-out and the trailing status word.

pub mod status;

use bytes::Bytes;
use tracing::trace;

use crate::Error;
use status::StatusWord;

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response payload data (may be empty)
    payload: Bytes,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a new response with payload and status
    pub fn new(payload: impl Into<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            payload: payload.into(),
            status: status.into(),
        }
    }

    /// Create a success response
    pub fn success(payload: impl Into<Bytes>) -> Self {
        Self::new(payload, status::common::SUCCESS)
    }

    /// Parse response from raw bytes (including status word)
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        let (status, payload) = extract_status_and_payload(data)?;

        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = payload.len(),
            "Parsed APDU response"
        );

        Ok(Self {
            payload: Bytes::copy_from_slice(payload),
            status,
        })
    }

    /// Get the response payload data
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Get the status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Check if the response carries the plain success status (90 00)
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if the status word belongs to a command's declared success set
    pub fn is_success_in(&self, accepted: &[StatusWord]) -> bool {
        accepted.contains(&self.status)
    }
}

/// Extract status word and payload from raw APDU response data
///
/// # Errors
/// Returns an error if the data is too short to contain a valid status word.
pub fn extract_status_and_payload(data: &[u8]) -> Result<(StatusWord, &[u8]), Error> {
    match data {
        [payload @ .., sw1, sw2] => Ok((StatusWord::new(*sw1, *sw2), payload)),
        _ => Err(Error::IncompleteResponse(data.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_from_bytes() {
        let response = Response::from_bytes(&hex!("0A0B0C9000")).unwrap();
        assert_eq!(response.payload().as_ref(), hex!("0A0B0C"));
        assert!(response.is_success());

        let response = Response::from_bytes(&hex!("6A83")).unwrap();
        assert!(response.payload().is_empty());
        assert_eq!(response.status(), StatusWord::new(0x6A, 0x83));
        assert!(!response.is_success());

        assert!(matches!(
            Response::from_bytes(&hex!("90")),
            Err(Error::IncompleteResponse(1))
        ));
    }

    #[test]
    fn test_counter_warning_keeps_data() {
        let response = Response::from_bytes(&hex!("030490AB6103")).unwrap();
        assert_eq!(response.payload().as_ref(), hex!("030490AB"));
        assert_eq!(response.status(), StatusWord::from_u16(0x6103));
    }

    #[test]
    fn test_success_set() {
        let response = Response::new(hex!("000102").to_vec(), 0x6103_u16);
        assert!(!response.is_success());
        assert!(response.is_success_in(&[status::common::SUCCESS, StatusWord::from_u16(0x6103)]));
        assert!(!response.is_success_in(&[status::common::SUCCESS]));
    }
}
