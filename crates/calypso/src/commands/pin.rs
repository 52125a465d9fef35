//! VERIFY PIN
//!
//! Revision 2.4 cards have no PIN commands. The PIN is sent in plain; PIN
//! encryption through the SAM is not offered.

use bytes::Bytes;
use calypso_apdu_core::{Command, StatusWord};

use super::{Decoder, PoCommandRef, PreparedCommand};
use crate::{
    Error, Result,
    constants::{ins, limits, status},
    revision::PoRevision,
};

/// Present a PIN, or read the presentation counter when no PIN is given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyPin {
    pin: Option<Bytes>,
}

impl VerifyPin {
    /// Present a 4-byte PIN
    pub fn present(pin: impl Into<Bytes>) -> Self {
        Self {
            pin: Some(pin.into()),
        }
    }

    /// Read the PIN status without presenting anything
    pub const fn read_status() -> Self {
        Self { pin: None }
    }

    /// Encode the command for a revision
    pub fn build(&self, revision: PoRevision) -> Result<PreparedCommand> {
        revision.ensure_supports(PoCommandRef::VerifyPin)?;
        let class = revision.class_byte();

        match &self.pin {
            Some(pin) => {
                if pin.len() != limits::PIN_LENGTH {
                    return Err(Error::invalid_parameter(format!(
                        "PIN must be {} bytes, got {}",
                        limits::PIN_LENGTH,
                        pin.len()
                    )));
                }
                let command = Command::new_with_data(class, ins::VERIFY_PIN, 0x00, 0x00, pin.clone());
                PreparedCommand::new(revision, PoCommandRef::VerifyPin, command, Decoder::Pin)
            }
            None => {
                let command = Command::new(class, ins::VERIFY_PIN, 0x00, 0x00);
                Ok(
                    PreparedCommand::new(revision, PoCommandRef::VerifyPin, command, Decoder::Pin)?
                        .with_success(&[
                            status::SUCCESS,
                            status::PIN_TWO_ATTEMPTS,
                            status::PIN_ONE_ATTEMPT,
                            status::PIN_BLOCKED,
                        ]),
                )
            }
        }
    }
}

/// PIN presentation state reported by the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinStatus {
    /// Presentations left before the PIN is blocked
    pub remaining_attempts: u8,
}

impl PinStatus {
    /// Attempts available on a fresh PIN
    pub const MAX_ATTEMPTS: u8 = 3;

    pub(crate) const fn from_status(status: StatusWord) -> Self {
        let remaining_attempts = match (status.sw1, status.sw2) {
            (0x69, 0x83) => 0,
            _ => match status.remaining_attempts() {
                Some(n) => n,
                None => Self::MAX_ATTEMPTS,
            },
        };
        Self { remaining_attempts }
    }

    /// Whether the PIN can no longer be presented
    pub const fn is_blocked(&self) -> bool {
        self.remaining_attempts == 0
    }
}
