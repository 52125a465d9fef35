//! CLOSE SECURE SESSION, its no-MAC abort form and the ratification command

use bytes::Bytes;
use calypso_apdu_core::{Command, Response};

use super::PoCommandRef;
use crate::{
    Error, Result,
    constants::{ins, params},
    revision::PoRevision,
};

/// Close the secure session with the terminal signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseSession {
    /// Terminal session signature computed by the SAM
    pub signature: Bytes,
    /// Ask for a ratification (ignored by revision 2.4 cards)
    pub ratification_requested: bool,
}

impl CloseSession {
    /// Create the command
    pub fn new(signature: impl Into<Bytes>, ratification_requested: bool) -> Self {
        Self {
            signature: signature.into(),
            ratification_requested,
        }
    }

    /// Encode the command for a revision
    ///
    /// Signatures are 4 bytes, or 8 bytes on revision 3.2 cards in extended
    /// mode. The ratification bit is only ever set for revision 3 cards.
    pub fn to_command(&self, revision: PoRevision) -> Result<Command> {
        match (self.signature.len(), revision) {
            (4, _) | (8, PoRevision::Rev3_2) => {}
            (len, _) => {
                return Err(Error::invalid_parameter(format!(
                    "signature of {len} bytes for a revision {revision} card"
                )));
            }
        }

        let p1 = if self.ratification_requested && revision.is_rev3() {
            params::CLOSE_RATIFICATION
        } else {
            0x00
        };
        Ok(Command::new_with_data(
            revision.class_byte(),
            ins::CLOSE_SESSION,
            p1,
            0x00,
            self.signature.clone(),
        ))
    }

    /// Check the status word and decode the card signature
    pub fn parse(&self, response: &Response) -> Result<CloseSessionData> {
        if !response.is_success() {
            return Err(Error::card_status(PoCommandRef::CloseSession, response.status()));
        }
        CloseSessionData::parse(response.payload(), self.signature.len())
    }
}

/// Decoded answer to CLOSE SECURE SESSION
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseSessionData {
    /// Card session signature, to be checked by the SAM
    pub signature: Bytes,
    /// Postponed data blocks returned before the signature
    pub postponed_data: Vec<Bytes>,
}

impl CloseSessionData {
    /// Decode `[length, data]* | signature`
    pub fn parse(data: &Bytes, signature_len: usize) -> Result<Self> {
        if data.len() < signature_len {
            return Err(Error::InvalidResponse("close session answer too short"));
        }
        let split = data.len() - signature_len;

        let mut postponed_data = Vec::new();
        let mut offset = 0;
        while offset < split {
            let len = usize::from(data[offset]);
            let end = offset + 1 + len;
            if end > split {
                return Err(Error::InvalidResponse("postponed data overlaps the signature"));
            }
            postponed_data.push(data.slice(offset + 1..end));
            offset = end;
        }

        Ok(Self {
            signature: data.slice(split..),
            postponed_data,
        })
    }
}

/// Abort the session without a MAC: `CLA 8E 00 00 00`
pub const fn abort_session(revision: PoRevision) -> Command {
    Command::new(revision.class_byte(), ins::CLOSE_SESSION, 0x00, 0x00).with_le(0x00)
}

/// Ratify the closed session: `CLA B2 00 00 00`
///
/// The card's answer is advisory; any status is acceptable.
pub const fn ratification(revision: PoRevision) -> Command {
    Command::new(revision.class_byte(), ins::READ_RECORDS, 0x00, 0x00).with_le(0x00)
}
