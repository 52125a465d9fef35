//! SAM commands used by the secure session digest

use bytes::{BufMut, Bytes, BytesMut};
use calypso_apdu_core::{Command, command::MAX_SHORT_DATA};
use derive_more::Display;

use crate::{
    Error, Result,
    constants::{params, sam_ins},
    revision::SamRevision,
};

/// Identity of a SAM command, used in errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SamCommandRef {
    /// SELECT DIVERSIFIER
    #[display("Select Diversifier")]
    SelectDiversifier,
    /// GET CHALLENGE
    #[display("Get Challenge")]
    GetChallenge,
    /// DIGEST INIT
    #[display("Digest Init")]
    DigestInit,
    /// DIGEST UPDATE
    #[display("Digest Update")]
    DigestUpdate,
    /// DIGEST CLOSE
    #[display("Digest Close")]
    DigestClose,
    /// DIGEST AUTHENTICATE
    #[display("Digest Authenticate")]
    DigestAuthenticate,
}

/// Parameters of DIGEST INIT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestInit {
    /// Verification mode
    pub verification_mode: bool,
    /// Revision 3.2 session
    pub rev3_2_mode: bool,
    /// 8-byte signatures
    pub extended: bool,
    /// Session key identifier
    pub kif: u8,
    /// Session key version
    pub kvc: u8,
    /// Data-out of OPEN SECURE SESSION
    pub open_session_data: Bytes,
}

impl DigestInit {
    /// Length of the session signatures this digest produces and checks
    pub const fn signature_length(&self) -> u8 {
        if self.extended { 8 } else { 4 }
    }
}

/// SELECT DIVERSIFIER with the application serial number
pub fn select_diversifier(revision: SamRevision, serial: &[u8]) -> Result<Command> {
    if !matches!(serial.len(), 4 | 8) {
        return Err(Error::invalid_parameter(format!(
            "diversifier must be 4 or 8 bytes, got {}",
            serial.len()
        )));
    }
    Ok(Command::new_with_data(
        revision.class_byte(),
        sam_ins::SELECT_DIVERSIFIER,
        0x00,
        0x00,
        Bytes::copy_from_slice(serial),
    ))
}

/// GET CHALLENGE for a 4 or 8 byte terminal challenge
pub fn get_challenge(revision: SamRevision, length: u8) -> Result<Command> {
    check_length(length)?;
    Ok(Command::new(revision.class_byte(), sam_ins::GET_CHALLENGE, 0x00, 0x00).with_le(length))
}

/// DIGEST INIT: `P1 = verification | rev3.2`, `P2 = FF`, data `KIF KVC open data`
pub fn digest_init(revision: SamRevision, init: &DigestInit) -> Result<Command> {
    if init.open_session_data.is_empty() || init.open_session_data.len() + 2 > MAX_SHORT_DATA {
        return Err(Error::invalid_parameter(format!(
            "open session data of {} bytes cannot be digested",
            init.open_session_data.len()
        )));
    }

    let mut p1 = 0x00;
    if init.verification_mode {
        p1 |= params::DIGEST_VERIFICATION;
    }
    if init.rev3_2_mode {
        p1 |= params::DIGEST_REV3_2;
    }

    let mut data = BytesMut::with_capacity(2 + init.open_session_data.len());
    data.put_u8(init.kif);
    data.put_u8(init.kvc);
    data.put_slice(&init.open_session_data);

    Ok(Command::new_with_data(
        revision.class_byte(),
        sam_ins::DIGEST_INIT,
        p1,
        params::DIGEST_KIF_KVC,
        data.freeze(),
    ))
}

/// DIGEST UPDATE with one request or one response
pub fn digest_update(revision: SamRevision, message: &[u8]) -> Result<Command> {
    if message.is_empty() {
        return Err(Error::invalid_parameter("empty digest message"));
    }
    if message.len() > MAX_SHORT_DATA {
        return Err(Error::DigestTooLong {
            length: message.len(),
        });
    }
    Ok(Command::new_with_data(
        revision.class_byte(),
        sam_ins::DIGEST_UPDATE,
        0x00,
        0x00,
        Bytes::copy_from_slice(message),
    ))
}

/// DIGEST CLOSE, returning the terminal signature
pub fn digest_close(revision: SamRevision, signature_length: u8) -> Result<Command> {
    check_length(signature_length)?;
    Ok(Command::new(revision.class_byte(), sam_ins::DIGEST_CLOSE, 0x00, 0x00).with_le(signature_length))
}

/// DIGEST AUTHENTICATE with the card signature
pub fn digest_authenticate(revision: SamRevision, signature: &[u8]) -> Result<Command> {
    check_length(u8::try_from(signature.len()).unwrap_or(u8::MAX))?;
    Ok(Command::new_with_data(
        revision.class_byte(),
        sam_ins::DIGEST_AUTHENTICATE,
        0x00,
        0x00,
        Bytes::copy_from_slice(signature),
    ))
}

fn check_length(length: u8) -> Result<()> {
    if matches!(length, 4 | 8) {
        Ok(())
    } else {
        Err(Error::invalid_parameter(format!(
            "length must be 4 or 8, got {length}"
        )))
    }
}
