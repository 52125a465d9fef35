//! OPEN SECURE SESSION
//!
//! The command layout and the answer layout differ for each card revision:
//!
//! | Revision | P1 | P2 | Data | Le |
//! |---|---|---|---|---|
//! | 2.4 | `0x80 + rec*8 + key` | `sfi*8` | challenge | none |
//! | 3.1 | `rec*8 + key` | `sfi*8 + 1` | challenge | 0 |
//! | 3.2 | `rec*8 + key` | `sfi*8 + 2` | mode byte, challenge | 0 |

use bytes::{BufMut, Bytes, BytesMut};
use calypso_apdu_core::{Command, Response};

use super::{PoCommandRef, check_sfi};
use crate::{
    Error, Result,
    config::SessionAccessLevel,
    constants::{ins, limits, params},
    revision::PoRevision,
};

/// Open a secure session, optionally reading one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSession {
    /// Session key to use
    pub access_level: SessionAccessLevel,
    /// SFI of the record read at opening, 0 for none
    pub sfi: u8,
    /// Record read at opening, 0 for none
    pub record: u8,
    /// Terminal challenge obtained from the SAM
    pub challenge: Bytes,
    /// Revision 3.2 extended mode
    pub extended: bool,
}

impl OpenSession {
    /// Create the command
    pub fn new(access_level: SessionAccessLevel, sfi: u8, record: u8, challenge: impl Into<Bytes>) -> Self {
        Self {
            access_level,
            sfi,
            record,
            challenge: challenge.into(),
            extended: false,
        }
    }

    /// Enable revision 3.2 extended mode
    pub const fn with_extended_mode(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }

    /// Terminal challenge length expected by a revision
    pub const fn challenge_length(revision: PoRevision, extended: bool) -> u8 {
        match revision {
            PoRevision::Rev3_2 if extended => 8,
            _ => 4,
        }
    }

    /// Check the parameters that do not depend on the challenge
    ///
    /// Runs before the terminal challenge is requested, so a bad SFI or
    /// record number never consumes a SAM challenge.
    pub fn check(revision: PoRevision, sfi: u8, record: u8, extended: bool) -> Result<()> {
        check_sfi(sfi)?;
        if extended && revision != PoRevision::Rev3_2 {
            return Err(Error::invalid_parameter(format!(
                "extended mode on a revision {revision} card"
            )));
        }

        let max_record = match revision {
            PoRevision::Rev2_4 => limits::MAX_OPEN_RECORD_REV2_4,
            PoRevision::Rev3_1 | PoRevision::Rev3_2 => limits::MAX_OPEN_RECORD_REV3,
        };
        if record > max_record {
            return Err(Error::invalid_parameter(format!(
                "record {record} above {max_record} at session opening"
            )));
        }
        Ok(())
    }

    /// Encode the command for a revision
    pub fn to_command(&self, revision: PoRevision) -> Result<Command> {
        Self::check(revision, self.sfi, self.record, self.extended)?;
        let expected = Self::challenge_length(revision, self.extended);
        if self.challenge.len() != usize::from(expected) {
            return Err(Error::invalid_parameter(format!(
                "challenge must be {expected} bytes, got {}",
                self.challenge.len()
            )));
        }

        let class = revision.class_byte();
        let key = self.access_level.key_index();
        let p1 = (self.record << 3) | key;
        let sfi = self.sfi << 3;

        let command = match revision {
            PoRevision::Rev2_4 => Command::new_with_data(
                class,
                ins::OPEN_SESSION,
                params::OPEN_REV2_4 | p1,
                sfi,
                self.challenge.clone(),
            ),
            PoRevision::Rev3_1 => Command::new_with_data(
                class,
                ins::OPEN_SESSION,
                p1,
                sfi | params::OPEN_REV3_1,
                self.challenge.clone(),
            )
            .with_le(0x00),
            PoRevision::Rev3_2 => {
                let mut data = BytesMut::with_capacity(1 + self.challenge.len());
                data.put_u8(u8::from(self.extended));
                data.put_slice(&self.challenge);
                Command::new_with_data(
                    class,
                    ins::OPEN_SESSION,
                    p1,
                    sfi | params::OPEN_REV3_2,
                    data.freeze(),
                )
                .with_le(0x00)
            }
        };
        Ok(command)
    }

    /// Check the status word and decode the answer
    pub fn parse(&self, revision: PoRevision, response: &Response) -> Result<OpenSessionData> {
        if !response.is_success() {
            return Err(Error::card_status(PoCommandRef::OpenSession, response.status()));
        }
        OpenSessionData::parse(revision, response.payload())
    }
}

/// Decoded answer to OPEN SECURE SESSION
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSessionData {
    /// Card transaction counter
    pub transaction_counter: u32,
    /// Card challenge: transaction counter followed by the card random
    pub card_challenge: Bytes,
    /// Whether the previous session was ratified
    pub previous_session_ratified: bool,
    /// Whether the card allows managing the session (revision 3.2)
    pub manage_secure_session_authorized: bool,
    /// Session key identifier, not reported by revision 2.4 cards
    pub kif: Option<u8>,
    /// Session key version
    pub kvc: u8,
    /// Content of the record read at opening
    pub record_data: Bytes,
}

impl OpenSessionData {
    /// Decode the data-out of OPEN SECURE SESSION
    pub fn parse(revision: PoRevision, data: &Bytes) -> Result<Self> {
        match revision {
            PoRevision::Rev2_4 => Self::parse_rev2_4(data),
            PoRevision::Rev3_1 => Self::parse_rev3(data, 4, |flags| (flags == 0x00, false)),
            PoRevision::Rev3_2 => Self::parse_rev3(data, 8, |flags| {
                (flags & 0x01 == 0, flags & 0x02 != 0)
            }),
        }
    }

    /// `KVC | counter(3) | random(1) | record data`
    ///
    /// Answers shorter than six bytes report an unratified previous session.
    fn parse_rev2_4(data: &Bytes) -> Result<Self> {
        if data.len() < 5 {
            return Err(Error::InvalidResponse("open session answer too short"));
        }
        Ok(Self {
            transaction_counter: counter(&data[1..4]),
            card_challenge: data.slice(1..5),
            previous_session_ratified: data.len() >= 6,
            manage_secure_session_authorized: false,
            kif: None,
            kvc: data[0],
            record_data: data.slice(5..),
        })
    }

    /// `challenge | flags | KIF | KVC | length | record data`
    fn parse_rev3(data: &Bytes, challenge_len: usize, flags: impl Fn(u8) -> (bool, bool)) -> Result<Self> {
        let header = challenge_len + 4;
        if data.len() < header {
            return Err(Error::InvalidResponse("open session answer too short"));
        }
        let record_len = usize::from(data[challenge_len + 3]);
        if data.len() != header + record_len {
            return Err(Error::InvalidResponse("open session record length mismatch"));
        }

        let (ratified, manage) = flags(data[challenge_len]);
        Ok(Self {
            transaction_counter: counter(&data[0..3]),
            card_challenge: data.slice(0..challenge_len),
            previous_session_ratified: ratified,
            manage_secure_session_authorized: manage,
            kif: Some(data[challenge_len + 1]),
            kvc: data[challenge_len + 2],
            record_data: data.slice(header..),
        })
    }
}

fn counter(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0, |acc, b| (acc << 8) | u32::from(*b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const CHALLENGE: [u8; 4] = hex!("C1C2C3C4");

    #[test]
    fn test_open_rev2_4() {
        let open = OpenSession::new(SessionAccessLevel::Debit, 0x07, 0x01, CHALLENGE.to_vec());
        let command = open.to_command(PoRevision::Rev2_4).unwrap();
        assert_eq!(command.to_bytes().as_ref(), hex!("948A8B3804C1C2C3C4"));
    }

    #[test]
    fn test_open_rev3_1() {
        let open = OpenSession::new(SessionAccessLevel::Debit, 0x07, 0x01, CHALLENGE.to_vec());
        let command = open.to_command(PoRevision::Rev3_1).unwrap();
        assert_eq!(command.to_bytes().as_ref(), hex!("008A0B3904C1C2C3C400"));
    }

    #[test]
    fn test_open_rev3_2() {
        let open = OpenSession::new(SessionAccessLevel::Load, 0x08, 0x00, CHALLENGE.to_vec());
        let command = open.to_command(PoRevision::Rev3_2).unwrap();
        assert_eq!(command.to_bytes().as_ref(), hex!("008A02420500C1C2C3C400"));

        let extended = OpenSession::new(SessionAccessLevel::Load, 0x08, 0x00, hex!("0102030405060708").to_vec())
            .with_extended_mode(true);
        let command = extended.to_command(PoRevision::Rev3_2).unwrap();
        assert_eq!(command.to_bytes().as_ref(), hex!("008A02420901010203040506070800"));
    }

    #[test]
    fn test_open_parameter_checks() {
        let open = OpenSession::new(SessionAccessLevel::Debit, 0x07, 0x10, CHALLENGE.to_vec());
        assert!(open.to_command(PoRevision::Rev2_4).is_err());
        assert!(open.to_command(PoRevision::Rev3_1).is_ok());

        let short = OpenSession::new(SessionAccessLevel::Debit, 0x07, 0x01, hex!("C1C2").to_vec());
        assert!(matches!(
            short.to_command(PoRevision::Rev3_1),
            Err(Error::InvalidParameter(_))
        ));

        let extended = OpenSession::new(SessionAccessLevel::Debit, 0x07, 0x01, CHALLENGE.to_vec())
            .with_extended_mode(true);
        assert!(extended.to_command(PoRevision::Rev3_1).is_err());

        assert!(OpenSession::check(PoRevision::Rev3_1, 31, 0x01, false).is_err());
        assert!(OpenSession::check(PoRevision::Rev2_4, 0x07, 16, false).is_err());
        assert!(OpenSession::check(PoRevision::Rev3_2, 30, 31, true).is_ok());
    }

    #[test]
    fn test_parse_rev2_4_ratification() {
        let data = OpenSessionData::parse(PoRevision::Rev2_4, &Bytes::from_static(&hex!("7900001234"))).unwrap();
        assert!(!data.previous_session_ratified);
        assert_eq!(data.kvc, 0x79);
        assert_eq!(data.transaction_counter, 0x12);
        assert_eq!(data.card_challenge.as_ref(), hex!("00001234"));
        assert_eq!(data.kif, None);
        assert!(data.record_data.is_empty());

        let data = OpenSessionData::parse(PoRevision::Rev2_4, &Bytes::from_static(&hex!("790000123401"))).unwrap();
        assert!(data.previous_session_ratified);
        assert_eq!(data.record_data.as_ref(), hex!("01"));

        assert!(OpenSessionData::parse(PoRevision::Rev2_4, &Bytes::from_static(&hex!("79000012"))).is_err());
    }

    #[test]
    fn test_parse_rev3_1() {
        let data = OpenSessionData::parse(
            PoRevision::Rev3_1,
            &Bytes::from_static(&hex!("0000149A" "00" "30" "79" "03" "AABBCC")),
        )
        .unwrap();
        assert_eq!(data.transaction_counter, 0x14);
        assert_eq!(data.card_challenge.as_ref(), hex!("0000149A"));
        assert!(data.previous_session_ratified);
        assert_eq!(data.kif, Some(0x30));
        assert_eq!(data.kvc, 0x79);
        assert_eq!(data.record_data.as_ref(), hex!("AABBCC"));

        let data = OpenSessionData::parse(
            PoRevision::Rev3_1,
            &Bytes::from_static(&hex!("0000149A" "01" "30" "79" "00")),
        )
        .unwrap();
        assert!(!data.previous_session_ratified);

        // Declared record length disagrees with the data
        assert!(
            OpenSessionData::parse(
                PoRevision::Rev3_1,
                &Bytes::from_static(&hex!("0000149A" "00" "30" "79" "04" "AABBCC")),
            )
            .is_err()
        );
    }

    #[test]
    fn test_parse_rev3_2() {
        let data = OpenSessionData::parse(
            PoRevision::Rev3_2,
            &Bytes::from_static(&hex!("000014" "0102030405" "02" "30" "79" "00")),
        )
        .unwrap();
        assert_eq!(data.card_challenge.len(), 8);
        assert!(data.previous_session_ratified);
        assert!(data.manage_secure_session_authorized);

        let data = OpenSessionData::parse(
            PoRevision::Rev3_2,
            &Bytes::from_static(&hex!("000014" "0102030405" "01" "30" "79" "00")),
        )
        .unwrap();
        assert!(!data.previous_session_ratified);
        assert!(!data.manage_secure_session_authorized);
    }

    #[test]
    fn test_parse_status_error() {
        let open = OpenSession::new(SessionAccessLevel::Debit, 0x07, 0x01, CHALLENGE.to_vec());
        let err = open
            .parse(PoRevision::Rev3_1, &Response::from_bytes(&hex!("6985")).unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::CardStatus {
                command: PoCommandRef::OpenSession,
                ..
            }
        ));
    }
}
