//! READ RECORD(S)

use bytes::Bytes;
use calypso_apdu_core::Command;

use super::{Decoder, PoCommandRef, PreparedCommand, check_record, sfi_p2};
use crate::{
    Error, Result,
    constants::{ins, params},
    revision::PoRevision,
};

/// A record read from the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record number
    pub number: u8,
    /// Record content
    pub data: Bytes,
}

/// Read one record, or every record from a starting one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRecords {
    /// Short file identifier, 0 for the current file
    pub sfi: u8,
    /// Record number to read, or first record when reading several
    pub record: u8,
    /// Read from `record` to the end of the file
    pub multiple: bool,
    /// Le, 0 lets the card return the full records
    pub expected_length: u8,
}

impl ReadRecords {
    /// Read a single record
    pub const fn one(sfi: u8, record: u8) -> Self {
        Self {
            sfi,
            record,
            multiple: false,
            expected_length: 0,
        }
    }

    /// Read every record starting at `first`
    pub const fn multiple(sfi: u8, first: u8) -> Self {
        Self {
            sfi,
            record: first,
            multiple: true,
            expected_length: 0,
        }
    }

    /// Set Le
    ///
    /// Inside a secure session the whole response, status word included, is
    /// digested in one DIGEST UPDATE, so at most 253 data bytes can be read.
    /// A longer answer cancels the session with [`Error::DigestTooLong`].
    ///
    /// [`Error::DigestTooLong`]: crate::Error::DigestTooLong
    pub const fn with_expected_length(mut self, le: u8) -> Self {
        self.expected_length = le;
        self
    }

    /// Encode the command for a revision
    pub fn build(&self, revision: PoRevision) -> Result<PreparedCommand> {
        check_record(self.record)?;
        let (low, decoder) = if self.multiple {
            (params::READ_MULTIPLE, Decoder::MultipleRecords)
        } else {
            (params::READ_ONE, Decoder::SingleRecord(self.record))
        };

        let command = Command::new(
            revision.class_byte(),
            ins::READ_RECORDS,
            self.record,
            sfi_p2(self.sfi, low)?,
        )
        .with_le(self.expected_length);

        PreparedCommand::new(revision, PoCommandRef::ReadRecords, command, decoder)
    }
}

/// Split a multiple-record answer made of `[number, length, data...]` blocks
pub(crate) fn parse_multiple(payload: &Bytes) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < payload.len() {
        let header = payload
            .get(offset..offset + 2)
            .ok_or(Error::InvalidResponse("truncated record header"))?;
        let (number, length) = (header[0], usize::from(header[1]));
        let start = offset + 2;
        let end = start + length;
        if end > payload.len() {
            return Err(Error::InvalidResponse("record longer than response"));
        }
        records.push(Record {
            number,
            data: payload.slice(start..end),
        });
        offset = end;
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::PoOutput;
    use calypso_apdu_core::Response;
    use hex_literal::hex;

    #[test]
    fn test_read_one_record() {
        let prepared = ReadRecords::one(0x07, 0x01).build(PoRevision::Rev3_1).unwrap();
        assert_eq!(prepared.command().to_bytes().as_ref(), hex!("00B2013C00"));

        let prepared = ReadRecords::one(0x07, 0x01)
            .with_expected_length(0x1D)
            .build(PoRevision::Rev2_4)
            .unwrap();
        assert_eq!(prepared.command().to_bytes().as_ref(), hex!("94B2013C1D"));

        let output = prepared
            .parse(&Response::from_bytes(&hex!("0102039000")).unwrap())
            .unwrap();
        assert_eq!(
            output,
            PoOutput::Records(vec![Record {
                number: 1,
                data: Bytes::from_static(&hex!("010203")),
            }])
        );
    }

    #[test]
    fn test_read_multiple_records() {
        let prepared = ReadRecords::multiple(0x08, 0x02)
            .build(PoRevision::Rev3_1)
            .unwrap();
        assert_eq!(prepared.command().to_bytes().as_ref(), hex!("00B2024500"));

        let output = prepared
            .parse(&Response::from_bytes(&hex!("0202AABB0301CC9000")).unwrap())
            .unwrap();
        let PoOutput::Records(records) = output else {
            panic!("expected records");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].number, 2);
        assert_eq!(records[0].data.as_ref(), hex!("AABB"));
        assert_eq!(records[1].number, 3);
        assert_eq!(records[1].data.as_ref(), hex!("CC"));
    }

    #[test]
    fn test_truncated_records() {
        assert!(parse_multiple(&Bytes::from_static(&hex!("0205AABB"))).is_err());
        assert!(parse_multiple(&Bytes::from_static(&hex!("02"))).is_err());
        assert!(parse_multiple(&Bytes::new()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(ReadRecords::one(0x07, 0).build(PoRevision::Rev3_1).is_err());
        assert!(ReadRecords::one(31, 1).build(PoRevision::Rev3_1).is_err());
    }
}
