//! UPDATE RECORD, WRITE RECORD and APPEND RECORD
//!
//! All three modify the card and are charged to the session modifications
//! buffer.

use bytes::Bytes;
use calypso_apdu_core::{Command, command::MAX_SHORT_DATA};

use super::{Decoder, PoCommandRef, PreparedCommand, check_data, check_record, sfi_p2};
use crate::{
    Result,
    constants::{ins, params},
    revision::PoRevision,
};

/// Replace the content of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    /// Short file identifier, 0 for the current file
    pub sfi: u8,
    /// Record number
    pub record: u8,
    /// New record content
    pub data: Bytes,
}

impl UpdateRecord {
    /// Create the command
    pub fn new(sfi: u8, record: u8, data: impl Into<Bytes>) -> Self {
        Self {
            sfi,
            record,
            data: data.into(),
        }
    }

    /// Encode the command for a revision
    pub fn build(&self, revision: PoRevision) -> Result<PreparedCommand> {
        build_record_command(
            revision,
            PoCommandRef::UpdateRecord,
            ins::UPDATE_RECORD,
            self.sfi,
            self.record,
            &self.data,
        )
    }
}

/// OR new data into the content of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    /// Short file identifier, 0 for the current file
    pub sfi: u8,
    /// Record number
    pub record: u8,
    /// Data combined with the record
    pub data: Bytes,
}

impl WriteRecord {
    /// Create the command
    pub fn new(sfi: u8, record: u8, data: impl Into<Bytes>) -> Self {
        Self {
            sfi,
            record,
            data: data.into(),
        }
    }

    /// Encode the command for a revision
    pub fn build(&self, revision: PoRevision) -> Result<PreparedCommand> {
        build_record_command(
            revision,
            PoCommandRef::WriteRecord,
            ins::WRITE_RECORD,
            self.sfi,
            self.record,
            &self.data,
        )
    }
}

/// Append a record to a cyclic file, shifting the older ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendRecord {
    /// Short file identifier, 0 for the current file
    pub sfi: u8,
    /// New record content
    pub data: Bytes,
}

impl AppendRecord {
    /// Create the command
    pub fn new(sfi: u8, data: impl Into<Bytes>) -> Self {
        Self {
            sfi,
            data: data.into(),
        }
    }

    /// Encode the command for a revision
    pub fn build(&self, revision: PoRevision) -> Result<PreparedCommand> {
        check_data(&self.data, MAX_SHORT_DATA)?;
        let command = Command::new_with_data(
            revision.class_byte(),
            ins::APPEND_RECORD,
            0x00,
            sfi_p2(self.sfi, 0x00)?,
            self.data.clone(),
        );
        PreparedCommand::new(revision, PoCommandRef::AppendRecord, command, Decoder::Done)
    }
}

fn build_record_command(
    revision: PoRevision,
    reference: PoCommandRef,
    instruction: u8,
    sfi: u8,
    record: u8,
    data: &Bytes,
) -> Result<PreparedCommand> {
    check_record(record)?;
    check_data(data, MAX_SHORT_DATA)?;
    let command = Command::new_with_data(
        revision.class_byte(),
        instruction,
        record,
        sfi_p2(sfi, params::RECORD_IN_P1)?,
        data.clone(),
    );
    PreparedCommand::new(revision, reference, command, Decoder::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, commands::PoOutput};
    use calypso_apdu_core::Response;
    use hex_literal::hex;

    #[test]
    fn test_update_record() {
        let prepared = UpdateRecord::new(0x08, 0x01, hex!("00112233").to_vec())
            .build(PoRevision::Rev3_1)
            .unwrap();
        assert_eq!(prepared.command().to_bytes().as_ref(), hex!("00DC01440400112233"));
        assert!(prepared.is_modifying());
        assert_eq!(prepared.data_length(), 4);

        let output = prepared
            .parse(&Response::from_bytes(&hex!("9000")).unwrap())
            .unwrap();
        assert_eq!(output, PoOutput::Done);
    }

    #[test]
    fn test_write_and_append() {
        let prepared = WriteRecord::new(0x08, 0x02, hex!("FF").to_vec())
            .build(PoRevision::Rev2_4)
            .unwrap();
        assert_eq!(prepared.command().to_bytes().as_ref(), hex!("94D2024401FF"));

        let prepared = AppendRecord::new(0x0A, hex!("0102").to_vec())
            .build(PoRevision::Rev3_2)
            .unwrap();
        assert_eq!(prepared.command().to_bytes().as_ref(), hex!("00E20050020102"));
    }

    #[test]
    fn test_record_data_limits() {
        assert!(matches!(
            UpdateRecord::new(0x08, 0x01, Bytes::new()).build(PoRevision::Rev3_1),
            Err(Error::InvalidParameter(_))
        ));
        assert!(
            AppendRecord::new(0x08, vec![0u8; 256])
                .build(PoRevision::Rev3_1)
                .is_err()
        );
    }

    #[test]
    fn test_record_status_error() {
        let prepared = UpdateRecord::new(0x08, 0x01, hex!("00").to_vec())
            .build(PoRevision::Rev3_1)
            .unwrap();
        let err = prepared
            .parse(&Response::from_bytes(&hex!("6400")).unwrap())
            .unwrap_err();
        assert_eq!(
            err.status_kind(),
            Some(crate::StatusKind::SessionBufferOverflow)
        );
    }
}
