//! INVALIDATE and REHABILITATE

use calypso_apdu_core::Command;

use super::{Decoder, PoCommandRef, PreparedCommand};
use crate::{Result, constants::ins, revision::PoRevision};

/// Invalidate the current application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Invalidate;

impl Invalidate {
    /// Encode the command for a revision
    pub fn build(&self, revision: PoRevision) -> Result<PreparedCommand> {
        let command = Command::new(revision.class_byte(), ins::INVALIDATE, 0x00, 0x00);
        PreparedCommand::new(revision, PoCommandRef::Invalidate, command, Decoder::Done)
    }
}

/// Rehabilitate an invalidated application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rehabilitate;

impl Rehabilitate {
    /// Encode the command for a revision
    pub fn build(&self, revision: PoRevision) -> Result<PreparedCommand> {
        let command = Command::new(revision.class_byte(), ins::REHABILITATE, 0x00, 0x00);
        PreparedCommand::new(revision, PoCommandRef::Rehabilitate, command, Decoder::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calypso_apdu_core::Response;
    use hex_literal::hex;

    #[test]
    fn test_lifecycle_commands() {
        let prepared = Invalidate.build(PoRevision::Rev2_4).unwrap();
        assert_eq!(prepared.command().to_bytes().as_ref(), hex!("94040000"));
        assert!(prepared.is_modifying());
        assert_eq!(prepared.data_length(), 0);

        let prepared = Rehabilitate.build(PoRevision::Rev3_1).unwrap();
        assert_eq!(prepared.command().to_bytes().as_ref(), hex!("00440000"));

        let err = prepared
            .parse(&Response::from_bytes(&hex!("6985")).unwrap())
            .unwrap_err();
        assert_eq!(err.status_kind(), Some(crate::StatusKind::AccessForbidden));
    }
}
