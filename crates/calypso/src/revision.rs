//! Card and SAM revisions
//!
//! The revision decides the class byte of every command and which command
//! layouts a card understands. Nothing here holds state: the revision in use is
//! resolved once per transaction and passed explicitly to each builder.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    commands::PoCommandRef,
    constants::cla,
};

/// Portable object revision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum PoRevision {
    /// Calypso revision 2.4, legacy class byte
    #[display("2.4")]
    Rev2_4,
    /// Calypso revision 3.1
    #[default]
    #[display("3.1")]
    Rev3_1,
    /// Calypso revision 3.2, with extended session mode
    #[display("3.2")]
    Rev3_2,
}

impl PoRevision {
    /// Class byte used for every command sent to this revision
    pub const fn class_byte(self) -> u8 {
        match self {
            Self::Rev2_4 => cla::CALYPSO_LEGACY,
            Self::Rev3_1 | Self::Rev3_2 => cla::ISO7816,
        }
    }

    /// Whether this is a revision 3 card
    pub const fn is_rev3(self) -> bool {
        matches!(self, Self::Rev3_1 | Self::Rev3_2)
    }

    /// Whether the card understands the command at all
    pub const fn supports(self, command: PoCommandRef) -> bool {
        !matches!(
            (self, command),
            (Self::Rev2_4, PoCommandRef::VerifyPin)
        )
    }

    /// Fail with [`Error::UnsupportedCommand`] if the command is not supported
    pub const fn ensure_supports(self, command: PoCommandRef) -> Result<()> {
        if self.supports(command) {
            Ok(())
        } else {
            Err(Error::UnsupportedCommand {
                command,
                revision: self,
            })
        }
    }

    /// Fail with [`Error::ClassMismatch`] unless `class` is this revision's class byte
    pub const fn ensure_class(self, class: u8) -> Result<()> {
        let expected = self.class_byte();
        if class == expected {
            Ok(())
        } else {
            Err(Error::ClassMismatch {
                expected,
                actual: class,
            })
        }
    }
}

/// SAM revision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum SamRevision {
    /// C1 SAM
    C1,
    /// S1D SAM
    #[default]
    S1D,
}

impl SamRevision {
    /// Class byte used for every command sent to this SAM
    pub const fn class_byte(self) -> u8 {
        match self {
            Self::C1 => cla::SAM_C1,
            Self::S1D => cla::CALYPSO_LEGACY,
        }
    }
}

/// Application subtype split points used to detect the card revision
///
/// Subtypes from `0x01` up to `rev3_1_start` (exclusive) are revision 2.4,
/// up to `rev3_2_start` (exclusive) revision 3.1 and up to `0x7F` revision
/// 3.2. Subtype `0x00` and `0x80..=0xFF` are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBoundaries", into = "RawBoundaries")]
pub struct RevisionBoundaries {
    rev3_1_start: u8,
    rev3_2_start: u8,
}

impl Default for RevisionBoundaries {
    fn default() -> Self {
        Self {
            rev3_1_start: 0x20,
            rev3_2_start: 0x28,
        }
    }
}

impl RevisionBoundaries {
    /// Highest subtype mapped to a revision
    pub const LAST_SUBTYPE: u8 = 0x7F;

    /// Create boundaries, checking `0x01 < rev3_1_start <= rev3_2_start <= 0x80`
    pub fn new(rev3_1_start: u8, rev3_2_start: u8) -> Result<Self> {
        if rev3_1_start <= 0x01 || rev3_1_start > rev3_2_start || rev3_2_start > 0x80 {
            return Err(Error::InvalidSettings(format!(
                "revision boundaries {rev3_1_start:#04X}/{rev3_2_start:#04X} are not ordered"
            )));
        }
        Ok(Self {
            rev3_1_start,
            rev3_2_start,
        })
    }

    /// First subtype of revision 3.1 cards
    pub const fn rev3_1_start(&self) -> u8 {
        self.rev3_1_start
    }

    /// First subtype of revision 3.2 cards
    pub const fn rev3_2_start(&self) -> u8 {
        self.rev3_2_start
    }

    /// Map an application subtype to the card revision
    pub const fn resolve(&self, subtype: u8) -> Result<PoRevision> {
        match subtype {
            0x00 | 0x80..=0xFF => Err(Error::UnknownApplicationSubtype(subtype)),
            s if s < self.rev3_1_start => Ok(PoRevision::Rev2_4),
            s if s < self.rev3_2_start => Ok(PoRevision::Rev3_1),
            _ => Ok(PoRevision::Rev3_2),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawBoundaries {
    rev3_1_start: u8,
    rev3_2_start: u8,
}

impl TryFrom<RawBoundaries> for RevisionBoundaries {
    type Error = Error;

    fn try_from(raw: RawBoundaries) -> Result<Self> {
        Self::new(raw.rev3_1_start, raw.rev3_2_start)
    }
}

impl From<RevisionBoundaries> for RawBoundaries {
    fn from(boundaries: RevisionBoundaries) -> Self {
        Self {
            rev3_1_start: boundaries.rev3_1_start,
            rev3_2_start: boundaries.rev3_2_start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_bytes() {
        assert_eq!(PoRevision::Rev2_4.class_byte(), 0x94);
        assert_eq!(PoRevision::Rev3_1.class_byte(), 0x00);
        assert_eq!(PoRevision::Rev3_2.class_byte(), 0x00);
        assert_eq!(SamRevision::C1.class_byte(), 0x80);
        assert_eq!(SamRevision::S1D.class_byte(), 0x94);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(PoRevision::default(), PoRevision::Rev3_1);
        assert_eq!(SamRevision::default(), SamRevision::S1D);
    }

    #[test]
    fn test_subtype_boundaries() {
        let boundaries = RevisionBoundaries::default();
        for subtype in [0x01, 0x04, 0x06, 0x1F] {
            assert_eq!(boundaries.resolve(subtype).unwrap(), PoRevision::Rev2_4);
        }
        assert_eq!(boundaries.resolve(0x20).unwrap(), PoRevision::Rev3_1);
        assert_eq!(boundaries.resolve(0x27).unwrap(), PoRevision::Rev3_1);
        assert_eq!(boundaries.resolve(0x28).unwrap(), PoRevision::Rev3_2);
        assert_eq!(boundaries.resolve(0x7F).unwrap(), PoRevision::Rev3_2);

        assert!(matches!(
            boundaries.resolve(0x00),
            Err(Error::UnknownApplicationSubtype(0x00))
        ));
        assert!(matches!(
            boundaries.resolve(0x80),
            Err(Error::UnknownApplicationSubtype(0x80))
        ));
    }

    #[test]
    fn test_custom_boundaries() {
        let boundaries = RevisionBoundaries::new(0x10, 0x30).unwrap();
        assert_eq!(boundaries.resolve(0x0F).unwrap(), PoRevision::Rev2_4);
        assert_eq!(boundaries.resolve(0x10).unwrap(), PoRevision::Rev3_1);
        assert_eq!(boundaries.resolve(0x2F).unwrap(), PoRevision::Rev3_1);
        assert_eq!(boundaries.resolve(0x30).unwrap(), PoRevision::Rev3_2);

        assert!(RevisionBoundaries::new(0x30, 0x10).is_err());
        assert!(RevisionBoundaries::new(0x01, 0x28).is_err());
        assert!(RevisionBoundaries::new(0x20, 0x81).is_err());
    }

    #[test]
    fn test_pin_not_on_rev2_4() {
        assert!(!PoRevision::Rev2_4.supports(PoCommandRef::VerifyPin));
        assert!(PoRevision::Rev3_1.supports(PoCommandRef::VerifyPin));
        assert!(matches!(
            PoRevision::Rev2_4.ensure_supports(PoCommandRef::VerifyPin),
            Err(Error::UnsupportedCommand { .. })
        ));
        assert!(matches!(
            PoRevision::Rev3_1.ensure_class(0x94),
            Err(Error::ClassMismatch {
                expected: 0x00,
                actual: 0x94
            })
        ));
    }
}
