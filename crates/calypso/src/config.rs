//! Configuration options for Calypso transactions
//!
//! Settings are passed explicitly to every transaction. They can be built in
//! code with the `with_*` methods or loaded from a TOML file, with
//! `CALYPSO_`-prefixed environment variables taking precedence.

use std::path::Path;

use derive_more::Display;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    revision::{PoRevision, RevisionBoundaries, SamRevision},
};

/// Access level requested when opening a secure session
///
/// Each level selects one of the three session keys of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum SessionAccessLevel {
    /// Personalization key
    #[display("personalization")]
    Personalization,
    /// Load key
    #[display("load")]
    Load,
    /// Debit key
    #[display("debit")]
    Debit,
}

impl SessionAccessLevel {
    /// Key index carried in the open session P1
    pub const fn key_index(self) -> u8 {
        match self {
            Self::Personalization => 0x01,
            Self::Load => 0x02,
            Self::Debit => 0x03,
        }
    }
}

/// Key identifiers assumed when the card does not report one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultKifs {
    /// KIF of the personalization key
    pub personalization: u8,
    /// KIF of the load key
    pub load: u8,
    /// KIF of the debit key
    pub debit: u8,
}

impl Default for DefaultKifs {
    fn default() -> Self {
        Self {
            personalization: 0x21,
            load: 0x27,
            debit: 0x30,
        }
    }
}

impl DefaultKifs {
    /// KIF for an access level
    pub const fn for_level(&self, level: SessionAccessLevel) -> u8 {
        match level {
            SessionAccessLevel::Personalization => self.personalization,
            SessionAccessLevel::Load => self.load,
            SessionAccessLevel::Debit => self.debit,
        }
    }
}

/// Settings for a [`PoTransaction`](crate::PoTransaction)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionSettings {
    /// Card revision; detected from the application subtype when unset
    pub po_revision: Option<PoRevision>,

    /// Subtype split points used for detection
    pub revision_boundaries: RevisionBoundaries,

    /// SAM revision
    pub sam_revision: SamRevision,

    /// KIFs used when the card does not report the session key identifier
    pub default_kifs: DefaultKifs,

    /// KVC used when the card reports the session key version as `0xFF`
    pub default_kvc: Option<u8>,

    /// Session key versions accepted; empty accepts any
    pub authorized_kvcs: Vec<u8>,

    /// Ask the card to require a ratification after close
    pub ratification_requested: bool,

    /// Use 8-byte challenges and signatures on revision 3.2 cards
    pub extended_mode: bool,

    /// Session modifications buffer size, overriding what the card advertises
    pub modifications_buffer: Option<usize>,

    /// Start the SAM digest in verification mode
    pub sam_verification_mode: bool,
}

impl Default for TransactionSettings {
    fn default() -> Self {
        Self {
            po_revision: None,
            revision_boundaries: RevisionBoundaries::default(),
            sam_revision: SamRevision::default(),
            default_kifs: DefaultKifs::default(),
            default_kvc: None,
            authorized_kvcs: Vec::new(),
            ratification_requested: false,
            extended_mode: false,
            modifications_buffer: None,
            sam_verification_mode: false,
        }
    }
}

impl TransactionSettings {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file, then apply `CALYPSO_` environment overrides
    ///
    /// Nested keys use a double underscore, e.g. `CALYPSO_DEFAULT_KIFS__DEBIT`.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_figment(Figment::new().merge(Toml::file(path.as_ref())))
    }

    /// Load settings from a TOML document, then apply environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::from_figment(Figment::new().merge(Toml::string(toml)))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Self = figment
            .merge(Env::prefixed("CALYPSO_").split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check settings that cannot be expressed by the types alone
    pub fn validate(&self) -> Result<()> {
        if self.modifications_buffer == Some(0) {
            return Err(Error::InvalidSettings(
                "modifications buffer must not be empty".into(),
            ));
        }
        if self.extended_mode && matches!(self.po_revision, Some(r) if r != PoRevision::Rev3_2) {
            return Err(Error::InvalidSettings(
                "extended mode requires a revision 3.2 card".into(),
            ));
        }
        Ok(())
    }

    /// Set the card revision, disabling detection
    pub const fn with_po_revision(mut self, revision: PoRevision) -> Self {
        self.po_revision = Some(revision);
        self
    }

    /// Set the subtype split points used for detection
    pub const fn with_revision_boundaries(mut self, boundaries: RevisionBoundaries) -> Self {
        self.revision_boundaries = boundaries;
        self
    }

    /// Set the SAM revision
    pub const fn with_sam_revision(mut self, revision: SamRevision) -> Self {
        self.sam_revision = revision;
        self
    }

    /// Set the KIF assumed for one access level
    pub const fn with_default_kif(mut self, level: SessionAccessLevel, kif: u8) -> Self {
        match level {
            SessionAccessLevel::Personalization => self.default_kifs.personalization = kif,
            SessionAccessLevel::Load => self.default_kifs.load = kif,
            SessionAccessLevel::Debit => self.default_kifs.debit = kif,
        }
        self
    }

    /// Set the KVC assumed when the card does not report one
    pub const fn with_default_kvc(mut self, kvc: u8) -> Self {
        self.default_kvc = Some(kvc);
        self
    }

    /// Restrict the accepted session key versions
    pub fn with_authorized_kvcs(mut self, kvcs: impl IntoIterator<Item = u8>) -> Self {
        self.authorized_kvcs = kvcs.into_iter().collect();
        self
    }

    /// Set whether close asks for a ratification
    pub const fn with_ratification(mut self, requested: bool) -> Self {
        self.ratification_requested = requested;
        self
    }

    /// Set whether revision 3.2 extended mode is used
    pub const fn with_extended_mode(mut self, extended: bool) -> Self {
        self.extended_mode = extended;
        self
    }

    /// Override the session modifications buffer size
    pub const fn with_modifications_buffer(mut self, units: usize) -> Self {
        self.modifications_buffer = Some(units);
        self
    }

    /// Set whether the SAM digest runs in verification mode
    pub const fn with_sam_verification_mode(mut self, enabled: bool) -> Self {
        self.sam_verification_mode = enabled;
        self
    }

    /// Whether a session key version may be used
    pub fn is_kvc_authorized(&self, kvc: u8) -> bool {
        self.authorized_kvcs.is_empty() || self.authorized_kvcs.contains(&kvc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = TransactionSettings::default();
        assert_eq!(settings.po_revision, None);
        assert_eq!(settings.sam_revision, SamRevision::S1D);
        assert_eq!(settings.default_kifs.for_level(SessionAccessLevel::Debit), 0x30);
        assert!(settings.is_kvc_authorized(0x79));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let settings = TransactionSettings::new()
            .with_po_revision(PoRevision::Rev3_2)
            .with_extended_mode(true)
            .with_default_kif(SessionAccessLevel::Load, 0x2A)
            .with_authorized_kvcs([0x79, 0x7E]);

        assert_eq!(settings.default_kifs.for_level(SessionAccessLevel::Load), 0x2A);
        assert!(settings.is_kvc_authorized(0x7E));
        assert!(!settings.is_kvc_authorized(0x7F));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let settings = TransactionSettings::new()
            .with_po_revision(PoRevision::Rev3_1)
            .with_extended_mode(true);
        assert!(matches!(settings.validate(), Err(Error::InvalidSettings(_))));

        let settings = TransactionSettings::new().with_modifications_buffer(0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let settings = TransactionSettings::from_toml_str(
            r#"
            po_revision = "Rev2_4"
            sam_revision = "C1"
            authorized_kvcs = [121, 126]
            ratification_requested = true

            [revision_boundaries]
            rev3_1_start = 16
            rev3_2_start = 48

            [default_kifs]
            debit = 49
            "#,
        )
        .unwrap();

        assert_eq!(settings.po_revision, Some(PoRevision::Rev2_4));
        assert_eq!(settings.sam_revision, SamRevision::C1);
        assert_eq!(settings.authorized_kvcs, vec![0x79, 0x7E]);
        assert!(settings.ratification_requested);
        assert_eq!(settings.revision_boundaries.rev3_1_start(), 0x10);
        assert_eq!(settings.default_kifs.debit, 0x31);
        assert_eq!(settings.default_kifs.load, 0x27);
    }

    #[test]
    fn test_from_toml_rejects_bad_boundaries() {
        let result = TransactionSettings::from_toml_str(
            r#"
            [revision_boundaries]
            rev3_1_start = 48
            rev3_2_start = 16
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
