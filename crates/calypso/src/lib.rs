//! Calypso portable object commands and secure sessions
//!
//! This crate builds the commands understood by Calypso portable objects (PO)
//! and runs them inside secure sessions whose integrity is checked by a SAM.
//!
//! ## Overview
//!
//! - [`select_application`] selects a Calypso application and decodes its FCI
//! - [`PoCommand`] describes a card command, built at the card revision into a
//!   [`PreparedCommand`]
//! - [`PoTransaction`] opens, runs, closes or cancels a secure session
//! - [`SamAuthenticator`] is the SAM capability, implemented over APDUs by
//!   [`CalypsoSam`] and shared between readers with [`SharedSam`]
//! - [`TransactionSettings`] holds the transaction parameters, loadable from
//!   TOML and `CALYPSO_` environment variables
//!
//! ## Example
//!
//! ```no_run
//! use calypso::prelude::*;
//!
//! fn debit<C: CardTransport, S: SamAuthenticator>(mut card: C, sam: S) -> calypso::Result<()> {
//!     let application = select_application(&mut card, &[0x31, 0x54, 0x49, 0x43, 0x2E, 0x49, 0x43, 0x41])?;
//!     let mut transaction = PoTransaction::new(card, sam, Some(application), TransactionSettings::default())?;
//!
//!     transaction.open_session(SessionAccessLevel::Debit, 0x07, 1)?;
//!     transaction.process_command(&PoCommand::Counter(CounterCommand::decrease(0x19, 1, 10)))?;
//!     transaction.close_session()?;
//!     Ok(())
//! }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod commands;
pub mod config;
pub mod constants;
pub mod po;
pub mod revision;
pub mod sam;
pub mod session;
pub mod transaction;
pub mod transcript;

mod error;
pub use error::{Error, Result, StatusKind};

pub use commands::{PoCommand, PoCommandRef, PoOutput, PreparedCommand};
pub use config::{SessionAccessLevel, TransactionSettings};
pub use po::{PoApplication, StartupInfo, select_application};
pub use revision::{PoRevision, RevisionBoundaries, SamRevision};
pub use sam::{CalypsoSam, SamAuthenticator, SamLease, SharedSam};
pub use session::{SecureSession, SessionState};
pub use transaction::PoTransaction;
pub use transcript::{ModificationsBuffer, SessionTranscript, TranscriptEntry};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use calypso_apdu_core::prelude::*;

    pub use crate::{
        CalypsoSam, PoApplication, PoCommand, PoOutput, PoRevision, PoTransaction,
        SamAuthenticator, SamRevision, SessionAccessLevel, SessionState, SharedSam,
        TransactionSettings,
        commands::{
            AppendRecord, CounterCommand, CustomCommand, ReadRecords, UpdateRecord, VerifyPin,
            WriteRecord,
        },
        select_application,
    };
}
