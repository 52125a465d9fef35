//! Portable object commands
//!
//! Every command is described by a plain struct holding its parameters. A
//! struct is turned into bytes for one [`PoRevision`] with `build`, which
//! checks the parameters and the revision, and the answer is decoded by the
//! resulting [`PreparedCommand`].
//!
//! Session framing commands (open, close, abort, ratification) are driven by
//! [`PoTransaction`](crate::PoTransaction); the business commands processed
//! inside a session are gathered in [`PoCommand`].

pub mod close_session;
pub mod counter;
pub mod lifecycle;
pub mod open_session;
pub mod pin;
pub mod read_records;
pub mod record;

use bytes::Bytes;
use calypso_apdu_core::{Command, Response, StatusWord};
use derive_more::Display;

use crate::{
    Error, Result,
    constants::{limits, status},
    revision::PoRevision,
};

pub use close_session::{CloseSession, CloseSessionData, abort_session, ratification};
pub use counter::{CounterCommand, CounterDirection};
pub use lifecycle::{Invalidate, Rehabilitate};
pub use open_session::{OpenSession, OpenSessionData};
pub use pin::{PinStatus, VerifyPin};
pub use read_records::{ReadRecords, Record};
pub use record::{AppendRecord, UpdateRecord, WriteRecord};

/// Identity of a portable object command, used in errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PoCommandRef {
    /// SELECT APPLICATION
    #[display("Select Application")]
    SelectApplication,
    /// OPEN SECURE SESSION
    #[display("Open Secure Session")]
    OpenSession,
    /// CLOSE SECURE SESSION
    #[display("Close Secure Session")]
    CloseSession,
    /// Abort of the secure session
    #[display("Abort Secure Session")]
    AbortSession,
    /// READ RECORD(S)
    #[display("Read Records")]
    ReadRecords,
    /// UPDATE RECORD
    #[display("Update Record")]
    UpdateRecord,
    /// WRITE RECORD
    #[display("Write Record")]
    WriteRecord,
    /// APPEND RECORD
    #[display("Append Record")]
    AppendRecord,
    /// INCREASE
    #[display("Increase")]
    Increase,
    /// DECREASE
    #[display("Decrease")]
    Decrease,
    /// VERIFY PIN
    #[display("Verify PIN")]
    VerifyPin,
    /// INVALIDATE
    #[display("Invalidate")]
    Invalidate,
    /// REHABILITATE
    #[display("Rehabilitate")]
    Rehabilitate,
    /// Ratification
    #[display("Ratification")]
    Ratification,
    /// Caller-supplied raw command
    #[display("Custom Command")]
    Custom,
}

impl PoCommandRef {
    /// Whether the command consumes the session modifications buffer
    pub const fn is_modifying(self) -> bool {
        matches!(
            self,
            Self::UpdateRecord
                | Self::WriteRecord
                | Self::AppendRecord
                | Self::Increase
                | Self::Decrease
                | Self::Invalidate
                | Self::Rehabilitate
        )
    }
}

/// Business commands that can be sent inside a secure session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoCommand {
    /// Read one or several records
    ReadRecords(ReadRecords),
    /// Replace a record
    UpdateRecord(UpdateRecord),
    /// OR data into a record
    WriteRecord(WriteRecord),
    /// Append a record to a cyclic file
    AppendRecord(AppendRecord),
    /// Increase or decrease a counter
    Counter(CounterCommand),
    /// Present a PIN or read the PIN status
    VerifyPin(VerifyPin),
    /// Invalidate the application
    Invalidate(Invalidate),
    /// Rehabilitate the application
    Rehabilitate(Rehabilitate),
    /// Raw command supplied by the caller
    Custom(CustomCommand),
}

impl PoCommand {
    /// Encode the command for a revision
    pub fn build(&self, revision: PoRevision) -> Result<PreparedCommand> {
        match self {
            Self::ReadRecords(cmd) => cmd.build(revision),
            Self::UpdateRecord(cmd) => cmd.build(revision),
            Self::WriteRecord(cmd) => cmd.build(revision),
            Self::AppendRecord(cmd) => cmd.build(revision),
            Self::Counter(cmd) => cmd.build(revision),
            Self::VerifyPin(cmd) => cmd.build(revision),
            Self::Invalidate(cmd) => cmd.build(revision),
            Self::Rehabilitate(cmd) => cmd.build(revision),
            Self::Custom(cmd) => cmd.build(revision),
        }
    }

    /// Encode the command for the default revision
    pub fn build_default(&self) -> Result<PreparedCommand> {
        self.build(PoRevision::default())
    }

    /// Identity of the command
    pub const fn reference(&self) -> PoCommandRef {
        match self {
            Self::ReadRecords(_) => PoCommandRef::ReadRecords,
            Self::UpdateRecord(_) => PoCommandRef::UpdateRecord,
            Self::WriteRecord(_) => PoCommandRef::WriteRecord,
            Self::AppendRecord(_) => PoCommandRef::AppendRecord,
            Self::Counter(cmd) => cmd.direction.reference(),
            Self::VerifyPin(_) => PoCommandRef::VerifyPin,
            Self::Invalidate(_) => PoCommandRef::Invalidate,
            Self::Rehabilitate(_) => PoCommandRef::Rehabilitate,
            Self::Custom(_) => PoCommandRef::Custom,
        }
    }
}

/// Decoded answer of a business command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoOutput {
    /// The command returns no data
    Done,
    /// Records read, in card order
    Records(Vec<Record>),
    /// Counter value after the operation, when the card returned it
    Counter(Option<u32>),
    /// PIN presentation state
    Pin(PinStatus),
    /// Data-out of a custom command
    Raw(Bytes),
}

/// How the data-out of a prepared command is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decoder {
    Done,
    SingleRecord(u8),
    MultipleRecords,
    Counter,
    Pin,
    Raw,
}

/// A command encoded for one revision, together with its answer decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCommand {
    revision: PoRevision,
    reference: PoCommandRef,
    command: Command,
    success: Vec<StatusWord>,
    modifying: bool,
    decoder: Decoder,
}

impl PreparedCommand {
    pub(crate) fn new(
        revision: PoRevision,
        reference: PoCommandRef,
        command: Command,
        decoder: Decoder,
    ) -> Result<Self> {
        revision.ensure_supports(reference)?;
        command.validate()?;
        Ok(Self {
            revision,
            reference,
            command,
            success: vec![status::SUCCESS],
            modifying: reference.is_modifying(),
            decoder,
        })
    }

    pub(crate) fn with_success(mut self, success: &[StatusWord]) -> Self {
        self.success = success.to_vec();
        self
    }

    /// Revision the command was built for
    pub const fn revision(&self) -> PoRevision {
        self.revision
    }

    /// Identity of the command
    pub const fn reference(&self) -> PoCommandRef {
        self.reference
    }

    /// Encoded APDU
    pub const fn command(&self) -> &Command {
        &self.command
    }

    /// Status words accepted as success
    pub fn success_statuses(&self) -> &[StatusWord] {
        &self.success
    }

    /// Whether the command consumes the session modifications buffer
    pub const fn is_modifying(&self) -> bool {
        self.modifying
    }

    /// Length of the data field, as charged to the modifications buffer
    pub fn data_length(&self) -> usize {
        self.command.data.as_ref().map_or(0, Bytes::len)
    }

    /// Check the status word and decode the data-out
    pub fn parse(&self, response: &Response) -> Result<PoOutput> {
        if !response.is_success_in(&self.success) {
            return Err(Error::card_status(self.reference, response.status()));
        }

        let payload = response.payload();
        match self.decoder {
            Decoder::Done => Ok(PoOutput::Done),
            Decoder::SingleRecord(number) => Ok(PoOutput::Records(vec![Record {
                number,
                data: payload.clone(),
            }])),
            Decoder::MultipleRecords => read_records::parse_multiple(payload).map(PoOutput::Records),
            Decoder::Counter => counter::parse_value(payload).map(PoOutput::Counter),
            Decoder::Pin => Ok(PoOutput::Pin(PinStatus::from_status(response.status()))),
            Decoder::Raw => Ok(PoOutput::Raw(payload.clone())),
        }
    }
}

/// A raw command supplied by the caller
///
/// The class byte must match the session revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomCommand {
    /// The APDU to send
    pub command: Command,
    /// Extra status words to accept besides 90 00
    pub extra_success: Vec<StatusWord>,
    /// Whether the command modifies card data
    pub modifying: bool,
}

impl CustomCommand {
    /// Wrap a raw command that does not modify the card
    pub fn new(command: Command) -> Self {
        Self {
            command,
            extra_success: Vec::new(),
            modifying: false,
        }
    }

    /// Mark the command as modifying
    pub const fn modifying(mut self) -> Self {
        self.modifying = true;
        self
    }

    /// Accept an additional status word as success
    pub fn accept(mut self, status: StatusWord) -> Self {
        self.extra_success.push(status);
        self
    }

    /// Encode the command for a revision
    pub fn build(&self, revision: PoRevision) -> Result<PreparedCommand> {
        revision.ensure_class(self.command.cla)?;

        let mut success = vec![status::SUCCESS];
        success.extend_from_slice(&self.extra_success);

        let mut prepared = PreparedCommand::new(
            revision,
            PoCommandRef::Custom,
            self.command.clone(),
            Decoder::Raw,
        )?
        .with_success(&success);
        prepared.modifying = self.modifying;
        Ok(prepared)
    }
}

/// P2 for record-oriented commands: `sfi << 3 | low`
pub(crate) fn sfi_p2(sfi: u8, low: u8) -> Result<u8> {
    check_sfi(sfi)?;
    Ok((sfi << 3) | low)
}

pub(crate) fn check_sfi(sfi: u8) -> Result<()> {
    if sfi > limits::MAX_SFI {
        return Err(Error::invalid_parameter(format!("SFI {sfi} above {}", limits::MAX_SFI)));
    }
    Ok(())
}

pub(crate) fn check_record(record: u8) -> Result<()> {
    if record == 0 || record > limits::MAX_RECORD {
        return Err(Error::invalid_parameter(format!(
            "record number {record} outside 1..={}",
            limits::MAX_RECORD
        )));
    }
    Ok(())
}

pub(crate) fn check_data(data: &[u8], max: usize) -> Result<()> {
    if data.is_empty() || data.len() > max {
        return Err(Error::invalid_parameter(format!(
            "data length {} outside 1..={max}",
            data.len()
        )));
    }
    Ok(())
}
