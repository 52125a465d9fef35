//! Secure session state
//!
//! A [`SecureSession`] exists only between a successful opening and the end of
//! the session, whatever the outcome. Dropping it discards the transcript.

use derive_more::Display;

use crate::{
    commands::OpenSessionData,
    config::SessionAccessLevel,
    revision::PoRevision,
    transcript::{ModificationsBuffer, SessionTranscript},
};

/// Lifecycle of a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
pub enum SessionState {
    /// No session opened yet
    #[default]
    #[display("idle")]
    Idle,
    /// Session open, commands may be processed
    #[display("session open")]
    SessionOpen,
    /// Close in progress
    #[display("closing")]
    Closing,
    /// Closed, card and SAM signatures verified
    #[display("closed")]
    ClosedOk,
    /// Close failed or a signature was rejected
    #[display("closed with failure")]
    ClosedFailed,
    /// Session aborted without MAC
    #[display("cancelled")]
    Cancelled,
}

impl SessionState {
    /// Whether the transaction has reached a final state
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ClosedOk | Self::ClosedFailed | Self::Cancelled)
    }
}

/// Context of an open secure session
#[derive(Debug)]
pub struct SecureSession {
    revision: PoRevision,
    access_level: SessionAccessLevel,
    kif: u8,
    kvc: u8,
    open_data: OpenSessionData,
    transcript: SessionTranscript,
    buffer: ModificationsBuffer,
}

impl SecureSession {
    pub(crate) fn new(
        revision: PoRevision,
        access_level: SessionAccessLevel,
        kif: u8,
        kvc: u8,
        open_data: OpenSessionData,
        buffer: ModificationsBuffer,
    ) -> Self {
        Self {
            revision,
            access_level,
            kif,
            kvc,
            open_data,
            transcript: SessionTranscript::new(),
            buffer,
        }
    }

    /// Card revision the session runs at
    pub const fn revision(&self) -> PoRevision {
        self.revision
    }

    /// Access level the session was opened with
    pub const fn access_level(&self) -> SessionAccessLevel {
        self.access_level
    }

    /// Session key identifier
    pub const fn kif(&self) -> u8 {
        self.kif
    }

    /// Session key version
    pub const fn kvc(&self) -> u8 {
        self.kvc
    }

    /// Decoded answer to OPEN SECURE SESSION
    pub const fn open_data(&self) -> &OpenSessionData {
        &self.open_data
    }

    /// Whether the previous session on the card was ratified
    pub const fn previous_session_ratified(&self) -> bool {
        self.open_data.previous_session_ratified
    }

    /// Exchanges since the session was opened
    pub const fn transcript(&self) -> &SessionTranscript {
        &self.transcript
    }

    /// Modifications buffer usage
    pub const fn buffer(&self) -> &ModificationsBuffer {
        &self.buffer
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut SessionTranscript, &mut ModificationsBuffer) {
        (&mut self.transcript, &mut self.buffer)
    }
}
