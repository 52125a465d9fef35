//! Secure session transcript and modifications buffer
//!
//! The transcript keeps the raw bytes of every command exchanged after the
//! session was opened, in transmission order. The same order is fed to the
//! SAM digest, so entries are only ever appended.

use bytes::Bytes;

use crate::{
    Error, Result,
    constants::limits,
    po::StartupInfo,
    revision::PoRevision,
};

/// One exchanged command, request and response as sent on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// Raw command APDU
    pub request: Bytes,
    /// Raw response APDU, status word included
    pub response: Bytes,
}

/// Append-only ordered record of a session's exchanges
#[derive(Debug, Default)]
pub struct SessionTranscript {
    entries: Vec<TranscriptEntry>,
}

impl SessionTranscript {
    /// Create an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an exchange and return the stored entry
    pub fn push(&mut self, request: Bytes, response: Bytes) -> &TranscriptEntry {
        let index = self.entries.len();
        self.entries.push(TranscriptEntry { request, response });
        &self.entries[index]
    }

    /// Entries in transmission order
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Number of recorded exchanges
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was exchanged yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Unit in which a card counts its session modifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUnit {
    /// Revision 3 cards count bytes: each modifying command costs its Lc plus 6
    Bytes,
    /// Revision 2.4 cards count modifying commands
    Commands,
}

/// Remaining capacity of the card's session modifications buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModificationsBuffer {
    unit: BufferUnit,
    capacity: usize,
    used: usize,
}

impl ModificationsBuffer {
    /// Create a buffer with an explicit capacity
    pub const fn new(unit: BufferUnit, capacity: usize) -> Self {
        Self {
            unit,
            capacity,
            used: 0,
        }
    }

    /// Size the buffer for a card
    ///
    /// `capacity` overrides what the card advertises. Revision 3 cards
    /// without a usable buffer size indicator get 215 bytes.
    pub fn for_card(revision: PoRevision, startup: Option<&StartupInfo>, capacity: Option<usize>) -> Self {
        match revision {
            PoRevision::Rev2_4 => Self::new(
                BufferUnit::Commands,
                capacity.unwrap_or(limits::REV2_4_MODIFICATIONS),
            ),
            PoRevision::Rev3_1 | PoRevision::Rev3_2 => Self::new(
                BufferUnit::Bytes,
                capacity
                    .or_else(|| startup.and_then(StartupInfo::modifications_buffer_size))
                    .unwrap_or(limits::DEFAULT_BUFFER_BYTES),
            ),
        }
    }

    /// Unit of the buffer
    pub const fn unit(&self) -> BufferUnit {
        self.unit
    }

    /// Total capacity
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Capacity left in this session
    pub const fn remaining(&self) -> usize {
        self.capacity - self.used
    }

    /// Cost of a modifying command with `data_length` bytes of data
    pub const fn cost(&self, data_length: usize) -> usize {
        match self.unit {
            BufferUnit::Bytes => data_length + limits::BUFFER_OVERHEAD,
            BufferUnit::Commands => 1,
        }
    }

    /// Charge a modifying command, failing without side effect if it does not fit
    pub fn reserve(&mut self, data_length: usize) -> Result<()> {
        let required = self.cost(data_length);
        let remaining = self.remaining();
        if required > remaining {
            return Err(Error::SessionBufferOverflow {
                required,
                remaining,
            });
        }
        self.used += required;
        Ok(())
    }
}
