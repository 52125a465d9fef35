//! Status word definitions for APDU responses

use std::fmt;

use tracing::{Level, debug, info, warn};

/// Status Word (SW1-SW2) from an APDU response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Create from a u16 value (SW1 | SW2)
    pub const fn from_u16(status: u16) -> Self {
        Self {
            sw1: (status >> 8) as u8,
            sw2: status as u8,
        }
    }

    /// Convert to a u16 value (SW1 | SW2)
    pub const fn to_u16(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Check if this status word indicates success (90 00)
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Check if this status word is a warning (62 XX, 63 XX)
    pub const fn is_warning(&self) -> bool {
        self.sw1 == 0x62 || self.sw1 == 0x63
    }

    /// Remaining PIN presentation attempts carried by a 63 CX status
    pub const fn remaining_attempts(&self) -> Option<u8> {
        if self.sw1 == 0x63 && (self.sw2 & 0xF0) == 0xC0 {
            Some(self.sw2 & 0x0F)
        } else {
            None
        }
    }

    /// Get the appropriate tracing level for this status word
    pub const fn tracing_level(&self) -> Level {
        if self.is_success() {
            Level::DEBUG
        } else if self.is_warning() || self.sw1 == 0x61 {
            Level::INFO
        } else {
            Level::WARN
        }
    }

    /// Emit a tracing event for `command` answered with this status,
    /// at [`tracing_level`](Self::tracing_level)
    pub fn log(&self, command: &dyn fmt::Display) {
        let level = self.tracing_level();
        if level == Level::DEBUG {
            debug!(%command, status = %self, "{}", self.description());
        } else if level == Level::INFO {
            info!(%command, status = %self, "{}", self.description());
        } else {
            warn!(%command, status = %self, "{}", self.description());
        }
    }

    /// Get a description of this status word as reported by Calypso cards and SAMs
    pub const fn description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "Success",
            (0x61, _) => "Successful execution, response data available",
            (0x62, 0x00) => "Successful execution with warning",
            (0x63, n) if (n & 0xF0) == 0xC0 => "Incorrect PIN, attempts remaining",
            (0x64, 0x00) => "Too many modifications in session",
            (0x65, 0x81) => "Memory failure",
            (0x67, 0x00) => "Lc value not supported",
            (0x69, 0x81) => "Command incompatible with file structure",
            (0x69, 0x82) => "Security conditions not fulfilled",
            (0x69, 0x83) => "PIN blocked",
            (0x69, 0x84) => "Referenced data invalidated",
            (0x69, 0x85) => "Access forbidden",
            (0x69, 0x86) => "Command not allowed, no current EF",
            (0x69, 0x88) => "Incorrect signature",
            (0x6A, 0x80) => "Incorrect parameters in the data field",
            (0x6A, 0x81) => "Function not supported",
            (0x6A, 0x82) => "File not found",
            (0x6A, 0x83) => "Record not found",
            (0x6A, 0x87) => "Lc inconsistent with P1-P2",
            (0x6A, 0x88) => "Referenced data not found",
            (0x6B, 0x00) => "Incorrect parameters P1-P2",
            (0x6C, _) => "Wrong Le field",
            (0x6D, 0x00) => "Instruction unknown",
            (0x6E, 0x00) => "Class not supported",
            (0x6F, 0x00) => "No precise diagnosis",
            _ => "Unknown status word",
        }
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from(tuple: (u8, u8)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

impl From<u16> for StatusWord {
    fn from(status: u16) -> Self {
        Self::from_u16(status)
    }
}

impl From<StatusWord> for u16 {
    fn from(status: StatusWord) -> Self {
        status.to_u16()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.sw1, self.sw2)
    }
}

/// Status words shared by Calypso cards and SAMs
pub mod common {
    use super::StatusWord;

    /// Success (90 00)
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);

    /// Too many modifications in session (64 00)
    pub const TOO_MANY_MODIFICATIONS: StatusWord = StatusWord::new(0x64, 0x00);

    /// Memory failure (65 81)
    pub const MEMORY_FAILURE: StatusWord = StatusWord::new(0x65, 0x81);

    /// Wrong length (67 00)
    pub const WRONG_LENGTH: StatusWord = StatusWord::new(0x67, 0x00);

    /// Command incompatible with file structure (69 81)
    pub const COMMAND_INCOMPATIBLE: StatusWord = StatusWord::new(0x69, 0x81);

    /// Security conditions not fulfilled (69 82)
    pub const SECURITY_CONDITIONS_NOT_FULFILLED: StatusWord = StatusWord::new(0x69, 0x82);

    /// PIN blocked (69 83)
    pub const PIN_BLOCKED: StatusWord = StatusWord::new(0x69, 0x83);

    /// Access forbidden (69 85)
    pub const ACCESS_FORBIDDEN: StatusWord = StatusWord::new(0x69, 0x85);

    /// Command not allowed, no current EF (69 86)
    pub const COMMAND_NOT_ALLOWED: StatusWord = StatusWord::new(0x69, 0x86);

    /// Incorrect signature (69 88)
    pub const INCORRECT_SIGNATURE: StatusWord = StatusWord::new(0x69, 0x88);

    /// Incorrect parameter in the data field (6A 80)
    pub const INCORRECT_DATA: StatusWord = StatusWord::new(0x6A, 0x80);

    /// File not found (6A 82)
    pub const FILE_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x82);

    /// Record not found (6A 83)
    pub const RECORD_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x83);

    /// Referenced data not found (6A 88)
    pub const REFERENCED_DATA_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x88);

    /// Incorrect parameters P1-P2 (6B 00)
    pub const INCORRECT_P1P2: StatusWord = StatusWord::new(0x6B, 0x00);

    /// Instruction unknown (6D 00)
    pub const INSTRUCTION_UNKNOWN: StatusWord = StatusWord::new(0x6D, 0x00);

    /// Class not supported (6E 00)
    pub const CLASS_NOT_SUPPORTED: StatusWord = StatusWord::new(0x6E, 0x00);
}
