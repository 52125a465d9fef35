//! APDU command definitions and traits
//!
//! This module provides types and traits for working with short APDU commands
//! according to ISO/IEC 7816-4.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::Error;

/// Largest data field a short APDU can carry
pub const MAX_SHORT_DATA: usize = 255;

/// Core trait for APDU commands
pub trait ApduCommand {
    /// Command class (CLA)
    fn class(&self) -> u8;

    /// Instruction code (INS)
    fn instruction(&self) -> u8;

    /// First parameter (P1)
    fn p1(&self) -> u8;

    /// Second parameter (P2)
    fn p2(&self) -> u8;

    /// Command payload data (optional)
    fn data(&self) -> Option<&[u8]>;

    /// Expected response length (optional)
    fn expected_length(&self) -> Option<u8>;

    /// Convert to raw APDU bytes
    fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        // Header: CLA, INS, P1, P2
        buffer.put_u8(self.class());
        buffer.put_u8(self.instruction());
        buffer.put_u8(self.p1());
        buffer.put_u8(self.p2());

        if let Some(data) = self.data() {
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.expected_length() {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }

    /// Calculate length of serialized command
    fn command_length(&self) -> usize {
        4 + self.data().map_or(0, |data| 1 + data.len()) + usize::from(self.expected_length().is_some())
    }

    /// Convert to a generic Command
    fn to_command(&self) -> Command {
        Command {
            cla: self.class(),
            ins: self.instruction(),
            p1: self.p1(),
            p2: self.p2(),
            data: self.data().map(Bytes::copy_from_slice),
            le: self.expected_length(),
        }
    }
}

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<u8>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Check that the command can be encoded as a short APDU
    ///
    /// A present data field must hold between 1 and 255 bytes, since Lc
    /// cannot express anything else.
    pub fn validate(&self) -> Result<(), Error> {
        match self.data.as_ref().map(Bytes::len) {
            Some(0) => Err(Error::InvalidCommandData("empty data field")),
            Some(len) if len > MAX_SHORT_DATA => Err(Error::InvalidCommandLength(len)),
            _ => Ok(()),
        }
    }

    /// Raw APDU bytes, without needing [`ApduCommand`] in scope
    pub fn to_bytes(&self) -> Bytes {
        ApduCommand::to_bytes(self)
    }
}

impl ApduCommand for Command {
    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        self.ins
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        self.p2
    }

    fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    fn expected_length(&self) -> Option<u8> {
        self.le
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_command_serialization() {
        let cmd = Command::new_with_data(0x00, 0x8E, 0x80, 0x00, hex!("A831C33E").to_vec());
        assert_eq!(cmd.to_bytes().as_ref(), hex!("008E800004A831C33E"));

        let cmd = Command::new(0x94, 0xB2, 0x01, 0x0C).with_le(0x1D);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("94B2010C1D"));
    }

    #[test]
    fn test_command_length() {
        assert_eq!(Command::new(0x00, 0x04, 0x00, 0x00).command_length(), 4);
        assert_eq!(Command::new(0x00, 0xB2, 0x00, 0x00).with_le(0).command_length(), 5);

        let data = Bytes::from_static(&[0x01, 0x02, 0x03]);
        let cmd = Command::new_with_data(0x00, 0xDC, 0x01, 0x0C, data);
        assert_eq!(cmd.command_length(), 8);
        assert_eq!(cmd.with_le(0).command_length(), 9);
    }

    #[test]
    fn test_display_is_upper_hex() {
        let cmd = Command::new(0x94, 0x8E, 0x00, 0x00).with_le(0);
        assert_eq!(cmd.to_string(), "948E000000");
    }

    #[test]
    fn test_validate() {
        assert!(Command::new(0x00, 0x04, 0x00, 0x00).validate().is_ok());
        assert!(Command::new_with_data(0x00, 0xDC, 0x01, 0x0C, Bytes::new()).validate().is_err());
        assert!(
            Command::new_with_data(0x00, 0xDC, 0x01, 0x0C, vec![0u8; 256])
                .validate()
                .is_err()
        );
    }
}
