//! INCREASE and DECREASE

use bytes::Bytes;
use calypso_apdu_core::Command;

use super::{Decoder, PoCommandRef, PreparedCommand, sfi_p2};
use crate::{
    Error, Result,
    constants::{ins, limits, status},
    revision::PoRevision,
};

/// Direction of a counter operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterDirection {
    /// INCREASE
    Increase,
    /// DECREASE
    Decrease,
}

impl CounterDirection {
    const fn instruction(self) -> u8 {
        match self {
            Self::Increase => ins::INCREASE,
            Self::Decrease => ins::DECREASE,
        }
    }

    pub(crate) const fn reference(self) -> PoCommandRef {
        match self {
            Self::Increase => PoCommandRef::Increase,
            Self::Decrease => PoCommandRef::Decrease,
        }
    }
}

/// Add to or subtract from a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterCommand {
    /// Increase or decrease
    pub direction: CounterDirection,
    /// Short file identifier of the counters file
    pub sfi: u8,
    /// Counter number within the file
    pub counter: u8,
    /// Amount, at most 0xFFFFFF
    pub value: u32,
}

impl CounterCommand {
    /// Increase a counter
    pub const fn increase(sfi: u8, counter: u8, value: u32) -> Self {
        Self {
            direction: CounterDirection::Increase,
            sfi,
            counter,
            value,
        }
    }

    /// Decrease a counter
    pub const fn decrease(sfi: u8, counter: u8, value: u32) -> Self {
        Self {
            direction: CounterDirection::Decrease,
            sfi,
            counter,
            value,
        }
    }

    /// Encode the command for a revision
    ///
    /// Besides 90 00 the card may answer 61 03, which is accepted as success.
    pub fn build(&self, revision: PoRevision) -> Result<PreparedCommand> {
        if self.counter == 0 {
            return Err(Error::invalid_parameter("counter number 0"));
        }
        if self.value > limits::MAX_COUNTER_VALUE {
            return Err(Error::invalid_parameter(format!(
                "counter value {:#X} above 0xFFFFFF",
                self.value
            )));
        }

        let value = self.value.to_be_bytes();
        let command = Command::new_with_data(
            revision.class_byte(),
            self.direction.instruction(),
            self.counter,
            sfi_p2(self.sfi, 0x00)?,
            Bytes::copy_from_slice(&value[1..]),
        )
        .with_le(0x00);

        Ok(
            PreparedCommand::new(revision, self.direction.reference(), command, Decoder::Counter)?
                .with_success(&[status::SUCCESS, status::COUNTER_DATA_AVAILABLE]),
        )
    }
}

/// Decode the 3-byte counter value, absent when the card returned no data
pub(crate) fn parse_value(payload: &Bytes) -> Result<Option<u32>> {
    match payload.as_ref() {
        [] => Ok(None),
        [a, b, c] => Ok(Some(u32::from_be_bytes([0, *a, *b, *c]))),
        _ => Err(Error::InvalidResponse("counter value must be 3 bytes")),
    }
}
