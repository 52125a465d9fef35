//! Core types for APDU (Application Protocol Data Unit) exchanges
//!
//! This crate provides the foundational types used to talk to Calypso portable
//! objects and SAMs according to ISO/IEC 7816-4.
//!
//! ## Overview
//!
//! - [`Command`] and [`Response`] model the bytes on the wire
//! - [`StatusWord`] interprets the trailing SW1-SW2 pair
//! - [`CardTransport`] is the capability used to exchange APDUs with a card
//! - [`event`] delivers reader notifications on a per-reader stream
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod event;
pub mod response;
pub mod transport;

mod error;
pub use error::{Error, Result};

pub use command::{ApduCommand, Command};
pub use event::{ReaderEvent, ReaderEventStream};
pub use response::Response;
pub use response::status::StatusWord;
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, Command, Error, Response, Result,
        command::ApduCommand,
        response::status::{StatusWord, common as status},
        transport::{CardTransport, TransportError},
    };
}
