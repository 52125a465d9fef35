//! Application selection and portable object identity
//!
//! Selecting the Calypso application returns an FCI carrying the DF name, the
//! application serial number and the startup information from which the card
//! revision and session buffer size are derived.

use bytes::Bytes;
use calypso_apdu_core::{CardTransport, Command, Response};
use iso7816_tlv::ber::{Tlv, Value};
use tracing::{debug, instrument};

use crate::{
    Error, Result,
    commands::PoCommandRef,
    constants::{cla, ins, limits, params, status, tags},
    revision::{PoRevision, RevisionBoundaries},
};

/// Session buffer sizes indexed by the startup buffer size indicator
const BUFFER_SIZES: [usize; 56] = [
    0, 0, 0, 0, 0, 0, 215, 256, 304, 362, 430, 512, 608, 724, 861, 1024, 1217, 1448, 1722, 2048,
    2435, 2896, 3444, 4096, 4870, 5792, 6888, 8192, 9741, 11585, 13777, 16384, 19483, 23170,
    27554, 32768, 38967, 46340, 55108, 65536, 77935, 92681, 110217, 131072, 155871, 185363,
    220435, 262144, 311743, 370727, 440871, 524288, 623487, 741455, 881743, 1048576,
];

/// Startup information advertised in the FCI discretionary data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupInfo {
    /// Session modifications buffer size indicator
    pub buffer_size_indicator: u8,
    /// Chip platform
    pub platform: u8,
    /// Application type bit field
    pub application_type: u8,
    /// Application subtype, used for revision detection
    pub application_subtype: u8,
    /// Software issuer
    pub software_issuer: u8,
    /// Software version
    pub software_version: u8,
    /// Software revision
    pub software_revision: u8,
}

impl StartupInfo {
    /// Length of the startup information
    pub const LENGTH: usize = 7;

    /// Parse the seven startup bytes; extra trailing bytes are ignored
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        match data {
            [
                buffer_size_indicator,
                platform,
                application_type,
                application_subtype,
                software_issuer,
                software_version,
                software_revision,
                ..,
            ] => Ok(Self {
                buffer_size_indicator: *buffer_size_indicator,
                platform: *platform,
                application_type: *application_type,
                application_subtype: *application_subtype,
                software_issuer: *software_issuer,
                software_version: *software_version,
                software_revision: *software_revision,
            }),
            _ => Err(Error::InvalidResponse("startup information too short")),
        }
    }

    /// Session modifications buffer size in bytes, if the indicator is meaningful
    pub fn modifications_buffer_size(&self) -> Option<usize> {
        BUFFER_SIZES
            .get(usize::from(self.buffer_size_indicator))
            .copied()
            .filter(|size| *size > 0)
    }

    /// Whether the application has a PIN
    pub const fn has_pin(&self) -> bool {
        self.application_type & 0x01 != 0
    }

    /// Whether the application has a stored value purse
    pub const fn has_stored_value(&self) -> bool {
        self.application_type & 0x02 != 0
    }

    /// Whether the card waits for an explicit ratification command
    pub const fn ratification_command_required(&self) -> bool {
        self.application_type & 0x04 != 0
    }
}

/// The selected Calypso application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoApplication {
    /// Dedicated file name (AID)
    pub df_name: Bytes,
    /// Application serial number, used to diversify SAM keys
    pub serial_number: Bytes,
    /// Startup information, absent on cards that do not advertise it
    pub startup_info: Option<StartupInfo>,
    /// Whether the card answered 62 83 (application invalidated)
    pub invalidated: bool,
}

impl PoApplication {
    /// Parse a selection FCI
    pub fn from_fci(fci: &[u8]) -> Result<Self> {
        let (tlv, _) = Tlv::parse(fci);
        let tlv = tlv.map_err(|_| Error::InvalidResponse("malformed FCI"))?;
        if tlv.tag().to_bytes() != tags::FCI_TEMPLATE {
            return Err(Error::InvalidResponse("FCI template missing"));
        }

        let df_name =
            find_primitive(&tlv, tags::DF_NAME).ok_or(Error::InvalidResponse("DF name missing"))?;
        let serial_number = find_primitive(&tlv, tags::SERIAL_NUMBER)
            .ok_or(Error::InvalidResponse("serial number missing"))?;
        let startup_info = find_primitive(&tlv, tags::STARTUP_INFO)
            .map(StartupInfo::from_bytes)
            .transpose()?;

        Ok(Self {
            df_name: Bytes::copy_from_slice(df_name),
            serial_number: Bytes::copy_from_slice(serial_number),
            startup_info,
            invalidated: false,
        })
    }

    /// Resolve the card revision from the application subtype
    ///
    /// Returns `None` when the card did not advertise startup information.
    pub fn revision(&self, boundaries: &RevisionBoundaries) -> Option<Result<PoRevision>> {
        self.startup_info
            .map(|info| boundaries.resolve(info.application_subtype))
    }
}

/// Depth-first search for a primitive value by tag
fn find_primitive<'a>(tlv: &'a Tlv, tag: &[u8]) -> Option<&'a [u8]> {
    match tlv.value() {
        Value::Primitive(value) if tlv.tag().to_bytes() == tag => Some(value.as_slice()),
        Value::Primitive(_) => None,
        Value::Constructed(children) => children.iter().find_map(|child| find_primitive(child, tag)),
    }
}

/// SELECT APPLICATION by DF name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectApplication {
    aid: Bytes,
}

impl SelectApplication {
    /// Create the command for an AID of 5 to 16 bytes
    pub fn new(aid: impl Into<Bytes>) -> Result<Self> {
        let aid = aid.into();
        if !limits::AID_LENGTH.contains(&aid.len()) {
            return Err(Error::invalid_parameter(format!(
                "AID length {} outside 5..=16",
                aid.len()
            )));
        }
        Ok(Self { aid })
    }

    /// Encode the command; selection always uses the ISO class byte
    pub fn to_command(&self) -> Command {
        Command::new_with_data(cla::ISO7816, ins::SELECT, params::SELECT_BY_NAME, 0x00, self.aid.clone())
            .with_le(0x00)
    }

    /// Interpret the selection answer
    pub fn parse(&self, response: &Response) -> Result<PoApplication> {
        let invalidated = response.status() == status::SELECTED_INVALIDATED;
        if !response.is_success() && !invalidated {
            return Err(Error::card_status(
                PoCommandRef::SelectApplication,
                response.status(),
            ));
        }
        let mut application = PoApplication::from_fci(response.payload())?;
        application.invalidated = invalidated;
        Ok(application)
    }
}

/// Select the Calypso application and parse its FCI
#[instrument(level = "debug", skip_all, fields(aid = %hex::encode_upper(aid)))]
pub fn select_application<T: CardTransport>(transport: &mut T, aid: &[u8]) -> Result<PoApplication> {
    let select = SelectApplication::new(Bytes::copy_from_slice(aid))?;
    let response = transport.transmit(&select.to_command())?;
    let application = select.parse(&response)?;

    debug!(
        serial = %hex::encode_upper(&application.serial_number),
        subtype = application.startup_info.map(|info| info.application_subtype),
        invalidated = application.invalidated,
        "Application selected"
    );
    Ok(application)
}
