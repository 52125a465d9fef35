//! Constants used in Calypso operations
//!
//! Class bytes, instruction codes, parameter bits and status words shared by
//! the portable object and SAM command builders.

/// Command classes
pub mod cla {
    /// ISO 7816 class, also used by revision 3 portable objects
    pub const ISO7816: u8 = 0x00;
    /// Legacy Calypso class for revision 2.4 portable objects and S1D SAMs
    pub const CALYPSO_LEGACY: u8 = 0x94;
    /// Class for C1 SAMs
    pub const SAM_C1: u8 = 0x80;
}

/// Portable object instruction codes
pub mod ins {
    /// SELECT APPLICATION
    pub const SELECT: u8 = 0xA4;
    /// OPEN SECURE SESSION
    pub const OPEN_SESSION: u8 = 0x8A;
    /// CLOSE SECURE SESSION, also used to abort
    pub const CLOSE_SESSION: u8 = 0x8E;
    /// READ RECORD(S), also used for ratification
    pub const READ_RECORDS: u8 = 0xB2;
    /// UPDATE RECORD
    pub const UPDATE_RECORD: u8 = 0xDC;
    /// WRITE RECORD
    pub const WRITE_RECORD: u8 = 0xD2;
    /// APPEND RECORD
    pub const APPEND_RECORD: u8 = 0xE2;
    /// INCREASE
    pub const INCREASE: u8 = 0x32;
    /// DECREASE
    pub const DECREASE: u8 = 0x30;
    /// VERIFY PIN
    pub const VERIFY_PIN: u8 = 0x20;
    /// INVALIDATE
    pub const INVALIDATE: u8 = 0x04;
    /// REHABILITATE
    pub const REHABILITATE: u8 = 0x44;
}

/// SAM instruction codes
pub mod sam_ins {
    /// SELECT DIVERSIFIER
    pub const SELECT_DIVERSIFIER: u8 = 0x14;
    /// GET CHALLENGE
    pub const GET_CHALLENGE: u8 = 0x84;
    /// DIGEST INIT
    pub const DIGEST_INIT: u8 = 0x8A;
    /// DIGEST UPDATE
    pub const DIGEST_UPDATE: u8 = 0x8C;
    /// DIGEST CLOSE
    pub const DIGEST_CLOSE: u8 = 0x8E;
    /// DIGEST AUTHENTICATE
    pub const DIGEST_AUTHENTICATE: u8 = 0x82;
}

/// Parameter bits and offsets
pub mod params {
    /// SELECT by DF name
    pub const SELECT_BY_NAME: u8 = 0x04;
    /// Open session P1 marker for revision 2.4 cards
    pub const OPEN_REV2_4: u8 = 0x80;
    /// Open session P2 low bits for revision 3.1 cards
    pub const OPEN_REV3_1: u8 = 0x01;
    /// Open session P2 low bits for revision 3.2 cards
    pub const OPEN_REV3_2: u8 = 0x02;
    /// Close session P1 requesting ratification
    pub const CLOSE_RATIFICATION: u8 = 0x80;
    /// Read records P2 low bits, one record
    pub const READ_ONE: u8 = 0x04;
    /// Read records P2 low bits, from P1 to the last record
    pub const READ_MULTIPLE: u8 = 0x05;
    /// Update/write record P2 low bits, record number in P1
    pub const RECORD_IN_P1: u8 = 0x04;
    /// Digest init P1 bit enabling verification mode
    pub const DIGEST_VERIFICATION: u8 = 0x01;
    /// Digest init P1 bit for revision 3.2 mode
    pub const DIGEST_REV3_2: u8 = 0x02;
    /// Digest init P2 when KIF and KVC are carried in the data field
    pub const DIGEST_KIF_KVC: u8 = 0xFF;
}

/// Limits on command parameters
pub mod limits {
    /// Highest short file identifier
    pub const MAX_SFI: u8 = 30;
    /// Highest record number reachable by record commands
    pub const MAX_RECORD: u8 = 250;
    /// Highest record number an open session can read on revision 3 cards
    pub const MAX_OPEN_RECORD_REV3: u8 = 31;
    /// Highest record number an open session can read on revision 2.4 cards
    pub const MAX_OPEN_RECORD_REV2_4: u8 = 15;
    /// Largest counter value (3 bytes)
    pub const MAX_COUNTER_VALUE: u32 = 0x00FF_FFFF;
    /// PIN length in plain mode
    pub const PIN_LENGTH: usize = 4;
    /// Shortest and longest accepted AID
    pub const AID_LENGTH: std::ops::RangeInclusive<usize> = 5..=16;
    /// Session modifications allowed on revision 2.4 cards
    pub const REV2_4_MODIFICATIONS: usize = 6;
    /// Session buffer bytes assumed when the card does not advertise its size
    pub const DEFAULT_BUFFER_BYTES: usize = 215;
    /// Buffer overhead charged per modifying command on revision 3 cards
    pub const BUFFER_OVERHEAD: usize = 6;
    /// Session key identifier meaning "not provided by the card"
    pub const KIF_UNKNOWN: u8 = 0xFF;
}

/// FCI tags returned when selecting an application
pub mod tags {
    /// FCI template
    pub const FCI_TEMPLATE: &[u8] = &[0x6F];
    /// Dedicated file name
    pub const DF_NAME: &[u8] = &[0x84];
    /// FCI proprietary template
    pub const PROPRIETARY_TEMPLATE: &[u8] = &[0xA5];
    /// FCI issuer discretionary data
    pub const DISCRETIONARY_DATA: &[u8] = &[0xBF, 0x0C];
    /// Application serial number
    pub const SERIAL_NUMBER: &[u8] = &[0xC7];
    /// Discretionary data holding the startup information
    pub const STARTUP_INFO: &[u8] = &[0x53];
}

/// Status words given specific meaning by Calypso commands
pub mod status {
    use calypso_apdu_core::StatusWord;

    pub use calypso_apdu_core::response::status::common::*;

    /// Successful execution, counter response data available (61 03)
    pub const COUNTER_DATA_AVAILABLE: StatusWord = StatusWord::new(0x61, 0x03);
    /// Application invalidated, selection still possible (62 83)
    pub const SELECTED_INVALIDATED: StatusWord = StatusWord::new(0x62, 0x83);
    /// Wrong PIN, one attempt left (63 C1)
    pub const PIN_ONE_ATTEMPT: StatusWord = StatusWord::new(0x63, 0xC1);
    /// Wrong PIN, two attempts left (63 C2)
    pub const PIN_TWO_ATTEMPTS: StatusWord = StatusWord::new(0x63, 0xC2);
}
