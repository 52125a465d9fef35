#![allow(dead_code, unreachable_pub)]

use std::collections::VecDeque;

use bytes::Bytes;
use calypso::{
    Error, PoApplication, Result, SamAuthenticator, StartupInfo, TranscriptEntry,
    sam::{DigestInit, SamCommandRef},
};
use calypso_apdu_core::{CardTransport, StatusWord, TransportError};

pub const SERIAL: [u8; 8] = [0x00, 0x00, 0x00, 0x00, 0x12, 0x34, 0x56, 0x78];
pub const TERMINAL_SIGNATURE: [u8; 4] = [0x5A, 0x5B, 0x5C, 0x5D];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("calypso=trace,calypso_apdu_core=trace")
        .with_test_writer()
        .try_init();
}

/// Selected application advertising `subtype`
pub fn application(subtype: u8) -> PoApplication {
    PoApplication {
        df_name: Bytes::from_static(b"1TIC.ICA"),
        serial_number: Bytes::copy_from_slice(&SERIAL),
        startup_info: Some(StartupInfo {
            buffer_size_indicator: 0x0A,
            platform: 0x3C,
            application_type: 0x24,
            application_subtype: subtype,
            software_issuer: 0x14,
            software_version: 0x10,
            software_revision: 0x01,
        }),
        invalidated: false,
    }
}

/// Card answering from a script and recording what it was sent
#[derive(Debug, Default)]
pub struct ScriptedCard {
    responses: VecDeque<std::result::Result<Bytes, TransportError>>,
    pub commands: Vec<Bytes>,
}

impl ScriptedCard {
    pub fn new(responses: &[&[u8]]) -> Self {
        Self {
            responses: responses
                .iter()
                .map(|r| Ok(Bytes::copy_from_slice(r)))
                .collect(),
            commands: Vec::new(),
        }
    }

    pub fn then(mut self, response: &[u8]) -> Self {
        self.responses.push_back(Ok(Bytes::copy_from_slice(response)));
        self
    }

    pub fn then_fail(mut self, error: TransportError) -> Self {
        self.responses.push_back(Err(error));
        self
    }
}

impl CardTransport for ScriptedCard {
    fn do_transmit_raw(&mut self, command: &[u8]) -> std::result::Result<Bytes, TransportError> {
        self.commands.push(Bytes::copy_from_slice(command));
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::other("script exhausted")))
    }
}

/// SAM stub recording the calls it receives
#[derive(Debug)]
pub struct RecordingSam {
    pub calls: Vec<&'static str>,
    pub init: Option<DigestInit>,
    pub digested: Vec<TranscriptEntry>,
    pub card_signature: Option<Bytes>,
    pub authenticates: bool,
    /// Refuse every DIGEST UPDATE with 6985
    pub refuses_digest_update: bool,
}

impl RecordingSam {
    pub fn new(authenticates: bool) -> Self {
        Self {
            calls: Vec::new(),
            init: None,
            digested: Vec::new(),
            card_signature: None,
            authenticates,
            refuses_digest_update: false,
        }
    }
}

impl SamAuthenticator for RecordingSam {
    fn reset(&mut self) -> Result<()> {
        self.calls.push("reset");
        Ok(())
    }

    fn select_diversifier(&mut self, _serial: &[u8]) -> Result<()> {
        self.calls.push("select_diversifier");
        Ok(())
    }

    fn get_challenge(&mut self, length: u8) -> Result<Bytes> {
        self.calls.push("get_challenge");
        Ok(Bytes::from(vec![0xC0; usize::from(length)]))
    }

    fn digest_init(&mut self, init: &DigestInit) -> Result<()> {
        self.calls.push("digest_init");
        self.init = Some(init.clone());
        Ok(())
    }

    fn digest_update(&mut self, entry: &TranscriptEntry) -> Result<()> {
        self.calls.push("digest_update");
        if self.refuses_digest_update {
            return Err(Error::SamStatus {
                command: SamCommandRef::DigestUpdate,
                status: StatusWord::from_u16(0x6985),
            });
        }
        self.digested.push(entry.clone());
        Ok(())
    }

    fn digest_close(&mut self) -> Result<Bytes> {
        self.calls.push("digest_close");
        Ok(Bytes::copy_from_slice(&TERMINAL_SIGNATURE))
    }

    fn digest_authenticate(&mut self, signature: &[u8]) -> Result<bool> {
        self.calls.push("digest_authenticate");
        self.card_signature = Some(Bytes::copy_from_slice(signature));
        Ok(self.authenticates)
    }
}
