//! SAM driven through APDUs

use bytes::Bytes;
use calypso_apdu_core::{CardTransport, Command, Response};
use derive_more::Display;
use tracing::{debug, trace, warn};

use super::{
    SamAuthenticator,
    commands::{self, DigestInit, SamCommandRef},
};
use crate::{
    Error, Result,
    config::TransactionSettings,
    constants::status,
    revision::SamRevision,
    transcript::TranscriptEntry,
};

/// Progress of the SAM digest within one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum DigestPhase {
    /// No session in progress
    #[default]
    #[display("idle")]
    Idle,
    /// Terminal challenge issued, waiting for the open session answer
    #[display("challenge issued")]
    ChallengeIssued,
    /// Digesting exchanges
    #[display("digesting")]
    Digesting,
    /// Terminal signature produced, waiting for the card signature
    #[display("closed")]
    Closed,
}

/// A Calypso SAM reached through a [`CardTransport`]
///
/// The digest order is enforced: any call out of sequence fails with
/// [`Error::IllegalState`] without sending anything to the SAM.
#[derive(Debug)]
pub struct CalypsoSam<T> {
    transport: T,
    revision: SamRevision,
    phase: DigestPhase,
    signature_length: u8,
}

impl<T: CardTransport> CalypsoSam<T> {
    /// Wrap the transport of a SAM
    pub const fn new(transport: T, revision: SamRevision) -> Self {
        Self {
            transport,
            revision,
            phase: DigestPhase::Idle,
            signature_length: 4,
        }
    }

    /// Wrap the transport of a SAM of the configured revision
    pub const fn from_settings(transport: T, settings: &TransactionSettings) -> Self {
        Self::new(transport, settings.sam_revision)
    }

    /// SAM revision
    pub const fn revision(&self) -> SamRevision {
        self.revision
    }

    /// Current digest phase
    pub const fn phase(&self) -> DigestPhase {
        self.phase
    }

    /// Release the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    fn expect_phase(&self, operation: &'static str, expected: DigestPhase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(Error::illegal_state(operation, format_args!("SAM {}", self.phase)))
        }
    }

    fn exchange(&mut self, reference: SamCommandRef, command: &Command) -> Result<Response> {
        trace!(command = %reference, "Sending SAM command");
        let response = self.transport.transmit(command).map_err(Error::from_sam)?;
        response.status().log(&reference);
        Ok(response)
    }

    fn exchange_ok(&mut self, reference: SamCommandRef, command: &Command) -> Result<Bytes> {
        let response = self.exchange(reference, command)?;
        if !response.is_success() {
            return Err(Error::SamStatus {
                command: reference,
                status: response.status(),
            });
        }
        Ok(response.payload().clone())
    }

    fn expect_length(data: &Bytes, length: u8, message: &'static str) -> Result<()> {
        if data.len() == usize::from(length) {
            Ok(())
        } else {
            Err(Error::InvalidResponse(message))
        }
    }
}

impl<T: CardTransport> SamAuthenticator for CalypsoSam<T> {
    fn reset(&mut self) -> Result<()> {
        if self.phase != DigestPhase::Idle {
            debug!(phase = %self.phase, "Discarding SAM digest state");
        }
        self.phase = DigestPhase::Idle;
        Ok(())
    }

    fn select_diversifier(&mut self, serial: &[u8]) -> Result<()> {
        self.expect_phase("select diversifier", DigestPhase::Idle)?;
        let command = commands::select_diversifier(self.revision, serial)?;
        self.exchange_ok(SamCommandRef::SelectDiversifier, &command)?;
        Ok(())
    }

    fn get_challenge(&mut self, length: u8) -> Result<Bytes> {
        self.expect_phase("get challenge", DigestPhase::Idle)?;
        let command = commands::get_challenge(self.revision, length)?;
        let challenge = self.exchange_ok(SamCommandRef::GetChallenge, &command)?;
        Self::expect_length(&challenge, length, "SAM challenge length mismatch")?;
        self.phase = DigestPhase::ChallengeIssued;
        Ok(challenge)
    }

    fn digest_init(&mut self, init: &DigestInit) -> Result<()> {
        self.expect_phase("digest init", DigestPhase::ChallengeIssued)?;
        let command = commands::digest_init(self.revision, init)?;
        self.exchange_ok(SamCommandRef::DigestInit, &command)?;
        self.signature_length = init.signature_length();
        self.phase = DigestPhase::Digesting;
        Ok(())
    }

    fn digest_update(&mut self, entry: &TranscriptEntry) -> Result<()> {
        self.expect_phase("digest update", DigestPhase::Digesting)?;
        for message in [&entry.request, &entry.response] {
            let command = commands::digest_update(self.revision, message)?;
            self.exchange_ok(SamCommandRef::DigestUpdate, &command)?;
        }
        Ok(())
    }

    fn digest_close(&mut self) -> Result<Bytes> {
        self.expect_phase("digest close", DigestPhase::Digesting)?;
        let command = commands::digest_close(self.revision, self.signature_length)?;
        let signature = self.exchange_ok(SamCommandRef::DigestClose, &command)?;
        Self::expect_length(&signature, self.signature_length, "SAM signature length mismatch")?;
        self.phase = DigestPhase::Closed;
        Ok(signature)
    }

    fn digest_authenticate(&mut self, signature: &[u8]) -> Result<bool> {
        self.expect_phase("digest authenticate", DigestPhase::Closed)?;
        let command = commands::digest_authenticate(self.revision, signature)?;
        let response = self.exchange(SamCommandRef::DigestAuthenticate, &command)?;
        self.phase = DigestPhase::Idle;

        match response.status() {
            status::SUCCESS => Ok(true),
            status::INCORRECT_SIGNATURE => {
                warn!("SAM rejected the card session signature");
                Ok(false)
            }
            other => Err(Error::SamStatus {
                command: SamCommandRef::DigestAuthenticate,
                status: other,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calypso_apdu_core::TransportError;
    use hex_literal::hex;

    #[derive(Debug, Default)]
    struct ScriptedSam {
        responses: Vec<Bytes>,
        commands: Vec<Bytes>,
    }

    impl ScriptedSam {
        fn new(responses: &[&[u8]]) -> Self {
            Self {
                responses: responses.iter().map(|r| Bytes::copy_from_slice(r)).collect(),
                commands: Vec::new(),
            }
        }
    }

    impl CardTransport for ScriptedSam {
        fn do_transmit_raw(&mut self, command: &[u8]) -> std::result::Result<Bytes, TransportError> {
            self.commands.push(Bytes::copy_from_slice(command));
            if self.responses.is_empty() {
                return Err(TransportError::Timeout);
            }
            Ok(self.responses.remove(0))
        }
    }

    fn init() -> DigestInit {
        DigestInit {
            verification_mode: false,
            rev3_2_mode: false,
            extended: false,
            kif: 0x30,
            kvc: 0x79,
            open_session_data: Bytes::from_static(&hex!("0000149A00307900")),
        }
    }

    #[test]
    fn test_full_digest_sequence() {
        let transport = ScriptedSam::new(&[
            &hex!("C1C2C3C49000"),
            &hex!("9000"),
            &hex!("9000"),
            &hex!("9000"),
            &hex!("A831C33E9000"),
            &hex!("9000"),
        ]);
        let mut sam = CalypsoSam::new(transport, SamRevision::S1D);

        sam.reset().unwrap();
        assert_eq!(sam.get_challenge(4).unwrap().as_ref(), hex!("C1C2C3C4"));
        sam.digest_init(&init()).unwrap();
        sam.digest_update(&TranscriptEntry {
            request: Bytes::from_static(&hex!("00B2013C00")),
            response: Bytes::from_static(&hex!("01029000")),
        })
        .unwrap();
        assert_eq!(sam.digest_close().unwrap().as_ref(), hex!("A831C33E"));
        assert!(sam.digest_authenticate(&hex!("11223344")).unwrap());
        assert_eq!(sam.phase(), DigestPhase::Idle);

        let sent = sam.into_inner().commands;
        assert_eq!(sent.len(), 6);
        assert_eq!(sent[2].as_ref(), hex!("948C00000500B2013C00"));
        assert_eq!(sent[3].as_ref(), hex!("948C00000401029000"));
    }

    #[test]
    fn test_revision_from_settings() {
        let settings = TransactionSettings::default().with_sam_revision(SamRevision::C1);
        let mut sam = CalypsoSam::from_settings(ScriptedSam::new(&[&hex!("C1C2C3C49000")]), &settings);
        assert_eq!(sam.revision(), SamRevision::C1);
        sam.get_challenge(4).unwrap();
        assert_eq!(sam.into_inner().commands[0].as_ref(), hex!("8084000004"));
    }

    #[test]
    fn test_out_of_order_calls_are_rejected() {
        let mut sam = CalypsoSam::new(ScriptedSam::default(), SamRevision::S1D);
        assert!(matches!(sam.digest_init(&init()), Err(Error::IllegalState { .. })));
        assert!(matches!(sam.digest_close(), Err(Error::IllegalState { .. })));
        assert!(matches!(
            sam.digest_authenticate(&hex!("11223344")),
            Err(Error::IllegalState { .. })
        ));
        assert!(sam.into_inner().commands.is_empty());
    }

    #[test]
    fn test_rejected_signature() {
        let transport = ScriptedSam::new(&[
            &hex!("C1C2C3C49000"),
            &hex!("9000"),
            &hex!("A831C33E9000"),
            &hex!("6988"),
        ]);
        let mut sam = CalypsoSam::new(transport, SamRevision::C1);
        sam.get_challenge(4).unwrap();
        sam.digest_init(&init()).unwrap();
        sam.digest_close().unwrap();
        assert!(!sam.digest_authenticate(&hex!("11223344")).unwrap());
    }

    #[test]
    fn test_sam_failures() {
        let mut sam = CalypsoSam::new(ScriptedSam::new(&[&hex!("6D00")]), SamRevision::S1D);
        assert!(matches!(
            sam.get_challenge(4),
            Err(Error::SamStatus {
                command: SamCommandRef::GetChallenge,
                ..
            })
        ));
        assert_eq!(sam.phase(), DigestPhase::Idle);

        assert!(matches!(sam.get_challenge(4), Err(Error::SamTransport(TransportError::Timeout))));

        let mut sam = CalypsoSam::new(ScriptedSam::new(&[&hex!("C1C29000")]), SamRevision::S1D);
        assert!(matches!(sam.get_challenge(4), Err(Error::InvalidResponse(_))));
    }
}
