//! Secure session transactions
//!
//! A [`PoTransaction`] drives one card and one SAM through a secure session:
//!
//! ```text
//! Idle ──open──▶ SessionOpen ──close──▶ Closing ──▶ ClosedOk | ClosedFailed
//!                     │
//!                     └──cancel / fatal error──▶ Cancelled
//! ```
//!
//! Every command exchanged while the session is open is recorded and digested
//! by the SAM in transmission order. The session only succeeds when the card
//! accepts the terminal signature and the SAM accepts the card signature.

use calypso_apdu_core::{CardTransport, Response, command::MAX_SHORT_DATA};
use tracing::{debug, info, instrument, warn};

use crate::{
    Error, Result,
    commands::{
        CloseSession, CloseSessionData, OpenSession, PoCommand, PoCommandRef, PoOutput,
        PreparedCommand, abort_session, ratification,
    },
    config::{SessionAccessLevel, TransactionSettings},
    constants::limits,
    po::PoApplication,
    revision::PoRevision,
    sam::{DigestInit, SamAuthenticator},
    session::{SecureSession, SessionState},
    transcript::ModificationsBuffer,
};

/// A secure session transaction with one portable object
///
/// Every operation takes `&mut self`: a transaction serves one reader and
/// sharing it needs an external lock.
#[derive(Debug)]
pub struct PoTransaction<C, S> {
    card: C,
    sam: S,
    application: Option<PoApplication>,
    settings: TransactionSettings,
    revision: PoRevision,
    extended: bool,
    state: SessionState,
    session: Option<SecureSession>,
}

impl<C: CardTransport, S: SamAuthenticator> PoTransaction<C, S> {
    /// Create a transaction
    ///
    /// The card revision is taken from the settings when set, otherwise
    /// detected from the application subtype, otherwise revision 3.1.
    /// Extended mode only applies to revision 3.2 cards.
    pub fn new(
        card: C,
        sam: S,
        application: Option<PoApplication>,
        settings: TransactionSettings,
    ) -> Result<Self> {
        settings.validate()?;

        let detected = application
            .as_ref()
            .and_then(|app| app.revision(&settings.revision_boundaries))
            .transpose()?;
        let revision = settings.po_revision.or(detected).unwrap_or_default();
        let extended = settings.extended_mode && revision == PoRevision::Rev3_2;

        debug!(%revision, extended, "Transaction created");
        Ok(Self {
            card,
            sam,
            application,
            settings,
            revision,
            extended,
            state: SessionState::Idle,
            session: None,
        })
    }

    /// Current state
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Card revision used for every command of this transaction
    pub const fn revision(&self) -> PoRevision {
        self.revision
    }

    /// Open session context, while a session is open
    pub const fn session(&self) -> Option<&SecureSession> {
        self.session.as_ref()
    }

    /// Selected application, when one was supplied
    pub const fn application(&self) -> Option<&PoApplication> {
        self.application.as_ref()
    }

    /// Settings of the transaction
    pub const fn settings(&self) -> &TransactionSettings {
        &self.settings
    }

    /// Release the card and the SAM
    pub fn into_inner(self) -> (C, S) {
        (self.card, self.sam)
    }

    fn ensure_state(&self, operation: &'static str, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::illegal_state(operation, self.state))
        }
    }

    /// Open a secure session, reading `record` of `sfi` when both are non-zero
    ///
    /// On any failure the transaction stays idle and no session state is kept.
    #[instrument(level = "debug", skip(self), fields(revision = %self.revision))]
    pub fn open_session(
        &mut self,
        access_level: SessionAccessLevel,
        sfi: u8,
        record: u8,
    ) -> Result<&SecureSession> {
        self.ensure_state("open a session", SessionState::Idle)?;
        OpenSession::check(self.revision, sfi, record, self.extended)?;

        match self.establish(access_level, sfi, record) {
            Ok(session) => {
                info!(
                    kif = session.kif(),
                    kvc = session.kvc(),
                    ratified = session.previous_session_ratified(),
                    "Secure session opened"
                );
                self.state = SessionState::SessionOpen;
                Ok(self.session.insert(session))
            }
            Err(err) => {
                warn!(error = %err, "Opening the secure session failed");
                self.reset_sam_quietly();
                Err(err)
            }
        }
    }

    fn establish(
        &mut self,
        access_level: SessionAccessLevel,
        sfi: u8,
        record: u8,
    ) -> Result<SecureSession> {
        self.sam.reset()?;
        if let Some(app) = &self.application {
            self.sam.select_diversifier(&app.serial_number)?;
        }
        let challenge = self
            .sam
            .get_challenge(OpenSession::challenge_length(self.revision, self.extended))?;

        let open = OpenSession::new(access_level, sfi, record, challenge)
            .with_extended_mode(self.extended);
        let response = self.card.transmit(&open.to_command(self.revision)?)?;
        response.status().log(&PoCommandRef::OpenSession);

        // From here on the card may hold an open session
        let data = match open.parse(self.revision, &response) {
            Ok(data) => data,
            Err(err) => {
                if response.is_success() {
                    self.abort_quietly();
                }
                return Err(err);
            }
        };

        let kvc = match (data.kvc, self.settings.default_kvc) {
            (limits::KIF_UNKNOWN, Some(default)) => default,
            (kvc, _) => kvc,
        };
        if !self.settings.is_kvc_authorized(kvc) {
            self.abort_quietly();
            return Err(Error::UnauthorizedKvc(kvc));
        }
        let kif = match data.kif {
            Some(kif) if kif != limits::KIF_UNKNOWN => kif,
            _ => self.settings.default_kifs.for_level(access_level),
        };

        let init = DigestInit {
            verification_mode: self.settings.sam_verification_mode,
            rev3_2_mode: self.revision == PoRevision::Rev3_2,
            extended: self.extended,
            kif,
            kvc,
            open_session_data: response.payload().clone(),
        };
        if let Err(err) = self.sam.digest_init(&init) {
            self.abort_quietly();
            return Err(err);
        }

        let buffer = ModificationsBuffer::for_card(
            self.revision,
            self.application.as_ref().and_then(|app| app.startup_info.as_ref()),
            self.settings.modifications_buffer,
        );
        Ok(SecureSession::new(
            self.revision,
            access_level,
            kif,
            kvc,
            data,
            buffer,
        ))
    }

    /// Build a command at the session revision and process it
    pub fn process_command(&mut self, command: &PoCommand) -> Result<PoOutput> {
        self.ensure_state("process a command", SessionState::SessionOpen)?;
        let prepared = command.build(self.revision)?;
        self.process_prepared(&prepared)
    }

    /// Process several commands in order, stopping at the first error
    pub fn process_commands(&mut self, commands: &[PoCommand]) -> Result<Vec<PoOutput>> {
        commands
            .iter()
            .map(|command| self.process_command(command))
            .collect()
    }

    /// Send a prepared command inside the open session
    ///
    /// A card status error is returned and the session stays open. A
    /// transport or SAM failure ends the session: the card session is aborted
    /// on a best-effort basis and the transaction is cancelled.
    #[instrument(level = "debug", skip_all, fields(command = %prepared.reference()))]
    pub fn process_prepared(&mut self, prepared: &PreparedCommand) -> Result<PoOutput> {
        self.ensure_state("process a command", SessionState::SessionOpen)?;
        if prepared.revision() != self.revision {
            return Err(Error::RevisionMismatch {
                expected: self.revision,
                actual: prepared.revision(),
            });
        }

        let Some(session) = self.session.as_mut() else {
            return Err(Error::illegal_state("process a command", self.state));
        };
        let request = prepared.command().to_bytes();
        check_digestible(&request)?;
        let (transcript, buffer) = session.parts_mut();
        if prepared.is_modifying() {
            buffer.reserve(prepared.data_length())?;
        }

        let raw = match self.card.transmit_raw(&request) {
            Ok(raw) => raw,
            Err(err) => return Err(self.fail_session(err.into())),
        };
        let response = match Response::from_bytes(&raw) {
            Ok(response) => response,
            Err(err) => return Err(self.fail_session(err.into())),
        };
        response.status().log(&prepared.reference());
        if let Err(err) = check_digestible(&raw) {
            return Err(self.fail_session(err));
        }

        let entry = transcript.push(request, raw);
        if let Err(err) = self.sam.digest_update(entry) {
            return Err(self.fail_session(err));
        }

        prepared.parse(&response)
    }

    /// Close the session and verify the card signature
    ///
    /// Ends in [`SessionState::ClosedOk`] only when the card accepted the
    /// terminal signature and the SAM accepted the card signature. The session
    /// is discarded in both outcomes.
    #[instrument(level = "debug", skip(self), fields(revision = %self.revision))]
    pub fn close_session(&mut self) -> Result<CloseSessionData> {
        self.ensure_state("close the session", SessionState::SessionOpen)?;
        self.state = SessionState::Closing;
        self.session = None;

        match self.finish_close() {
            Ok(data) => {
                self.state = SessionState::ClosedOk;
                info!("Secure session closed");
                if self.revision == PoRevision::Rev2_4 && self.settings.ratification_requested {
                    self.ratify();
                }
                Ok(data)
            }
            Err(err) => {
                self.state = SessionState::ClosedFailed;
                warn!(error = %err, "Closing the secure session failed");
                self.reset_sam_quietly();
                Err(err)
            }
        }
    }

    fn finish_close(&mut self) -> Result<CloseSessionData> {
        let close = match self.sam.digest_close() {
            Ok(signature) => CloseSession::new(signature, self.settings.ratification_requested),
            Err(err) => {
                self.abort_quietly();
                return Err(err);
            }
        };

        let sent = close
            .to_command(self.revision)
            .and_then(|command| Ok(self.card.transmit(&command)?));
        let response = match sent {
            Ok(response) => response,
            Err(err) => {
                self.abort_quietly();
                return Err(err);
            }
        };

        let data = close.parse(&response)?;
        if !self.sam.digest_authenticate(&data.signature)? {
            return Err(Error::AuthenticationFailed);
        }
        Ok(data)
    }

    /// Abort the session without MAC
    ///
    /// The session state is discarded even when the abort command fails.
    #[instrument(level = "debug", skip(self), fields(revision = %self.revision))]
    pub fn cancel_session(&mut self) -> Result<()> {
        self.ensure_state("cancel the session", SessionState::SessionOpen)?;
        self.session = None;
        self.state = SessionState::Cancelled;
        self.reset_sam_quietly();

        let response = self.card.transmit(&abort_session(self.revision))?;
        if !response.is_success() {
            return Err(Error::card_status(
                PoCommandRef::AbortSession,
                response.status(),
            ));
        }
        info!("Secure session cancelled");
        Ok(())
    }

    /// End the session after a fatal error and hand the error back
    fn fail_session(&mut self, err: Error) -> Error {
        warn!(error = %err, "Fatal error inside the session, cancelling");
        self.session = None;
        self.state = SessionState::Cancelled;
        self.abort_quietly();
        self.reset_sam_quietly();
        err
    }

    fn abort_quietly(&mut self) {
        match self.card.transmit(&abort_session(self.revision)) {
            Ok(response) if response.is_success() => debug!("Card session aborted"),
            Ok(response) => warn!(status = %response.status(), "Card refused the session abort"),
            Err(err) => warn!(error = %err, "Session abort failed"),
        }
    }

    fn reset_sam_quietly(&mut self) {
        if let Err(err) = self.sam.reset() {
            warn!(error = %err, "SAM reset failed");
        }
    }

    fn ratify(&mut self) {
        match self.card.transmit(&ratification(self.revision)) {
            Ok(response) => debug!(status = %response.status(), "Ratification sent"),
            Err(err) => debug!(error = %err, "Ratification not delivered"),
        }
    }
}

/// One DIGEST UPDATE carries a whole request or response
fn check_digestible(message: &[u8]) -> Result<()> {
    if message.len() > MAX_SHORT_DATA {
        return Err(Error::DigestTooLong {
            length: message.len(),
        });
    }
    Ok(())
}
