//! Command dispatcher: typed operations on a Neural Unit.
//!
//! [`NeuralUnit`] turns each command into a payload, runs it through the [`Session`], and
//! decodes the answer. It also owns the two policies the session deliberately leaves out:
//! confirmation of destructive commands, and retrying idempotent ones.

use std::time::Duration;

use tokio::time::Instant;

use crate::codec::{
    DriveCodec, DriveId, DriveReading, EventCodec, EventDescriptor, PersonalityCodec,
    PersonalitySnapshot, TrustCodec, DEFAULT_DRIVES, RESET_CONFIRMATION, RESET_GUARD,
};
use crate::config::{RetryPolicy, SessionConfig};
use crate::error::{NeuralLinkError, Result};
use crate::protocol::{CommandCode, Frame};
use crate::session::{Session, SessionBuilder};

/// Handle to one Neural Unit.
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct NeuralUnit {
    session: Session,
    retry: RetryPolicy,
}

impl NeuralUnit {
    /// Wrap an open session, taking the retry policy from its config.
    pub fn new(session: Session) -> Self {
        let retry = session.config().retry;
        Self { session, retry }
    }

    /// Open the port named in `config`.
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let port = config
            .port
            .clone()
            .ok_or_else(|| NeuralLinkError::InvalidArgument("config has no port".to_string()))?;
        let session = SessionBuilder::from_config(config.clone()).open(&port)?;
        Ok(Self::new(session))
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn call(&self, command: CommandCode, payload: &[u8]) -> Result<Frame> {
        let attempts = if command.is_idempotent() {
            self.retry.attempts.max(1)
        } else {
            1
        };

        let mut attempt = 1;
        loop {
            match self.session.request(command, payload).await {
                Ok(frame) => return Ok(frame),
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        "{} failed ({}), retrying (attempt {}/{})",
                        command,
                        e,
                        attempt + 1,
                        attempts
                    );
                    tokio::time::sleep(self.retry.backoff()).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Set one drive, `0..=100`.
    pub async fn set_drive(&self, id: DriveId, value: u8) -> Result<()> {
        let payload = DriveCodec::encode_set(id, value)?;
        self.call(CommandCode::SetDrive, &payload).await?;
        tracing::debug!("Set drive {} to {}", id, value);
        Ok(())
    }

    /// Read every drive, in the unit's order.
    pub async fn get_drives(&self) -> Result<Vec<DriveReading>> {
        let frame = self.call(CommandCode::GetDrives, &[]).await?;
        Ok(DriveCodec::decode_list(frame.payload()))
    }

    /// Write the factory drive table, stopping at the first failure.
    pub async fn apply_default_drives(&self) -> Result<()> {
        for (id, value) in DEFAULT_DRIVES {
            self.set_drive(id, value).await?;
        }
        Ok(())
    }

    /// Record an event in the unit's episodic memory.
    pub async fn encode_event(&self, event: &EventDescriptor) -> Result<()> {
        let record = EventCodec::encode(event)?;
        self.call(CommandCode::EncodeEvent, &record).await?;
        tracing::debug!(
            "Encoded event {} (valence {:.2})",
            event.kind,
            event.valence
        );
        Ok(())
    }

    /// Overall trust score, `0.0..=1.0`.
    pub async fn get_trust(&self) -> Result<f32> {
        let frame = self.call(CommandCode::GetTrust, &[]).await?;
        Ok(TrustCodec::decode(frame.payload()))
    }

    /// Trust score for one subject, `0.0..=1.0`. Unknown subjects read as `0.0`.
    pub async fn get_trust_for(&self, uid: &str) -> Result<f32> {
        let payload = TrustCodec::encode_subject(uid);
        let frame = self.call(CommandCode::GetTrust, &payload).await?;
        Ok(TrustCodec::decode(frame.payload()))
    }

    /// Snapshot every personality trait.
    pub async fn get_personality(&self) -> Result<PersonalitySnapshot> {
        let frame = self.call(CommandCode::GetPersonality, &[]).await?;
        PersonalityCodec::decode(frame.payload())
    }

    /// Irreversibly reset the unit's personality to factory defaults.
    ///
    /// `confirmation` must equal [`RESET_CONFIRMATION`]; anything else fails with
    /// `ConfirmationRequired` before a single byte is written.
    pub async fn reset_personality(&self, confirmation: &str) -> Result<()> {
        confirm(CommandCode::ResetPersonality, confirmation)?;
        tracing::warn!("Resetting personality to factory defaults");
        self.call(CommandCode::ResetPersonality, &RESET_GUARD).await?;
        Ok(())
    }

    /// Round-trip latency of a PING.
    pub async fn ping(&self) -> Result<Duration> {
        let start = Instant::now();
        self.call(CommandCode::Ping, &[]).await?;
        Ok(start.elapsed())
    }

    /// Close the session.
    pub async fn close(&self) -> Result<()> {
        Ok(self.session.close().await?)
    }
}

fn confirm(command: CommandCode, confirmation: &str) -> Result<()> {
    if command.is_destructive() && confirmation != RESET_CONFIRMATION {
        return Err(NeuralLinkError::ConfirmationRequired(command));
    }
    Ok(())
}
