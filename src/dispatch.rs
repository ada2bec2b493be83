//! Campaign message dispatcher.
//!
//! Moves due messages through delivery with bounded retries. A run is
//! triggered externally and handles one batch to completion: each message is
//! claimed with a single conditional update, delivered, and finalized before
//! the next one is touched. The claim is the only thing that keeps two
//! concurrent runs from sending the same message.

use std::{sync::Arc, time::Duration};

use chrono::TimeDelta;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::{
    clock::Clock,
    config::Config,
    error::Error,
    mail::MailProvider,
    message::{Message, MessageStatus, OutboundEmail, PendingDelivery},
};

mod error;
pub mod html;
pub mod retry;
mod summary;

pub use error::{DispatchError, ErrorKind};
pub use summary::{DispatchFailure, DispatchSummary};

/// How long sent and failed messages are kept.
pub const RETENTION: TimeDelta = TimeDelta::days(30);

const STALLED_ERROR: &str = "delivery outcome unknown: stalled in processing";

/// Number of messages a single run may handle, between 1 and 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSize(u32);

impl BatchSize {
    pub const MAX: u32 = 100;

    pub fn new(size: i64) -> Result<Self, Error> {
        match u32::try_from(size) {
            Ok(size) if (1..=Self::MAX).contains(&size) => Ok(Self(size)),
            _ => Err(Error::invalid_parameter(format!(
                "batchSize must be between 1 and {}, got {size}",
                Self::MAX
            ))),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self(10)
    }
}

/// Knobs for a single delivery.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// Transport attempts per delivery, independent of `retry_count`.
    pub attempts: u32,
    pub backoff: Duration,
    /// Deadline for one provider call.
    pub timeout: Duration,
    /// Age after which a `processing` message is considered abandoned.
    pub stalled_after: Duration,
}

impl DeliverySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.send_attempts(),
            backoff: config.send_backoff(),
            timeout: config.send_timeout(),
            stalled_after: config.stalled_after(),
        }
    }
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct Dispatcher {
    db: SqlitePool,
    mailer: Arc<dyn MailProvider>,
    clock: Arc<dyn Clock>,
    settings: DeliverySettings,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        db: SqlitePool,
        mailer: Arc<dyn MailProvider>,
        clock: Arc<dyn Clock>,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            db,
            mailer,
            clock,
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// Aborts in-flight provider calls and stops claiming new messages.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn now_micros(&self) -> i64 {
        self.clock.now().timestamp_micros()
    }

    /// Delivers up to `batch_size` due messages of active campaigns, oldest first.
    #[tracing::instrument(skip(self), fields(batch_size = batch_size.get()))]
    pub async fn process_queue(&self, batch_size: BatchSize) -> Result<DispatchSummary, Error> {
        let batch = {
            let mut conn = self.db.acquire().await?;
            PendingDelivery::due(&mut conn, self.now_micros(), batch_size.get()).await?
        };

        tracing::debug!(selected = batch.len(), "selected queued messages");

        Ok(self.run_batch(batch, MessageStatus::Queued).await)
    }

    /// Gives failed messages with retries left another delivery.
    #[tracing::instrument(skip(self), fields(batch_size = batch_size.get()))]
    pub async fn retry_failed_messages(
        &self,
        batch_size: BatchSize,
    ) -> Result<DispatchSummary, Error> {
        let batch = {
            let mut conn = self.db.acquire().await?;
            PendingDelivery::retryable(&mut conn, batch_size.get()).await?
        };

        tracing::debug!(selected = batch.len(), "selected retryable messages");

        Ok(self.run_batch(batch, MessageStatus::Failed).await)
    }

    /// Deletes sent and failed messages untouched for longer than [`RETENTION`].
    #[tracing::instrument(skip(self))]
    pub async fn cleanup_old_jobs(&self) -> Result<u64, Error> {
        let cutoff = (self.clock.now() - RETENTION).timestamp_micros();

        let mut conn = self.db.acquire().await?;
        let deleted = Message::delete_finished_before(&mut conn, cutoff).await?;

        tracing::info!(deleted, "removed finished messages past retention");

        Ok(deleted)
    }

    /// Fails messages that have been `processing` for too long, e.g. because
    /// the process died mid-delivery, so the retry path can pick them up.
    #[tracing::instrument(skip(self))]
    pub async fn recover_stalled(&self) -> Result<u64, Error> {
        let stalled_after =
            TimeDelta::from_std(self.settings.stalled_after).map_err(Error::internal)?;
        let now = self.clock.now();
        let cutoff = (now - stalled_after).timestamp_micros();

        let mut conn = self.db.acquire().await?;
        let recovered =
            Message::fail_stalled(&mut conn, cutoff, STALLED_ERROR, now.timestamp_micros())
                .await?;

        if recovered > 0 {
            tracing::warn!(recovered, "failed messages stuck in processing");
        }

        Ok(recovered)
    }

    async fn run_batch(&self, batch: Vec<PendingDelivery>, from: MessageStatus) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for delivery in batch {
            if self.shutdown.is_cancelled() {
                tracing::info!("shutdown requested, leaving the rest of the batch");
                break;
            }

            let id = delivery.id;

            match self.claim(id, from).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(message_id = id, "message claimed elsewhere, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(message_id = id, error = %e, "could not claim message");
                    summary.record_unclaimed(id, e);
                    continue;
                }
            }

            match self.complete(&delivery).await {
                Ok(()) => {
                    tracing::info!(message_id = id, campaign_id = delivery.campaign_id, "message sent");
                    summary.record_sent();
                }
                Err(e) => {
                    tracing::warn!(
                        message_id = id,
                        campaign_id = delivery.campaign_id,
                        kind = %e.kind(),
                        error = %e,
                        "delivery failed"
                    );

                    if let Err(persist) = self.fail(id, &e).await {
                        tracing::error!(
                            message_id = id,
                            error = %persist,
                            "could not record delivery failure"
                        );
                    }

                    summary.record_failed(id, e);
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            sent = summary.sent,
            failed = summary.failed,
            "batch finished"
        );

        summary
    }

    async fn claim(&self, id: i64, from: MessageStatus) -> Result<bool, DispatchError> {
        let mut conn = self.db.acquire().await?;
        Ok(Message::claim(&mut conn, id, from, self.now_micros()).await?)
    }

    async fn complete(&self, delivery: &PendingDelivery) -> Result<(), DispatchError> {
        self.deliver(delivery).await?;

        let mut conn = self.db.acquire().await?;
        if !Message::mark_sent(&mut conn, delivery.id, self.now_micros()).await? {
            return Err(DispatchError::persistence(format!(
                "message {} left processing before it could be marked sent",
                delivery.id
            )));
        }

        Ok(())
    }

    async fn fail(&self, id: i64, error: &DispatchError) -> Result<(), DispatchError> {
        let mut conn = self.db.acquire().await?;
        Ok(Message::mark_failed(&mut conn, id, &error.to_string(), self.now_micros()).await?)
    }

    async fn deliver(&self, delivery: &PendingDelivery) -> Result<(), DispatchError> {
        let email = OutboundEmail {
            to: delivery.recipient.clone(),
            to_name: delivery.recipient_name.clone(),
            subject: delivery.subject.clone(),
            text: html::strip_html(&delivery.body),
            html: delivery.body.clone(),
        };

        retry::with_backoff(self.settings.attempts, self.settings.backoff, || {
            self.attempt(&email)
        })
        .await
    }

    async fn attempt(&self, email: &OutboundEmail) -> Result<(), DispatchError> {
        let cancel = self.shutdown.child_token();
        let send = self.mailer.send_email(email, cancel.clone());

        match tokio::time::timeout(self.settings.timeout, send).await {
            Ok(res) => res,
            Err(_) => {
                cancel.cancel();
                Err(DispatchError::transport(format!(
                    "mail provider did not respond within {}s",
                    self.settings.timeout.as_secs_f64()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_bounds() {
        assert!(BatchSize::new(0).is_err());
        assert!(BatchSize::new(-5).is_err());
        assert!(BatchSize::new(101).is_err());
        assert_eq!(BatchSize::new(1).unwrap().get(), 1);
        assert_eq!(BatchSize::new(100).unwrap().get(), 100);
        assert_eq!(BatchSize::default().get(), 10);
    }
}
