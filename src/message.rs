//! Outbound campaign messages and their delivery lifecycle.
//!
//! # Message Lifecycle
//!
//! 1. Messages are created in `Queued` status with a `scheduled_at` time
//! 2. The dispatcher claims a due message by moving it to `Processing`
//! 3. A successful delivery moves it to `Sent`, which is terminal
//! 4. A failed delivery moves it to `Failed` and bumps `retry_count`
//!
//! `Failed` messages are claimed again by the retry path until `retry_count`
//! reaches [`MAX_RETRIES`]; after that they are only visible to operators.

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

/// Number of failed deliveries after which a message is no longer retried.
pub const MAX_RETRIES: i64 = 3;

#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    sqlx::Type,
    strum::Display,
    strum::AsRefStr,
)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageStatus {
    /// Waiting for `scheduled_at` to pass.
    Queued,
    /// Claimed by a dispatcher run; a delivery attempt is in flight.
    Processing,
    /// Accepted by the mail provider.
    Sent,
    /// Last delivery attempt failed; see `retry_count`.
    Failed,
}

/// A persisted outbound email.
///
/// All timestamps are microseconds since the Unix epoch.
#[derive(Serialize, Deserialize, FromRow, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub campaign_id: i64,
    pub contact_id: i64,
    pub subject: String,
    pub body: String,
    pub status: MessageStatus,
    pub scheduled_at: i64,
    pub sent_at: Option<i64>,
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Message {
    /// A failed message that the retry path will never select again.
    pub fn is_exhausted(&self) -> bool {
        self.status == MessageStatus::Failed && self.retry_count >= MAX_RETRIES
    }
}

/// The slice of a message (joined with its contact) that a delivery needs.
#[derive(FromRow, Debug, Clone)]
pub struct PendingDelivery {
    pub id: i64,
    pub campaign_id: i64,
    pub recipient: String,
    pub recipient_name: Option<String>,
    pub subject: String,
    pub body: String,
}

/// What gets handed to a [`crate::mail::MailProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(status: MessageStatus, retry_count: i64) -> Message {
        Message {
            id: 1,
            campaign_id: 1,
            contact_id: 1,
            subject: "hi".to_owned(),
            body: "<p>hi</p>".to_owned(),
            status,
            scheduled_at: 0,
            sent_at: None,
            error_message: None,
            retry_count,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_exhausted_only_when_failed_at_ceiling() {
        assert!(!message(MessageStatus::Failed, 2).is_exhausted());
        assert!(message(MessageStatus::Failed, 3).is_exhausted());
        assert!(!message(MessageStatus::Sent, 3).is_exhausted());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(MessageStatus::Processing.as_ref(), "processing");
        assert_eq!(
            serde_json::to_string(&MessageStatus::Failed).unwrap(),
            "\"failed\""
        );
    }
}
