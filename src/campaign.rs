use serde::{Deserialize, Serialize};
use sqlx::FromRow;

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
)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    /// The only status whose messages are dispatched.
    Active,
    Paused,
    Completed,
}

/// A named outreach effort grouping messages.
///
/// The counters are informational and are not maintained by the dispatcher.
#[derive(Serialize, Deserialize, FromRow, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub status: CampaignStatus,
    pub sent_count: i64,
    pub opened_count: i64,
    pub replied_count: i64,
    pub bounced_count: i64,
    pub created_by: String,
    pub created_at: i64,
}

impl PartialEq for Campaign {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// A campaign plus a breakdown of its messages by delivery state.
#[derive(Serialize, Deserialize, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatistics {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub campaign: Campaign,
    pub queued: i64,
    pub processing: i64,
    pub sent: i64,
    /// Failed messages still eligible for retry.
    pub failed: i64,
    /// Failed messages that reached the retry ceiling.
    pub exhausted: i64,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
}
