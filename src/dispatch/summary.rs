use serde::{Deserialize, Serialize};

use super::{DispatchError, ErrorKind};

/// Outcome tally of one dispatcher run.
///
/// `processed` counts messages this run claimed; it always equals
/// `sent + failed`. `errors` may additionally hold messages that could not
/// even be claimed, which stay in their previous state.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSummary {
    pub processed: u32,
    pub sent: u32,
    pub failed: u32,
    pub errors: Vec<DispatchFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchFailure {
    pub message_id: i64,
    pub kind: ErrorKind,
    pub error: String,
}

impl DispatchSummary {
    pub(crate) fn record_sent(&mut self) {
        self.processed += 1;
        self.sent += 1;
    }

    pub(crate) fn record_failed(&mut self, message_id: i64, error: DispatchError) {
        self.processed += 1;
        self.failed += 1;
        self.push_error(message_id, error);
    }

    pub(crate) fn record_unclaimed(&mut self, message_id: i64, error: DispatchError) {
        self.push_error(message_id, error);
    }

    fn push_error(&mut self, message_id: i64, error: DispatchError) {
        self.errors.push(DispatchFailure {
            message_id,
            kind: error.kind(),
            error: error.to_string(),
        });
    }

    /// Human-readable one-liner for API responses and logs.
    pub fn describe(&self) -> String {
        format!(
            "Processed {} message(s): {} sent, {} failed",
            self.processed, self.sent, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_and_description() {
        let mut summary = DispatchSummary::default();
        summary.record_sent();
        summary.record_failed(7, DispatchError::transport("bounced"));
        summary.record_unclaimed(8, DispatchError::persistence("database is locked"));

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors.len(), 2);
        assert_eq!(summary.errors[0].kind, ErrorKind::Transport);
        assert_eq!(summary.describe(), "Processed 2 message(s): 1 sent, 1 failed");
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut summary = DispatchSummary::default();
        summary.record_failed(3, DispatchError::transport("bounced"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["errors"][0]["messageId"], 3);
        assert_eq!(json["errors"][0]["kind"], "transport");
        assert_eq!(json["errors"][0]["error"], "bounced");
    }
}
