use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Coarse classification of a [`DispatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ErrorKind {
    Transport,
    Persistence,
    Validation,
}

/// Why a single message could not be delivered.
///
/// The display string is what ends up in `messages.error_message`.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum DispatchError {
    /// The provider could not be reached or refused the message.
    #[snafu(display("{message}"))]
    Transport { message: String, permanent: bool },

    #[snafu(display("{message}"))]
    Persistence { message: String },

    /// The message itself is unsendable, e.g. a malformed address.
    #[snafu(display("{message}"))]
    Validation { message: String },
}

impl DispatchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            permanent: false,
        }
    }

    /// A rejection the provider will repeat no matter how often we ask.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            permanent: true,
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::transport("delivery cancelled by shutdown")
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Persistence { .. } => ErrorKind::Persistence,
            Self::Validation { .. } => ErrorKind::Validation,
        }
    }

    /// Whether another transport attempt within the same delivery can help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                permanent: false,
                ..
            }
        )
    }
}

impl From<sqlx::Error> for DispatchError {
    fn from(e: sqlx::Error) -> Self {
        Self::persistence(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_transport_errors_retry() {
        assert!(DispatchError::transport("connection reset").is_retryable());
        assert!(!DispatchError::rejected("550 mailbox unavailable").is_retryable());
        assert!(!DispatchError::validation("bad address").is_retryable());
        assert!(!DispatchError::persistence("database is locked").is_retryable());
    }

    #[test]
    fn test_display_is_bare_message() {
        let err = DispatchError::transport("bounced");
        assert_eq!(err.to_string(), "bounced");
        assert_eq!(err.kind().to_string(), "transport");
    }
}
