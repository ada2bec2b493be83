use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

/// Runtime configuration, read from `OUTREACH_`-prefixed environment variables.
#[derive(Clone, Default, Deserialize)]
pub struct Config {
    pub db_path: Option<String>,
    pub bind_host: Option<String>,
    pub port: Option<u16>,

    /// Static secret accepted as `Authorization: Bearer <secret>` from cron callers.
    pub cron_secret: Option<SecretString>,
    /// Base64 master key for signing session cookies (at least 32 bytes once decoded).
    pub session_key: Option<SecretString>,

    pub root_email: Option<String>,
    pub root_password: Option<SecretString>,

    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub mail_from: Option<String>,

    pub send_timeout_secs: Option<u64>,
    pub send_attempts: Option<u32>,
    pub send_backoff_ms: Option<u64>,
    pub rate_limit_per_minute: Option<u32>,
    pub stalled_after_secs: Option<u64>,
}

impl Config {
    pub fn load() -> eyre::Result<Self> {
        Ok(envy::prefixed("OUTREACH_").from_env::<Self>()?)
    }

    pub fn db_path(&self) -> &str {
        self.db_path.as_deref().unwrap_or("outreach.db")
    }

    pub fn bind_host(&self) -> &str {
        self.bind_host.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(8080)
    }

    pub fn smtp_port(&self) -> u16 {
        self.smtp_port.unwrap_or(587)
    }

    pub fn mail_from(&self) -> &str {
        self.mail_from.as_deref().unwrap_or("no-reply@localhost")
    }

    /// Deadline for a single provider call.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs.unwrap_or(30))
    }

    /// Transport-level attempts per delivery. Never less than one.
    pub fn send_attempts(&self) -> u32 {
        self.send_attempts.unwrap_or(2).max(1)
    }

    pub fn send_backoff(&self) -> Duration {
        Duration::from_millis(self.send_backoff_ms.unwrap_or(1000))
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute.unwrap_or(10).max(1)
    }

    pub fn stalled_after(&self) -> Duration {
        Duration::from_secs(self.stalled_after_secs.unwrap_or(15 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        envy::prefixed("OUTREACH_")
            .from_iter(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string())),
            )
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]);

        assert_eq!(config.db_path(), "outreach.db");
        assert_eq!(config.port(), 8080);
        assert_eq!(config.send_attempts(), 2);
        assert_eq!(config.send_backoff(), Duration::from_secs(1));
        assert_eq!(config.send_timeout(), Duration::from_secs(30));
        assert!(config.cron_secret.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("OUTREACH_DB_PATH", "/tmp/x.db"),
            ("OUTREACH_PORT", "9000"),
            ("OUTREACH_SEND_ATTEMPTS", "0"),
            ("OUTREACH_CRON_SECRET", "s3cret"),
            ("OUTREACH_UNRELATED", "ignored"),
        ]);

        assert_eq!(config.db_path(), "/tmp/x.db");
        assert_eq!(config.port(), 9000);
        // zero attempts would never deliver anything
        assert_eq!(config.send_attempts(), 1);
        assert!(config.cron_secret.is_some());
    }
}
