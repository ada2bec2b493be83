//! SQLite-backed storage for actix-session.
//!
//! Each session is one row holding its state as a JSON object and an
//! absolute expiry in Unix seconds. Expired rows are invisible to `load` and
//! swept whenever a new session is saved.

use std::collections::HashMap;

use actix_session::storage::{LoadError, SaveError, SessionKey, SessionStore, UpdateError};
use actix_web::cookie::time::Duration;
use rand::distributions::{Alphanumeric, DistString};
use sqlx::SqlitePool;

/// Session values as actix-session hands them over, each already JSON-encoded.
pub type SessionState = HashMap<String, String>;

#[derive(Clone)]
pub struct SqliteSessionStore {
    db: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

fn expires_at(ttl: &Duration) -> i64 {
    chrono::Utc::now().timestamp() + ttl.whole_seconds()
}

fn generate_key() -> Result<SessionKey, anyhow::Error> {
    Alphanumeric
        .sample_string(&mut rand::thread_rng(), 64)
        .try_into()
        .map_err(anyhow::Error::new)
}

impl SessionStore for SqliteSessionStore {
    fn load(
        &self,
        session_key: &SessionKey,
    ) -> impl ::core::future::Future<Output = Result<Option<SessionState>, LoadError>> {
        let db = self.db.clone();
        let key = session_key.as_ref().to_owned();

        Box::pin(async move {
            let state: Option<String> = sqlx::query_scalar(
                "SELECT state FROM sessions WHERE session_key = $1 AND expires_at > $2",
            )
            .bind(&key)
            .bind(chrono::Utc::now().timestamp())
            .fetch_optional(&db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load session: {e}");
                LoadError::Other(anyhow::Error::new(e))
            })?;

            let Some(state) = state else {
                return Ok(None);
            };

            let state: SessionState = serde_json::from_str(&state).map_err(|e| {
                tracing::warn!("Discarding undecodable session state: {e}");
                LoadError::Deserialization(anyhow::Error::new(e))
            })?;

            Ok(Some(state))
        })
    }

    fn save(
        &self,
        session_state: SessionState,
        ttl: &Duration,
    ) -> impl ::core::future::Future<Output = Result<SessionKey, SaveError>> {
        let db = self.db.clone();
        let expires_at = expires_at(ttl);

        Box::pin(async move {
            let state = serde_json::to_string(&session_state)
                .map_err(|e| SaveError::Serialization(anyhow::Error::new(e)))?;
            let key = generate_key().map_err(SaveError::Other)?;

            let mut tx = db
                .begin()
                .await
                .map_err(|e| SaveError::Other(anyhow::Error::new(e)))?;

            sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
                .bind(chrono::Utc::now().timestamp())
                .execute(tx.as_mut())
                .await
                .map_err(|e| SaveError::Other(anyhow::Error::new(e)))?;

            sqlx::query(
                "
                INSERT INTO sessions (session_key, state, expires_at)
                VALUES ($1, $2, $3)
                ",
            )
            .bind(key.as_ref())
            .bind(state)
            .bind(expires_at)
            .execute(tx.as_mut())
            .await
            .map_err(|e| SaveError::Other(anyhow::Error::new(e)))?;

            tx.commit()
                .await
                .map_err(|e| SaveError::Other(anyhow::Error::new(e)))?;

            Ok(key)
        })
    }

    fn update(
        &self,
        session_key: SessionKey,
        session_state: SessionState,
        ttl: &Duration,
    ) -> impl ::core::future::Future<Output = Result<SessionKey, UpdateError>> {
        let db = self.db.clone();
        let expires_at = expires_at(ttl);

        Box::pin(async move {
            let state = serde_json::to_string(&session_state)
                .map_err(|e| UpdateError::Serialization(anyhow::Error::new(e)))?;

            sqlx::query(
                "
                INSERT INTO sessions (session_key, state, expires_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (session_key) DO UPDATE
                SET state = excluded.state, expires_at = excluded.expires_at
                ",
            )
            .bind(session_key.as_ref())
            .bind(state)
            .bind(expires_at)
            .execute(&db)
            .await
            .map_err(|e| UpdateError::Other(anyhow::Error::new(e)))?;

            Ok(session_key)
        })
    }

    fn update_ttl(
        &self,
        session_key: &SessionKey,
        ttl: &Duration,
    ) -> impl ::core::future::Future<Output = Result<(), anyhow::Error>> {
        let db = self.db.clone();
        let key = session_key.as_ref().to_owned();
        let expires_at = expires_at(ttl);

        Box::pin(async move {
            sqlx::query("UPDATE sessions SET expires_at = $1 WHERE session_key = $2")
                .bind(expires_at)
                .bind(key)
                .execute(&db)
                .await?;

            Ok(())
        })
    }

    fn delete(
        &self,
        session_key: &SessionKey,
    ) -> impl ::core::future::Future<Output = Result<(), anyhow::Error>> {
        let db = self.db.clone();
        let key = session_key.as_ref().to_owned();

        Box::pin(async move {
            sqlx::query("DELETE FROM sessions WHERE session_key = $1")
                .bind(key)
                .execute(&db)
                .await?;

            Ok(())
        })
    }
}
