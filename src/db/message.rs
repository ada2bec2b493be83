use sqlx::SqliteConnection;
use tokio_stream::StreamExt;

use crate::message::{Message, MessageStatus, PendingDelivery, MAX_RETRIES};

const PENDING_COLUMNS: &str = "
    m.id, m.campaign_id, m.subject, m.body,
    ct.email AS recipient, ct.name AS recipient_name
";

impl Message {
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        db: &mut SqliteConnection,
        campaign_id: i64,
        contact_id: i64,
        subject: &str,
        body: &str,
        scheduled_at: i64,
        now: i64,
    ) -> sqlx::Result<i64> {
        sqlx::query_scalar(
            "
            INSERT INTO messages
                (campaign_id, contact_id, subject, body, status, scheduled_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING id
            ",
        )
        .bind(campaign_id)
        .bind(contact_id)
        .bind(subject)
        .bind(body)
        .bind(MessageStatus::Queued)
        .bind(scheduled_at)
        .bind(now)
        .fetch_one(db)
        .await
    }

    pub async fn get(db: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Message>> {
        sqlx::query_as("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list_for_campaign(
        db: &mut SqliteConnection,
        campaign_id: i64,
    ) -> sqlx::Result<Vec<Message>> {
        let mut stream =
            sqlx::query_as("SELECT * FROM messages WHERE campaign_id = $1 ORDER BY scheduled_at, id")
                .bind(campaign_id)
                .fetch(db);

        let mut messages = Vec::new();

        while let Some(res) = stream.next().await.transpose()? {
            messages.push(res);
        }

        Ok(messages)
    }

    /// Atomically moves a message from `from` into `processing`.
    ///
    /// Returns `false` when the row no longer matches, i.e. another run
    /// claimed it first. Retry claims additionally require `retry_count` to
    /// be under the ceiling, so the guard holds even against stale selections.
    pub async fn claim(
        db: &mut SqliteConnection,
        id: i64,
        from: MessageStatus,
        now: i64,
    ) -> sqlx::Result<bool> {
        let res = sqlx::query(
            "
            UPDATE messages
            SET status = $1, updated_at = $2
            WHERE id = $3
              AND status = $4
              AND ($4 != 'failed' OR retry_count < $5)
            ",
        )
        .bind(MessageStatus::Processing)
        .bind(now)
        .bind(id)
        .bind(from)
        .bind(MAX_RETRIES)
        .execute(db)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    /// Returns `false` if the message was not in `processing` anymore.
    pub async fn mark_sent(db: &mut SqliteConnection, id: i64, now: i64) -> sqlx::Result<bool> {
        let res = sqlx::query(
            "
            UPDATE messages
            SET status = $1, sent_at = $2, error_message = NULL, updated_at = $2
            WHERE id = $3 AND status = $4
            ",
        )
        .bind(MessageStatus::Sent)
        .bind(now)
        .bind(id)
        .bind(MessageStatus::Processing)
        .execute(db)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    pub async fn mark_failed(
        db: &mut SqliteConnection,
        id: i64,
        error: &str,
        now: i64,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "
            UPDATE messages
            SET status = $1, error_message = $2, retry_count = retry_count + 1, updated_at = $3
            WHERE id = $4 AND status = $5
            ",
        )
        .bind(MessageStatus::Failed)
        .bind(error)
        .bind(now)
        .bind(id)
        .bind(MessageStatus::Processing)
        .execute(db)
        .await?;

        Ok(())
    }

    /// Deletes sent and failed messages last touched before `cutoff`.
    pub async fn delete_finished_before(
        db: &mut SqliteConnection,
        cutoff: i64,
    ) -> sqlx::Result<u64> {
        let res = sqlx::query(
            "
            DELETE FROM messages
            WHERE status IN ($1, $2) AND updated_at < $3
            ",
        )
        .bind(MessageStatus::Sent)
        .bind(MessageStatus::Failed)
        .bind(cutoff)
        .execute(db)
        .await?;

        Ok(res.rows_affected())
    }

    /// Fails every message that has sat in `processing` since before `cutoff`.
    pub async fn fail_stalled(
        db: &mut SqliteConnection,
        cutoff: i64,
        error: &str,
        now: i64,
    ) -> sqlx::Result<u64> {
        let res = sqlx::query(
            "
            UPDATE messages
            SET status = $1, error_message = $2, retry_count = retry_count + 1, updated_at = $3
            WHERE status = $4 AND updated_at < $5
            ",
        )
        .bind(MessageStatus::Failed)
        .bind(error)
        .bind(now)
        .bind(MessageStatus::Processing)
        .bind(cutoff)
        .execute(db)
        .await?;

        Ok(res.rows_affected())
    }
}

impl PendingDelivery {
    /// Queued messages of active campaigns whose send time has come, oldest first.
    pub async fn due(
        db: &mut SqliteConnection,
        now: i64,
        limit: u32,
    ) -> sqlx::Result<Vec<PendingDelivery>> {
        sqlx::query_as(&format!(
            "
            SELECT {PENDING_COLUMNS}
            FROM messages m
            JOIN campaigns ca ON ca.id = m.campaign_id
            JOIN contacts ct ON ct.id = m.contact_id
            WHERE m.status = 'queued'
              AND m.scheduled_at <= $1
              AND ca.status = 'active'
            ORDER BY m.scheduled_at ASC, m.id ASC
            LIMIT $2
            "
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(db)
        .await
    }

    /// Failed messages of active campaigns that still have retries left,
    /// least recently touched first.
    pub async fn retryable(
        db: &mut SqliteConnection,
        limit: u32,
    ) -> sqlx::Result<Vec<PendingDelivery>> {
        sqlx::query_as(&format!(
            "
            SELECT {PENDING_COLUMNS}
            FROM messages m
            JOIN campaigns ca ON ca.id = m.campaign_id
            JOIN contacts ct ON ct.id = m.contact_id
            WHERE m.status = 'failed'
              AND m.retry_count < $1
              AND ca.status = 'active'
            ORDER BY m.updated_at ASC, m.id ASC
            LIMIT $2
            "
        ))
        .bind(MAX_RETRIES)
        .bind(limit)
        .fetch_all(db)
        .await
    }
}
