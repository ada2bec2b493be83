use sqlx::SqliteConnection;
use tokio_stream::StreamExt;

use crate::campaign::{Campaign, CampaignStatistics, CampaignStatus, Contact};

impl Campaign {
    pub async fn insert(
        db: &mut SqliteConnection,
        name: &str,
        created_by: &str,
        now: i64,
    ) -> sqlx::Result<Campaign> {
        sqlx::query_as(
            "
            INSERT INTO campaigns (name, status, created_by, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(name)
        .bind(CampaignStatus::Draft)
        .bind(created_by)
        .bind(now)
        .fetch_one(db)
        .await
    }

    pub async fn get(db: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Campaign>> {
        sqlx::query_as("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Returns `false` if no such campaign exists.
    pub async fn set_status(
        db: &mut SqliteConnection,
        id: i64,
        status: CampaignStatus,
    ) -> sqlx::Result<bool> {
        let res = sqlx::query("UPDATE campaigns SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(db)
            .await?;

        Ok(res.rows_affected() == 1)
    }

    pub async fn statistics(db: &mut SqliteConnection) -> sqlx::Result<Vec<CampaignStatistics>> {
        let mut stream = sqlx::query_as(
            "
            SELECT
                c.*,
                COUNT(m.id) FILTER (WHERE m.status = 'queued') AS queued,
                COUNT(m.id) FILTER (WHERE m.status = 'processing') AS processing,
                COUNT(m.id) FILTER (WHERE m.status = 'sent') AS sent,
                COUNT(m.id) FILTER (WHERE m.status = 'failed' AND m.retry_count < $1) AS failed,
                COUNT(m.id) FILTER (WHERE m.status = 'failed' AND m.retry_count >= $1) AS exhausted
            FROM campaigns c
            LEFT JOIN messages m ON m.campaign_id = c.id
            GROUP BY c.id
            ORDER BY c.id
            ",
        )
        .bind(crate::message::MAX_RETRIES)
        .fetch(db);

        let mut stats = Vec::new();

        while let Some(res) = stream.next().await.transpose()? {
            stats.push(res);
        }

        Ok(stats)
    }
}

impl Contact {
    /// Returns the contact for `email`, creating it if needed.
    ///
    /// An existing contact keeps its name unless it had none.
    pub async fn ensure(
        db: &mut SqliteConnection,
        email: &str,
        name: Option<&str>,
    ) -> sqlx::Result<Contact> {
        sqlx::query_as(
            "
            INSERT INTO contacts (email, name) VALUES ($1, $2)
            ON CONFLICT (email) DO UPDATE SET name = COALESCE(contacts.name, excluded.name)
            RETURNING *
            ",
        )
        .bind(email)
        .bind(name)
        .fetch_one(db)
        .await
    }
}
