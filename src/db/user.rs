use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub hashed_password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct UserInfo {
    pub email: String,
    pub role: Role,
}

impl User {
    pub async fn find(db: &mut SqliteConnection, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn insert(
        db: &mut SqliteConnection,
        email: &str,
        hashed_password: &str,
        role: Role,
    ) -> sqlx::Result<i64> {
        sqlx::query_scalar(
            "INSERT INTO users (email, hashed_password, role) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(email)
        .bind(hashed_password)
        .bind(role)
        .fetch_one(db)
        .await
    }

    pub async fn list(db: &mut SqliteConnection) -> sqlx::Result<Vec<UserInfo>> {
        sqlx::query_as("SELECT email, role FROM users ORDER BY email")
            .fetch_all(db)
            .await
    }

    /// Returns `false` if there was no such user.
    pub async fn delete(db: &mut SqliteConnection, email: &str) -> sqlx::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(db)
            .await?;

        Ok(res.rows_affected() == 1)
    }
}
