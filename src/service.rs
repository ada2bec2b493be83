use std::{num::NonZeroU32, sync::Arc};

use secrecy::SecretString;
use serde_email::Email;
use sqlx::{
    sqlite::{
        SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqliteLockingMode,
        SqlitePoolOptions,
    },
    Acquire, SqlitePool,
};

use crate::{
    auth::crypto::{hash_secret, verify_secret},
    campaign::{Campaign, CampaignStatistics, CampaignStatus, Contact},
    clock::{Clock, SystemClock},
    config::Config,
    db::user::{Role, User, UserInfo},
    dispatch::{DeliverySettings, Dispatcher},
    error::Error,
    mail::{self, MailProvider},
    message::Message,
    ratelimit::{KeyedRateLimiter, RateLimiter},
};

/// A message to be scheduled on a campaign.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub recipient: Email,
    pub recipient_name: Option<String>,
    pub subject: String,
    pub body: String,
    /// Microseconds since the Unix epoch; `None` schedules for now.
    pub scheduled_at: Option<i64>,
}

pub struct Service {
    db: SqlitePool,
    config: Config,
    dispatcher: Dispatcher,
    rate_limiter: Arc<dyn RateLimiter>,
    clock: Arc<dyn Clock>,
}

#[bon::bon]
impl Service {
    /// Opens the database, runs migrations and wires up the dispatcher.
    ///
    /// Collaborators that are not provided are built from `config`.
    #[builder]
    pub async fn connect_with(
        config: Config,
        mailer: Option<Arc<dyn MailProvider>>,
        clock: Option<Arc<dyn Clock>>,
        rate_limiter: Option<Arc<dyn RateLimiter>>,
    ) -> eyre::Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(config.db_path())
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .locking_mode(SqliteLockingMode::Normal)
            .optimize_on_close(true, None)
            .auto_vacuum(SqliteAutoVacuum::Full);

        let pool = SqlitePoolOptions::new().connect_with(opts).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let mailer = match mailer {
            Some(mailer) => mailer,
            None => mail::from_config(&config)?,
        };
        let clock = clock.unwrap_or_else(|| Arc::new(SystemClock));
        let rate_limiter = rate_limiter.unwrap_or_else(|| {
            let per_minute =
                NonZeroU32::new(config.rate_limit_per_minute()).unwrap_or(NonZeroU32::MIN);
            Arc::new(KeyedRateLimiter::per_minute(per_minute))
        });

        let dispatcher = Dispatcher::new(
            pool.clone(),
            mailer,
            clock.clone(),
            DeliverySettings::from_config(&config),
        );

        let service = Self {
            db: pool,
            config,
            dispatcher,
            rate_limiter,
            clock,
        };

        service.bootstrap_root().await?;

        Ok(service)
    }
}

impl Service {
    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn now_micros(&self) -> i64 {
        self.clock.now().timestamp_micros()
    }

    async fn bootstrap_root(&self) -> eyre::Result<()> {
        let (Some(email), Some(password)) = (
            self.config.root_email.as_deref(),
            self.config.root_password.as_ref(),
        ) else {
            return Ok(());
        };

        let mut conn = self.db.acquire().await?;
        if User::find(&mut conn, email).await?.is_some() {
            return Ok(());
        }

        let email = Email::from_str(email).map_err(|e| eyre::eyre!("invalid root email: {e}"))?;
        self.create_user(email, password.clone(), Role::Admin)
            .await
            .map_err(|e| eyre::eyre!("failed to create root user: {e}"))?;

        tracing::info!("created root admin user");

        Ok(())
    }

    pub async fn create_user(
        &self,
        email: Email,
        password: SecretString,
        role: Role,
    ) -> Result<i64, Error> {
        let hashed = tokio::task::spawn_blocking(move || hash_secret(&password))
            .await
            .map_err(Error::internal)??;

        let mut tx = self.db.begin().await?;
        let id = User::insert(tx.acquire().await?, email.as_str(), hashed.as_str(), role).await?;
        tx.commit().await?;

        Ok(id)
    }

    /// Checks a login attempt. Unknown users and wrong passwords look the same.
    pub async fn verify_user(&self, email: &str, password: SecretString) -> Result<User, Error> {
        let mut conn = self.db.acquire().await?;
        let user = User::find(&mut conn, email)
            .await?
            .ok_or(Error::Unauthorized)?;

        let hash = user.hashed_password.clone();
        tokio::task::spawn_blocking(move || verify_secret(&password, &hash))
            .await
            .map_err(Error::internal)?
            .map_err(|_| Error::Unauthorized)?;

        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<UserInfo>, Error> {
        let mut conn = self.db.acquire().await?;
        Ok(User::list(&mut conn).await?)
    }

    pub async fn delete_user(&self, email: &str) -> Result<(), Error> {
        let mut conn = self.db.acquire().await?;
        if !User::delete(&mut conn, email).await? {
            return Err(Error::not_found(format!("user {email}")));
        }
        Ok(())
    }

    /// Returns the user's role if it is at least `required`.
    pub async fn check_user_role(&self, email: &str, required: Role) -> Result<Role, Error> {
        let mut conn = self.db.acquire().await?;
        let user = User::find(&mut conn, email)
            .await?
            .ok_or(Error::Unauthorized)?;

        if user.role < required {
            return Err(Error::Forbidden);
        }

        Ok(user.role)
    }

    pub async fn create_campaign(&self, name: &str, created_by: &str) -> Result<Campaign, Error> {
        if name.trim().is_empty() {
            return Err(Error::invalid_parameter("campaign name must not be empty"));
        }

        let mut conn = self.db.acquire().await?;
        Ok(Campaign::insert(&mut conn, name.trim(), created_by, self.now_micros()).await?)
    }

    pub async fn list_campaigns(&self) -> Result<Vec<CampaignStatistics>, Error> {
        let mut conn = self.db.acquire().await?;
        Ok(Campaign::statistics(&mut conn).await?)
    }

    pub async fn set_campaign_status(&self, id: i64, status: CampaignStatus) -> Result<(), Error> {
        let mut conn = self.db.acquire().await?;
        if !Campaign::set_status(&mut conn, id, status).await? {
            return Err(Error::campaign_not_found(id));
        }

        tracing::info!(campaign_id = id, %status, "campaign status changed");

        Ok(())
    }

    /// Queues a message on a campaign, creating the contact if needed.
    pub async fn schedule_message(&self, campaign_id: i64, msg: NewMessage) -> Result<i64, Error> {
        let now = self.now_micros();

        let mut tx = self.db.begin().await?;

        if Campaign::get(tx.acquire().await?, campaign_id).await?.is_none() {
            return Err(Error::campaign_not_found(campaign_id));
        }

        let contact = Contact::ensure(
            tx.acquire().await?,
            msg.recipient.as_str(),
            msg.recipient_name.as_deref(),
        )
        .await?;

        let id = Message::insert(
            tx.acquire().await?,
            campaign_id,
            contact.id,
            &msg.subject,
            &msg.body,
            msg.scheduled_at.unwrap_or(now),
            now,
        )
        .await?;

        tx.commit().await?;

        Ok(id)
    }

    pub async fn list_messages(&self, campaign_id: i64) -> Result<Vec<Message>, Error> {
        let mut conn = self.db.acquire().await?;

        if Campaign::get(&mut conn, campaign_id).await?.is_none() {
            return Err(Error::campaign_not_found(campaign_id));
        }

        Ok(Message::list_for_campaign(&mut conn, campaign_id).await?)
    }
}
