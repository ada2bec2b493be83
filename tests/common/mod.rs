#![allow(dead_code)]

use std::{
    ops::Deref,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use futures_util::future::BoxFuture;
use outreach::{
    campaign::CampaignStatus,
    clock::{Clock, ManualClock},
    config::Config,
    dispatch::DispatchError,
    mail::MailProvider,
    message::{Message, OutboundEmail},
    ratelimit::RateLimiter,
    service::{NewMessage, Service},
};
use serde_email::Email;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// What the fake provider does with each email.
#[derive(Clone)]
pub enum Behaviour {
    Accept,
    Fail(DispatchError),
    /// Never answers until cancelled.
    Hang,
}

pub struct FakeMailer {
    behaviour: Mutex<Behaviour>,
    delay: Duration,
    sent: Mutex<Vec<OutboundEmail>>,
    calls: Mutex<u32>,
}

impl FakeMailer {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Self::with_delay(behaviour, Duration::ZERO)
    }

    pub fn with_delay(behaviour: Behaviour, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behaviour: Mutex::new(behaviour),
            delay,
            sent: Mutex::new(Vec::new()),
            calls: Mutex::new(0),
        })
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl MailProvider for FakeMailer {
    fn send_email<'a>(
        &'a self,
        email: &'a OutboundEmail,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            *self.calls.lock().unwrap() += 1;
            let behaviour = self.behaviour.lock().unwrap().clone();

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match behaviour {
                Behaviour::Accept => {
                    self.sent.lock().unwrap().push(email.clone());
                    Ok(())
                }
                Behaviour::Fail(e) => Err(e),
                Behaviour::Hang => {
                    cancel.cancelled().await;
                    Err(DispatchError::cancelled())
                }
            }
        })
    }
}

pub struct TmpService {
    svc: Service,
    pub clock: Arc<ManualClock>,
    #[allow(unused)]
    tmpdir: TempDir,
}

impl Deref for TmpService {
    type Target = Service;

    fn deref(&self) -> &Self::Target {
        &self.svc
    }
}

impl TmpService {
    pub fn into_inner(self) -> (Service, Arc<ManualClock>, TempDir) {
        (self.svc, self.clock, self.tmpdir)
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub fn test_config(dir: &TempDir) -> Config {
    Config {
        db_path: Some(dir.path().join("outreach.db").to_string_lossy().to_string()),
        send_attempts: Some(2),
        send_backoff_ms: Some(0),
        send_timeout_secs: Some(5),
        ..Default::default()
    }
}

pub async fn setup_with(
    config: impl FnOnce(Config) -> Config,
    mailer: Arc<dyn MailProvider>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
) -> TmpService {
    let tmpdir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(epoch()));

    let svc = Service::connect_with()
        .config(config(test_config(&tmpdir)))
        .mailer(mailer)
        .clock(clock.clone() as Arc<dyn Clock>)
        .maybe_rate_limiter(rate_limiter)
        .call()
        .await
        .unwrap();

    TmpService { svc, clock, tmpdir }
}

pub async fn setup(mailer: Arc<dyn MailProvider>) -> TmpService {
    setup_with(|c| c, mailer, None).await
}

pub async fn active_campaign(service: &Service, name: &str) -> i64 {
    let campaign = service.create_campaign(name, "tests").await.unwrap();
    service
        .set_campaign_status(campaign.id, CampaignStatus::Active)
        .await
        .unwrap();
    campaign.id
}

pub async fn schedule(service: &Service, campaign_id: i64, to: &str, at: DateTime<Utc>) -> i64 {
    service
        .schedule_message(
            campaign_id,
            NewMessage {
                recipient: Email::from_str(to).unwrap(),
                recipient_name: None,
                subject: format!("Hello {to}"),
                body: "<p>Hi there,</p><p>Fish &amp; chips?</p>".to_owned(),
                scheduled_at: Some(at.timestamp_micros()),
            },
        )
        .await
        .unwrap()
}

pub async fn message(service: &Service, id: i64) -> Message {
    let mut conn = service.db().acquire().await.unwrap();
    Message::get(&mut conn, id).await.unwrap().unwrap()
}

/// Puts a message straight into `failed` with the given retry count.
pub async fn force_failed(service: &Service, id: i64, retry_count: i64, updated_at: i64) {
    sqlx::query(
        "UPDATE messages SET status = 'failed', retry_count = $1, updated_at = $2 WHERE id = $3",
    )
    .bind(retry_count)
    .bind(updated_at)
    .bind(id)
    .execute(service.db())
    .await
    .unwrap();
}
