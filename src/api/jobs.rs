//! Externally triggered dispatcher runs.

use actix_web::{
    post,
    web::{self, Json},
    Scope,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auth::Caller,
    dispatch::{BatchSize, DispatchSummary},
    error::Error,
    service::Service,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobAction {
    ProcessQueue,
    RetryFailed,
    CleanupOldJobs,
    RecoverStalled,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    action: JobAction,
    batch_size: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    pub action: JobAction,
    pub batch_size: u32,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub success: bool,
    pub results: DispatchSummary,
    pub message: String,
    pub metadata: JobMetadata,
}

#[post("")]
#[tracing::instrument(skip_all, fields(caller = caller.name(), action = tracing::field::Empty))]
pub async fn run_job(
    service: web::Data<Service>,
    caller: Caller,
    data: Json<JobRequest>,
) -> Result<Json<JobResponse>, Error> {
    let JobRequest { action, batch_size } = data.into_inner();
    tracing::Span::current().record("action", tracing::field::display(action));

    let batch_size = match batch_size {
        Some(size) => BatchSize::new(size)?,
        None => BatchSize::default(),
    };

    if let Some(key) = caller.rate_limit_key() {
        if let Err(wait) = service.rate_limiter().check(key) {
            tracing::info!(wait_ms = wait.as_millis() as u64, "job trigger rate limited");
            return Err(Error::RateLimited {
                retry_after_secs: wait.as_secs().max(1),
            });
        }
    }

    let dispatcher = service.dispatcher();

    let (results, message) = match action {
        JobAction::ProcessQueue => {
            let summary = dispatcher.process_queue(batch_size).await?;
            let message = summary.describe();
            (summary, message)
        }
        JobAction::RetryFailed => {
            let summary = dispatcher.retry_failed_messages(batch_size).await?;
            let message = summary.describe();
            (summary, message)
        }
        JobAction::CleanupOldJobs => {
            let deleted = dispatcher.cleanup_old_jobs().await?;
            let summary = DispatchSummary {
                processed: u32::try_from(deleted).unwrap_or(u32::MAX),
                ..Default::default()
            };
            (summary, format!("Deleted {deleted} finished message(s)"))
        }
        JobAction::RecoverStalled => {
            let recovered = dispatcher.recover_stalled().await?;
            let summary = DispatchSummary {
                processed: u32::try_from(recovered).unwrap_or(u32::MAX),
                failed: u32::try_from(recovered).unwrap_or(u32::MAX),
                ..Default::default()
            };
            (
                summary,
                format!("Recovered {recovered} stalled message(s)"),
            )
        }
    };

    Ok(Json(JobResponse {
        success: true,
        results,
        message,
        metadata: JobMetadata {
            action,
            batch_size: batch_size.get(),
            processed_at: service.clock().now(),
        },
    }))
}

pub fn service() -> Scope {
    web::scope("/jobs").service(run_job)
}
