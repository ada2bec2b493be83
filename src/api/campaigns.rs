use actix_web::{
    get, post, put,
    web::{self, Json},
    HttpResponse, Responder, Scope,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_email::Email;

use crate::{
    auth::Caller, campaign::CampaignStatus, error::Error, service::NewMessage, service::Service,
};

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    name: String,
}

#[post("")]
async fn create_campaign(
    service: web::Data<Service>,
    caller: Caller,
    data: Json<CreateCampaignRequest>,
) -> Result<impl Responder, Error> {
    let campaign = service.create_campaign(&data.name, caller.name()).await?;

    tracing::info!(campaign_id = campaign.id, created_by = caller.name(), "campaign created");

    Ok(HttpResponse::Created().json(campaign))
}

#[get("")]
async fn list_campaigns(service: web::Data<Service>) -> Result<impl Responder, Error> {
    Ok(Json(service.list_campaigns().await?))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    status: CampaignStatus,
}

#[put("/{id}/status")]
async fn set_status(
    service: web::Data<Service>,
    id: web::Path<i64>,
    data: Json<SetStatusRequest>,
) -> Result<impl Responder, Error> {
    service.set_campaign_status(*id, data.status).await?;

    Ok(HttpResponse::NoContent())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMessageRequest {
    recipient: String,
    recipient_name: Option<String>,
    subject: String,
    body: String,
    scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleMessageResponse {
    pub id: i64,
}

#[post("/{id}/messages")]
async fn schedule_message(
    service: web::Data<Service>,
    id: web::Path<i64>,
    data: Json<ScheduleMessageRequest>,
) -> Result<impl Responder, Error> {
    let data = data.into_inner();

    let recipient = Email::from_str(&data.recipient)
        .map_err(|e| Error::invalid_parameter(format!("recipient: {e}")))?;

    if data.subject.trim().is_empty() {
        return Err(Error::missing_parameter("subject"));
    }

    let id = service
        .schedule_message(
            *id,
            NewMessage {
                recipient,
                recipient_name: data.recipient_name.filter(|n| !n.trim().is_empty()),
                subject: data.subject,
                body: data.body,
                scheduled_at: data.scheduled_at.map(|at| at.timestamp_micros()),
            },
        )
        .await?;

    Ok(HttpResponse::Created().json(ScheduleMessageResponse { id }))
}

#[get("/{id}/messages")]
async fn list_messages(
    service: web::Data<Service>,
    id: web::Path<i64>,
) -> Result<impl Responder, Error> {
    Ok(Json(service.list_messages(*id).await?))
}

pub fn service() -> Scope {
    web::scope("/campaigns")
        .service(create_campaign)
        .service(list_campaigns)
        .service(set_status)
        .service(schedule_message)
        .service(list_messages)
}
