use actix_web::{
    delete, get, post,
    web::{self, Json},
    HttpResponse, Responder, Scope,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_email::Email;

use crate::{db::user::Role, error::Error, service::Service};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    email: String,
    password: SecretString,
    role: Option<Role>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub id: i64,
}

#[post("/users")]
pub async fn create_user(
    data: web::Json<CreateUserRequest>,
    service: web::Data<Service>,
) -> Result<impl Responder, Error> {
    let data = data.into_inner();

    let email = Email::from_str(&data.email)
        .map_err(|e| Error::invalid_parameter(format!("email: {e}")))?;

    let id = service
        .create_user(email, data.password, data.role.unwrap_or(Role::User))
        .await?;

    Ok(HttpResponse::Created().json(CreateUserResponse { id }))
}

#[get("/users")]
pub async fn list_users(service: web::Data<Service>) -> Result<impl Responder, Error> {
    Ok(Json(service.list_users().await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteUserRequest {
    email: String,
}

#[delete("/users")]
pub async fn delete_user(
    data: web::Json<DeleteUserRequest>,
    service: web::Data<Service>,
) -> Result<impl Responder, Error> {
    service.delete_user(&data.email).await?;

    Ok(HttpResponse::NoContent())
}

pub fn service() -> Scope {
    web::scope("/admin")
        .service(create_user)
        .service(delete_user)
        .service(list_users)
}
