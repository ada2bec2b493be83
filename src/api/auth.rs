use actix_identity::Identity;
use actix_web::{
    get, post,
    web::{self, Json},
    HttpMessage, HttpRequest, HttpResponse, Responder, Scope,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::{error::Error, service::Service};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: SecretString,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum SessionResponse {
    Valid { email: String },
    Invalid,
}

#[post("/login")]
pub async fn login(
    request: HttpRequest,
    service: web::Data<Service>,
    form: Json<LoginRequest>,
) -> Result<impl Responder, Error> {
    let LoginRequest { email, password } = form.into_inner();

    let user = match service.verify_user(&email, password).await {
        Ok(user) => user,
        Err(e) => {
            tracing::info!(%email, "failed login attempt");
            return Err(e);
        }
    };

    Identity::login(&request.extensions(), user.email.clone())
        .map_err(|e| Error::internal(eyre::eyre!("failed to start session: {e}")))?;

    Ok(Json(SessionResponse::Valid { email: user.email }))
}

#[post("/logout")]
pub async fn logout(user: Identity) -> impl Responder {
    user.logout();

    HttpResponse::NoContent()
}

#[get("/session")]
pub async fn get_session(identity: Option<Identity>) -> Result<impl Responder, Error> {
    match identity {
        Some(identity) => {
            let email = identity.id()?;
            Ok(Json(SessionResponse::Valid { email }))
        }
        None => Ok(Json(SessionResponse::Invalid)),
    }
}

pub fn service() -> Scope {
    web::scope("/auth")
        .service(login)
        .service(logout)
        .service(get_session)
}
