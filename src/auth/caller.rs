use actix_web::{FromRequest, HttpMessage};

use crate::{db::user::Role, error::Error};

/// Who is behind an authenticated request.
///
/// Inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Presented the static cron secret.
    System,
    /// Logged in through a session.
    User { email: String, role: Role },
}

impl Caller {
    /// Key for per-caller rate limiting. System callers are not limited.
    pub fn rate_limit_key(&self) -> Option<&str> {
        match self {
            Self::System => None,
            Self::User { email, .. } => Some(email),
        }
    }

    /// Name recorded as the author of things this caller creates.
    pub fn name(&self) -> &str {
        match self {
            Self::System => "system",
            Self::User { email, .. } => email,
        }
    }
}

impl FromRequest for Caller {
    type Error = Error;

    type Future = std::future::Ready<Result<Caller, Self::Error>>;

    fn from_request(req: &actix_web::HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        std::future::ready(
            req.extensions()
                .get::<Caller>()
                .cloned()
                .ok_or(Error::Unauthorized),
        )
    }
}
