use actix_web::{http::StatusCode, HttpResponse};
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Unauthorized"))]
    Unauthorized,

    #[snafu(display("Forbidden"))]
    Forbidden,

    #[snafu(display("Resource not found: {resource}"))]
    NotFound { resource: String },

    #[snafu(display("Too many requests, retry in {retry_after_secs}s"))]
    RateLimited { retry_after_secs: u64 },

    #[snafu(display("Internal server error"))]
    InternalServerError {
        #[snafu(source(false))]
        source: Option<eyre::Report>,
    },

    #[snafu(display("Error returned from database"))]
    Sqlx {
        #[snafu(source)]
        source: sqlx::Error,
    },

    #[snafu(display("Invalid header: {header}"))]
    InvalidHeader { header: String },

    #[snafu(display("Invalid parameter: {message}"))]
    InvalidParameter { message: String },

    #[snafu(display("Missing parameter: {message}"))]
    MissingParameter { message: String },
}

impl From<sqlx::Error> for Error {
    fn from(source: sqlx::Error) -> Self {
        Self::Sqlx { source }
    }
}

impl From<eyre::Report> for Error {
    fn from(e: eyre::Report) -> Self {
        Self::InternalServerError { source: Some(e) }
    }
}

impl From<actix_identity::error::GetIdentityError> for Error {
    fn from(_: actix_identity::error::GetIdentityError) -> Self {
        Self::Unauthorized
    }
}

impl Error {
    pub fn internal(e: impl Into<eyre::Report>) -> Self {
        Self::InternalServerError {
            source: Some(e.into()),
        }
    }

    pub fn opaque() -> Self {
        Self::InternalServerError { source: None }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn missing_parameter(message: impl Into<String>) -> Self {
        Self::MissingParameter {
            message: message.into(),
        }
    }

    pub fn campaign_not_found(id: i64) -> Self {
        Self::NotFound {
            resource: format!("campaign {id}"),
        }
    }
}

impl actix_web::ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            Self::MissingParameter { .. }
            | Self::InvalidHeader { .. }
            | Self::InvalidParameter { .. } => StatusCode::BAD_REQUEST,

            Self::InternalServerError { .. } | Self::Sqlx { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Details stay in the log; the body only carries the display string,
        // which is generic for every 5xx variant.
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let mut res = HttpResponse::build(status);
        if let Self::RateLimited { retry_after_secs } = self {
            res.insert_header((
                actix_web::http::header::RETRY_AFTER,
                retry_after_secs.to_string(),
            ));
        }

        res.json(serde_json::json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{body::to_bytes, ResponseError};

    use super::*;

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let err = Error::internal(eyre::eyre!("disk on fire at /var/db"));
        let res = err.error_response();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(res.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let res = Error::RateLimited {
            retry_after_secs: 7,
        }
        .error_response();

        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            res.headers()
                .get(actix_web::http::header::RETRY_AFTER)
                .unwrap(),
            "7"
        );
    }

    #[test]
    fn test_validation_is_bad_request() {
        assert_eq!(
            Error::invalid_parameter("batchSize").status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
