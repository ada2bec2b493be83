use actix_web::web::JsonConfig;

use crate::error::Error;

pub mod admin;
pub mod auth;
pub mod campaigns;
pub mod jobs;

/// JSON extractor settings shared by every endpoint.
///
/// Malformed bodies are reported through [`Error`] so that clients always get
/// a `{ "error": ... }` object back.
pub fn json_config() -> JsonConfig {
    JsonConfig::default()
        .content_type_required(false)
        .error_handler(|err, _req| Error::invalid_parameter(err.to_string()).into())
}
