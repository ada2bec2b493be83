//! Outbound mail transports.
//!
//! The dispatcher only sees [`MailProvider`]; which transport backs it is a
//! startup decision (see [`from_config`]).

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::{config::Config, dispatch::DispatchError, message::OutboundEmail};

pub mod log;
pub mod smtp;

pub use log::LogMailer;
pub use smtp::SmtpMailer;

/// Something that can hand an email to a delivery service.
///
/// Implementations should stop work promptly once `cancel` fires. An `Ok`
/// means the provider accepted the message; it is not a delivery receipt.
pub trait MailProvider: Send + Sync + 'static {
    fn send_email<'a>(
        &'a self,
        email: &'a OutboundEmail,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>>;
}

/// SMTP when a host is configured, otherwise the logging transport.
pub fn from_config(config: &Config) -> eyre::Result<Arc<dyn MailProvider>> {
    match SmtpMailer::from_config(config)? {
        Some(smtp) => Ok(Arc::new(smtp)),
        None => {
            tracing::warn!("OUTREACH_SMTP_HOST is not set, messages will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}
