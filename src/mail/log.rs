use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::MailProvider;
use crate::{dispatch::DispatchError, message::OutboundEmail};

/// Accepts every message and writes it to the log. For development setups
/// without an SMTP relay.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl MailProvider for LogMailer {
    fn send_email<'a>(
        &'a self,
        email: &'a OutboundEmail,
        _cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            tracing::info!(
                to = %email.to,
                subject = %email.subject,
                text = %email.text,
                "accepted message (log transport)"
            );
            Ok(())
        })
    }
}
