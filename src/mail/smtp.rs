use futures_util::future::BoxFuture;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;

use super::MailProvider;
use crate::{config::Config, dispatch::DispatchError, message::OutboundEmail};

/// Delivers through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Returns `None` when no SMTP host is configured.
    pub fn from_config(config: &Config) -> eyre::Result<Option<Self>> {
        let Some(host) = config.smtp_host.as_deref() else {
            return Ok(None);
        };

        let port = config.smtp_port();

        // 465 speaks TLS from the first byte, everything else upgrades via STARTTLS.
        let builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        };

        let mut builder = builder.port(port).timeout(Some(config.send_timeout()));

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_owned(),
            ));
        }

        let from: Mailbox = config
            .mail_from()
            .parse()
            .map_err(|e| eyre::eyre!("invalid OUTREACH_MAIL_FROM: {e}"))?;

        tracing::info!(host, port, from = %from, "using SMTP transport");

        Ok(Some(Self {
            transport: builder.build(),
            from,
        }))
    }

    fn build(&self, email: &OutboundEmail) -> Result<Message, DispatchError> {
        let address: Address = email
            .to
            .parse()
            .map_err(|e| DispatchError::validation(format!("invalid recipient {}: {e}", email.to)))?;

        Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(email.to_name.clone(), address))
            .subject(email.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html.clone()),
                    ),
            )
            .map_err(|e| DispatchError::validation(e.to_string()))
    }
}

impl MailProvider for SmtpMailer {
    fn send_email<'a>(
        &'a self,
        email: &'a OutboundEmail,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            let message = self.build(email)?;

            tokio::select! {
                res = self.transport.send(message) => match res {
                    Ok(_) => Ok(()),
                    Err(e) if e.is_permanent() => Err(DispatchError::rejected(e.to_string())),
                    Err(e) => Err(DispatchError::transport(e.to_string())),
                },
                _ = cancel.cancelled() => Err(DispatchError::cancelled()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: Option<&str>) -> Config {
        Config {
            smtp_host: host.map(str::to_owned),
            mail_from: Some("Outreach <outreach@example.com>".to_owned()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_no_host_means_no_transport() {
        assert!(SmtpMailer::from_config(&config(None)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_recipient_is_validation_error() {
        let mailer = SmtpMailer::from_config(&config(Some("smtp.example.com")))
            .unwrap()
            .unwrap();

        let email = OutboundEmail {
            to: "not an address".to_owned(),
            to_name: None,
            subject: "hi".to_owned(),
            text: "hi".to_owned(),
            html: "<p>hi</p>".to_owned(),
        };

        let err = mailer.build(&email).unwrap_err();
        assert_eq!(err.kind(), crate::dispatch::ErrorKind::Validation);
    }
}
