use std::time::Duration;

use error_stack::{Report, ResultExt};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use crate::ports::{Email, Mailer, MailerError};

/// SMTP submission over STARTTLS, authenticated as the report's own address.
pub struct SmtpMailer {
    host: String,
    port: u16,
    username: String,
    password: SecretString,
    timeout: Duration,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish()
    }
}

impl SmtpMailer {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: SecretString,
        timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password,
            timeout,
        }
    }

    fn transport(&self) -> error_stack::Result<AsyncSmtpTransport<Tokio1Executor>, MailerError> {
        let credentials = Credentials::new(
            self.username.clone(),
            self.password.expose_secret().clone(),
        );

        Ok(AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .change_context(MailerError::FailedToConnect)
            .attach_printable_lazy(|| format!("Mail host: {}", self.host))?
            .port(self.port)
            .credentials(credentials)
            .timeout(Some(self.timeout))
            .build())
    }
}

fn parse_mailbox(address: &str) -> error_stack::Result<Mailbox, MailerError> {
    address
        .parse::<Mailbox>()
        .change_context_lazy(|| MailerError::InvalidAddress(address.to_string()))
}

/// Builds a `multipart/alternative` message with the text and HTML bodies.
pub fn build_message(email: &Email) -> error_stack::Result<Message, MailerError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(&email.sender)?)
        .subject(email.subject.clone());
    for receiver in &email.receivers {
        builder = builder.to(parse_mailbox(receiver)?);
    }

    builder
        .multipart(MultiPart::alternative_plain_html(
            email.text.clone(),
            email.html.clone(),
        ))
        .change_context(MailerError::FailedToBuildMessage)
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(email), fields(subject = %email.subject))]
    async fn send(&self, email: &Email) -> error_stack::Result<(), MailerError> {
        let message = build_message(email)?;
        let transport = self.transport()?;

        transport.send(message).await.map_err(|error| {
            // A response means the server was reached and said no.
            let context = if error.is_permanent() || error.is_transient() {
                MailerError::Rejected
            } else {
                MailerError::FailedToConnect
            };
            Report::new(error)
                .change_context(context)
                .attach_printable(format!("Mail server: {}:{}", self.host, self.port))
        })?;

        tracing::debug!("Email accepted by {}", self.host);
        Ok(())
    }
}
