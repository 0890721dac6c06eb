use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailerError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
    #[error("Failed to build email message")]
    FailedToBuildMessage,
    #[error("Failed to connect to mail server")]
    FailedToConnect,
    #[error("Mail server rejected the message")]
    Rejected,
}

/// A composed message, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub sender: String,
    pub receivers: Vec<String>,
    pub text: String,
    pub html: String,
}

/// Outbound mail transport. Server, port and credentials are bound when the
/// implementation is built.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> error_stack::Result<(), MailerError>;
}
