use std::fmt;

/// What happened to this cycle's report email. Never retried within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Delivered,
    /// No email was attempted (no reading and no-reading reports disabled).
    Skipped,
    Failed { reason: String },
}

impl fmt::Display for NotificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationOutcome::Delivered => write!(f, "delivered"),
            NotificationOutcome::Skipped => write!(f, "skipped"),
            NotificationOutcome::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}
