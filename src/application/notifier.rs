use std::sync::Arc;

use error_stack::ResultExt;
use thiserror::Error;
use tracing::instrument;

use crate::domain::{AlertDecision, CycleReading, CURRENCY};
use crate::ports::{Email, Mailer};

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Email to {0} could not be sent")]
    NotDelivered(String),
}

/// Composes the per-cycle balance report and hands it to the mailer. The
/// report goes from the configured address to itself.
pub struct BalanceNotifier {
    mailer: Arc<dyn Mailer>,
    address: String,
}

impl std::fmt::Debug for BalanceNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceNotifier")
            .field("address", &self.address)
            .finish()
    }
}

impl BalanceNotifier {
    pub fn new(mailer: Arc<dyn Mailer>, address: impl Into<String>) -> Self {
        Self {
            mailer,
            address: address.into(),
        }
    }

    pub fn compose(&self, reading: &CycleReading, decision: Option<&AlertDecision>) -> Email {
        let (subject, lines) = match reading {
            CycleReading::Reading(balance) => {
                let headline = format!("Balance Account: {} {}", balance, CURRENCY);
                let mut lines = vec![headline.clone()];
                lines.extend(decision.and_then(AlertDecision::alert_line));
                (headline, lines)
            }
            CycleReading::NoReading { cause, reason } => (
                "Balance Account: no reading".to_string(),
                vec![
                    "Balance Account: no reading".to_string(),
                    format!("The balance could not be obtained ({}): {}", cause, reason),
                ],
            ),
        };

        let html = std::iter::once("<h1>Hi, </h1>".to_string())
            .chain(lines.iter().map(|line| format!("<p>{}</p>", escape_html(line))))
            .collect::<String>();

        Email {
            subject,
            sender: self.address.clone(),
            receivers: vec![self.address.clone()],
            text: lines.join("\n"),
            html,
        }
    }

    #[instrument(skip(self, decision), fields(to = %self.address))]
    pub async fn notify(
        &self,
        reading: &CycleReading,
        decision: Option<&AlertDecision>,
    ) -> error_stack::Result<(), DeliveryError> {
        let email = self.compose(reading, decision);
        tracing::info!(subject = %email.subject, "Sending email to {}", self.address);

        self.mailer
            .send(&email)
            .await
            .change_context_lazy(|| DeliveryError::NotDelivered(self.address.clone()))
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BalanceReading, NoReadingCause};
    use crate::ports::MailerError;
    use crate::testkit::RecordingMailer;

    fn notifier(mailer: &Arc<RecordingMailer>) -> BalanceNotifier {
        BalanceNotifier::new(mailer.clone(), "owner@example.com")
    }

    fn reading(value: f64) -> CycleReading {
        CycleReading::Reading(BalanceReading::new(value).unwrap())
    }

    #[test]
    fn test_compose_without_alert() {
        let mailer = Arc::new(RecordingMailer::default());
        let decision = AlertDecision {
            triggered: false,
            condition: "balance < 100".to_string(),
        };

        let email = notifier(&mailer).compose(&reading(2500.0), Some(&decision));

        assert_eq!(email.subject, "Balance Account: 2500.00 EUR");
        assert_eq!(email.sender, "owner@example.com");
        assert_eq!(email.receivers, vec!["owner@example.com".to_string()]);
        assert_eq!(email.text, "Balance Account: 2500.00 EUR");
        assert!(!email.text.contains("ALERT"));
        assert!(!email.html.contains("ALERT"));
    }

    #[test]
    fn test_compose_with_alert() {
        let mailer = Arc::new(RecordingMailer::default());
        let decision = AlertDecision {
            triggered: true,
            condition: "balance < 100".to_string(),
        };

        let email = notifier(&mailer).compose(&reading(42.5), Some(&decision));

        assert_eq!(email.subject, "Balance Account: 42.50 EUR");
        assert_eq!(
            email.text,
            "Balance Account: 42.50 EUR\nALERT: balance < 100"
        );
        assert_eq!(
            email.html,
            "<h1>Hi, </h1><p>Balance Account: 42.50 EUR</p><p>ALERT: balance &lt; 100</p>"
        );
    }

    #[test]
    fn test_compose_without_reading() {
        let mailer = Arc::new(RecordingMailer::default());
        let no_reading = CycleReading::NoReading {
            cause: NoReadingCause::Session,
            reason: "timed out during await-balance".to_string(),
        };

        let email = notifier(&mailer).compose(&no_reading, None);

        assert_eq!(email.subject, "Balance Account: no reading");
        assert!(email.text.contains("banking session failed"));
        assert!(email.text.contains("timed out during await-balance"));
        assert!(!email.text.contains("0.00"));
        assert!(!email.text.contains("ALERT"));
    }

    #[tokio::test]
    async fn test_notify_sends_composed_email() {
        let mailer = Arc::new(RecordingMailer::default());

        notifier(&mailer).notify(&reading(10.0), None).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Balance Account: 10.00 EUR");
    }

    #[tokio::test]
    async fn test_notify_reports_delivery_failure() {
        let mailer = Arc::new(RecordingMailer::failing(MailerError::Rejected));

        let report = notifier(&mailer)
            .notify(&reading(10.0), None)
            .await
            .unwrap_err();

        assert!(matches!(
            report.current_context(),
            DeliveryError::NotDelivered(address) if address == "owner@example.com"
        ));
        assert!(mailer.sent().is_empty());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"a < b && c > "d" 'e'"#),
            "a &lt; b &amp;&amp; c &gt; &quot;d&quot; &#39;e&#39;"
        );
    }
}
