//! In-memory stand-ins for the browser and mail ports.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use error_stack::bail;

use crate::ports::{
    BrowserDriver, BrowserError, BrowserSession, Email, Mailer, MailerError, Selector,
};

#[derive(Debug, Clone, Default)]
struct Behavior {
    page: String,
    timeout_on: Option<Selector>,
    fail_click_on: Option<Selector>,
    fail_url: Option<String>,
    fail_open: bool,
}

/// Scripted browser. Every call made through its sessions is recorded as a
/// short line such as `click name=pin` or `dispose`.
#[derive(Debug, Clone, Default)]
pub struct FakeBrowserDriver {
    behavior: Behavior,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeBrowserDriver {
    pub fn with_page(page: impl Into<String>) -> Self {
        Self {
            behavior: Behavior {
                page: page.into(),
                ..Behavior::default()
            },
            calls: Arc::default(),
        }
    }

    pub fn timing_out_on(mut self, selector: Selector) -> Self {
        self.behavior.timeout_on = Some(selector);
        self
    }

    pub fn failing_click_on(mut self, selector: Selector) -> Self {
        self.behavior.fail_click_on = Some(selector);
        self
    }

    pub fn failing_navigation_to(mut self, url: impl Into<String>) -> Self {
        self.behavior.fail_url = Some(url.into());
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.behavior.fail_open = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl BrowserDriver for FakeBrowserDriver {
    async fn open_session(&self) -> error_stack::Result<Box<dyn BrowserSession>, BrowserError> {
        self.record("open".to_string());
        if self.behavior.fail_open {
            bail!(BrowserError::FailedToStartSession);
        }
        Ok(Box::new(FakeSession {
            driver: self.clone(),
        }))
    }
}

struct FakeSession {
    driver: FakeBrowserDriver,
}

#[async_trait::async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> error_stack::Result<(), BrowserError> {
        self.driver.record(format!("navigate {}", url));
        if self.driver.behavior.fail_url.as_deref() == Some(url) {
            bail!(BrowserError::FailedToNavigate);
        }
        Ok(())
    }

    async fn wait_interactable(
        &mut self,
        selector: &Selector,
        _timeout: Duration,
    ) -> error_stack::Result<(), BrowserError> {
        self.driver.record(format!("wait {}", selector));
        if self.driver.behavior.timeout_on.as_ref() == Some(selector) {
            bail!(BrowserError::Timeout(selector.clone()));
        }
        Ok(())
    }

    async fn click(&mut self, selector: &Selector) -> error_stack::Result<(), BrowserError> {
        self.driver.record(format!("click {}", selector));
        if self.driver.behavior.fail_click_on.as_ref() == Some(selector) {
            bail!(BrowserError::CommandFailed);
        }
        Ok(())
    }

    async fn clear(&mut self, selector: &Selector) -> error_stack::Result<(), BrowserError> {
        self.driver.record(format!("clear {}", selector));
        Ok(())
    }

    async fn send_keys(
        &mut self,
        selector: &Selector,
        text: &str,
    ) -> error_stack::Result<(), BrowserError> {
        self.driver.record(format!("keys {} {}", selector, text));
        Ok(())
    }

    async fn page_source(&mut self) -> error_stack::Result<String, BrowserError> {
        self.driver.record("source".to_string());
        Ok(self.driver.behavior.page.clone())
    }

    async fn dispose(self: Box<Self>) -> error_stack::Result<(), BrowserError> {
        self.driver.record("dispose".to_string());
        Ok(())
    }
}

/// Mailer that keeps what it was asked to send, or refuses everything.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    failure: Option<MailerError>,
}

impl RecordingMailer {
    pub fn failing(error: MailerError) -> Self {
        Self {
            sent: Mutex::default(),
            failure: Some(error),
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> error_stack::Result<(), MailerError> {
        if let Some(error) = &self.failure {
            bail!(error.clone());
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
