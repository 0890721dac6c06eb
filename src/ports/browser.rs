use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("Failed to start a browser session")]
    FailedToStartSession,
    #[error("Timed out waiting for {0}")]
    Timeout(Selector),
    #[error("Element not found: {0}")]
    ElementNotFound(Selector),
    #[error("Operation not supported for {0}")]
    Unsupported(Selector),
    #[error("Failed to navigate to URL")]
    FailedToNavigate,
    #[error("Browser command failed")]
    CommandFailed,
    #[error("Failed to close browser session")]
    FailedToClose,
}

/// How an element is located on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `name` attribute of a form control.
    Name(String),
    Id(String),
    XPath(String),
    /// CSS selector resolved inside the shadow root of `host`.
    Shadow { host: String, inner: String },
}

impl Selector {
    pub fn name(name: impl Into<String>) -> Self {
        Selector::Name(name.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Selector::Id(id.into())
    }

    pub fn xpath(xpath: impl Into<String>) -> Self {
        Selector::XPath(xpath.into())
    }

    pub fn shadow(host: impl Into<String>, inner: impl Into<String>) -> Self {
        Selector::Shadow {
            host: host.into(),
            inner: inner.into(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Name(name) => write!(f, "name={}", name),
            Selector::Id(id) => write!(f, "id={}", id),
            Selector::XPath(xpath) => write!(f, "xpath={}", xpath),
            Selector::Shadow { host, inner } => write!(f, "shadow={} >> {}", host, inner),
        }
    }
}

/// Starts fresh browser sessions. One session per cycle, never reused.
#[async_trait::async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn open_session(&self) -> error_stack::Result<Box<dyn BrowserSession>, BrowserError>;
}

/// A live browser session, exclusively owned by whoever opened it.
///
/// Element operations re-locate the element through its [`Selector`] each
/// time, so no element handles outlive a single call.
#[async_trait::async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> error_stack::Result<(), BrowserError>;

    /// Waits until the element is present, displayed and enabled. Fails with
    /// [`BrowserError::Timeout`] once `timeout` has elapsed.
    async fn wait_interactable(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> error_stack::Result<(), BrowserError>;

    async fn click(&mut self, selector: &Selector) -> error_stack::Result<(), BrowserError>;

    async fn clear(&mut self, selector: &Selector) -> error_stack::Result<(), BrowserError>;

    async fn send_keys(
        &mut self,
        selector: &Selector,
        text: &str,
    ) -> error_stack::Result<(), BrowserError>;

    async fn page_source(&mut self) -> error_stack::Result<String, BrowserError>;

    /// Releases the session and everything backing it.
    async fn dispose(self: Box<Self>) -> error_stack::Result<(), BrowserError>;
}
