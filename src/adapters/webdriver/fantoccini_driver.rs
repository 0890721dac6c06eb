use std::fmt;
use std::time::Duration;

use error_stack::{bail, Report, ResultExt};
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tokio::time::{sleep, Instant};
use tracing::instrument;

use super::geckodriver::{random_port, GeckodriverProcess};
use crate::ports::{BrowserDriver, BrowserError, BrowserSession, Selector};

const CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const SHADOW_INTERACTABLE_SCRIPT: &str = r#"
const host = document.querySelector(arguments[0]);
if (!host || !host.shadowRoot) { return false; }
const element = host.shadowRoot.querySelector(arguments[1]);
return !!element && element.getClientRects().length > 0 && !element.disabled;
"#;

const SHADOW_CLICK_SCRIPT: &str = r#"
const host = document.querySelector(arguments[0]);
if (!host || !host.shadowRoot) { return false; }
const element = host.shadowRoot.querySelector(arguments[1]);
if (!element) { return false; }
element.click();
return true;
"#;

/// Firefox through a geckodriver spawned per session on a random port.
#[derive(Debug, Clone)]
pub struct FantocciniBrowserDriver {
    geckodriver: String,
    headless: bool,
    user_agent: Option<String>,
}

impl FantocciniBrowserDriver {
    pub fn new(geckodriver: impl Into<String>, headless: bool, user_agent: Option<String>) -> Self {
        Self {
            geckodriver: geckodriver.into(),
            headless,
            user_agent,
        }
    }

    fn capabilities(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut capabilities = serde_json::Map::new();
        if self.headless {
            capabilities.insert(
                "moz:firefoxOptions".to_string(),
                json!({ "args": ["-headless"] }),
            );
        }
        capabilities
    }

    #[instrument(skip(self))]
    async fn connect(&self, url: &str) -> error_stack::Result<Client, BrowserError> {
        let mut attempt = 1;
        loop {
            let connected = ClientBuilder::native()
                .capabilities(self.capabilities())
                .connect(url)
                .await;

            match connected {
                Ok(client) => return Ok(client),
                // geckodriver needs a moment before it accepts connections
                Err(error) if attempt < CONNECT_ATTEMPTS => {
                    tracing::debug!("Connection attempt {} failed: {}", attempt, error);
                    attempt += 1;
                    sleep(CONNECT_RETRY_DELAY).await;
                }
                Err(error) => {
                    return Err(Report::new(error)
                        .change_context(BrowserError::FailedToStartSession)
                        .attach_printable(format!("Failed to connect to geckodriver at {}", url)))
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl BrowserDriver for FantocciniBrowserDriver {
    #[instrument(skip(self))]
    async fn open_session(&self) -> error_stack::Result<Box<dyn BrowserSession>, BrowserError> {
        let process = GeckodriverProcess::spawn(&self.geckodriver, random_port())
            .change_context(BrowserError::FailedToStartSession)?;

        let client = self.connect(&process.webdriver_url()).await?;

        if let Some(user_agent) = &self.user_agent {
            client
                .set_ua(user_agent)
                .await
                .change_context(BrowserError::FailedToStartSession)
                .attach_printable("Failed to set user agent")?;
        }

        tracing::debug!("Browser session ready on {}", process.webdriver_url());
        Ok(Box::new(FantocciniSession { client, process }))
    }
}

pub struct FantocciniSession {
    client: Client,
    process: GeckodriverProcess,
}

impl fmt::Debug for FantocciniSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FantocciniSession")
            .field("process", &self.process)
            .finish()
    }
}

/// `name` attribute lookup expressed as CSS.
fn name_to_css(name: &str) -> String {
    format!("[name='{}']", name.replace('\'', "\\'"))
}

/// A missing or stale element is reported as not found, anything else as a
/// failed command.
fn classify(error: &CmdError, selector: &Selector) -> BrowserError {
    if error.is_miss() {
        BrowserError::ElementNotFound(selector.clone())
    } else {
        BrowserError::CommandFailed
    }
}

fn command_failed(selector: &Selector) -> impl FnOnce(CmdError) -> Report<BrowserError> + '_ {
    move |error| {
        let context = classify(&error, selector);
        Report::new(error)
            .change_context(context)
            .attach_printable(format!("Selector: {}", selector))
    }
}

impl FantocciniSession {
    async fn find(&self, selector: &Selector) -> error_stack::Result<Element, BrowserError> {
        let name_css;
        let locator = match selector {
            Selector::Name(name) => {
                name_css = name_to_css(name);
                Locator::Css(&name_css)
            }
            Selector::Id(id) => Locator::Id(id),
            Selector::XPath(xpath) => Locator::XPath(xpath),
            Selector::Shadow { .. } => bail!(BrowserError::Unsupported(selector.clone())),
        };

        self.client
            .find(locator)
            .await
            .map_err(command_failed(selector))
    }

    async fn run_shadow_script(
        &self,
        script: &str,
        host: &str,
        inner: &str,
    ) -> error_stack::Result<bool, BrowserError> {
        let value = self
            .client
            .execute(script, vec![json!(host), json!(inner)])
            .await
            .change_context(BrowserError::CommandFailed)
            .attach_printable_lazy(|| format!("Shadow host: {}", host))?;

        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_interactable(&self, selector: &Selector) -> error_stack::Result<bool, BrowserError> {
        if let Selector::Shadow { host, inner } = selector {
            return self
                .run_shadow_script(SHADOW_INTERACTABLE_SCRIPT, host, inner)
                .await;
        }

        let element = match self.find(selector).await {
            Ok(element) => element,
            Err(report) if matches!(report.current_context(), BrowserError::ElementNotFound(_)) => {
                return Ok(false)
            }
            Err(report) => return Err(report),
        };

        // The element may go stale between lookups; that only means "not yet".
        let displayed = element.is_displayed().await.unwrap_or(false);
        let enabled = element.is_enabled().await.unwrap_or(false);
        Ok(displayed && enabled)
    }
}

#[async_trait::async_trait]
impl BrowserSession for FantocciniSession {
    #[instrument(skip(self))]
    async fn navigate(&mut self, url: &str) -> error_stack::Result<(), BrowserError> {
        self.client
            .goto(url)
            .await
            .change_context(BrowserError::FailedToNavigate)
            .attach_printable_lazy(|| format!("URL: {}", url))
    }

    #[instrument(skip(self), fields(selector = %selector))]
    async fn wait_interactable(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> error_stack::Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_interactable(selector).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!(BrowserError::Timeout(selector.clone()));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    #[instrument(skip(self), fields(selector = %selector))]
    async fn click(&mut self, selector: &Selector) -> error_stack::Result<(), BrowserError> {
        if let Selector::Shadow { host, inner } = selector {
            if !self.run_shadow_script(SHADOW_CLICK_SCRIPT, host, inner).await? {
                bail!(BrowserError::ElementNotFound(selector.clone()));
            }
            return Ok(());
        }

        self.find(selector)
            .await?
            .click()
            .await
            .map_err(command_failed(selector))
    }

    #[instrument(skip(self), fields(selector = %selector))]
    async fn clear(&mut self, selector: &Selector) -> error_stack::Result<(), BrowserError> {
        self.find(selector)
            .await?
            .clear()
            .await
            .map_err(command_failed(selector))
    }

    // Never instrumented with the text: it carries the PIN.
    async fn send_keys(
        &mut self,
        selector: &Selector,
        text: &str,
    ) -> error_stack::Result<(), BrowserError> {
        self.find(selector)
            .await?
            .send_keys(text)
            .await
            .map_err(command_failed(selector))
    }

    #[instrument(skip(self))]
    async fn page_source(&mut self) -> error_stack::Result<String, BrowserError> {
        self.client
            .source()
            .await
            .change_context(BrowserError::CommandFailed)
            .attach_printable("Failed to read page source")
    }

    #[instrument(skip(self))]
    async fn dispose(self: Box<Self>) -> error_stack::Result<(), BrowserError> {
        let FantocciniSession {
            client,
            mut process,
        } = *self;

        let closed = client.close().await;
        process.kill();

        closed.change_context(BrowserError::FailedToClose)
    }
}
