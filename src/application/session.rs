use std::{fmt, sync::Arc, time::Duration};

use error_stack::ResultExt;
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::{CredentialBundle, RawPageContent};
use crate::ports::{BrowserDriver, BrowserError, BrowserSession, Selector};
use crate::progress::wait_with_progress;

/// Steps of one visit to the banking portal, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NavigateInit,
    AcceptCookies,
    AwaitLoginForm,
    SubmitCredentials,
    AwaitBalanceView,
    CapturePage,
    Logout,
    Dispose,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::NavigateInit => "navigate-init",
            SessionPhase::AcceptCookies => "accept-cookies",
            SessionPhase::AwaitLoginForm => "await-login-form",
            SessionPhase::SubmitCredentials => "submit-credentials",
            SessionPhase::AwaitBalanceView => "await-balance-view",
            SessionPhase::CapturePage => "capture-page",
            SessionPhase::Logout => "logout",
            SessionPhase::Dispose => "dispose",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Failed to open a browser session")]
    SessionUnavailable,
    #[error("Timed out during {0}")]
    LoginOrNavigationTimeout(SessionPhase),
    #[error("Browser command failed during {0}")]
    BrowserFailure(SessionPhase),
}

/// Bounded waits used while driving the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Pause before looking for the cookie banner, which renders late.
    pub cookie_settle: Duration,
    /// Transient UI elements (the cookie banner).
    pub short: Duration,
    /// Navigation and page content (login form, balance view).
    pub long: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            cookie_settle: Duration::from_secs(10),
            short: Duration::from_secs(10),
            long: Duration::from_secs(30),
        }
    }
}

/// URLs and element selectors of the banking portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteScript {
    pub entry_url: String,
    pub logout_url: String,
    pub cookie_accept: Selector,
    pub branch_field: Selector,
    pub account_field: Selector,
    pub subaccount_field: Selector,
    pub pin_field: Selector,
    pub submit: Selector,
    /// Element that only exists once the balance page has rendered.
    pub balance_view: Selector,
}

impl Default for SiteScript {
    fn default() -> Self {
        Self {
            entry_url: "https://meine.deutsche-bank.de/trxm/db/init.do".to_string(),
            logout_url: "https://meine.deutsche-bank.de/trxm/db/gvo/login/logout.do".to_string(),
            cookie_accept: Selector::shadow(
                "div#usercentrics-root",
                r#"button[data-testid="uc-accept-all-button"]"#,
            ),
            branch_field: Selector::name("branch"),
            account_field: Selector::name("account"),
            subaccount_field: Selector::name("subaccount"),
            pin_field: Selector::name("pin"),
            submit: Selector::xpath("//input[@value='Execute Login']"),
            balance_view: Selector::id("rollContainer"),
        }
    }
}

/// Tags a browser failure with the phase it happened in. Exceeded waits
/// become [`SessionError::LoginOrNavigationTimeout`].
fn at_phase<T>(
    result: error_stack::Result<T, BrowserError>,
    phase: SessionPhase,
) -> error_stack::Result<T, SessionError> {
    result.map_err(|report| {
        let context = match report.current_context() {
            BrowserError::Timeout(_) => SessionError::LoginOrNavigationTimeout(phase),
            _ => SessionError::BrowserFailure(phase),
        };
        report.change_context(context)
    })
}

/// Logs into the portal, snapshots the balance page and logs out again, using
/// a fresh browser session that is always disposed before returning.
pub struct SessionOrchestrator {
    driver: Arc<dyn BrowserDriver>,
    site: SiteScript,
    timeouts: SessionTimeouts,
}

impl fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("site", &self.site.entry_url)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl SessionOrchestrator {
    pub fn new(driver: Arc<dyn BrowserDriver>, site: SiteScript, timeouts: SessionTimeouts) -> Self {
        Self {
            driver,
            site,
            timeouts,
        }
    }

    #[instrument(skip_all)]
    pub async fn capture_balance_page(
        &self,
        credentials: &CredentialBundle,
    ) -> error_stack::Result<RawPageContent, SessionError> {
        let mut session = self
            .driver
            .open_session()
            .await
            .change_context(SessionError::SessionUnavailable)?;

        let result = self.drive(session.as_mut(), credentials).await;

        tracing::debug!(phase = %SessionPhase::Dispose, "Disposing browser session");
        if let Err(report) = session.dispose().await {
            warn!("Failed to dispose browser session: {:?}", report);
        }

        result
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        credentials: &CredentialBundle,
    ) -> error_stack::Result<RawPageContent, SessionError> {
        info!(phase = %SessionPhase::NavigateInit, url = %self.site.entry_url, "Retrieving web");
        at_phase(
            session.navigate(&self.site.entry_url).await,
            SessionPhase::NavigateInit,
        )?;

        self.accept_cookies(session).await?;
        self.await_login_form(session).await?;
        self.submit_credentials(session, credentials).await?;

        // Once credentials went in we may be logged in, so always log out.
        let page = self.capture_balance_view(session).await;
        self.logout(session).await;
        page
    }

    async fn accept_cookies(
        &self,
        session: &mut dyn BrowserSession,
    ) -> error_stack::Result<(), SessionError> {
        let phase = SessionPhase::AcceptCookies;
        wait_with_progress(self.timeouts.cookie_settle, "Waiting for the cookie banner").await;

        info!(phase = %phase, "Accepting cookies");
        let consent = &self.site.cookie_accept;
        at_phase(
            session.wait_interactable(consent, self.timeouts.short).await,
            phase,
        )?;
        at_phase(session.click(consent).await, phase)
    }

    async fn await_login_form(
        &self,
        session: &mut dyn BrowserSession,
    ) -> error_stack::Result<(), SessionError> {
        let phase = SessionPhase::AwaitLoginForm;
        info!(phase = %phase, "Waiting for the login form");

        for selector in [
            &self.site.branch_field,
            &self.site.account_field,
            &self.site.subaccount_field,
            &self.site.pin_field,
            &self.site.submit,
        ] {
            at_phase(
                session.wait_interactable(selector, self.timeouts.long).await,
                phase,
            )
            .attach_printable_lazy(|| format!("Login form element: {}", selector))?;
        }
        Ok(())
    }

    async fn submit_credentials(
        &self,
        session: &mut dyn BrowserSession,
        credentials: &CredentialBundle,
    ) -> error_stack::Result<(), SessionError> {
        let phase = SessionPhase::SubmitCredentials;
        info!(
            phase = %phase,
            branch = %credentials.branch,
            account = %credentials.masked_account(),
            subaccount = %credentials.subaccount,
            conditions = %credentials.conditions,
            "Logging in"
        );

        let fields = [
            (&self.site.branch_field, credentials.branch.as_str()),
            (&self.site.account_field, credentials.account.as_str()),
            (&self.site.subaccount_field, credentials.subaccount.as_str()),
            (&self.site.pin_field, credentials.pin.expose_secret().as_str()),
        ];
        for (selector, value) in fields {
            at_phase(session.clear(selector).await, phase)?;
            at_phase(session.send_keys(selector, value).await, phase)
                .attach_printable_lazy(|| format!("Typing into {}", selector))?;
        }

        at_phase(session.click(&self.site.submit).await, phase)
    }

    async fn capture_balance_view(
        &self,
        session: &mut dyn BrowserSession,
    ) -> error_stack::Result<RawPageContent, SessionError> {
        info!(phase = %SessionPhase::AwaitBalanceView, "Waiting for balance page to appear");
        at_phase(
            session
                .wait_interactable(&self.site.balance_view, self.timeouts.long)
                .await,
            SessionPhase::AwaitBalanceView,
        )?;

        let source = at_phase(session.page_source().await, SessionPhase::CapturePage)?;
        tracing::debug!(phase = %SessionPhase::CapturePage, len = source.len(), "Captured page");
        Ok(RawPageContent::new(source))
    }

    async fn logout(&self, session: &mut dyn BrowserSession) {
        info!(phase = %SessionPhase::Logout, "Logging out");
        if let Err(report) = session.navigate(&self.site.logout_url).await {
            warn!("Logout failed, continuing: {:?}", report);
        }
    }
}
