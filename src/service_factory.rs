use std::sync::Arc;

use bank_balance::adapters::config::app_config::AppConfig;
use bank_balance::adapters::mail::smtp_mailer::SmtpMailer;
use bank_balance::adapters::webdriver::fantoccini_driver::FantocciniBrowserDriver;
use bank_balance::application::notifier::BalanceNotifier;
use bank_balance::application::polling_loop::PollingLoop;
use bank_balance::application::session::SessionOrchestrator;
use bank_balance::ports::{BrowserDriver, Mailer};
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

pub struct ServiceFactory;

impl ServiceFactory {
    /// Wires the Firefox driver and the SMTP mailer into a polling loop.
    #[instrument(skip(config))]
    pub fn create(config: AppConfig) -> PollingLoop {
        let AppConfig {
            db,
            smtp,
            browser,
            polling,
        } = config;

        let driver: Arc<dyn BrowserDriver> = Arc::new(FantocciniBrowserDriver::new(
            browser.geckodriver.clone(),
            browser.headless,
            browser.user_agent.clone(),
        ));

        let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(
            db.email_host.clone(),
            smtp.port,
            db.email_addr.clone(),
            SecretString::new(db.password.expose_secret().clone()),
            smtp.timeout(),
        ));

        let orchestrator =
            SessionOrchestrator::new(driver, browser.site_script(), browser.timeouts());
        let notifier = BalanceNotifier::new(mailer, db.email_addr.clone());

        PollingLoop::new(Arc::new(db), orchestrator, notifier, polling.settings())
    }
}
