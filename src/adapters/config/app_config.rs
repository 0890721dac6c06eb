use std::time::Duration;

use config::{Config, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::Deserialize;
use thiserror::Error;

use crate::application::polling_loop::PollingSettings;
use crate::application::session::{SessionTimeouts, SiteScript};
use crate::domain::CredentialBundle;

/// Used when neither `--config` nor `CONFIG_PATH` is given.
pub const DEFAULT_CONFIG_PATH: &str = "bankcredentials.ini";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}'")]
    Unreadable(String),
    #[error("Invalid configuration at `{path}`: {message}")]
    Invalid { path: String, message: String },
}

#[derive(Deserialize, Debug)]
pub struct AppConfig {
    /// Account and mail credentials. Every key is mandatory.
    pub db: CredentialBundle,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SmtpConfig {
    pub port: u16,
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            port: 587,
            timeout_secs: 30,
        }
    }
}

impl SmtpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BrowserConfig {
    pub entry_url: String,
    pub logout_url: String,
    /// geckodriver binary, looked up on `PATH` unless absolute.
    pub geckodriver: String,
    pub headless: bool,
    pub user_agent: Option<String>,
    pub cookie_settle_secs: u64,
    pub short_timeout_secs: u64,
    pub long_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        let site = SiteScript::default();
        let timeouts = SessionTimeouts::default();
        Self {
            entry_url: site.entry_url,
            logout_url: site.logout_url,
            geckodriver: "geckodriver".to_string(),
            headless: true,
            user_agent: None,
            cookie_settle_secs: timeouts.cookie_settle.as_secs(),
            short_timeout_secs: timeouts.short.as_secs(),
            long_timeout_secs: timeouts.long.as_secs(),
        }
    }
}

impl BrowserConfig {
    pub fn site_script(&self) -> SiteScript {
        SiteScript {
            entry_url: self.entry_url.clone(),
            logout_url: self.logout_url.clone(),
            ..SiteScript::default()
        }
    }

    pub fn timeouts(&self) -> SessionTimeouts {
        SessionTimeouts {
            cookie_settle: Duration::from_secs(self.cookie_settle_secs),
            short: Duration::from_secs(self.short_timeout_secs),
            long: Duration::from_secs(self.long_timeout_secs),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub notify_without_reading: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        let settings = PollingSettings::default();
        Self {
            interval_secs: settings.interval.as_secs(),
            notify_without_reading: settings.notify_without_reading,
        }
    }
}

impl PollingConfig {
    pub fn settings(&self) -> PollingSettings {
        PollingSettings {
            interval: Duration::from_secs(self.interval_secs),
            notify_without_reading: self.notify_without_reading,
        }
    }
}

impl AppConfig {
    /// Reads the file at `path`; the format follows its extension.
    pub fn load(path: &str) -> error_stack::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .build()
            .change_context_lazy(|| ConfigError::Unreadable(path.to_string()))?;

        Self::from_config(config).attach_printable_lazy(|| format!("Config file: {}", path))
    }

    pub fn from_ini_str(ini: &str) -> error_stack::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(ini, FileFormat::Ini))
            .build()
            .change_context_lazy(|| ConfigError::Unreadable("<inline>".to_string()))?;

        Self::from_config(config)
    }

    fn from_config(config: Config) -> error_stack::Result<Self, ConfigError> {
        serde_path_to_error::deserialize(config).map_err(|error| {
            let path = error.path().to_string();
            let message = error.into_inner().to_string();
            Report::new(ConfigError::Invalid { path, message }).attach_printable(
                "Make sure the [db] section has branch, account, subaccount, pin, conditions, \
                 email_addr, password and email_host.",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const DB_SECTION: &str = "\
[db]
branch = 100
account = 1234567
subaccount = 00
pin = 98765
conditions = balance < 100
email_addr = owner@example.com
password = hunter2
email_host = smtp.example.com
";

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_ini_str(DB_SECTION).unwrap();

        assert_eq!(config.db.branch, "100");
        assert_eq!(config.db.subaccount, "00");
        assert_eq!(config.db.pin.expose_secret(), "98765");
        assert_eq!(config.db.conditions, "balance < 100");
        assert_eq!(config.db.email_host, "smtp.example.com");
        assert_eq!(config.smtp, SmtpConfig::default());
        assert_eq!(config.browser.site_script(), SiteScript::default());
        assert_eq!(config.browser.timeouts(), SessionTimeouts::default());
        assert_eq!(config.polling.settings(), PollingSettings::default());
    }

    #[test]
    fn test_optional_sections_override_defaults() {
        let ini = format!(
            "{}\n[smtp]\nport = 2525\n\n[browser]\nheadless = false\nlong_timeout_secs = 60\n\n[polling]\ninterval_secs = 3600\nnotify_without_reading = false\n",
            DB_SECTION
        );

        let config = AppConfig::from_ini_str(&ini).unwrap();

        assert_eq!(config.smtp.port, 2525);
        assert_eq!(config.smtp.timeout(), Duration::from_secs(30));
        assert!(!config.browser.headless);
        assert_eq!(config.browser.timeouts().long, Duration::from_secs(60));
        assert_eq!(config.browser.timeouts().short, Duration::from_secs(10));
        assert_eq!(
            config.polling.settings(),
            PollingSettings {
                interval: Duration::from_secs(3600),
                notify_without_reading: false,
            }
        );
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let ini = DB_SECTION.replace("pin = 98765\n", "");

        let report = AppConfig::from_ini_str(&ini).unwrap_err();

        match report.current_context() {
            ConfigError::Invalid { message, .. } => assert!(message.contains("pin"), "{}", message),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_section_is_rejected() {
        let report = AppConfig::from_ini_str("[other]\nkey = value\n").unwrap_err();

        assert!(matches!(
            report.current_context(),
            ConfigError::Invalid { message, .. } if message.contains("db")
        ));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let report = AppConfig::load("/nonexistent/bankcredentials.ini").unwrap_err();

        assert!(matches!(
            report.current_context(),
            ConfigError::Unreadable(path) if path == "/nonexistent/bankcredentials.ini"
        ));
    }
}
