use std::env;

use bank_balance::adapters::config::app_config::{AppConfig, DEFAULT_CONFIG_PATH};
use bank_balance::application::condition::AlertCondition;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::service_factory::ServiceFactory;

const CONFIG_PATH_VAR: &str = "CONFIG_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Poll forever.
    Run,
    /// A single cycle without the trailing sleep.
    Once,
    /// Validate the configuration and the alert condition.
    Check,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub config_path: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid command: {details}")]
    InvalidCommand { details: String },
}

#[derive(Debug, Default)]
pub struct CliAdapter;

impl CliAdapter {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, args))]
    pub async fn run(&self, args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
        let invocation = parse_args(&args, env::var(CONFIG_PATH_VAR).ok())?;
        info!("Using configuration file {}", invocation.config_path);

        let config = match AppConfig::load(&invocation.config_path) {
            Ok(config) => config,
            Err(report) => {
                error!("Failed to load configuration: {:?}", report);
                return Err(format!("Configuration error: {}", report.current_context()).into());
            }
        };

        match invocation.command {
            Command::Check => {
                check(&config);
                Ok(())
            }
            Command::Once => {
                let polling_loop = ServiceFactory::create(config);
                let report = polling_loop.run_cycle().await;
                info!(
                    "Cycle {} finished, notification {}",
                    report.cycle, report.notification
                );
                Ok(())
            }
            Command::Run => {
                let polling_loop = ServiceFactory::create(config);
                polling_loop.run().await
            }
        }
    }
}

fn check(config: &AppConfig) {
    info!(
        "✅ Configuration loaded for account {} at {}",
        config.db.masked_account(),
        config.browser.entry_url
    );

    match AlertCondition::parse(&config.db.conditions) {
        Ok(condition) => info!("✅ Alert condition: {}", condition),
        Err(report) => warn!(
            "❌ Alert condition {:?} is invalid: {}",
            config.db.conditions,
            report.current_context()
        ),
    }
}

/// `bank-balance [run|once|check] [--config <path>]`
pub fn parse_args(
    args: &[String],
    env_config_path: Option<String>,
) -> Result<Invocation, CommandError> {
    let mut command = None;
    let mut config_path = None;

    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--config" => {
                let path = rest.next().ok_or_else(|| CommandError::InvalidCommand {
                    details: "--config requires a path".to_string(),
                })?;
                config_path = Some(path.clone());
            }
            "run" | "once" | "check" if command.is_none() => {
                command = Some(match arg.as_str() {
                    "run" => Command::Run,
                    "once" => Command::Once,
                    _ => Command::Check,
                });
            }
            other => {
                return Err(CommandError::InvalidCommand {
                    details: format!("Unexpected argument '{}'", other),
                })
            }
        }
    }

    Ok(Invocation {
        command: command.unwrap_or(Command::Run),
        config_path: config_path
            .or(env_config_path)
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string()),
    })
}
