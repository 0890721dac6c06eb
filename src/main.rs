use std::env;

use bank_balance::prettyprint::PrettyFormatter;
use tracing::{error, info, instrument};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Registry};

mod cli_adapter;
mod service_factory;

use cli_adapter::CliAdapter;

const LOG_FILE: &str = "bank_balance.log";

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing()?;
    setup_panic_hook();

    let args: Vec<String> = env::args().collect();

    info!("Starting bank-balance");

    match CliAdapter::new().run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("bank-balance failed: {}", e);
            Err(e)
        }
    }
}

fn setup_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let indicatif_layer = IndicatifLayer::new();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .event_format(PrettyFormatter::new(true))
        .with_writer(indicatif_layer.get_stderr_writer());

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_FILE)?;

    let log_file_layer = tracing_subscriber::fmt::layer()
        .event_format(PrettyFormatter::new(false))
        .with_writer(log_file)
        .with_ansi(false);

    Registry::default()
        .with(
            tracing_subscriber::filter::Targets::new()
                .with_target("bank_balance", tracing::Level::DEBUG)
                .with_target("bank_balance::adapters::webdriver", tracing::Level::INFO),
        )
        .with(indicatif_layer)
        .with(log_file_layer)
        .with(stdout_layer)
        .init();

    Ok(())
}

fn setup_panic_hook() {
    tracing::trace!("Setting panic hook");
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic: {info}");
    }));
}
