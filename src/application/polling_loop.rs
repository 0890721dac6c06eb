use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tracing::{error, info, info_span, instrument, warn, Instrument};

use super::balance_extractor::extract_balance;
use super::condition::{evaluate_condition, AlertCondition};
use super::notifier::BalanceNotifier;
use super::session::SessionOrchestrator;
use crate::domain::{
    AlertDecision, CredentialBundle, CycleReading, NoReadingCause, NotificationOutcome, CURRENCY,
};
use crate::progress::wait_with_progress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingSettings {
    /// Pause between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Whether a cycle that produced no reading still sends a report.
    pub notify_without_reading: bool,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 3600),
            notify_without_reading: true,
        }
    }
}

/// Everything one cycle produced. Nothing of it survives into the next.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub reading: CycleReading,
    pub decision: Option<AlertDecision>,
    pub notification: NotificationOutcome,
}

/// Drives the check forever: read the balance, evaluate the alert, report,
/// sleep. Per-cycle failures are logged and absorbed here.
pub struct PollingLoop {
    credentials: Arc<CredentialBundle>,
    orchestrator: SessionOrchestrator,
    notifier: BalanceNotifier,
    settings: PollingSettings,
    cycles: AtomicU64,
}

impl fmt::Debug for PollingLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingLoop")
            .field("orchestrator", &self.orchestrator)
            .field("notifier", &self.notifier)
            .field("settings", &self.settings)
            .field("cycles", &self.cycles.load(Ordering::Relaxed))
            .finish()
    }
}

impl PollingLoop {
    pub fn new(
        credentials: Arc<CredentialBundle>,
        orchestrator: SessionOrchestrator,
        notifier: BalanceNotifier,
        settings: PollingSettings,
    ) -> Self {
        // Evaluation still happens every cycle, this only warns early.
        if let Err(report) = AlertCondition::parse(&credentials.conditions) {
            warn!(
                "Alert condition {:?} is invalid, no alerts will be raised: {:?}",
                credentials.conditions, report
            );
        }

        Self {
            credentials,
            orchestrator,
            notifier,
            settings,
            cycles: AtomicU64::new(0),
        }
    }

    pub async fn run(&self) -> ! {
        loop {
            self.tick().await;
        }
    }

    /// One cycle followed by the inter-cycle sleep.
    pub async fn tick(&self) -> CycleReport {
        let report = self.run_cycle().await;
        self.sleep().await;
        report
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;

        async {
            let reading = self.read_balance().await;
            let decision = self.evaluate(&reading);
            let notification = self.notify(&reading, decision.as_ref()).await;

            let report = CycleReport {
                cycle,
                reading,
                decision,
                notification,
            };
            match &report.notification {
                NotificationOutcome::Failed { .. } => {
                    error!("❌ Cycle {} finished: {:?}", cycle, report)
                }
                _ => info!("✅ Cycle {} finished: {:?}", cycle, report),
            }
            report
        }
        .instrument(info_span!("cycle", cycle))
        .await
    }

    async fn read_balance(&self) -> CycleReading {
        let page = match self
            .orchestrator
            .capture_balance_page(&self.credentials)
            .await
        {
            Ok(page) => page,
            Err(report) => {
                error!("Could not retrieve the balance page: {:?}", report);
                return CycleReading::NoReading {
                    cause: NoReadingCause::Session,
                    reason: report.current_context().to_string(),
                };
            }
        };

        match extract_balance(page.as_str()) {
            Ok(balance) => {
                info!("Balance in account is: {} {}", balance, CURRENCY);
                CycleReading::Reading(balance)
            }
            Err(report) => {
                error!("Error finding the balance: {:?}", report);
                CycleReading::NoReading {
                    cause: NoReadingCause::Extraction,
                    reason: report.current_context().to_string(),
                }
            }
        }
    }

    #[instrument(skip(self, reading))]
    fn evaluate(&self, reading: &CycleReading) -> Option<AlertDecision> {
        let balance = reading.balance()?;

        match evaluate_condition(&self.credentials.conditions, balance) {
            Ok(decision) => {
                if decision.triggered {
                    warn!("Alert condition met: {}", decision.condition);
                }
                Some(decision)
            }
            Err(report) => {
                error!("Alert condition could not be evaluated: {:?}", report);
                None
            }
        }
    }

    async fn notify(
        &self,
        reading: &CycleReading,
        decision: Option<&AlertDecision>,
    ) -> NotificationOutcome {
        if reading.balance().is_none() && !self.settings.notify_without_reading {
            info!("No reading this cycle and no-reading reports are disabled");
            return NotificationOutcome::Skipped;
        }

        match self.notifier.notify(reading, decision).await {
            Ok(()) => NotificationOutcome::Delivered,
            Err(report) => {
                error!("Error sending email: {:?}", report);
                NotificationOutcome::Failed {
                    reason: report.current_context().to_string(),
                }
            }
        }
    }

    async fn sleep(&self) {
        let interval = self.settings.interval;
        let next = chrono::Duration::from_std(interval)
            .ok()
            .and_then(|delta| chrono::Local::now().checked_add_signed(delta));

        match next {
            Some(next) => info!(
                "Going to sleep for {}s, next check at {}",
                interval.as_secs(),
                next.format("%Y-%m-%d %H:%M:%S")
            ),
            None => info!("Going to sleep for {}s", interval.as_secs()),
        }

        wait_with_progress(interval, "Sleeping until the next check").await;
    }
}
