use std::{borrow::Cow, sync::LazyLock, time::Duration};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::time::{sleep_until, Instant};

pub static CLI_MULTI_PROGRESS: LazyLock<MultiProgress> = LazyLock::new(MultiProgress::new);

pub fn new_progress(progress_bar: ProgressBar) -> ProgressBar {
    let progress_bar = CLI_MULTI_PROGRESS.add(progress_bar);
    progress_bar.enable_steady_tick(Duration::from_millis(250));
    progress_bar
}

pub fn finish_progress(progress_bar: &ProgressBar) {
    progress_bar.finish();
    CLI_MULTI_PROGRESS.remove(progress_bar);
}

pub trait ProgressBarExt {
    fn trace(&self, msg: impl Into<Cow<'static, str>>);
}

impl ProgressBarExt for ProgressBar {
    fn trace(&self, msg: impl Into<Cow<'static, str>>) {
        let msg: Cow<'static, str> = msg.into();
        tracing::trace!("{}", msg);
        self.set_message(msg);
    }
}

/// Sleeps for `duration`, showing a per-second progress bar meanwhile.
/// Ticks are scheduled from the start instant so the total does not drift.
pub async fn wait_with_progress(duration: Duration, message: impl Into<Cow<'static, str>>) {
    if duration.is_zero() {
        return;
    }

    let seconds = duration.as_secs().max(1);
    let progress = new_progress(ProgressBar::new(seconds));
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner} {msg} [{elapsed_precise}/{duration_precise}] {wide_bar}",
    ) {
        progress.set_style(style);
    }
    progress.trace(message);

    let start = Instant::now();
    for tick in 1..=seconds {
        sleep_until(start + duration.mul_f64(tick as f64 / seconds as f64)).await;
        progress.set_position(tick);
    }
    finish_progress(&progress);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_wait_returns_immediately() {
        let start = std::time::Instant::now();
        wait_with_progress(Duration::ZERO, "nothing to wait for").await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_sub_second_wait_completes() {
        let start = std::time::Instant::now();
        wait_with_progress(Duration::from_millis(30), "short wait").await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
