use std::process::{Child, Command, ExitStatus, Stdio};

use error_stack::ResultExt;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum GeckodriverError {
    #[error("Failed to spawn geckodriver process")]
    FailedToSpawnGeckodriver,
}

pub fn random_port() -> u16 {
    rand::random::<u16>() % (65535 - 1024) + 1024
}

/// A running geckodriver child. Killed when dropped, so a session that is
/// abandoned halfway never leaves a driver behind.
#[derive(Debug)]
pub struct GeckodriverProcess {
    child: Option<Child>,
    port: u16,
}

impl GeckodriverProcess {
    #[instrument]
    pub fn spawn(binary: &str, port: u16) -> error_stack::Result<Self, GeckodriverError> {
        let child = Command::new(binary)
            .arg("--port")
            .arg(port.to_string())
            .arg("--log")
            .arg("fatal")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .change_context(GeckodriverError::FailedToSpawnGeckodriver)
            .attach_printable_lazy(|| format!("Binary: {}", binary))?;

        Ok(Self {
            child: Some(child),
            port,
        })
    }

    /// A handle for a WebDriver endpoint this process does not own.
    #[cfg(test)]
    pub(crate) fn detached(port: u16) -> Self {
        Self { child: None, port }
    }

    pub fn webdriver_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    pub fn kill(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        match terminate(&mut child) {
            Ok(Some(_)) => {}
            Ok(None) => tracing::error!("geckodriver process {} is still running", child.id()),
            Err(error) => tracing::error!("Failed to stop geckodriver process: {}", error),
        }
    }
}

/// Kills and reaps `child`. Returns `None` if it could not be killed and is
/// still running.
fn terminate(child: &mut Child) -> std::io::Result<Option<ExitStatus>> {
    match child.kill() {
        Ok(()) => child.wait().map(Some),
        // Fails when the child already exited on its own; it still needs reaping.
        Err(_) => child.try_wait(),
    }
}

impl Drop for GeckodriverProcess {
    fn drop(&mut self) {
        self.kill();
    }
}
