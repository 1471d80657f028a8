//! Playwright scenario invocation
//!
//! The UI scenarios themselves live in the web app's test suite; this module
//! only runs a named scenario file against one browser engine with a single
//! worker and classifies the exit. Scenarios share one fixture file and one
//! provisioned backend order, so parallel workers are deliberately off.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser: {}", other)),
        }
    }
}

/// How a runner invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    /// Exit code 0: every scenario passed.
    Passed,
    /// Non-zero exit: at least one scenario failed, or the runner errored
    /// after starting. Soft failure from the pipeline's point of view.
    Failed { code: i32 },
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }
}

/// Runs one Playwright scenario file as a subprocess.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    /// Scenario spec file, relative to `working_dir`.
    pub scenario: PathBuf,
    pub browser: Browser,
    /// Directory holding the web app's Playwright project.
    pub working_dir: PathBuf,
}

impl ScenarioRunner {
    pub fn new(scenario: impl Into<PathBuf>, browser: Browser, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            scenario: scenario.into(),
            browser,
            working_dir: working_dir.into(),
        }
    }

    /// Check that the Playwright CLI is reachable at all.
    pub async fn check_installed(&self) -> PipelineResult<()> {
        let status = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| PipelineError::Execution(format!("failed to invoke npx: {}", e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(PipelineError::Execution(
                "Playwright not found. Install with: npx playwright install".to_string(),
            ))
        }
    }

    /// Run the scenario. Failing to spawn the runner at all is an
    /// execution-level error; a non-zero exit is reported as a
    /// [`TestOutcome::Failed`], not an error.
    pub async fn run(&self) -> PipelineResult<TestOutcome> {
        self.run_with_timeout(None).await
    }

    /// [`Self::run`] with an overall deadline. A runner still alive at the
    /// deadline is sent SIGTERM and reported as an execution error.
    pub async fn run_with_timeout(&self, deadline: Option<Duration>) -> PipelineResult<TestOutcome> {
        let scenario = self.scenario.display().to_string();
        info!(
            "Running: npx playwright test {} --project={} --workers=1",
            scenario,
            self.browser.as_str()
        );

        let mut child = Command::new("npx")
            .arg("playwright")
            .arg("test")
            .arg(&self.scenario)
            .arg(format!("--project={}", self.browser.as_str()))
            .arg("--workers=1")
            .current_dir(&self.working_dir)
            .spawn()
            .map_err(|e| {
                PipelineError::Execution(format!("failed to spawn Playwright runner: {}", e))
            })?;

        let status = if let Some(limit) = deadline {
            let waited = tokio::time::timeout(limit, child.wait()).await;
            match waited {
                Ok(status) => status,
                Err(_) => {
                    warn!("Runner exceeded {} s deadline, terminating", limit.as_secs());
                    Self::terminate(&mut child);
                    return Err(PipelineError::Execution(format!(
                        "runner timed out after {} s",
                        limit.as_secs()
                    )));
                }
            }
        } else {
            child.wait().await
        }
        .map_err(|e| PipelineError::Execution(format!("runner did not exit cleanly: {}", e)))?;

        if status.success() {
            info!("UI scenario run completed successfully");
            Ok(TestOutcome::Passed)
        } else {
            let code = status.code().unwrap_or(-1);
            warn!("UI scenario run exited with code {}", code);
            Ok(TestOutcome::Failed { code })
        }
    }

    /// Best-effort graceful termination of a still-running runner.
    #[cfg(unix)]
    pub fn terminate(child: &mut tokio::process::Child) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }
        let _ = child.start_kill();
    }

    #[cfg(not(unix))]
    pub fn terminate(child: &mut tokio::process::Child) {
        let _ = child.start_kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_parses_case_insensitively() {
        assert_eq!("Chromium".parse::<Browser>().unwrap(), Browser::Chromium);
        assert_eq!("chrome".parse::<Browser>().unwrap(), Browser::Chromium);
        assert_eq!("firefox".parse::<Browser>().unwrap(), Browser::Firefox);
        assert!("opera".parse::<Browser>().is_err());
    }

    #[tokio::test]
    async fn spawn_failure_is_an_execution_error() {
        // Point the runner at a working directory that cannot exist.
        let runner = ScenarioRunner::new(
            "tests/cash-payment-flow.spec.ts",
            Browser::Chromium,
            "/nonexistent/remitflow-web",
        );
        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Execution(_)));
    }
}
