//! Pipeline configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::playwright::Browser;

/// Default settle delay between fixture sync and the UI run.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 5000;

/// Configuration for one provisioning pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Cloud project the order service runs in.
    pub project_id: String,

    /// Service name used as the token cache key prefix and as the
    /// service-account identifier on order calls.
    pub service_name: String,

    /// Base URL of the order-management service; also the token audience.
    pub order_service_url: String,

    /// Service-account key file. `GOOGLE_APPLICATION_CREDENTIALS` wins when
    /// set.
    pub service_account_path: PathBuf,

    /// Domain the payment pages are served from.
    pub payment_domain: String,

    /// Shared fixture file rewritten with each provisioned order id.
    pub fixture_path: PathBuf,

    /// Settle delay in milliseconds (`ORDER_READY_DELAY` overrides).
    pub settle_delay_ms: u64,

    /// Playwright scenario file to run after provisioning.
    pub scenario: PathBuf,

    /// Browser engine for the scenario run.
    #[serde(skip)]
    pub browser: Browser,

    /// Directory holding the web app's Playwright project.
    pub web_project_dir: PathBuf,

    /// Overall deadline for the scenario run, in seconds. Zero disables it.
    pub runner_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project_id: "remitflow-sandbox".to_string(),
            service_name: "remitflow-e2e".to_string(),
            order_service_url: "https://orders-sandbox.remitflow.app".to_string(),
            service_account_path: PathBuf::from("orders-sandbox.json"),
            payment_domain: "test.pay.remitflow.app".to_string(),
            fixture_path: PathBuf::from("src/fixtures/cash-payment-test-data.ts"),
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            scenario: PathBuf::from("tests/cash-payment-flow.spec.ts"),
            browser: Browser::Chromium,
            web_project_dir: PathBuf::from("."),
            runner_timeout_secs: 600,
        }
    }
}

impl PipelineConfig {
    /// Apply environment overrides: `ORDER_READY_DELAY` for the settle delay,
    /// `GOOGLE_APPLICATION_CREDENTIALS` for the key file.
    pub fn apply_env(mut self) -> Self {
        if let Ok(delay) = std::env::var("ORDER_READY_DELAY") {
            if let Ok(ms) = delay.parse::<u64>() {
                self.settle_delay_ms = ms;
            }
        }
        if let Ok(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
            self.service_account_path = PathBuf::from(path);
        }
        self
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn runner_timeout(&self) -> Option<Duration> {
        (self.runner_timeout_secs > 0).then(|| Duration::from_secs(self.runner_timeout_secs))
    }

    /// Validate the configuration before any remote call is attempted.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.project_id.is_empty() {
            return Err(PipelineError::Authentication(
                "Project ID is not configured".to_string(),
            ));
        }
        if self.order_service_url.is_empty() {
            return Err(PipelineError::Authentication(
                "Order service URL is not configured".to_string(),
            ));
        }
        if !self.service_account_path.exists() {
            return Err(PipelineError::Authentication(format!(
                "Service account key file not found at: {}",
                self.service_account_path.display()
            )));
        }

        info!("Configuration validated successfully");
        info!("Project ID: {}", self.project_id);
        info!("Service Name: {}", self.service_name);
        info!("Order Service URL: {}", self.order_service_url);
        info!("Service Account Path: {}", self.service_account_path.display());
        Ok(())
    }
}
