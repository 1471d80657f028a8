//! Provisioning orchestrator
//!
//! Sequences one run end to end: create a fresh order, resolve its
//! identifier, rewrite the shared fixture, wait out the backend's
//! eventual-consistency window, then hand off to the Playwright runner.
//! Any stage failure halts the run; there is no whole-pipeline retry.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::extract::{extract_order_id, is_canonical_uuid};
use crate::fixture::FixtureSync;
use crate::order::{OrderClient, OrderCreationRequest, OrderResult};
use crate::playwright::{ScenarioRunner, TestOutcome};

/// Pipeline stages, entered strictly in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Creating,
    Extracting,
    Syncing,
    Settling,
    Testing,
    Succeeded,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Creating => "creating",
            Stage::Extracting => "extracting",
            Stage::Syncing => "syncing",
            Stage::Settling => "settling",
            Stage::Testing => "testing",
            Stage::Succeeded => "succeeded",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What the Creating stage produced: a structured result when the order was
/// created in-process, otherwise the captured text of an external creation
/// command for the extractor to work on.
#[derive(Debug)]
pub struct Provisioned {
    pub result: Option<OrderResult>,
    pub captured: String,
}

/// Source of freshly created orders.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn provision(&self) -> PipelineResult<Provisioned>;
}

/// In-process order creation through the [`OrderClient`]. The structured
/// result makes the text-extraction step a pure formality.
pub struct InProcessSource {
    client: OrderClient,
    request: OrderCreationRequest,
}

impl InProcessSource {
    pub fn new(client: OrderClient, request: OrderCreationRequest) -> Self {
        Self { client, request }
    }
}

#[async_trait]
impl OrderSource for InProcessSource {
    async fn provision(&self) -> PipelineResult<Provisioned> {
        info!("Starting order creation...");
        info!("Order data: {}", serde_json::to_string_pretty(&self.request)?);

        let result = self.client.start_order(&self.request).await?;
        info!("Order created successfully!");
        info!("Result: {}", serde_json::to_string(&result)?);

        Ok(Provisioned {
            captured: String::new(),
            result: Some(result),
        })
    }
}

/// Compatibility shim: the order-creation step stays an external black-box
/// process whose stdout/stderr are captured for the extractor.
pub struct ExternalCommandSource {
    program: String,
    args: Vec<String>,
}

impl ExternalCommandSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a shell-ish command line into program and arguments.
    pub fn from_command_line(line: &str) -> PipelineResult<Self> {
        let mut parts = line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| PipelineError::Execution("empty create-order command".to_string()))?;
        Ok(Self::new(program, parts.map(String::from).collect()))
    }
}

#[async_trait]
impl OrderSource for ExternalCommandSource {
    async fn provision(&self) -> PipelineResult<Provisioned> {
        info!("Running {} {}...", self.program, self.args.join(" "));

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| {
                PipelineError::Execution(format!(
                    "failed to run create-order command {}: {}",
                    self.program, e
                ))
            })?;

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));
        print!("{}", captured);

        if !output.status.success() {
            return Err(PipelineError::ProcessStart(format!(
                "create-order command exited with {}",
                output.status
            )));
        }

        Ok(Provisioned {
            captured,
            result: None,
        })
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub order_id: String,
    pub settle_delay_ms: u64,
    /// `None` when the UI run was skipped.
    pub tests_passed: Option<bool>,
}

/// Drives one provisioning run through the stage machine.
pub struct Orchestrator {
    config: PipelineConfig,
    source: Box<dyn OrderSource>,
    fixture: FixtureSync,
    runner: Option<ScenarioRunner>,
    stage: Stage,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        source: Box<dyn OrderSource>,
        fixture: FixtureSync,
        runner: Option<ScenarioRunner>,
    ) -> Self {
        Self {
            config,
            source,
            fixture,
            runner,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        info!("Stage: {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    /// Run the pipeline to completion. Failures at any stage surface
    /// immediately; a failed UI run is soft and still yields a report.
    pub async fn run(&mut self) -> PipelineResult<PipelineReport> {
        match self.run_stages().await {
            Ok(report) => {
                self.enter(Stage::Succeeded);
                Ok(report)
            }
            Err(err) => {
                self.enter(Stage::Failed);
                Err(err)
            }
        }
    }

    async fn run_stages(&mut self) -> PipelineResult<PipelineReport> {
        info!("Starting payment flow integration...");
        info!("==========================================");

        self.enter(Stage::Creating);
        info!("Step 1/5: Creating test order...");
        let provisioned = self.source.provision().await?;

        self.enter(Stage::Extracting);
        info!("Step 2/5: Extracting orderId...");
        let order_id = resolve_order_id(&provisioned)?;
        info!("OrderId extracted: {}", order_id);

        self.enter(Stage::Syncing);
        info!("Step 3/5: Updating fixtures...");
        self.fixture.update(&order_id)?;

        self.enter(Stage::Settling);
        info!("Step 4/5: Waiting for order to be ready...");
        let settle = self.config.settle_delay();
        info!("Waiting {}s (order ready to interact)...", settle.as_secs());
        tokio::time::sleep(settle).await;

        self.enter(Stage::Testing);
        info!("Step 5/5: Running payment flow tests...");
        let tests_passed = match &self.runner {
            Some(runner) => {
                let outcome = runner.run_with_timeout(self.config.runner_timeout()).await?;
                match outcome {
                    TestOutcome::Passed => Some(true),
                    TestOutcome::Failed { code } => {
                        // Soft failure: the order was provisioned and the
                        // fixture is consistent, only the UI run reported red.
                        warn!("Integration completed with failed tests (exit code {})", code);
                        Some(false)
                    }
                }
            }
            None => {
                info!("UI test run skipped");
                None
            }
        };

        info!("==========================================");
        info!("OrderId used: {}", order_id);
        info!("Delay applied: {}ms", self.config.settle_delay_ms);

        Ok(PipelineReport {
            order_id,
            settle_delay_ms: self.config.settle_delay_ms,
            tests_passed,
        })
    }
}

/// Resolve the order identifier from the Creating stage's output: prefer the
/// structured result, fall back to text extraction over the captured output.
fn resolve_order_id(provisioned: &Provisioned) -> PipelineResult<String> {
    match &provisioned.result {
        Some(result) => {
            if !is_canonical_uuid(&result.order_id) {
                return Err(PipelineError::InvalidIdentifier(result.order_id.clone()));
            }
            Ok(result.order_id.clone())
        }
        None => extract_order_id(&provisioned.captured),
    }
}

/// Delimited failure banner, printed by the entry point when a run fails.
pub fn log_failure_banner(err: &PipelineError) {
    tracing::error!("Payment flow integration failed");
    tracing::error!("==========================================");
    tracing::error!("Error: {}", err);
    tracing::error!("==========================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER_ID: &str = "52497f3e-ce60-4c50-b3e5-f8247b5eb056";

    fn structured(order_id: &str) -> Provisioned {
        Provisioned {
            captured: String::new(),
            result: Some(OrderResult {
                order_id: order_id.to_string(),
                workflow_id: "workflow-123".to_string(),
                message: "ok".to_string(),
                payment_review_url: None,
            }),
        }
    }

    #[test]
    fn structured_result_short_circuits_extraction() {
        let provisioned = structured(ORDER_ID);
        assert_eq!(resolve_order_id(&provisioned).unwrap(), ORDER_ID);
    }

    #[test]
    fn malformed_structured_id_is_rejected() {
        let provisioned = structured("not-a-uuid");
        assert!(matches!(
            resolve_order_id(&provisioned),
            Err(PipelineError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn captured_text_goes_through_the_extractor() {
        let provisioned = Provisioned {
            captured: format!("Order ID: {}, Workflow ID: {}\n", ORDER_ID, ORDER_ID),
            result: None,
        };
        assert_eq!(resolve_order_id(&provisioned).unwrap(), ORDER_ID);
    }

    #[test]
    fn command_line_parsing() {
        let source = ExternalCommandSource::from_command_line("npx tsx scripts/create-order.ts").unwrap();
        assert_eq!(source.program, "npx");
        assert_eq!(source.args, vec!["tsx", "scripts/create-order.ts"]);

        assert!(ExternalCommandSource::from_command_line("   ").is_err());
    }
}
