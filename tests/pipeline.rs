//! End-to-end pipeline tests against a mocked order source
//!
//! The UI run is skipped (no runner); everything up to and including the
//! settle stage runs for real, with the fixture on a tempfile.

use std::io::Write;

use async_trait::async_trait;
use tempfile::NamedTempFile;

use remitflow_e2e::config::PipelineConfig;
use remitflow_e2e::error::{PipelineError, PipelineResult};
use remitflow_e2e::fixture::{payment_urls, FixtureSync};
use remitflow_e2e::order::OrderResult;
use remitflow_e2e::pipeline::{Orchestrator, OrderSource, Provisioned, Stage};

const DOMAIN: &str = "test.pay.remitflow.app";
const ORDER_ID: &str = "a84ab411-a690-488d-a32a-6e053f434807";

struct StructuredSource {
    order_id: String,
}

#[async_trait]
impl OrderSource for StructuredSource {
    async fn provision(&self) -> PipelineResult<Provisioned> {
        Ok(Provisioned {
            captured: String::new(),
            result: Some(OrderResult {
                order_id: self.order_id.clone(),
                workflow_id: "workflow-123".to_string(),
                message: "Order created and process started successfully".to_string(),
                payment_review_url: None,
            }),
        })
    }
}

struct CapturedTextSource {
    output: String,
}

#[async_trait]
impl OrderSource for CapturedTextSource {
    async fn provision(&self) -> PipelineResult<Provisioned> {
        Ok(Provisioned {
            captured: self.output.clone(),
            result: None,
        })
    }
}

struct FailingSource;

#[async_trait]
impl OrderSource for FailingSource {
    async fn provision(&self) -> PipelineResult<Provisioned> {
        Err(PipelineError::ProcessStart("connection refused".to_string()))
    }
}

fn placeholder_fixture() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let body: String = payment_urls(DOMAIN, "placeholder")
        .into_iter()
        .take(3)
        .map(|u| format!("  url: '{u}',\n"))
        .collect();
    file.write_all(body.as_bytes()).unwrap();
    file
}

fn test_config(fixture: &NamedTempFile) -> PipelineConfig {
    PipelineConfig {
        fixture_path: fixture.path().to_path_buf(),
        settle_delay_ms: 0,
        ..PipelineConfig::default()
    }
}

fn orchestrator(fixture: &NamedTempFile, source: Box<dyn OrderSource>) -> Orchestrator {
    let config = test_config(fixture);
    let sync = FixtureSync::new(fixture.path(), DOMAIN);
    Orchestrator::new(config, source, sync, None)
}

#[tokio::test]
async fn structured_provisioning_rewrites_placeholder_fixture() {
    let fixture = placeholder_fixture();
    let mut orch = orchestrator(
        &fixture,
        Box::new(StructuredSource { order_id: ORDER_ID.to_string() }),
    );

    let report = orch.run().await.unwrap();
    assert_eq!(report.order_id, ORDER_ID);
    assert_eq!(report.tests_passed, None);
    assert_eq!(orch.stage(), Stage::Succeeded);

    let updated = std::fs::read_to_string(fixture.path()).unwrap();
    assert!(!updated.contains("placeholder"));
    assert_eq!(
        updated.matches(&format!("https://{DOMAIN}/{ORDER_ID}/")).count(),
        3
    );
}

#[tokio::test]
async fn captured_output_is_resolved_through_the_extractor() {
    // The shape an external create-order script actually emits: a JSON
    // result line plus the human-readable banner with the workflow
    // annotation.
    let output = format!(
        "Result: {{ \"orderId\": \"{id}\", \"workflowId\": \"{id}\" }}\n\
         Order ID: {id}, Workflow ID: {id}\n",
        id = ORDER_ID
    );
    let fixture = placeholder_fixture();
    let mut orch = orchestrator(&fixture, Box::new(CapturedTextSource { output }));

    let report = orch.run().await.unwrap();
    assert_eq!(report.order_id, ORDER_ID);

    let updated = std::fs::read_to_string(fixture.path()).unwrap();
    assert!(!updated.contains("Workflow"));
    assert!(updated.contains(&format!("https://{DOMAIN}/{ORDER_ID}/payment/review")));
}

#[tokio::test]
async fn creation_failure_halts_before_touching_the_fixture() {
    let fixture = placeholder_fixture();
    let original = std::fs::read_to_string(fixture.path()).unwrap();
    let mut orch = orchestrator(&fixture, Box::new(FailingSource));

    let err = orch.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::ProcessStart(_)));
    assert_eq!(orch.stage(), Stage::Failed);
    assert_eq!(std::fs::read_to_string(fixture.path()).unwrap(), original);
}

#[tokio::test]
async fn extraction_failure_halts_the_run() {
    let fixture = placeholder_fixture();
    let mut orch = orchestrator(
        &fixture,
        Box::new(CapturedTextSource {
            output: "no identifiers in here\n".to_string(),
        }),
    );

    let err = orch.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Extraction));
    assert_eq!(orch.stage(), Stage::Failed);
}

#[tokio::test]
async fn rerun_with_same_order_is_idempotent() {
    let fixture = placeholder_fixture();

    let mut first = orchestrator(
        &fixture,
        Box::new(StructuredSource { order_id: ORDER_ID.to_string() }),
    );
    first.run().await.unwrap();
    let after_first = std::fs::read_to_string(fixture.path()).unwrap();

    let mut second = orchestrator(
        &fixture,
        Box::new(StructuredSource { order_id: ORDER_ID.to_string() }),
    );
    second.run().await.unwrap();
    let after_second = std::fs::read_to_string(fixture.path()).unwrap();

    assert_eq!(after_first, after_second);
}
