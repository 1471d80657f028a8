//! RemitFlow E2E provisioning pipeline
//!
//! This crate automates end-to-end verification of the RemitFlow payment
//! pages (bank transfer and cash pickup) by provisioning a disposable order
//! against the backend order-management service and then driving the UI
//! scenarios against it:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Provisioning Orchestrator                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Creating    OrderClient::start_order (bearer-authed RPC)   │
//! │      │       or external create-order command (captured)    │
//! │  Extracting  extract_order_id over captured output          │
//! │  Syncing     FixtureSync rewrites the shared fixture file   │
//! │  Settling    configurable delay (ORDER_READY_DELAY)         │
//! │  Testing     npx playwright test ... --workers=1            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The UI flow drivers wait on the freshly provisioned order's pages through
//! the resilient waiter ([`waiter`]): bounded retry rounds with escalating
//! timeouts, concurrent sub-waits, and an immediate abort when the page
//! context is torn down.
//!
//! Orders propagate through the backend eventually, not instantly; the settle
//! delay and the waiter exist to tame exactly that window. Scenarios run with
//! a single worker because they share one fixture file and one backend order.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod fixture;
pub mod order;
pub mod pipeline;
pub mod playwright;
pub mod waiter;

pub use auth::{GcloudTokenSource, TokenProvider, TokenSource};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use extract::extract_order_id;
pub use fixture::FixtureSync;
pub use order::{OrderClient, OrderCreationRequest, OrderResult};
pub use pipeline::{Orchestrator, OrderSource, PipelineReport, Stage};
pub use playwright::{Browser, ScenarioRunner, TestOutcome};
pub use waiter::{wait_for_ready, wait_for_ready_recovering, RetryPolicy, UiAssertion};
