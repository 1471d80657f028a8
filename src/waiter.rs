//! Resilient waiting for UI state against a live, non-deterministic target
//!
//! Flow drivers hand the waiter a set of assertions (elements expected to
//! appear) and a retry policy. The waiter polls once as a fast path, then
//! runs bounded rounds of concurrent waits with escalating timeouts. A
//! torn-down page context is fatal immediately; conditions that simply have
//! not become true yet are retried up to the attempt budget.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};

/// How the per-round timeout grows across attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Every round gets the base timeout.
    Fixed,
    /// Round `n` gets `n * base_timeout`.
    #[default]
    Escalating,
}

/// Retry policy consumed by the waiter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_timeout: Duration,
    pub backoff: Backoff,
    /// Pause between failed rounds.
    pub retry_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_timeout: Duration::from_secs(10),
            backoff: Backoff::Escalating,
            retry_pause: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Timeout for a 1-based attempt number.
    pub fn timeout_for(&self, attempt: usize) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_timeout,
            Backoff::Escalating => self.base_timeout * attempt as u32,
        }
    }

    /// The largest timeout the policy will ever grant.
    pub fn max_timeout(&self) -> Duration {
        self.timeout_for(self.max_attempts.max(1))
    }
}

/// A single UI condition expected to hold, e.g. "success icon visible".
#[async_trait]
pub trait UiAssertion: Send + Sync {
    /// Stable name used in logs and timeout errors.
    fn name(&self) -> &str;

    /// One non-blocking check of the condition. A destroyed viewing context
    /// surfaces as [`PipelineError::ContextClosed`].
    async fn poll(&self) -> PipelineResult<bool>;

    /// Block until the condition holds or the timeout elapses. The default
    /// implementation polls every 100 ms until the deadline.
    async fn wait(&self, timeout: Duration) -> PipelineResult<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.poll().await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Wait until every assertion holds, within the policy's attempt budget.
///
/// Fast path: one concurrent poll; if everything already holds, returns
/// without any wait round. Rounds are strictly sequential; the sub-waits
/// inside a round run concurrently. Exhausting the budget fails with
/// [`PipelineError::ConditionTimeout`] naming the assertions still unmet.
pub async fn wait_for_ready(
    assertions: &[&dyn UiAssertion],
    policy: &RetryPolicy,
) -> PipelineResult<()> {
    if all_hold(assertions).await? {
        debug!("All conditions already hold, skipping wait");
        return Ok(());
    }

    let mut unmet: Vec<String> = Vec::new();

    for attempt in 1..=policy.max_attempts {
        let timeout = policy.timeout_for(attempt);
        info!(
            "Attempt {}/{} - waiting for {} condition(s) ({} ms timeout)",
            attempt,
            policy.max_attempts,
            assertions.len(),
            timeout.as_millis()
        );

        unmet = run_round(assertions, timeout).await?;
        if unmet.is_empty() {
            info!("Conditions met on attempt {}", attempt);
            return Ok(());
        }

        warn!("Attempt {} failed, still unmet: {}", attempt, unmet.join(", "));
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.retry_pause).await;
        }
    }

    Err(PipelineError::ConditionTimeout {
        attempts: policy.max_attempts,
        unmet,
    })
}

/// [`wait_for_ready`], plus one recovery round before giving up.
///
/// When the budget is exhausted but the page context is still alive, a single
/// extra round at the policy's maximum timeout is attempted. A closed context
/// is never retried.
pub async fn wait_for_ready_recovering(
    assertions: &[&dyn UiAssertion],
    policy: &RetryPolicy,
) -> PipelineResult<()> {
    match wait_for_ready(assertions, policy).await {
        Err(err) if err.is_retryable_wait() => {
            warn!("Wait failed ({}), attempting recovery...", err);
            let unmet = run_round(assertions, policy.max_timeout()).await?;
            if unmet.is_empty() {
                info!("Recovery succeeded");
                Ok(())
            } else {
                warn!("Recovery failed, still unmet: {}", unmet.join(", "));
                Err(err)
            }
        }
        other => other,
    }
}

/// One concurrent wait round. Returns the names of assertions still unmet;
/// a `ContextClosed` from any sub-wait aborts the round.
async fn run_round(
    assertions: &[&dyn UiAssertion],
    timeout: Duration,
) -> PipelineResult<Vec<String>> {
    let waits = assertions.iter().map(|a| a.wait(timeout));
    let outcomes = join_all(waits).await;

    let mut unmet = Vec::new();
    for (assertion, outcome) in assertions.iter().zip(outcomes) {
        match outcome {
            Ok(true) => {}
            Ok(false) => unmet.push(assertion.name().to_string()),
            Err(err @ PipelineError::ContextClosed(_)) => return Err(err),
            Err(err) => {
                warn!("Condition '{}' errored: {}", assertion.name(), err);
                unmet.push(assertion.name().to_string());
            }
        }
    }
    Ok(unmet)
}

async fn all_hold(assertions: &[&dyn UiAssertion]) -> PipelineResult<bool> {
    let polls = join_all(assertions.iter().map(|a| a.poll())).await;
    let mut all = true;
    for outcome in polls {
        match outcome {
            Ok(true) => {}
            Ok(false) => all = false,
            Err(err @ PipelineError::ContextClosed(_)) => return Err(err),
            Err(_) => all = false,
        }
    }
    Ok(all)
}
