//! Identity token acquisition and caching
//!
//! Outbound order-service calls carry a bearer identity token scoped to the
//! service URL. Tokens are minted by an external identity provider and cached
//! per (service name, audience) pair for a fixed one-hour window; the cache
//! lives for the process lifetime. Minting failures are never retried here -
//! they propagate to the caller.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// Fixed cache lifetime for a minted token.
const TOKEN_TTL_MILLIS: u64 = 3600 * 1000;

/// A cached bearer credential.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: u64,
}

/// Source of fresh identity tokens, scoped to a target audience URL.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_id_token(&self, audience: &str) -> PipelineResult<String>;
}

/// Millisecond clock, injectable for deterministic expiry tests.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Caching token provider in front of a [`TokenSource`].
pub struct TokenProvider {
    service_name: String,
    source: Box<dyn TokenSource>,
    clock: Box<dyn Clock>,
    cache: Mutex<HashMap<String, CachedToken>>,
}

impl TokenProvider {
    pub fn new(service_name: impl Into<String>, source: Box<dyn TokenSource>) -> Self {
        Self::with_clock(service_name, source, Box::new(SystemClock))
    }

    pub fn with_clock(
        service_name: impl Into<String>,
        source: Box<dyn TokenSource>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            source,
            clock,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Return a bearer token scoped to `target_audience`, reusing the cached
    /// one while it is still inside its validity window.
    pub async fn get_authentication_token(&self, target_audience: &str) -> PipelineResult<String> {
        let key = self.token_key(target_audience);
        let now = self.clock.now_millis();

        if let Some(cached) = self.cached_token(&key) {
            if now < cached.expires_at {
                debug!("Reusing cached token for audience {}", target_audience);
                return Ok(cached.token);
            }
        }

        info!(
            "Generating new token for {} with audience {}",
            self.service_name, target_audience
        );
        let token = self.source.fetch_id_token(target_audience).await?;
        if token.is_empty() {
            return Err(PipelineError::Authentication(
                "identity provider returned an empty token".to_string(),
            ));
        }

        let entry = CachedToken {
            token: token.clone(),
            expires_at: now + TOKEN_TTL_MILLIS,
        };
        // Expired entries are replaced wholesale, never merged.
        self.cache
            .lock()
            .expect("token cache poisoned")
            .insert(key, entry);

        Ok(token)
    }

    fn token_key(&self, target_audience: &str) -> String {
        format!("{}_{}", self.service_name, target_audience)
    }

    fn cached_token(&self, key: &str) -> Option<CachedToken> {
        self.cache
            .lock()
            .expect("token cache poisoned")
            .get(key)
            .cloned()
    }
}

/// Token source backed by the gcloud CLI: mints an identity token for the
/// given audience with the service-account credentials named by
/// `GOOGLE_APPLICATION_CREDENTIALS`.
pub struct GcloudTokenSource {
    credentials_path: Option<String>,
}

impl GcloudTokenSource {
    pub fn new(credentials_path: Option<String>) -> Self {
        Self { credentials_path }
    }
}

#[async_trait]
impl TokenSource for GcloudTokenSource {
    async fn fetch_id_token(&self, audience: &str) -> PipelineResult<String> {
        let mut cmd = Command::new("gcloud");
        cmd.args(["auth", "print-identity-token", "--audiences", audience])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(path) = &self.credentials_path {
            cmd.env("GOOGLE_APPLICATION_CREDENTIALS", path);
        }

        let output = cmd.output().await.map_err(|e| {
            PipelineError::Authentication(format!("failed to invoke gcloud: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Authentication(format!(
                "gcloud exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
