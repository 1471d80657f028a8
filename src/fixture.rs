//! Fixture synchronization - rewriting the shared test-data file in place
//!
//! UI scenarios read their URLs from one version-controlled fixture file.
//! After a fresh order is provisioned, every identifier in that file (and any
//! unresolved placeholder) must point at the new order before the Playwright
//! run starts. The rewrite is whole-file: full read, full transform, full
//! write, then verify.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::extract::{is_canonical_uuid, UUID_RE};

/// `, Workflow ID: <uuid>` annotations erroneously embedded by earlier runs.
static WORKFLOW_ANNOTATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i),\s*Workflow\s*ID:\s*[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .unwrap()
});

/// Minimum number of payment URLs that must carry the new order id after a
/// rewrite. The fixture holds the review, barcode and store-selection URLs.
const MIN_URL_OCCURRENCES: usize = 3;

/// Rewrites the shared fixture file with a freshly provisioned order id.
#[derive(Debug, Clone)]
pub struct FixtureSync {
    /// The fixture source file to rewrite.
    pub path: PathBuf,

    /// Domain the payment URLs are served from, e.g. `test.pay.remitflow.app`.
    pub payment_domain: String,

    /// Sentinel token marking "identifier not yet known".
    pub placeholder: String,
}

impl FixtureSync {
    pub fn new(path: impl Into<PathBuf>, payment_domain: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            payment_domain: payment_domain.into(),
            placeholder: "placeholder".to_string(),
        }
    }

    /// Substitute `order_id` for every previous identifier and placeholder
    /// occurrence, then verify the rewrite by re-reading the file.
    ///
    /// Idempotent: re-running with the same `order_id` leaves the file
    /// byte-identical.
    pub fn update(&self, order_id: &str) -> PipelineResult<()> {
        if !self.path.exists() {
            return Err(PipelineError::FixtureNotFound(self.path.clone()));
        }

        if !is_canonical_uuid(order_id) {
            return Err(PipelineError::InvalidIdentifier(order_id.to_string()));
        }

        let content = std::fs::read_to_string(&self.path)?;

        // Defensive cleanup of a known malformed pattern before the UUID
        // sweep, otherwise the stray workflow id would survive as a URL-less
        // copy of the order id.
        let content = WORKFLOW_ANNOTATION_RE.replace_all(&content, "");
        let content = UUID_RE.replace_all(&content, order_id);
        let content = content.replace(&self.placeholder, order_id);

        std::fs::write(&self.path, &content)?;
        info!("Fixture updated with orderId: {}", order_id);

        self.verify(order_id)?;
        Ok(())
    }

    /// Post-write verification: the id must be present, and the payment URLs
    /// built from it must occur at least [`MIN_URL_OCCURRENCES`] times.
    fn verify(&self, order_id: &str) -> PipelineResult<()> {
        let updated = std::fs::read_to_string(&self.path)?;

        if !updated.contains(order_id) {
            return Err(PipelineError::FixtureVerification(
                "orderId was not written to the fixture file".to_string(),
            ));
        }

        let url_prefix = format!("https://{}/{}/", self.payment_domain, order_id);
        let url_count = updated.matches(&url_prefix).count();
        if url_count < MIN_URL_OCCURRENCES {
            return Err(PipelineError::FixtureVerification(format!(
                "expected at least {} URLs with orderId {}, found {}",
                MIN_URL_OCCURRENCES, order_id, url_count
            )));
        }

        info!("Verified {} URLs updated with orderId: {}", url_count, order_id);
        Ok(())
    }
}

/// Render the fixture's canonical payment URLs for an order, used when
/// generating a fixture from scratch in tests and demos.
pub fn payment_urls(domain: &str, order_id: &str) -> Vec<String> {
    vec![
        format!("https://{domain}/{order_id}/payment/review?overseer=true"),
        format!("https://{domain}/{order_id}/payment/barcode?overseer=true"),
        format!("https://{domain}/{order_id}/new-cash/3?only_user_info=false&overseer=true"),
        format!("https://{domain}/{order_id}/payment/change-payment-method?overseer=true"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DOMAIN: &str = "test.pay.remitflow.app";
    const NEW_ID: &str = "a84ab411-a690-488d-a32a-6e053f434807";
    const OLD_ID: &str = "fe2cb863-128d-4066-8855-f02b1b9001e5";

    fn fixture_with(content: &str) -> (NamedTempFile, FixtureSync) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let sync = FixtureSync::new(file.path(), DOMAIN);
        (file, sync)
    }

    fn fixture_body(id: &str) -> String {
        payment_urls(DOMAIN, id)
            .into_iter()
            .map(|u| format!("  url: '{u}'\n"))
            .collect()
    }

    #[test]
    fn replaces_previous_order_id_everywhere() {
        let (_file, sync) = fixture_with(&fixture_body(OLD_ID));
        sync.update(NEW_ID).unwrap();

        let updated = std::fs::read_to_string(&sync.path).unwrap();
        assert!(!updated.contains(OLD_ID));
        assert_eq!(updated.matches(NEW_ID).count(), 4);
    }

    #[test]
    fn replaces_placeholder_token() {
        let (_file, sync) = fixture_with(&fixture_body("placeholder"));
        sync.update(NEW_ID).unwrap();

        let updated = std::fs::read_to_string(&sync.path).unwrap();
        assert!(!updated.contains("placeholder"));
        assert!(updated.contains(&format!("https://{DOMAIN}/{NEW_ID}/payment/review")));
    }

    #[test]
    fn strips_workflow_annotation_before_rewriting() {
        let content = format!(
            "orderId: '{OLD_ID}, Workflow ID: {OLD_ID}'\n{}",
            fixture_body(OLD_ID)
        );
        let (_file, sync) = fixture_with(&content);
        sync.update(NEW_ID).unwrap();

        let updated = std::fs::read_to_string(&sync.path).unwrap();
        assert!(!updated.contains("Workflow"));
        assert!(updated.contains(&format!("orderId: '{NEW_ID}'")));
    }

    #[test]
    fn update_is_idempotent() {
        let (_file, sync) = fixture_with(&fixture_body(OLD_ID));
        sync.update(NEW_ID).unwrap();
        let first = std::fs::read_to_string(&sync.path).unwrap();

        sync.update(NEW_ID).unwrap();
        let second = std::fs::read_to_string(&sync.path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_invalid_order_id_without_touching_file() {
        let original = fixture_body(OLD_ID);
        let (_file, sync) = fixture_with(&original);

        let err = sync.update("not-a-uuid").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidIdentifier(_)));
        assert_eq!(std::fs::read_to_string(&sync.path).unwrap(), original);
    }

    #[test]
    fn missing_file_is_fixture_not_found() {
        let sync = FixtureSync::new("/nonexistent/cash-payment-test-data.ts", DOMAIN);
        assert!(matches!(
            sync.update(NEW_ID),
            Err(PipelineError::FixtureNotFound(_))
        ));
    }

    #[test]
    fn too_few_urls_fails_verification() {
        // Only one payment URL: the rewrite happens but verification rejects it.
        let content = format!("url: 'https://{DOMAIN}/{OLD_ID}/payment/review'\n");
        let (_file, sync) = fixture_with(&content);
        assert!(matches!(
            sync.update(NEW_ID),
            Err(PipelineError::FixtureVerification(_))
        ));
    }
}
