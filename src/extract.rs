//! Order identifier extraction from captured process output
//!
//! The order-creation step emits unstructured log text interleaved with JSON
//! fragments. Extraction is an ordered cascade of independent matcher
//! strategies, folded first-match-wins; structured machine-readable fragments
//! take priority over human-readable labels.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PipelineError, PipelineResult};

/// UUID-shaped substring anywhere in a line (8-4-4-4-12, case-insensitive).
pub static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});

/// Full-string canonical UUID shape.
static UUID_EXACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

/// `"orderId": "<value>"` JSON-style fragment.
static JSON_ORDER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""orderId":\s*"([^"]+)""#).unwrap());

/// `Order ID: <uuid>` label, with the UUID bounded by whitespace, a comma or
/// end of line so trailing annotations like `, Workflow ID: ...` are never
/// swept into the match.
static ORDER_ID_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)Order ID:\s*([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})(?:\s|,|$)",
    )
    .unwrap()
});

/// Whether `candidate` is exactly a canonical UUID, nothing more.
pub fn is_canonical_uuid(candidate: &str) -> bool {
    UUID_EXACT_RE.is_match(candidate)
}

type Matcher = fn(&str) -> Option<String>;

/// Extract the order identifier from captured process output.
///
/// Strategies are tried in priority order; the first candidate that passes
/// strict UUID validation wins. Fails with [`PipelineError::Extraction`] when
/// no strategy yields a valid UUID.
pub fn extract_order_id(output: &str) -> PipelineResult<String> {
    const MATCHERS: &[Matcher] = &[
        match_json_order_id,
        match_result_line,
        match_order_id_label,
        match_any_uuid,
    ];

    MATCHERS
        .iter()
        .find_map(|matcher| matcher(output))
        .ok_or(PipelineError::Extraction)
}

/// Strategy 1: lines containing a `"orderId"` JSON key.
fn match_json_order_id(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("\"orderId\""))
        .find_map(extract_quoted_order_id)
}

/// Strategy 2: lines containing both `Result:` and `"orderId"`.
fn match_result_line(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("Result:") && line.contains("\"orderId\""))
        .find_map(extract_quoted_order_id)
}

/// Strategy 3: the human-readable `Order ID:` label.
fn match_order_id_label(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("Order ID:"))
        .find_map(|line| {
            let captures = ORDER_ID_LABEL_RE.captures(line)?;
            let candidate = captures.get(1)?.as_str().trim().to_string();
            is_canonical_uuid(&candidate).then_some(candidate)
        })
}

/// Strategy 4 (last resort): any UUID-shaped substring anywhere in the text.
fn match_any_uuid(output: &str) -> Option<String> {
    UUID_RE
        .find_iter(output)
        .map(|m| m.as_str().to_string())
        .find(|candidate| is_canonical_uuid(candidate))
}

fn extract_quoted_order_id(line: &str) -> Option<String> {
    let captures = JSON_ORDER_ID_RE.captures(line)?;
    let candidate = captures.get(1)?.as_str().trim().to_string();
    is_canonical_uuid(&candidate).then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER_ID: &str = "52497f3e-ce60-4c50-b3e5-f8247b5eb056";

    #[test]
    fn extracts_from_json_fragment() {
        let output = format!(
            "✅ Order created successfully!\n📊 Result: {{\"orderId\": \"{}\", \"workflowId\": \"workflow-123\"}}\n",
            ORDER_ID
        );
        assert_eq!(extract_order_id(&output).unwrap(), ORDER_ID);
    }

    #[test]
    fn json_fragment_wins_over_label() {
        let other = "a84ab411-a690-488d-a32a-6e053f434807";
        let output = format!(
            "Order ID: {}\nResult: {{\"orderId\": \"{}\"}}\n",
            other, ORDER_ID
        );
        assert_eq!(extract_order_id(&output).unwrap(), ORDER_ID);
    }

    #[test]
    fn label_match_stops_before_workflow_annotation() {
        let output = format!("Order ID: {}, Workflow ID: {}\n", ORDER_ID, ORDER_ID);
        let extracted = extract_order_id(&output).unwrap();
        assert_eq!(extracted, ORDER_ID);
        assert_eq!(extracted.len(), 36);
        assert!(!extracted.contains(','));
        assert!(!extracted.contains("Workflow"));
    }

    #[test]
    fn label_at_end_of_line_matches() {
        let output = format!("🎯 done\nOrder ID: {}", ORDER_ID);
        assert_eq!(extract_order_id(&output).unwrap(), ORDER_ID);
    }

    #[test]
    fn falls_back_to_bare_uuid() {
        let output = format!("some noise\nprocessed {} ok\n", ORDER_ID);
        assert_eq!(extract_order_id(&output).unwrap(), ORDER_ID);
    }

    #[test]
    fn uppercase_uuid_is_accepted() {
        let upper = ORDER_ID.to_uppercase();
        let output = format!("\"orderId\": \"{}\"", upper);
        assert_eq!(extract_order_id(&output).unwrap(), upper);
    }

    #[test]
    fn invalid_json_value_falls_through_to_label() {
        let output = format!("\"orderId\": \"not-a-uuid\"\nOrder ID: {}\n", ORDER_ID);
        assert_eq!(extract_order_id(&output).unwrap(), ORDER_ID);
    }

    #[test]
    fn no_uuid_anywhere_is_an_extraction_failure() {
        let output = "🚀 Starting order creation...\nnothing useful here\n";
        assert!(matches!(
            extract_order_id(output),
            Err(PipelineError::Extraction)
        ));
    }

    #[test]
    fn full_real_world_output() {
        // Shape of the real order-creation script output: JSON result line
        // followed by the human-readable banner with the workflow annotation.
        let output = format!(
            "Result: {{ \"orderId\": \"{id}\", \"workflowId\": \"{id}\" }}\n\
             ================================\n\
             Order ID: {id}, Workflow ID: {id}\n\
             ================================\n",
            id = ORDER_ID
        );
        assert_eq!(extract_order_id(&output).unwrap(), ORDER_ID);
    }

    #[test]
    fn canonical_uuid_validation() {
        assert!(is_canonical_uuid(ORDER_ID));
        assert!(is_canonical_uuid(&ORDER_ID.to_uppercase()));
        assert!(!is_canonical_uuid("52497f3e-ce60-4c50-b3e5"));
        assert!(!is_canonical_uuid(&format!("{} trailing", ORDER_ID)));
        assert!(!is_canonical_uuid(""));
    }
}
