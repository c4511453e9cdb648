//! Turning raw model text into an [`ExtractionResult`].
//!
//! The model is asked for bare JSON but does not always comply, so the text
//! is trimmed and de-fenced before parsing. Parsing itself is split into a
//! shape check (both top-level keys present) and a lenient typed mapping;
//! each failure is reported as a distinct [`ParseFailure`] so the retry loop
//! can log and back off accordingly.

use darflow_core::{AuditFinding, ExtractionResult, ReportHeader};
use serde_json::Value;
use thiserror::Error;

const FENCE_OPENINGS: [&str; 3] = ["```json", "```JSON", "```"];
const FENCE: &str = "```";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseFailure {
    #[error("model returned an empty response")]
    Empty,
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("response JSON is missing required key(s): {}", .0.join(", "))]
    MissingKeys(Vec<&'static str>),
    #[error("could not map '{key}': {message}")]
    Mapping { key: &'static str, message: String },
}

impl ParseFailure {
    /// Malformed or schema-violating output, as opposed to no output at all.
    pub fn is_shape_error(&self) -> bool {
        !matches!(self, Self::Empty)
    }
}

/// Trim, then drop one leading code-fence opening and one trailing fence.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = FENCE_OPENINGS.iter().find_map(|f| text.strip_prefix(f)) {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix(FENCE) {
        text = rest;
    }
    text.trim()
}

/// Parse cleaned model output. Unrecognised top-level keys are ignored.
pub fn parse_response(raw: &str) -> Result<ExtractionResult, ParseFailure> {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return Err(ParseFailure::Empty);
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| ParseFailure::InvalidJson(e.to_string()))?;
    let Value::Object(mut map) = value else {
        return Err(ParseFailure::MissingKeys(vec!["header", "audit_paras"]));
    };

    let missing: Vec<&'static str> = ["header", "audit_paras"]
        .into_iter()
        .filter(|k| !map.contains_key(*k))
        .collect();
    if !missing.is_empty() {
        return Err(ParseFailure::MissingKeys(missing));
    }

    let header = match map.remove("header") {
        None | Some(Value::Null) => None,
        Some(v) => Some(serde_json::from_value::<ReportHeader>(v).map_err(|e| {
            ParseFailure::Mapping {
                key: "header",
                message: e.to_string(),
            }
        })?),
    };

    let audit_paras = match map.remove("audit_paras") {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value::<Vec<AuditFinding>>(v).map_err(|e| {
            ParseFailure::Mapping {
                key: "audit_paras",
                message: e.to_string(),
            }
        })?,
    };

    let error_message = match map.remove("parsing_errors") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s).filter(|s| !s.trim().is_empty()),
        Some(other) => Some(other.to_string()),
    };

    Ok(ExtractionResult {
        header,
        audit_paras,
        error_message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use darflow_core::Category;

    const VALID: &str = r#"{
        "header": {
            "audit_group_number": 4,
            "gstin": "29ABCDE1234F1Z5",
            "trade_name": "Acme Corp",
            "category": "large",
            "total_amount_detected_overall_rs": "1,23,456.00",
            "total_amount_recovered_overall_rs": 50000
        },
        "audit_paras": [
            { "audit_para_number": 1, "audit_para_heading": "Short payment of tax",
              "revenue_involved_lakhs_rs": 1.23, "revenue_recovered_lakhs_rs": 0.5 }
        ],
        "parsing_errors": null
    }"#;

    #[test]
    fn strips_each_fence_spelling() {
        for open in ["```json", "```JSON", "```"] {
            let fenced = format!("  {open}\n{{\"a\": 1}}\n```  ");
            assert_eq!(strip_code_fences(&fenced), "{\"a\": 1}");
        }
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn fencing_does_not_change_result() {
        let bare = parse_response(VALID).unwrap();
        let fenced = parse_response(&format!("```json\n{VALID}\n```")).unwrap();
        assert_eq!(bare, fenced);

        let header = bare.header.unwrap();
        assert_eq!(header.category, Some(Category::Large));
        assert_eq!(header.total_amount_detected_overall_rs, Some(123_456.0));
        assert_eq!(bare.audit_paras.len(), 1);
        assert!(bare.error_message.is_none());
    }

    #[test]
    fn empty_and_fence_only_are_empty() {
        assert_eq!(parse_response("   "), Err(ParseFailure::Empty));
        assert_eq!(parse_response("```json\n```"), Err(ParseFailure::Empty));
        assert!(!ParseFailure::Empty.is_shape_error());
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = parse_response("{ header: ").unwrap_err();
        assert!(matches!(err, ParseFailure::InvalidJson(_)));
        assert!(err.is_shape_error());
    }

    #[test]
    fn missing_keys_are_named() {
        assert_eq!(
            parse_response(r#"{"header": {}}"#),
            Err(ParseFailure::MissingKeys(vec!["audit_paras"]))
        );
        assert_eq!(
            parse_response("[1, 2]"),
            Err(ParseFailure::MissingKeys(vec!["header", "audit_paras"]))
        );
    }

    #[test]
    fn uncoercible_value_is_a_mapping_failure() {
        let err = parse_response(r#"{"header": {"category": "Huge"}, "audit_paras": []}"#)
            .unwrap_err();
        assert!(matches!(err, ParseFailure::Mapping { key: "header", .. }));

        let err = parse_response(r#"{"header": null, "audit_paras": {"x": 1}}"#).unwrap_err();
        assert!(matches!(
            err,
            ParseFailure::Mapping {
                key: "audit_paras",
                ..
            }
        ));
    }

    #[test]
    fn parsing_errors_become_soft_diagnostic() {
        let r = parse_response(
            r#"{"header": null, "audit_paras": [], "parsing_errors": "para 3 missing heading", "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(r.error(), Some("para 3 missing heading"));
        assert!(!r.has_data());
    }
}
