//! Typed model of one extracted Draft Audit Report.
//!
//! Every field is optional: the generative model routinely returns partial
//! data, and a half-filled report is still worth showing to a reviewer.
//! Deserialisation is lenient (see [`lenient`]) so that `"1,23,456"` and
//! `123456` both land in the same `f64`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One lakh, the sub-unit finding amounts are normalised to.
pub const LAKH: f64 = 100_000.0;

/// Convert an amount in rupees into lakhs.
pub fn rupees_to_lakhs(rupees: f64) -> f64 {
    rupees / LAKH
}

/// Taxpayer size category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Large,
    Medium,
    Small,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Large, Category::Medium, Category::Small];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Large => "Large",
            Self::Medium => "Medium",
            Self::Small => "Small",
        }
    }

    /// Case-insensitive parse, surrounding whitespace ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Category::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown category '{s}'")))
    }
}

/// Document-level summary fields of an audit report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportHeader {
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub audit_group_number: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub gstin: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub trade_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_category")]
    pub category: Option<Category>,
    /// Overall amount detected, in rupees.
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub total_amount_detected_overall_rs: Option<f64>,
    /// Overall amount recovered, in rupees.
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub total_amount_recovered_overall_rs: Option<f64>,
}

/// One itemised audit paragraph. Amounts are in lakhs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditFinding {
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub audit_para_number: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub audit_para_heading: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub revenue_involved_lakhs_rs: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub revenue_recovered_lakhs_rs: Option<f64>,
}

/// Outcome of one extraction run.
///
/// A non-empty `error_message` does not imply the other fields are empty:
/// soft diagnostics ("para 3 missing heading") travel alongside usable data.
/// Callers must not treat populated fields as complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub header: Option<ReportHeader>,
    #[serde(default)]
    pub audit_paras: Vec<AuditFinding>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ExtractionResult {
    /// A result carrying only an error.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            header: None,
            audit_paras: Vec::new(),
            error_message: Some(message.into()),
        }
    }

    /// The error string, if set and non-blank.
    pub fn error(&self) -> Option<&str> {
        self.error_message
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Whether any structured data came back at all.
    pub fn has_data(&self) -> bool {
        self.header.is_some() || !self.audit_paras.is_empty()
    }
}

/// Serde helpers that coerce loosely-typed model output.
///
/// Missing or null values become `None`. Values of the wrong shape are
/// reported as deserialisation errors so the caller can retry.
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::Category;

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::String(s) => {
                let s = s.trim();
                Ok((!s.is_empty()).then(|| s.to_string()))
            }
            Value::Number(n) => Ok(Some(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "expected text, got {other}"
            ))),
        }
    }

    pub fn opt_amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("amount out of range: {n}"))),
            Value::String(s) => parse_amount(&s).map_err(serde::de::Error::custom),
            other => Err(serde::de::Error::custom(format!(
                "expected amount, got {other}"
            ))),
        }
    }

    pub fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    return u32::try_from(v)
                        .map(Some)
                        .map_err(|_| serde::de::Error::custom(format!("integer too large: {v}")));
                }
                match n.as_f64() {
                    Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => {
                        Ok(Some(f as u32))
                    }
                    _ => Err(serde::de::Error::custom(format!(
                        "expected a whole number, got {n}"
                    ))),
                }
            }
            Value::String(s) => parse_int(&s).map_err(serde::de::Error::custom),
            other => Err(serde::de::Error::custom(format!(
                "expected integer, got {other}"
            ))),
        }
    }

    pub fn opt_category<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Category>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => Category::parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown category '{s}'"))),
            other => Err(serde::de::Error::custom(format!(
                "expected category, got {other}"
            ))),
        }
    }

    /// Parse an amount written the way reports write them: `"Rs. 1,23,456.50"`.
    pub fn parse_amount(s: &str) -> Result<Option<f64>, String> {
        let cleaned: String = s
            .trim()
            .trim_start_matches("Rs.")
            .trim_start_matches("Rs")
            .trim_start_matches('₹')
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();
        if cleaned.is_empty() {
            return Ok(None);
        }
        cleaned
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("not a number: '{}'", s.trim()))
    }

    /// Parse a whole number, tolerating a trailing `.0`.
    pub fn parse_int(s: &str) -> Result<Option<u32>, String> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        if let Ok(v) = s.parse::<u32>() {
            return Ok(Some(v));
        }
        match s.parse::<f64>() {
            Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => Ok(Some(f as u32)),
            _ => Err(format!("not a whole number: '{s}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(Category::parse("large"), Some(Category::Large));
        assert_eq!(Category::parse("  MEDIUM "), Some(Category::Medium));
        assert_eq!(Category::parse("Small"), Some(Category::Small));
        assert_eq!(Category::parse("Huge"), None);
    }

    #[test]
    fn header_coerces_loose_values() {
        let json = r#"{
            "audit_group_number": "7",
            "gstin": " 29ABCDE1234F1Z5 ",
            "trade_name": "Acme Corp",
            "category": "medium",
            "total_amount_detected_overall_rs": "1,23,456.50",
            "total_amount_recovered_overall_rs": 5000,
            "unexpected": true
        }"#;
        let header: ReportHeader = serde_json::from_str(json).unwrap();
        assert_eq!(header.audit_group_number, Some(7));
        assert_eq!(header.gstin.as_deref(), Some("29ABCDE1234F1Z5"));
        assert_eq!(header.category, Some(Category::Medium));
        assert_eq!(header.total_amount_detected_overall_rs, Some(123456.5));
        assert_eq!(header.total_amount_recovered_overall_rs, Some(5000.0));
    }

    #[test]
    fn missing_and_null_fields_become_none() {
        let header: ReportHeader =
            serde_json::from_str(r#"{"trade_name": null, "gstin": ""}"#).unwrap();
        assert_eq!(header, ReportHeader::default());
    }

    #[test]
    fn finding_accepts_float_para_number() {
        let finding: AuditFinding =
            serde_json::from_str(r#"{"audit_para_number": 3.0, "audit_para_heading": "ITC"}"#)
                .unwrap();
        assert_eq!(finding.audit_para_number, Some(3));
    }

    #[test]
    fn unknown_category_is_an_error() {
        let err = serde_json::from_str::<ReportHeader>(r#"{"category": "Huge"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown category"));
    }

    #[test]
    fn text_amount_is_an_error() {
        let res = serde_json::from_str::<AuditFinding>(
            r#"{"revenue_involved_lakhs_rs": "about two lakh"}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn rupee_prefixes_are_stripped() {
        assert_eq!(lenient::parse_amount("Rs. 2,00,000").unwrap(), Some(200000.0));
        assert_eq!(lenient::parse_amount("₹ 15").unwrap(), Some(15.0));
        assert_eq!(lenient::parse_amount("   ").unwrap(), None);
    }

    #[test]
    fn failure_result_reports_error() {
        let res = ExtractionResult::failure("boom");
        assert_eq!(res.error(), Some("boom"));
        assert!(!res.has_data());
    }

    #[test]
    fn lakh_conversion() {
        assert_eq!(rupees_to_lakhs(250_000.0), 2.5);
    }
}
