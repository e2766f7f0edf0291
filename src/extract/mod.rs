//! Company/title extraction from job emails.
//!
//! Extraction is a capability: a [`DetailExtractor`] either returns
//! [`JobDetails`] or an [`ExtractionError`]. The pipeline calls the configured
//! extractor exactly once per accepted message and, on any error, degrades to
//! [`FallbackExtractor`], which never fails.

pub mod chat;

use std::sync::LazyLock;

use miette::Diagnostic;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

pub use chat::{ChatExtractor, ExtractionConfig};

/// Company used when the real company cannot be determined.
pub const UNKNOWN_COMPANY: &str = "Unknown";

/// First `{` through the next `}`. Not nesting-aware; may span lines.
static RE_JSON_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*?\}").unwrap());

/// Errors from the extraction service. None of these are fatal to a run.
#[derive(Debug, Error, Diagnostic)]
pub enum ExtractionError {
    #[error("extraction request failed: {message}")]
    #[diagnostic(
        code(jobmail::extract::request_failed),
        help("Check the [extraction] base_url and api_key, and that the service is reachable.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse extraction response: {message}")]
    #[diagnostic(
        code(jobmail::extract::parse_error),
        help("The model returned an unexpected response format.")
    )]
    ParseError { message: String },

    #[error("extraction response has an empty \"{field}\"")]
    #[diagnostic(
        code(jobmail::extract::missing_field),
        help("The model could not find this field in the email; the fallback is used.")
    )]
    MissingField { field: &'static str },
}

/// Structured fields pulled out of a job email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDetails {
    pub company: String,
    pub title: String,
}

impl JobDetails {
    /// Deterministic fallback: unknown company, subject as title.
    pub fn fallback(subject: &str) -> Self {
        Self {
            company: UNKNOWN_COMPANY.to_string(),
            title: subject.to_string(),
        }
    }
}

/// Something that can turn an email into [`JobDetails`].
pub trait DetailExtractor {
    fn extract(&self, subject: &str, body: &str) -> Result<JobDetails, ExtractionError>;
}

/// Always returns [`JobDetails::fallback`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackExtractor;

impl DetailExtractor for FallbackExtractor {
    fn extract(&self, subject: &str, _body: &str) -> Result<JobDetails, ExtractionError> {
        Ok(JobDetails::fallback(subject))
    }
}

/// Result of one extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub details: JobDetails,
    /// Whether the fallback replaced a failed extraction.
    pub degraded: bool,
}

/// Call `extractor` once; on error use the fallback.
pub fn extract_or_fallback(extractor: &dyn DetailExtractor, subject: &str, body: &str) -> Extraction {
    match extractor.extract(subject, body) {
        Ok(details) => Extraction {
            details,
            degraded: false,
        },
        Err(e) => {
            tracing::warn!(subject, "extraction failed, using fallback: {e}");
            Extraction {
                details: JobDetails::fallback(subject),
                degraded: true,
            }
        }
    }
}

#[derive(Deserialize)]
struct RawDetails {
    #[serde(default)]
    company: String,
    #[serde(default)]
    title: String,
}

/// Locate the first `{...}` span in a model response.
pub fn locate_json_span(text: &str) -> Option<&str> {
    RE_JSON_SPAN.find(text).map(|m| m.as_str())
}

/// Parse `{company, title}` out of free-form model output.
///
/// Both fields must be present and non-blank after trimming.
pub fn parse_details(response: &str) -> Result<JobDetails, ExtractionError> {
    let span = locate_json_span(response).ok_or_else(|| ExtractionError::ParseError {
        message: "no JSON object found in response".into(),
    })?;

    let raw: RawDetails = serde_json::from_str(span).map_err(|e| ExtractionError::ParseError {
        message: format!("JSON parse error: {e}"),
    })?;

    let company = raw.company.trim();
    if company.is_empty() {
        return Err(ExtractionError::MissingField { field: "company" });
    }
    let title = raw.title.trim();
    if title.is_empty() {
        return Err(ExtractionError::MissingField { field: "title" });
    }

    Ok(JobDetails {
        company: company.to_string(),
        title: title.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Failing {
        calls: Cell<usize>,
    }

    impl DetailExtractor for Failing {
        fn extract(&self, _subject: &str, _body: &str) -> Result<JobDetails, ExtractionError> {
            self.calls.set(self.calls.get() + 1);
            Err(ExtractionError::RequestFailed {
                message: "503 Service Unavailable".into(),
            })
        }
    }

    #[test]
    fn parse_plain_json() {
        let details = parse_details(r#"{"company": "Acme", "title": "Backend Engineer"}"#).unwrap();
        assert_eq!(details.company, "Acme");
        assert_eq!(details.title, "Backend Engineer");
    }

    #[test]
    fn parse_json_wrapped_in_prose_and_fences() {
        let response = "Sure! Here you go:\n```json\n{\n  \"company\": \"Globex\",\n  \"title\": \"SRE\"\n}\n```";
        let details = parse_details(response).unwrap();
        assert_eq!(details.company, "Globex");
        assert_eq!(details.title, "SRE");
    }

    #[test]
    fn parse_takes_first_span_only() {
        let response = r#"{"company": "First", "title": "A"} and {"company": "Second", "title": "B"}"#;
        assert_eq!(parse_details(response).unwrap().company, "First");
    }

    #[test]
    fn parse_without_braces_fails() {
        let err = parse_details("I could not determine the company.").unwrap_err();
        assert!(matches!(err, ExtractionError::ParseError { .. }));
    }

    #[test]
    fn parse_nested_object_is_not_supported() {
        // The span stops at the first closing brace, leaving invalid JSON.
        let err = parse_details(r#"{"company": {"name": "Acme"}, "title": "X"}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::ParseError { .. }));
    }

    #[test]
    fn parse_empty_field_fails() {
        let err = parse_details(r#"{"company": "  ", "title": "Engineer"}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingField { field: "company" }));

        let err = parse_details(r#"{"company": "Acme"}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingField { field: "title" }));
    }

    #[test]
    fn fallback_uses_subject_as_title() {
        let details = FallbackExtractor
            .extract("Thank you for applying", "body")
            .unwrap();
        assert_eq!(details, JobDetails::fallback("Thank you for applying"));
        assert_eq!(details.company, UNKNOWN_COMPANY);
    }

    #[test]
    fn failure_degrades_to_fallback_after_one_call() {
        let failing = Failing { calls: Cell::new(0) };
        let outcome = extract_or_fallback(&failing, "Application received", "");
        assert!(outcome.degraded);
        assert_eq!(outcome.details.company, "Unknown");
        assert_eq!(outcome.details.title, "Application received");
        assert_eq!(failing.calls.get(), 1);
    }

    #[test]
    fn success_is_not_degraded() {
        let outcome = extract_or_fallback(&FallbackExtractor, "Hi", "");
        assert!(!outcome.degraded);
    }
}
