//! Tolerant parsing of the model's JSON reply
//!
//! Stage 1 parses the whole reply as JSON. Stage 2 recovers the first
//! brace-delimited span (greedy, first `{` to last `}`) from replies wrapped
//! in prose or markdown fences and parses that instead.

use crate::error::LlmError;
use crate::llm::schema::ExperienceRecord;
use regex::Regex;
use std::sync::OnceLock;

fn brace_span() -> &'static Regex {
    static BRACE_SPAN: OnceLock<Regex> = OnceLock::new();
    BRACE_SPAN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid brace span regex"))
}

/// The first `{ ... }` span of `text`, if any.
pub fn first_brace_span(text: &str) -> Option<&str> {
    brace_span().find(text).map(|m| m.as_str())
}

pub fn parse_experience(response: &str) -> Result<ExperienceRecord, LlmError> {
    let direct_error = match serde_json::from_str::<ExperienceRecord>(response.trim()) {
        Ok(record) => return record.validate().map_err(LlmError::MalformedResponse),
        Err(e) => e,
    };

    let span = first_brace_span(response).ok_or_else(|| {
        LlmError::MalformedResponse(format!("no JSON object in reply ({})", direct_error))
    })?;

    serde_json::from_str::<ExperienceRecord>(span)
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))?
        .validate()
        .map_err(LlmError::MalformedResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BARE: &str = r#"{
  "total_experience_years": 6.5,
  "experience_by_domain": {"IT": 3, "Finance": 2.5},
  "roles": [
    {"title": "Software Engineer", "company": "XYZ Corp", "start": "Jan 2020", "end": "June 2023", "domain": "IT"}
  ]
}"#;

    #[test]
    fn test_bare_json() {
        let record = parse_experience(BARE).unwrap();
        assert_eq!(record.total_experience_years, 6.5);
        assert_eq!(record.experience_by_domain["IT"], 3.0);
        assert_eq!(record.roles.len(), 1);
        assert_eq!(record.roles[0].company.as_deref(), Some("XYZ Corp"));
    }

    #[test]
    fn test_fenced_reply_recovers_same_record() {
        let wrapped = format!("Sure! ```json\n{}\n```", BARE);
        assert_eq!(parse_experience(&wrapped).unwrap(), parse_experience(BARE).unwrap());
    }

    #[test]
    fn test_prose_around_json() {
        let wrapped = format!("Here is the extracted data:\n\n{}\n\nLet me know if you need more.", BARE);
        assert_eq!(parse_experience(&wrapped).unwrap(), parse_experience(BARE).unwrap());
    }

    #[test]
    fn test_empty_roles_convention() {
        let record = parse_experience(r#"{"total_experience_years": 0, "experience_by_domain": {}, "roles": []}"#).unwrap();
        assert!(record.roles.is_empty());
        assert_eq!(record.total_experience_years, 0.0);
    }

    #[test]
    fn test_no_json_is_malformed() {
        let err = parse_experience("I could not find any work history.").unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse(_)));
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let err = parse_experience(r#"{"years": "many"}"#).unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse(_)));
    }

    #[test]
    fn test_first_brace_span() {
        assert_eq!(first_brace_span("a {b} c {d} e"), Some("{b} c {d}"));
        assert_eq!(first_brace_span("nothing here"), None);
    }
}
