//! # Structured Output
//!
//! Turns raw generation text into a typed stage output.
//!
//! Models wrap JSON in ```json fences or surround it with prose, so the
//! object is extracted first, then checked against the schema's required
//! keys, then deserialized, then passed through the output's own
//! [`StageOutput::validate`] hook. Any failure is a
//! [`StageError::SchemaViolation`].

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StageError;

/// A type a stage can produce
pub trait StageOutput: DeserializeOwned + Serialize + JsonSchema + Send + Sync + 'static {
    /// Semantic checks the JSON schema cannot express
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// JSON schema for `T`, as sent to the generation backend
pub fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

/// Parse generation text into `T`
pub fn parse_output<T: StageOutput>(stage: &str, text: &str) -> Result<T, StageError> {
    let json = extract_json(text)
        .ok_or_else(|| StageError::schema_violation(stage, "no JSON object found in output"))?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| StageError::schema_violation(stage, format!("invalid JSON: {}", e)))?;

    check_required(&schema_of::<T>(), &value).map_err(|r| StageError::schema_violation(stage, r))?;

    let output: T = serde_json::from_value(value)
        .map_err(|e| StageError::schema_violation(stage, e.to_string()))?;

    output
        .validate()
        .map_err(|r| StageError::schema_violation(stage, r))?;

    Ok(output)
}

/// Every key in the schema's top-level `required` list must be present and
/// non-null.
fn check_required(schema: &Value, value: &Value) -> Result<(), String> {
    let object = value
        .as_object()
        .ok_or_else(|| "output is not a JSON object".to_string())?;

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();

    let missing: Vec<&str> = required
        .into_iter()
        .filter(|key| object.get(*key).map_or(true, Value::is_null))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("missing required field(s): {}", missing.join(", ")))
    }
}

/// Locate the JSON object inside generation text.
///
/// Order: the whole text, a ```json fenced block, any fenced block, then the
/// first balanced `{...}` span.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && serde_json::from_str::<Value>(trimmed).is_ok() {
        return Some(trimmed);
    }

    for opener in ["```json", "```JSON", "```"] {
        if let Some(start) = trimmed.find(opener) {
            let body_start = start + opener.len();
            if let Some(len) = trimmed[body_start..].find("```") {
                let body = trimmed[body_start..body_start + len].trim();
                if body.starts_with('{') {
                    return Some(body);
                }
            }
        }
    }

    trimmed
        .char_indices()
        .filter(|(_, c)| *c == '{')
        .find_map(|(start, _)| balanced_object(&trimmed[start..]))
}

/// The balanced `{...}` prefix of `text`, if it parses as JSON
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let candidate = &text[..=i];
                    return serde_json::from_str::<Value>(candidate)
                        .ok()
                        .map(|_| candidate);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
    struct Scored {
        name: String,
        score: u32,
        #[serde(default)]
        note: Option<String>,
    }

    impl StageOutput for Scored {
        fn validate(&self) -> Result<(), String> {
            if self.name.trim().is_empty() {
                return Err("name is blank".to_string());
            }
            Ok(())
        }
    }

    #[test]
    fn test_extract_plain_object() {
        assert_eq!(extract_json(r#"  {"a": 1}  "#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_extract_fenced_block() {
        let text = "Here you go:\n```json\n{\"a\": {\"b\": 2}}\n```\nDone.";
        assert_eq!(extract_json(text), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn test_extract_object_from_prose() {
        let text = r#"Sure! The result is {"text": "a } inside", "n": 1} and that's it."#;
        assert_eq!(extract_json(text), Some(r#"{"text": "a } inside", "n": 1}"#));
    }

    #[test]
    fn test_extract_skips_non_json_braces() {
        let text = r#"Use {placeholder} then {"ok": true}"#;
        assert_eq!(extract_json(text), Some(r#"{"ok": true}"#));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_parse_output_success() {
        let scored: Scored = parse_output("s", "```json\n{\"name\": \"x\", \"score\": 3}\n```").unwrap();
        assert_eq!(scored.score, 3);
        assert_eq!(scored.note, None);
    }

    #[test]
    fn test_missing_required_field_is_schema_violation() {
        let err = parse_output::<Scored>("engineer_2", r#"{"name": "x"}"#).unwrap_err();
        match err {
            StageError::SchemaViolation { stage, reason } => {
                assert_eq!(stage, "engineer_2");
                assert!(reason.contains("score"), "reason: {}", reason);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_null_required_field_is_schema_violation() {
        let err = parse_output::<Scored>("s", r#"{"name": null, "score": 1}"#).unwrap_err();
        assert!(matches!(err, StageError::SchemaViolation { .. }));
    }

    #[test]
    fn test_validate_hook_runs() {
        let err = parse_output::<Scored>("s", r#"{"name": "  ", "score": 1}"#).unwrap_err();
        assert_eq!(err, StageError::schema_violation("s", "name is blank"));
    }

    #[test]
    fn test_wrong_type_is_schema_violation() {
        let err = parse_output::<Scored>("s", r#"{"name": "x", "score": "high"}"#).unwrap_err();
        assert!(matches!(err, StageError::SchemaViolation { .. }));
    }
}
