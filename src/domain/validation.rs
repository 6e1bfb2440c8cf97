//! Shape validation for structured documents returned by the generation service.
//!
//! The service is asked for JSON matching a response schema, but nothing
//! guarantees it complies. Every document type therefore implements
//! [`StructuredOutput`], which pairs the schema sent upstream with the
//! constraints checked locally after deserialization.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// A document shape the generation service can be asked to produce
pub trait StructuredOutput: DeserializeOwned + Serialize + Send + Sync + 'static {
    /// Name used in logs, errors and request routing
    const SHAPE: &'static str;

    /// JSON schema sent with the request (OpenAPI subset)
    fn response_schema() -> Value;

    /// Record every constraint violation
    fn validate(&self, violations: &mut Violations);

    /// Parse raw service text into this shape and validate it
    fn from_service_text(text: &str) -> Result<Self, ValidationError> {
        let document: Self = serde_json::from_str(text.trim())
            .map_err(|e| {
                ValidationError::single(Self::SHAPE, format!("not a valid {}: {}", Self::SHAPE, e))
            })?;

        let mut violations = Violations::default();
        document.validate(&mut violations);
        violations.into_result(Self::SHAPE)?;

        Ok(document)
    }
}

/// Service output could not be coerced into the expected shape
#[derive(Debug, Clone, Error)]
#[error("{shape} returned invalid data: {} validation error(s)", violations.len())]
pub struct ValidationError {
    pub shape: &'static str,
    pub violations: Vec<String>,
}

impl ValidationError {
    pub fn single(shape: &'static str, violation: impl Into<String>) -> Self {
        Self {
            shape,
            violations: vec![violation.into()],
        }
    }
}

/// Accumulates constraint violations for one document
#[derive(Debug, Default)]
pub struct Violations {
    errors: Vec<String>,
}

impl Violations {
    /// String length (in chars) must not exceed `max`
    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        let len = value.chars().count();
        if len > max {
            self.errors
                .push(format!("{}: length {} exceeds {}", field, len, max));
        }
    }

    /// Optional string, checked only when present
    pub fn max_len_opt(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(v) = value {
            self.max_len(field, v, max);
        }
    }

    /// List must not hold more than `max` items
    pub fn max_items<T>(&mut self, field: &str, items: &[T], max: usize) {
        if items.len() > max {
            self.errors
                .push(format!("{}: {} items exceeds {}", field, items.len(), max));
        }
    }

    /// List of strings: item count plus per-item length
    pub fn string_list(&mut self, field: &str, items: &[String], max_items: usize, max_len: usize) {
        self.max_items(field, items, max_items);
        for (i, item) in items.iter().enumerate() {
            self.max_len(&format!("{}[{}]", field, i), item, max_len);
        }
    }

    /// Numeric value must fall within `[min, max]`
    pub fn range<N>(&mut self, field: &str, value: N, min: N, max: N)
    where
        N: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            self.errors
                .push(format!("{}: {} outside {}..={}", field, value, min, max));
        }
    }

    /// Validate a nested document, prefixing its violations
    pub fn nested(&mut self, prefix: &str, check: impl FnOnce(&mut Violations)) {
        let mut inner = Violations::default();
        check(&mut inner);
        self.errors
            .extend(inner.errors.into_iter().map(|e| format!("{}.{}", prefix, e)));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn into_result(self, shape: &'static str) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                shape,
                violations: self.errors,
            })
        }
    }
}

// Response schema builders

pub(crate) fn string() -> Value {
    json!({ "type": "STRING" })
}

pub(crate) fn nullable_string() -> Value {
    json!({ "type": "STRING", "nullable": true })
}

pub(crate) fn integer() -> Value {
    json!({ "type": "INTEGER" })
}

pub(crate) fn number() -> Value {
    json!({ "type": "NUMBER" })
}

pub(crate) fn date() -> Value {
    json!({ "type": "STRING", "format": "date" })
}

pub(crate) fn array(items: Value) -> Value {
    json!({ "type": "ARRAY", "items": items })
}

pub(crate) fn string_array() -> Value {
    array(string())
}

/// Object schema; every listed property is required unless named in `optional`
pub(crate) fn object(properties: &[(&str, Value)], optional: &[&str]) -> Value {
    let mut props = Map::new();
    let mut required = Vec::new();

    for (name, schema) in properties {
        props.insert((*name).to_string(), schema.clone());
        if !optional.contains(name) {
            required.push(Value::String((*name).to_string()));
        }
    }

    json!({
        "type": "OBJECT",
        "properties": props,
        "required": required,
        "propertyOrdering": properties.iter().map(|(n, _)| *n).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violations_collect_all() {
        let mut v = Violations::default();
        v.max_len("name", "abcdef", 3);
        v.max_items("tags", &[1, 2, 3], 2);
        v.range("week", 0, 1, 52);
        v.max_len("ok", "abc", 3);

        assert_eq!(v.len(), 3);
        let err = v.into_result("Test").unwrap_err();
        assert_eq!(err.to_string(), "Test returned invalid data: 3 validation error(s)");
    }

    #[test]
    fn test_max_len_counts_chars() {
        let mut v = Violations::default();
        v.max_len("emoji", "ééé", 3);
        assert!(v.is_empty());
    }

    #[test]
    fn test_nested_prefix() {
        let mut v = Violations::default();
        v.nested("personas[0]", |inner| inner.max_len("name", "too long", 2));

        let err = v.into_result("Audience").unwrap_err();
        assert!(err.violations[0].starts_with("personas[0].name"));
    }

    #[test]
    fn test_object_schema_required() {
        let schema = object(&[("a", string()), ("b", nullable_string())], &["b"]);
        assert_eq!(schema["required"], json!(["a"]));
        assert_eq!(schema["properties"]["b"]["nullable"], json!(true));
    }
}
