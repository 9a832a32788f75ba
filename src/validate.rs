//! Three-stage response validation and scoring.
//!
//! 1. **Syntax**: the trimmed response parses as JSON.
//! 2. **Schema**: the parsed value conforms to the test case's JSON Schema.
//! 3. **Data**: the parsed value equals the expected value.
//!
//! Each stage runs only when the previous one passed. Failures are logged
//! and degrade the score; they are never returned as errors.
//!
//! ## Scoring
//!
//! | Flag | Points |
//! |------|--------|
//! | `hasValidJsonFormat` | 10 |
//! | `hasValidSchema` | 30 |
//! | `hasValidData` | 60 |
//!
//! Points are summed per flag. The relative score scales the absolute score
//! by the test case's difficulty level.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// Points awarded for a syntactically valid JSON response
pub const JSON_FORMAT_POINTS: u32 = 10;
/// Points awarded for schema conformance
pub const SCHEMA_POINTS: u32 = 30;
/// Points awarded for an exact data match
pub const DATA_POINTS: u32 = 60;

/// Outcome flags of the three validation stages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub has_valid_json_format: bool,
    pub has_valid_schema: bool,
    pub has_valid_data: bool,
}

impl Validation {
    /// All stages failed
    #[must_use]
    pub const fn failed() -> Self {
        Self {
            has_valid_json_format: false,
            has_valid_schema: false,
            has_valid_data: false,
        }
    }

    /// Additive score in `0..=100`
    #[must_use]
    pub const fn absolute_score(&self) -> u32 {
        let mut score = 0;
        if self.has_valid_json_format {
            score += JSON_FORMAT_POINTS;
        }
        if self.has_valid_schema {
            score += SCHEMA_POINTS;
        }
        if self.has_valid_data {
            score += DATA_POINTS;
        }
        score
    }

    /// Absolute score weighted by difficulty level.
    ///
    /// Widened to `u64` so any `u32` level fits.
    #[must_use]
    pub fn relative_score(&self, difficulty_level: u32) -> u64 {
        u64::from(self.absolute_score()) * u64::from(difficulty_level)
    }

    /// Whether every stage passed
    #[must_use]
    pub const fn is_successful(&self) -> bool {
        self.has_valid_json_format && self.has_valid_schema && self.has_valid_data
    }

    /// Whether later stages only pass when earlier stages passed
    #[must_use]
    pub const fn is_monotonic(&self) -> bool {
        (!self.has_valid_schema || self.has_valid_json_format)
            && (!self.has_valid_data || self.has_valid_schema)
    }
}

/// One violated schema constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// JSON pointer to the offending instance location
    pub instance_path: String,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// A JSON Schema engine
pub trait SchemaValidator {
    /// Check `instance` against `schema`.
    ///
    /// # Errors
    ///
    /// Returns every violated constraint. A schema that cannot be compiled
    /// is reported as a single violation at the root.
    fn validate(&self, schema: &Value, instance: &Value) -> Result<(), Vec<SchemaViolation>>;
}

/// [`SchemaValidator`] backed by the `jsonschema` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaValidator;

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, schema: &Value, instance: &Value) -> Result<(), Vec<SchemaViolation>> {
        let compiled = jsonschema::validator_for(schema).map_err(|e| {
            vec![SchemaViolation {
                instance_path: String::new(),
                message: format!("Invalid schema: {e}"),
            }]
        })?;

        let violations: Vec<SchemaViolation> = compiled
            .iter_errors(instance)
            .map(|e| SchemaViolation {
                instance_path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// Why a response stopped short of full marks
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// No response text, or whitespace only
    EmptyResponse,
    /// Stage 1 failed
    InvalidJson(String),
    /// Stage 2 failed
    SchemaViolations(Vec<SchemaViolation>),
    /// Stage 3 failed
    DataMismatch,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyResponse => write!(f, "empty response"),
            Self::InvalidJson(msg) => write!(f, "invalid JSON: {msg}"),
            Self::SchemaViolations(violations) => {
                write!(f, "schema violations: ")?;
                for (i, violation) in violations.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{violation}")?;
                }
                Ok(())
            }
            Self::DataMismatch => write!(f, "data does not match expected result"),
        }
    }
}

/// Result of running the pipeline over one response
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    /// Stage flags
    pub validation: Validation,
    /// Parsed response, when stage 1 passed
    pub parsed: Option<Value>,
    /// Failure detail, `None` when every stage passed
    pub diagnostic: Option<Diagnostic>,
}

/// Run the three-stage pipeline over a model response.
///
/// `response` is `None` when the model produced no text at all.
pub fn validate_response<V>(
    response: Option<&str>,
    schema: &Value,
    expected: &Value,
    validator: &V,
) -> ValidationOutcome
where
    V: SchemaValidator + ?Sized,
{
    let mut validation = Validation::failed();

    let text = match response.map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => {
            tracing::warn!("Empty response");
            return ValidationOutcome {
                validation,
                parsed: None,
                diagnostic: Some(Diagnostic::EmptyResponse),
            };
        }
    };

    let parsed: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "JSON parse error");
            return ValidationOutcome {
                validation,
                parsed: None,
                diagnostic: Some(Diagnostic::InvalidJson(e.to_string())),
            };
        }
    };
    validation.has_valid_json_format = true;

    if let Err(violations) = validator.validate(schema, &parsed) {
        tracing::warn!(
            violations = violations.len(),
            first = %violations.first().map(ToString::to_string).unwrap_or_default(),
            "Schema validation error"
        );
        return ValidationOutcome {
            validation,
            parsed: Some(parsed),
            diagnostic: Some(Diagnostic::SchemaViolations(violations)),
        };
    }
    validation.has_valid_schema = true;

    if !values_match(&parsed, expected) {
        tracing::warn!("Data validation error");
        return ValidationOutcome {
            validation,
            parsed: Some(parsed),
            diagnostic: Some(Diagnostic::DataMismatch),
        };
    }
    validation.has_valid_data = true;

    ValidationOutcome {
        validation,
        parsed: Some(parsed),
        diagnostic: None,
    }
}

/// Deep structural equality.
///
/// Array order matters, object key order does not, and numbers compare by
/// value so `28` equals `28.0`.
#[must_use]
pub fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_match(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_match(x, y)))
        }
        _ => actual == expected,
    }
}

#[allow(clippy::float_cmp)]
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    a.as_f64() == b.as_f64()
}
