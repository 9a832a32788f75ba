//! Configuration module for benchmark settings and test cases.
//!
//! Handles YAML loading for the benchmark run configuration and for the
//! structured-extraction test cases, and renders the extraction prompt.

use crate::export::CsvOptions;
use crate::validate::{validate_response, SchemaValidator, ValidationOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(#[from] glob::PatternError),

    #[error("No test cases match {0}")]
    NoTestCases(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Pauses between harness steps, milliseconds
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelayConfig {
    /// After every iteration
    #[serde(default)]
    pub iteration_ms: u64,
    /// After every difficulty level
    #[serde(default)]
    pub difficulty_level_ms: u64,
    /// After every model
    #[serde(default)]
    pub model_ms: u64,
}

impl DelayConfig {
    #[must_use]
    pub const fn iteration(&self) -> Duration {
        Duration::from_millis(self.iteration_ms)
    }

    #[must_use]
    pub const fn difficulty_level(&self) -> Duration {
        Duration::from_millis(self.difficulty_level_ms)
    }

    #[must_use]
    pub const fn model(&self) -> Duration {
        Duration::from_millis(self.model_ms)
    }
}

/// Benchmark run configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchConfig {
    /// Inference endpoint base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model identifiers, `<family>:<size>`
    #[serde(default)]
    pub models: Vec<String>,
    /// Trials per (model, test case)
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Context window passed to the endpoint
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    /// Glob selecting test-case files
    #[serde(default = "default_tasks")]
    pub tasks: String,
    /// Directory for result logs, corpus and report views
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Per-request timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub delays: DelayConfig,
    /// Report view export format
    #[serde(default = "default_export")]
    pub export: CsvOptions,
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}
const fn default_iterations() -> u32 {
    10
}
const fn default_num_ctx() -> u32 {
    8192
}
fn default_tasks() -> String {
    "tasks/*.yaml".to_string()
}
fn default_output_dir() -> String {
    ".".to_string()
}
const fn default_export() -> CsvOptions {
    CsvOptions::tsv()
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            models: Vec::new(),
            iterations: default_iterations(),
            num_ctx: default_num_ctx(),
            tasks: default_tasks(),
            output_dir: default_output_dir(),
            timeout_ms: None,
            delays: DelayConfig::default(),
            export: default_export(),
        }
    }
}

impl BenchConfig {
    /// Load configuration from YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load configuration from YAML string
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Check the settings a run depends on
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when there is nothing to run.
    pub fn validate_for_run(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Invalid("no models configured".to_string()));
        }
        if self.iterations == 0 {
            return Err(ConfigError::Invalid("iterations must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Request timeout, if one is set
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

const REQUIREMENTS: &str = "\
You are tasked with converting human-readable descriptions into structured JSON outputs.
- The data generated should adhere to the predefined schema and follow proper JSON formatting.
- The result should be a valid JSON object that strictly conforms to the schema structure, including correct data types, field names, and values.
- The JSON output should include all required fields specified in the schema.
- If a field is specified as required in the schema but the data for it is not provided in the description, the field should not be omitted from the JSON output and should be set to a value that indicates its absence (e.g., null, an empty string, or an empty array) but with the correct data type.
- Optional fields should be omitted where not applicable.
- If a field is specified as optional in the schema and data for it is not provided in the description, the field should be omitted from the JSON output.
- Optional fields set as empty objects or empty arrays but with required fields inside according to the schema are not allowed.
- The JSON should not include any additional fields that are not specified in the schema.
- The output should only be the JSON object.
- The output should be a valid JSON string and should not include any extra or undefined fields, comments, or any text outside of the JSON object.";

/// One structured-extraction test case
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCase {
    /// Test case identifier
    pub id: String,
    /// Difficulty level, 1 is easiest
    pub difficulty_level: u32,
    /// Human-readable source text
    pub description: String,
    /// JSON Schema the answer must satisfy
    pub schema: Value,
    /// Example of a conforming answer, shown to the model
    pub example: Value,
    /// The one correct answer
    pub expected_result: Value,
}

impl TestCase {
    /// Load a test case from YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the
    /// difficulty level is zero.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load a test case from YAML string
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed or the difficulty level is zero.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let case: Self = serde_yaml::from_str(yaml)?;
        if case.difficulty_level == 0 {
            return Err(ConfigError::Invalid(format!(
                "test case {} has difficulty level 0",
                case.id
            )));
        }
        Ok(case)
    }

    /// Render the extraction prompt sent to the model
    #[must_use]
    pub fn prompt(&self) -> String {
        format!(
            "**Requirements**:\n{REQUIREMENTS}\n\
             **Schema**:\n```json\n{}\n```\n\
             **Example JSON Output**:\n```json\n{}\n```\n\
             **Human-Readable Description**:\n{}",
            self.schema,
            self.example,
            Value::String(self.description.clone()),
        )
    }

    /// Validate a model response against this case
    pub fn validate<V>(&self, response: Option<&str>, validator: &V) -> ValidationOutcome
    where
        V: SchemaValidator + ?Sized,
    {
        validate_response(response, &self.schema, &self.expected_result, validator)
    }
}

/// Test case loader for loading multiple cases from glob patterns
pub struct TestCaseLoader {
    cases: Vec<TestCase>,
}

impl TestCaseLoader {
    /// Create a new empty loader
    #[must_use]
    pub const fn new() -> Self {
        Self { cases: Vec::new() }
    }

    /// Load test cases from a glob pattern (e.g., "tasks/*.yaml"),
    /// ordered by difficulty level then id
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid, matches nothing, or a
    /// file cannot be loaded.
    pub fn load_glob(pattern: &str) -> Result<Self, ConfigError> {
        let mut loader = Self::new();

        for entry in glob::glob(pattern)? {
            let path = entry.map_err(|e| ConfigError::IoError(e.into_error()))?;
            tracing::debug!(path = %path.display(), "Loading test case");
            loader.cases.push(TestCase::load(&path)?);
        }

        if loader.cases.is_empty() {
            return Err(ConfigError::NoTestCases(pattern.to_string()));
        }

        loader
            .cases
            .sort_by(|a, b| (a.difficulty_level, &a.id).cmp(&(b.difficulty_level, &b.id)));
        Ok(loader)
    }

    /// Load a single test case from a file path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let case = TestCase::load(path)?;
        Ok(Self { cases: vec![case] })
    }

    /// Get all loaded test cases
    #[must_use]
    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Get the number of loaded test cases
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Check if no test cases are loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Iterate over loaded test cases
    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.iter()
    }
}

impl Default for TestCaseLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoIterator for TestCaseLoader {
    type Item = TestCase;
    type IntoIter = std::vec::IntoIter<TestCase>;

    fn into_iter(self) -> Self::IntoIter {
        self.cases.into_iter()
    }
}
