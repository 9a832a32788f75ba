//! Benchmark harness: the sequential models → test cases → iterations loop.
//!
//! Every attempt sends the rendered prompt through an [`InferenceClient`],
//! runs the validation pipeline on the reply, and appends the resulting
//! [`AttemptRecord`] to the model's result log. Nothing runs concurrently;
//! an optional pause follows each iteration, each test case and each model.

use crate::config::{BenchConfig, DelayConfig, TestCase};
use crate::inference::InferenceClient;
use crate::record::AttemptRecord;
use crate::results::ResultLog;
use crate::validate::{Diagnostic, JsonSchemaValidator, SchemaValidator};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Trials per (model, test case)
    pub iterations: u32,
    /// Pauses between steps
    pub delays: DelayConfig,
    /// Directory receiving per-model result logs
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            delays: DelayConfig::default(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl From<&BenchConfig> for RunnerConfig {
    fn from(config: &BenchConfig) -> Self {
        Self {
            iterations: config.iterations,
            delays: config.delays,
            output_dir: PathBuf::from(&config.output_dir),
        }
    }
}

/// Sequential benchmark runner
pub struct BenchRunner<C, V = JsonSchemaValidator> {
    client: C,
    validator: V,
    config: RunnerConfig,
}

impl<C: InferenceClient> BenchRunner<C> {
    /// Runner validating with the `jsonschema` engine
    #[must_use]
    pub fn new(client: C, config: RunnerConfig) -> Self {
        Self::with_validator(client, JsonSchemaValidator, config)
    }
}

impl<C: InferenceClient, V: SchemaValidator> BenchRunner<C, V> {
    /// Runner with a custom schema engine
    #[must_use]
    pub const fn with_validator(client: C, validator: V, config: RunnerConfig) -> Self {
        Self {
            client,
            validator,
            config,
        }
    }

    /// Get runner configuration
    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run one invocation and score it.
    ///
    /// Transport failures and empty replies produce an all-false record with
    /// no duration.
    pub fn run_attempt(&self, model: &str, case: &TestCase, iteration: u32) -> AttemptRecord {
        let level = case.difficulty_level;

        let reply = match self.client.generate(model, &case.prompt()) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    model = %model,
                    difficulty_level = level,
                    iteration,
                    error = %e,
                    "Get completion error"
                );
                return AttemptRecord::failed(model, level, iteration);
            }
        };

        let outcome = case.validate(reply.response.as_deref(), &self.validator);
        // An empty reply counts as no measurement
        let duration = match outcome.diagnostic {
            Some(Diagnostic::EmptyResponse) => None,
            _ => reply.total_duration,
        };
        let record = AttemptRecord::new(model, level, iteration, duration, outcome.validation);

        tracing::info!(
            model = %model,
            difficulty_level = level,
            iteration,
            duration_ns = ?record.duration,
            has_valid_json_format = record.validation.has_valid_json_format,
            has_valid_schema = record.validation.has_valid_schema,
            has_valid_data = record.validation.has_valid_data,
            absolute_score = record.absolute_score,
            relative_score = record.relative_score,
            is_successful = record.is_successful,
            "Attempt scored"
        );

        record
    }

    /// Run every test case for one model, appending to its result log
    ///
    /// # Errors
    ///
    /// Returns an error if the result log cannot be created or written.
    pub fn run_model(
        &self,
        model: &str,
        cases: &[TestCase],
        timestamp: &str,
    ) -> Result<Vec<AttemptRecord>> {
        let mut log = ResultLog::create(&self.config.output_dir, model, timestamp)
            .with_context(|| format!("Failed to open result log for {model}"))?;
        tracing::info!(model = %model, log = %log.path().display(), "Benchmarking model");

        let mut records = Vec::new();
        for (case_index, case) in cases.iter().enumerate() {
            for iteration in 1..=self.config.iterations {
                let record = self.run_attempt(model, case, iteration);
                log.append(&record)
                    .with_context(|| format!("Failed to append to {}", log.path().display()))?;
                records.push(record);

                if iteration < self.config.iterations {
                    pause(self.config.delays.iteration());
                }
            }
            if case_index + 1 < cases.len() {
                pause(self.config.delays.difficulty_level());
            }
        }

        Ok(records)
    }

    /// Run the full benchmark
    ///
    /// # Errors
    ///
    /// Returns an error if a result log cannot be written.
    pub fn run(&self, models: &[String], cases: &[TestCase]) -> Result<Vec<AttemptRecord>> {
        let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        self.run_with_timestamp(models, cases, &timestamp)
    }

    /// Run the full benchmark, naming logs with `timestamp`
    ///
    /// # Errors
    ///
    /// Returns an error if a result log cannot be written.
    pub fn run_with_timestamp(
        &self,
        models: &[String],
        cases: &[TestCase],
        timestamp: &str,
    ) -> Result<Vec<AttemptRecord>> {
        tracing::info!(
            models = models.len(),
            test_cases = cases.len(),
            iterations = self.config.iterations,
            "Starting benchmark run"
        );

        let mut records = Vec::new();
        for (index, model) in models.iter().enumerate() {
            records.extend(self.run_model(model, cases, timestamp)?);
            if index + 1 < models.len() {
                pause(self.config.delays.model());
            }
        }

        tracing::info!(records = records.len(), "Benchmark run complete");
        Ok(records)
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}
