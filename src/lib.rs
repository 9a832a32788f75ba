//! # Structured Eval
//!
//! Benchmark harness for structured JSON extraction with instruction-following
//! language models.
//!
//! Each model is asked to turn a human-readable description into JSON that
//! satisfies a schema. Responses are checked in three gated stages (JSON
//! syntax, schema conformance, exact value match) and scored 10/30/60,
//! weighted by the test case's difficulty level.
//!
//! ## Architecture
//!
//! ```text
//! Test cases (tasks/*.yaml)
//!        ↓
//! Inference endpoint (Ollama /api/generate)
//!        ↓
//! Validation pipeline → attempt record
//!        ↓
//! Per-model result logs (results_<model>_<ts>.txt)
//!        ↓
//! Combined corpus (results.txt)
//!        ↓
//! Aggregation (per model, per difficulty level)
//!        ↓
//! Ranked views → stats_*.csv
//! ```

pub mod aggregate;
pub mod config;
pub mod export;
pub mod inference;
pub mod metrics;
pub mod params;
pub mod record;
pub mod report;
pub mod results;
pub mod runner;
pub mod sort;
pub mod validate;

pub use aggregate::{
    aggregate, AggregateError, AggregateProperty, Aggregates, DifficultyAggregate, GroupStats,
    ModelAggregate,
};
pub use config::{BenchConfig, ConfigError, DelayConfig, TestCase, TestCaseLoader};
pub use export::{to_delimited_string, write_delimited, Columns, CsvOptions, ExportError};
pub use inference::{
    GenerateRequest, GenerateResponse, InferenceClient, InferenceError, OllamaClient,
};
pub use metrics::{average, median};
pub use params::{parse_params, ParamsError};
pub use record::AttemptRecord;
pub use report::{
    rank_difficulty_entries, rank_models, DifficultyRow, ModelRow, RankedView, Report,
    ReportBuilder, ReportMetadata, ReportSummary, ReportView, ViewRows, ViewScope,
};
pub use results::{combine_results, load_corpus, write_corpus, ResultLog, ResultsError};
pub use runner::{BenchRunner, RunnerConfig};
pub use sort::{sort_by_properties, SortOrder, SortSpec, SortSpecError, SortValue, Sortable};
pub use validate::{
    validate_response, values_match, Diagnostic, JsonSchemaValidator, SchemaValidator,
    SchemaViolation, Validation, ValidationOutcome,
};
