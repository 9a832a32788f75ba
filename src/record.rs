//! Attempt records: one per model, difficulty level and trial.

use crate::validate::Validation;
use serde::{Deserialize, Serialize};

/// Immutable outcome of one model invocation.
///
/// Serialized as a flat camelCase JSON object, one per line in the per-model
/// result logs. `duration` is the endpoint-reported total duration in
/// nanoseconds and is omitted when the call produced no measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub model: String,
    pub difficulty_level: u32,
    pub iteration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(flatten)]
    pub validation: Validation,
    pub absolute_score: u32,
    pub relative_score: u64,
    pub is_successful: bool,
}

impl AttemptRecord {
    /// Build a record, deriving scores and success from `validation`
    #[must_use]
    pub fn new(
        model: impl Into<String>,
        difficulty_level: u32,
        iteration: u32,
        duration: Option<u64>,
        validation: Validation,
    ) -> Self {
        Self {
            model: model.into(),
            difficulty_level,
            iteration,
            duration,
            validation,
            absolute_score: validation.absolute_score(),
            relative_score: validation.relative_score(difficulty_level),
            is_successful: validation.is_successful(),
        }
    }

    /// Record for a call that failed before producing any response
    #[must_use]
    pub fn failed(model: impl Into<String>, difficulty_level: u32, iteration: u32) -> Self {
        Self::new(model, difficulty_level, iteration, None, Validation::failed())
    }

    /// Duration in nanoseconds as a float sample
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_ns(&self) -> Option<f64> {
        self.duration.map(|d| d as f64)
    }

    /// Check the derived fields against the validation flags.
    ///
    /// Records built with [`AttemptRecord::new`] always pass; this is for
    /// records read back from disk.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.validation.is_monotonic()
            && self.absolute_score == self.validation.absolute_score()
            && self.relative_score == self.validation.relative_score(self.difficulty_level)
            && self.is_successful == self.validation.is_successful()
    }
}
