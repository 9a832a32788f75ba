//! Aggregation of attempt records into per-model and per-difficulty summaries.
//!
//! Records are grouped once (model → records), then every group is reduced
//! by the same stateless [`GroupStats::from_records`]. Running the aggregator
//! twice over the same records yields identical results.

use crate::metrics::{average, median};
use crate::params::{parse_params, ParamsError};
use crate::record::AttemptRecord;
use crate::sort::{SortValue, Sortable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during aggregation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("Cannot infer parameter count: {0}")]
    Params(#[from] ParamsError),
}

/// Totals, averages and medians over one group of attempts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub count: usize,

    /// Sum of measured durations, nanoseconds
    pub total_duration: u64,
    pub total_has_valid_json_format: usize,
    pub total_has_valid_schema: usize,
    pub total_has_valid_data: usize,
    pub total_absolute_score: u64,
    pub total_relative_score: u64,
    pub total_is_successful: usize,

    pub average_duration: f64,
    pub average_has_valid_json_format: f64,
    pub average_has_valid_schema: f64,
    pub average_has_valid_data: f64,
    pub average_absolute_score: f64,
    pub average_relative_score: f64,
    pub average_is_successful: f64,

    /// Over attempts with a measured duration only
    pub median_duration: Option<f64>,
    /// Over every attempt, measured or not
    pub median_absolute_score: Option<f64>,
    pub median_relative_score: Option<f64>,
}

impl GroupStats {
    /// Reduce a group of attempts
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AttemptRecord>,
    {
        let records: Vec<&AttemptRecord> = records.into_iter().collect();
        let count = records.len();

        let durations: Vec<f64> = records.iter().filter_map(|r| r.duration_ns()).collect();
        let absolute_scores: Vec<f64> = records.iter().map(|r| f64::from(r.absolute_score)).collect();
        let relative_scores: Vec<f64> = records.iter().map(|r| r.relative_score as f64).collect();

        let tally = |pred: fn(&AttemptRecord) -> bool| records.iter().filter(|r| pred(r)).count();

        let total_duration: u64 = records.iter().filter_map(|r| r.duration).sum();
        let total_has_valid_json_format = tally(|r| r.validation.has_valid_json_format);
        let total_has_valid_schema = tally(|r| r.validation.has_valid_schema);
        let total_has_valid_data = tally(|r| r.validation.has_valid_data);
        let total_absolute_score: u64 = records.iter().map(|r| u64::from(r.absolute_score)).sum();
        let total_relative_score: u64 = records.iter().map(|r| r.relative_score).sum();
        let total_is_successful = tally(|r| r.is_successful);

        Self {
            count,
            total_duration,
            total_has_valid_json_format,
            total_has_valid_schema,
            total_has_valid_data,
            total_absolute_score,
            total_relative_score,
            total_is_successful,
            average_duration: average(total_duration as f64, count),
            average_has_valid_json_format: average(total_has_valid_json_format as f64, count),
            average_has_valid_schema: average(total_has_valid_schema as f64, count),
            average_has_valid_data: average(total_has_valid_data as f64, count),
            average_absolute_score: average(total_absolute_score as f64, count),
            average_relative_score: average(total_relative_score as f64, count),
            average_is_successful: average(total_is_successful as f64, count),
            median_duration: median(&durations),
            median_absolute_score: median(&absolute_scores),
            median_relative_score: median(&relative_scores),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn sort_value(&self, property: AggregateProperty) -> SortValue<'static> {
        use AggregateProperty as P;
        match property {
            P::Count => SortValue::Number(self.count as f64),
            P::TotalDuration => SortValue::Number(self.total_duration as f64),
            P::TotalHasValidJsonFormat => SortValue::Number(self.total_has_valid_json_format as f64),
            P::TotalHasValidSchema => SortValue::Number(self.total_has_valid_schema as f64),
            P::TotalHasValidData => SortValue::Number(self.total_has_valid_data as f64),
            P::TotalAbsoluteScore => SortValue::Number(self.total_absolute_score as f64),
            P::TotalRelativeScore => SortValue::Number(self.total_relative_score as f64),
            P::TotalIsSuccessful => SortValue::Number(self.total_is_successful as f64),
            P::AverageDuration => SortValue::Number(self.average_duration),
            P::AverageHasValidJsonFormat => SortValue::Number(self.average_has_valid_json_format),
            P::AverageHasValidSchema => SortValue::Number(self.average_has_valid_schema),
            P::AverageHasValidData => SortValue::Number(self.average_has_valid_data),
            P::AverageAbsoluteScore => SortValue::Number(self.average_absolute_score),
            P::AverageRelativeScore => SortValue::Number(self.average_relative_score),
            P::AverageIsSuccessful => SortValue::Number(self.average_is_successful),
            P::MedianDuration => self.median_duration.into(),
            P::MedianAbsoluteScore => self.median_absolute_score.into(),
            P::MedianRelativeScore => self.median_relative_score.into(),
            P::Model | P::Params | P::DifficultyLevel => SortValue::Absent,
        }
    }
}

/// Summary of one model at one difficulty level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyAggregate {
    pub model: String,
    /// Parameter count in billions
    pub params: f64,
    pub difficulty_level: u32,
    #[serde(flatten)]
    pub stats: GroupStats,
}

/// Summary of one model across the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAggregate {
    pub model: String,
    /// Parameter count in billions
    pub params: f64,
    #[serde(flatten)]
    pub stats: GroupStats,
    pub difficulty_levels: BTreeMap<u32, DifficultyAggregate>,
}

/// Aggregator output for a benchmark run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregates {
    /// Model aggregates in discovery order
    models: Vec<ModelAggregate>,
    /// Distinct difficulty levels, ascending
    difficulty_levels: Vec<u32>,
}

impl Aggregates {
    /// Model aggregates in the order models first appear in the records
    #[must_use]
    pub fn models(&self) -> &[ModelAggregate] {
        &self.models
    }

    /// Look up a model aggregate by identifier
    #[must_use]
    pub fn model(&self, model: &str) -> Option<&ModelAggregate> {
        self.models.iter().find(|m| m.model == model)
    }

    /// Distinct difficulty levels present in the run, ascending
    #[must_use]
    pub fn difficulty_levels(&self) -> &[u32] {
        &self.difficulty_levels
    }

    /// Every difficulty aggregate across all models
    #[must_use]
    pub fn difficulty_entries(&self) -> Vec<&DifficultyAggregate> {
        self.models
            .iter()
            .flat_map(|m| m.difficulty_levels.values())
            .collect()
    }

    /// Number of models
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the run had no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Aggregate a run's attempt records.
///
/// Every model gets one nested entry per difficulty level present anywhere
/// in the run; levels a model never attempted have a count of zero.
///
/// # Errors
///
/// Returns [`AggregateError::Params`] if a model identifier has no parsable
/// size tag.
pub fn aggregate(records: &[AttemptRecord]) -> Result<Aggregates, AggregateError> {
    let mut discovery: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&AttemptRecord>> = HashMap::new();
    for record in records {
        let group = groups.entry(record.model.as_str()).or_insert_with(|| {
            discovery.push(record.model.as_str());
            Vec::new()
        });
        group.push(record);
    }

    let difficulty_levels: Vec<u32> = records
        .iter()
        .map(|r| r.difficulty_level)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    tracing::debug!(
        records = records.len(),
        models = discovery.len(),
        difficulty_levels = ?difficulty_levels,
        "Aggregating attempt records"
    );

    let models = discovery
        .into_iter()
        .map(|model| {
            let group = groups.get(model).map(Vec::as_slice).unwrap_or_default();
            summarize_model(model, group, &difficulty_levels)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Aggregates {
        models,
        difficulty_levels,
    })
}

fn summarize_model(
    model: &str,
    records: &[&AttemptRecord],
    difficulty_levels: &[u32],
) -> Result<ModelAggregate, AggregateError> {
    let params = parse_params(model)?;

    let levels = difficulty_levels
        .iter()
        .map(|&level| {
            let stats = GroupStats::from_records(
                records
                    .iter()
                    .copied()
                    .filter(|r| r.difficulty_level == level),
            );
            let entry = DifficultyAggregate {
                model: model.to_string(),
                params,
                difficulty_level: level,
                stats,
            };
            (level, entry)
        })
        .collect();

    Ok(ModelAggregate {
        model: model.to_string(),
        params,
        stats: GroupStats::from_records(records.iter().copied()),
        difficulty_levels: levels,
    })
}

/// Sortable properties of model and difficulty aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateProperty {
    Model,
    Params,
    DifficultyLevel,
    Count,
    TotalDuration,
    TotalHasValidJsonFormat,
    TotalHasValidSchema,
    TotalHasValidData,
    TotalAbsoluteScore,
    TotalRelativeScore,
    TotalIsSuccessful,
    AverageDuration,
    AverageHasValidJsonFormat,
    AverageHasValidSchema,
    AverageHasValidData,
    AverageAbsoluteScore,
    AverageRelativeScore,
    AverageIsSuccessful,
    MedianDuration,
    MedianAbsoluteScore,
    MedianRelativeScore,
}

impl AggregateProperty {
    /// Every property, in declaration order
    pub const ALL: [Self; 21] = [
        Self::Model,
        Self::Params,
        Self::DifficultyLevel,
        Self::Count,
        Self::TotalDuration,
        Self::TotalHasValidJsonFormat,
        Self::TotalHasValidSchema,
        Self::TotalHasValidData,
        Self::TotalAbsoluteScore,
        Self::TotalRelativeScore,
        Self::TotalIsSuccessful,
        Self::AverageDuration,
        Self::AverageHasValidJsonFormat,
        Self::AverageHasValidSchema,
        Self::AverageHasValidData,
        Self::AverageAbsoluteScore,
        Self::AverageRelativeScore,
        Self::AverageIsSuccessful,
        Self::MedianDuration,
        Self::MedianAbsoluteScore,
        Self::MedianRelativeScore,
    ];

    /// Field name as serialized
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Params => "params",
            Self::DifficultyLevel => "difficultyLevel",
            Self::Count => "count",
            Self::TotalDuration => "totalDuration",
            Self::TotalHasValidJsonFormat => "totalHasValidJsonFormat",
            Self::TotalHasValidSchema => "totalHasValidSchema",
            Self::TotalHasValidData => "totalHasValidData",
            Self::TotalAbsoluteScore => "totalAbsoluteScore",
            Self::TotalRelativeScore => "totalRelativeScore",
            Self::TotalIsSuccessful => "totalIsSuccessful",
            Self::AverageDuration => "averageDuration",
            Self::AverageHasValidJsonFormat => "averageHasValidJsonFormat",
            Self::AverageHasValidSchema => "averageHasValidSchema",
            Self::AverageHasValidData => "averageHasValidData",
            Self::AverageAbsoluteScore => "averageAbsoluteScore",
            Self::AverageRelativeScore => "averageRelativeScore",
            Self::AverageIsSuccessful => "averageIsSuccessful",
            Self::MedianDuration => "medianDuration",
            Self::MedianAbsoluteScore => "medianAbsoluteScore",
            Self::MedianRelativeScore => "medianRelativeScore",
        }
    }
}

impl fmt::Display for AggregateProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregateProperty {
    type Err = String;

    /// Accepts the camelCase field name or its `snake_case` spelling
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|p| p.name().to_lowercase() == wanted)
            .ok_or_else(|| s.to_string())
    }
}

impl Sortable for ModelAggregate {
    type Property = AggregateProperty;

    fn sort_value(&self, property: AggregateProperty) -> SortValue<'_> {
        match property {
            AggregateProperty::Model => SortValue::Text(&self.model),
            AggregateProperty::Params => SortValue::Number(self.params),
            AggregateProperty::DifficultyLevel => SortValue::Absent,
            other => self.stats.sort_value(other),
        }
    }
}

impl Sortable for DifficultyAggregate {
    type Property = AggregateProperty;

    fn sort_value(&self, property: AggregateProperty) -> SortValue<'_> {
        match property {
            AggregateProperty::Model => SortValue::Text(&self.model),
            AggregateProperty::Params => SortValue::Number(self.params),
            AggregateProperty::DifficultyLevel => {
                SortValue::Number(f64::from(self.difficulty_level))
            }
            other => self.stats.sort_value(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use crate::validate::Validation;

    const SEC: u64 = 1_000_000_000;

    fn flags(json: bool, schema: bool, data: bool) -> Validation {
        Validation {
            has_valid_json_format: json,
            has_valid_schema: schema,
            has_valid_data: data,
        }
    }

    /// Three attempts for `m:1b`: levels 1, 1, 2
    fn synthetic() -> Vec<AttemptRecord> {
        vec![
            AttemptRecord::new("m:1b", 1, 1, Some(2 * SEC), flags(true, true, true)),
            AttemptRecord::new("m:1b", 1, 2, Some(4 * SEC), flags(true, false, false)),
            AttemptRecord::new("m:1b", 2, 1, None, flags(false, false, false)),
        ]
    }

    #[test]
    fn test_end_to_end_hand_computed() {
        let aggregates = aggregate(&synthetic()).unwrap();
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates.difficulty_levels(), &[1, 2]);

        let m = aggregates.model("m:1b").unwrap();
        assert_eq!(m.params, 1.0);
        assert_eq!(m.stats.count, 3);
        assert_eq!(m.stats.total_absolute_score, 110);
        assert_eq!(m.stats.total_relative_score, 110);
        assert_eq!(m.stats.total_duration, 6 * SEC);
        assert_eq!(m.stats.total_has_valid_json_format, 2);
        assert_eq!(m.stats.total_has_valid_schema, 1);
        assert_eq!(m.stats.total_has_valid_data, 1);
        assert_eq!(m.stats.total_is_successful, 1);
        assert_eq!(m.stats.average_duration, 2.0 * SEC as f64);
        assert_eq!(m.stats.median_duration, Some(3.0 * SEC as f64));
        assert_eq!(m.stats.median_absolute_score, Some(10.0));
        assert_eq!(m.stats.median_relative_score, Some(10.0));

        let level1 = &m.difficulty_levels[&1];
        assert_eq!(level1.difficulty_level, 1);
        assert_eq!(level1.params, 1.0);
        assert_eq!(level1.stats.count, 2);
        assert_eq!(level1.stats.total_absolute_score, 110);
        assert_eq!(level1.stats.total_relative_score, 110);
        assert_eq!(level1.stats.median_absolute_score, Some(55.0));
        assert_eq!(level1.stats.median_duration, Some(3.0 * SEC as f64));
        assert_eq!(level1.stats.average_is_successful, 0.5);

        let level2 = &m.difficulty_levels[&2];
        assert_eq!(level2.stats.count, 1);
        assert_eq!(level2.stats.total_absolute_score, 0);
        assert_eq!(level2.stats.total_duration, 0);
        assert_eq!(level2.stats.median_duration, None);
        assert_eq!(level2.stats.median_absolute_score, Some(0.0));
    }

    #[test]
    fn test_averages_equal_totals_over_count() {
        let aggregates = aggregate(&synthetic()).unwrap();
        let stats = &aggregates.models()[0].stats;
        let n = stats.count as f64;
        assert_eq!(stats.average_duration, stats.total_duration as f64 / n);
        assert_eq!(stats.average_has_valid_json_format, stats.total_has_valid_json_format as f64 / n);
        assert_eq!(stats.average_has_valid_schema, stats.total_has_valid_schema as f64 / n);
        assert_eq!(stats.average_has_valid_data, stats.total_has_valid_data as f64 / n);
        assert_eq!(stats.average_absolute_score, stats.total_absolute_score as f64 / n);
        assert_eq!(stats.average_relative_score, stats.total_relative_score as f64 / n);
        assert_eq!(stats.average_is_successful, stats.total_is_successful as f64 / n);
    }

    #[test]
    fn test_score_medians_include_unmeasured_attempts() {
        let records = vec![
            AttemptRecord::new("m:1b", 1, 1, Some(SEC), flags(true, true, true)),
            AttemptRecord::failed("m:1b", 1, 2),
        ];
        let stats = GroupStats::from_records(&records);
        assert_eq!(stats.median_duration, Some(SEC as f64));
        assert_eq!(stats.median_absolute_score, Some(50.0));
        assert_eq!(stats.median_relative_score, Some(50.0));
    }

    #[test]
    fn test_large_difficulty_levels_total_without_overflow() {
        let level = u32::MAX;
        let records = vec![
            AttemptRecord::new("m:1b", level, 1, None, flags(true, true, true)),
            AttemptRecord::new("m:1b", level, 2, None, flags(true, true, true)),
        ];
        let stats = GroupStats::from_records(&records);
        assert_eq!(stats.total_relative_score, 200 * u64::from(level));
    }

    #[test]
    fn test_total_success_counts_successful_records() {
        let records = synthetic();
        let aggregates = aggregate(&records).unwrap();
        let expected = records.iter().filter(|r| r.is_successful).count();
        assert_eq!(aggregates.models()[0].stats.total_is_successful, expected);
    }

    #[test]
    fn test_models_in_discovery_order() {
        let records = vec![
            AttemptRecord::failed("zeta:7b", 1, 1),
            AttemptRecord::failed("alpha:3b", 1, 1),
            AttemptRecord::failed("zeta:7b", 2, 1),
        ];
        let aggregates = aggregate(&records).unwrap();
        let names: Vec<_> = aggregates.models().iter().map(|m| m.model.as_str()).collect();
        assert_eq!(names, vec!["zeta:7b", "alpha:3b"]);
    }

    #[test]
    fn test_difficulty_levels_sorted_numerically() {
        let records = vec![
            AttemptRecord::failed("m:1b", 10, 1),
            AttemptRecord::failed("m:1b", 2, 1),
            AttemptRecord::failed("m:1b", 9, 1),
            AttemptRecord::failed("m:1b", 2, 2),
        ];
        let aggregates = aggregate(&records).unwrap();
        assert_eq!(aggregates.difficulty_levels(), &[2, 9, 10]);
    }

    #[test]
    fn test_unattempted_level_is_empty_group() {
        let records = vec![
            AttemptRecord::new("a:1b", 1, 1, Some(SEC), flags(true, true, true)),
            AttemptRecord::new("b:2b", 2, 1, Some(SEC), flags(true, true, true)),
        ];
        let aggregates = aggregate(&records).unwrap();
        let a = aggregates.model("a:1b").unwrap();
        let empty = &a.difficulty_levels[&2];
        assert_eq!(empty.stats.count, 0);
        assert_eq!(empty.stats.average_absolute_score, 0.0);
        assert_eq!(empty.stats.average_duration, 0.0);
        assert_eq!(empty.stats.median_duration, None);
        assert_eq!(empty.stats.median_absolute_score, None);
        assert_eq!(aggregates.difficulty_entries().len(), 4);
    }

    #[test]
    fn test_empty_input() {
        let aggregates = aggregate(&[]).unwrap();
        assert!(aggregates.is_empty());
        assert!(aggregates.difficulty_levels().is_empty());
        assert!(aggregates.difficulty_entries().is_empty());
    }

    #[test]
    fn test_group_stats_of_nothing() {
        let stats = GroupStats::from_records(std::iter::empty());
        assert_eq!(stats, GroupStats::default());
    }

    #[test]
    fn test_idempotent() {
        let records = synthetic();
        assert_eq!(aggregate(&records).unwrap(), aggregate(&records).unwrap());
    }

    #[test]
    fn test_unparsable_model_is_an_error() {
        let records = vec![AttemptRecord::failed("llama3.2:latest", 1, 1)];
        assert!(matches!(
            aggregate(&records),
            Err(AggregateError::Params(ParamsError::InvalidNumber { .. }))
        ));
    }

    #[test]
    fn test_mixture_of_experts_params_copied_to_levels() {
        let records = vec![
            AttemptRecord::failed("mixtral:8x7b", 1, 1),
            AttemptRecord::failed("mixtral:8x7b", 3, 1),
        ];
        let aggregates = aggregate(&records).unwrap();
        let m = aggregates.model("mixtral:8x7b").unwrap();
        assert_eq!(m.params, 56.0);
        assert!(m.difficulty_levels.values().all(|d| d.params == 56.0));
    }

    #[test]
    fn test_property_names_round_trip() {
        for property in AggregateProperty::ALL {
            assert_eq!(property.name().parse::<AggregateProperty>(), Ok(property));
        }
        assert_eq!(
            "total_relative_score".parse::<AggregateProperty>(),
            Ok(AggregateProperty::TotalRelativeScore)
        );
        assert!("latency".parse::<AggregateProperty>().is_err());
    }

    #[test]
    fn test_serialized_field_names() {
        let aggregates = aggregate(&synthetic()).unwrap();
        let json = serde_json::to_value(&aggregates.models()[0]).unwrap();
        for property in AggregateProperty::ALL {
            if property != AggregateProperty::DifficultyLevel {
                assert!(json.get(property.name()).is_some(), "{property}");
            }
        }
        assert_eq!(json["difficultyLevels"]["2"]["difficultyLevel"], 2);
    }

    #[test]
    fn test_sort_values() {
        let aggregates = aggregate(&synthetic()).unwrap();
        let m = &aggregates.models()[0];
        assert_eq!(m.sort_value(AggregateProperty::Model), SortValue::Text("m:1b"));
        assert_eq!(m.sort_value(AggregateProperty::TotalRelativeScore), SortValue::Number(110.0));
        assert_eq!(m.sort_value(AggregateProperty::DifficultyLevel), SortValue::Absent);

        let level2 = &m.difficulty_levels[&2];
        assert_eq!(level2.sort_value(AggregateProperty::DifficultyLevel), SortValue::Number(2.0));
        assert_eq!(level2.sort_value(AggregateProperty::MedianDuration), SortValue::Absent);
    }
}
