//! Report generation: ranked comparison views over aggregated results.
//!
//! Every view is the same operation with a different key cascade: sort the
//! model aggregates (or the flattened difficulty aggregates) with
//! [`sort_by_properties`], then project each record to a narrow row of
//! model, score, parameter count, duration and, for level-aware views,
//! difficulty level.
//!
//! Scores are total relative scores and durations are median durations in
//! nanoseconds.

use crate::aggregate::{AggregateProperty, Aggregates, DifficultyAggregate, ModelAggregate};
use crate::export::{to_delimited_string, write_delimited, Columns, CsvOptions, ExportError};
use crate::metrics::average;
use crate::sort::{sort_by_properties, SortOrder, SortSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as FmtWrite;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

/// Which records a view ranks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewScope {
    /// One row per model
    Models,
    /// One row per (model, difficulty level)
    DifficultyLevels,
}

/// Named comparison views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportView {
    /// Best score first, then fewer parameters, then lower latency
    PerformanceScoresAcrossModels,
    /// Smallest models first, best score within a size
    ModelPerformanceVsParameterCount,
    /// Smallest models first, fastest within a size
    ModelResponseTimeVsParameterCount,
    /// Fastest models first, best score within a latency
    ModelPerformanceVsResponseTime,
    /// Per-level rows, smallest models first
    DifficultyPerformanceVsParameterCount,
    /// Per-level rows, fastest first
    DifficultyPerformanceVsResponseTime,
}

impl ReportView {
    /// Every view, in export order
    pub const ALL: [Self; 6] = [
        Self::PerformanceScoresAcrossModels,
        Self::ModelPerformanceVsParameterCount,
        Self::ModelResponseTimeVsParameterCount,
        Self::ModelPerformanceVsResponseTime,
        Self::DifficultyPerformanceVsParameterCount,
        Self::DifficultyPerformanceVsResponseTime,
    ];

    /// Export file name
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::PerformanceScoresAcrossModels => "stats_performance_scores_across_models.csv",
            Self::ModelPerformanceVsParameterCount => {
                "stats_model_performance_vs_parameter_count.csv"
            }
            Self::ModelResponseTimeVsParameterCount => {
                "stats_model_response_time_vs_parameter_count.csv"
            }
            Self::ModelPerformanceVsResponseTime => "stats_model_performance_vs_response_time.csv",
            Self::DifficultyPerformanceVsParameterCount => {
                "stats_dl_performance_vs_parameter_count.csv"
            }
            Self::DifficultyPerformanceVsResponseTime => "stats_dl_performance_vs_response_time.csv",
        }
    }

    /// Heading used in text output
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::PerformanceScoresAcrossModels => "Performance scores across models",
            Self::ModelPerformanceVsParameterCount => "Model performance vs parameter count",
            Self::ModelResponseTimeVsParameterCount => "Model response time vs parameter count",
            Self::ModelPerformanceVsResponseTime => "Model performance vs response time",
            Self::DifficultyPerformanceVsParameterCount => {
                "Performance per difficulty level vs parameter count"
            }
            Self::DifficultyPerformanceVsResponseTime => {
                "Performance per difficulty level vs response time"
            }
        }
    }

    /// Records this view ranks
    #[must_use]
    pub const fn scope(self) -> ViewScope {
        match self {
            Self::DifficultyPerformanceVsParameterCount
            | Self::DifficultyPerformanceVsResponseTime => ViewScope::DifficultyLevels,
            _ => ViewScope::Models,
        }
    }

    /// Key cascade; scores always rank descending
    #[must_use]
    pub fn sort_spec(self) -> SortSpec<AggregateProperty> {
        use AggregateProperty::{DifficultyLevel, MedianDuration, Params, TotalRelativeScore};
        use SortOrder::{Asc, Desc};

        match self {
            Self::PerformanceScoresAcrossModels => {
                SortSpec::new([TotalRelativeScore, Params, MedianDuration]).with_orders([Desc])
            }
            Self::ModelPerformanceVsParameterCount => {
                SortSpec::new([Params, TotalRelativeScore, MedianDuration])
                    .with_orders([Asc, Desc])
            }
            Self::ModelResponseTimeVsParameterCount => {
                SortSpec::new([Params, MedianDuration, TotalRelativeScore])
                    .with_orders([Asc, Asc, Desc])
            }
            Self::ModelPerformanceVsResponseTime => {
                SortSpec::new([MedianDuration, TotalRelativeScore, Params])
                    .with_orders([Asc, Desc])
            }
            Self::DifficultyPerformanceVsParameterCount => {
                SortSpec::new([Params, TotalRelativeScore, DifficultyLevel, MedianDuration])
                    .with_orders([Asc, Desc])
            }
            Self::DifficultyPerformanceVsResponseTime => {
                SortSpec::new([MedianDuration, TotalRelativeScore, DifficultyLevel, Params])
                    .with_orders([Asc, Desc])
            }
        }
    }
}

/// Projected model aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRow {
    pub model: String,
    /// Total relative score
    pub score: u64,
    /// Parameter count in billions
    pub params: f64,
    /// Median duration in nanoseconds
    pub duration: Option<f64>,
}

impl Columns for ModelRow {
    const COLUMNS: &'static [&'static str] = &["model", "score", "params", "duration"];
}

impl From<&ModelAggregate> for ModelRow {
    fn from(entry: &ModelAggregate) -> Self {
        Self {
            model: entry.model.clone(),
            score: entry.stats.total_relative_score,
            params: entry.params,
            duration: entry.stats.median_duration,
        }
    }
}

/// Projected difficulty aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyRow {
    pub model: String,
    /// Total relative score at this level
    pub score: u64,
    /// Parameter count in billions
    pub params: f64,
    /// Median duration in nanoseconds
    pub duration: Option<f64>,
    pub difficulty_level: u32,
}

impl Columns for DifficultyRow {
    const COLUMNS: &'static [&'static str] =
        &["model", "score", "params", "duration", "difficultyLevel"];
}

impl From<&DifficultyAggregate> for DifficultyRow {
    fn from(entry: &DifficultyAggregate) -> Self {
        Self {
            model: entry.model.clone(),
            score: entry.stats.total_relative_score,
            params: entry.params,
            duration: entry.stats.median_duration,
            difficulty_level: entry.difficulty_level,
        }
    }
}

/// Rank model aggregates by `spec` and project them
#[must_use]
pub fn rank_models(aggregates: &Aggregates, spec: &SortSpec<AggregateProperty>) -> Vec<ModelRow> {
    let mut entries: Vec<&ModelAggregate> = aggregates.models().iter().collect();
    sort_by_properties(&mut entries, spec);
    entries.into_iter().map(ModelRow::from).collect()
}

/// Rank every (model, difficulty level) aggregate by `spec` and project them
#[must_use]
pub fn rank_difficulty_entries(
    aggregates: &Aggregates,
    spec: &SortSpec<AggregateProperty>,
) -> Vec<DifficultyRow> {
    let mut entries = aggregates.difficulty_entries();
    sort_by_properties(&mut entries, spec);
    entries.into_iter().map(DifficultyRow::from).collect()
}

/// Rows of a ranked view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViewRows {
    // Untagged: the wider row shape must come first
    DifficultyLevels(Vec<DifficultyRow>),
    Models(Vec<ModelRow>),
}

impl ViewRows {
    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Models(rows) => rows.len(),
            Self::DifficultyLevels(rows) => rows.len(),
        }
    }

    /// Whether the view has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Model identifiers in rank order
    #[must_use]
    pub fn models(&self) -> Vec<&str> {
        match self {
            Self::Models(rows) => rows.iter().map(|r| r.model.as_str()).collect(),
            Self::DifficultyLevels(rows) => rows.iter().map(|r| r.model.as_str()).collect(),
        }
    }
}

/// A view after sorting and projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedView {
    pub view: ReportView,
    pub rows: ViewRows,
}

impl RankedView {
    /// Rank `aggregates` for `view`
    #[must_use]
    pub fn build(view: ReportView, aggregates: &Aggregates) -> Self {
        let spec = view.sort_spec();
        let rows = match view.scope() {
            ViewScope::Models => ViewRows::Models(rank_models(aggregates, &spec)),
            ViewScope::DifficultyLevels => {
                ViewRows::DifficultyLevels(rank_difficulty_entries(aggregates, &spec))
            }
        };
        Self { view, rows }
    }

    /// Render as delimited text
    ///
    /// # Errors
    ///
    /// Returns an error if the delimiter is invalid.
    pub fn to_delimited(&self, options: &CsvOptions) -> Result<String, ExportError> {
        match &self.rows {
            ViewRows::Models(rows) => to_delimited_string(rows, options),
            ViewRows::DifficultyLevels(rows) => to_delimited_string(rows, options),
        }
    }

    /// Write to `<dir>/<view file name>`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, dir: &Path, options: &CsvOptions) -> Result<PathBuf, ExportError> {
        let path = dir.join(self.view.file_name());
        match &self.rows {
            ViewRows::Models(rows) => write_delimited(&path, rows, options)?,
            ViewRows::DifficultyLevels(rows) => write_delimited(&path, rows, options)?,
        }
        Ok(path)
    }

    fn table_rows(&self) -> Vec<ViewTableRow> {
        match &self.rows {
            ViewRows::Models(rows) => rows
                .iter()
                .enumerate()
                .map(|(i, r)| ViewTableRow::new(i, &r.model, r.score, r.params, r.duration, None))
                .collect(),
            ViewRows::DifficultyLevels(rows) => rows
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    ViewTableRow::new(
                        i,
                        &r.model,
                        r.score,
                        r.params,
                        r.duration,
                        Some(r.difficulty_level.to_string()),
                    )
                })
                .collect(),
        }
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Report title
    pub title: String,
    /// Corpus the report was built from
    pub source: Option<String>,
    /// Report generation timestamp
    pub generated_at: DateTime<Utc>,
    /// Framework version
    pub framework_version: String,
}

/// High-level summary of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Models evaluated
    pub total_models: usize,
    /// Attempts across all models
    pub total_attempts: usize,
    /// Fully successful attempts
    pub total_successful: usize,
    /// Fraction of attempts that passed every stage
    pub success_rate: f64,
    /// Difficulty levels present
    pub difficulty_levels: Vec<u32>,
    /// Top of the performance ranking
    pub best_model: Option<String>,
    /// Total relative score of the best model
    pub best_score: u64,
}

/// Full report: aggregates plus every requested view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    pub aggregates: Aggregates,
    pub views: Vec<RankedView>,
}

/// Report builder
pub struct ReportBuilder {
    title: String,
    source: Option<String>,
    views: Vec<ReportView>,
}

impl ReportBuilder {
    /// Builder producing every view
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            source: None,
            views: ReportView::ALL.to_vec(),
        }
    }

    /// Record where the attempt records came from
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Restrict the report to `views`
    #[must_use]
    pub fn with_views(mut self, views: &[ReportView]) -> Self {
        self.views = views.to_vec();
        self
    }

    /// Build the report
    #[must_use]
    pub fn build(self, aggregates: Aggregates) -> Report {
        let views = self
            .views
            .iter()
            .map(|&view| RankedView::build(view, &aggregates))
            .collect();
        let summary = Self::build_summary(&aggregates);

        Report {
            metadata: ReportMetadata {
                title: self.title,
                source: self.source,
                generated_at: Utc::now(),
                framework_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            summary,
            aggregates,
            views,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn build_summary(aggregates: &Aggregates) -> ReportSummary {
        let total_attempts: usize = aggregates.models().iter().map(|m| m.stats.count).sum();
        let total_successful: usize = aggregates
            .models()
            .iter()
            .map(|m| m.stats.total_is_successful)
            .sum();

        let ranking = rank_models(
            aggregates,
            &ReportView::PerformanceScoresAcrossModels.sort_spec(),
        );
        let best = ranking.first();

        ReportSummary {
            total_models: aggregates.len(),
            total_attempts,
            total_successful,
            success_rate: average(total_successful as f64, total_attempts),
            difficulty_levels: aggregates.difficulty_levels().to_vec(),
            best_model: best.map(|r| r.model.clone()),
            best_score: best.map_or(0, |r| r.score),
        }
    }
}

/// Table row for text output
#[derive(Tabled)]
struct ViewTableRow {
    #[tabled(rename = "#")]
    rank: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Params (B)")]
    params: String,
    #[tabled(rename = "Median duration")]
    duration: String,
    #[tabled(rename = "Level")]
    level: String,
}

impl ViewTableRow {
    fn new(
        index: usize,
        model: &str,
        score: u64,
        params: f64,
        duration: Option<f64>,
        level: Option<String>,
    ) -> Self {
        Self {
            rank: (index + 1).to_string(),
            model: model.to_string(),
            score: score.to_string(),
            params: format!("{params}"),
            duration: format_duration(duration),
            level: level.unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Nanoseconds as seconds, `-` when absent
fn format_duration(nanos: Option<f64>) -> String {
    nanos.map_or_else(|| "-".to_string(), |ns| format!("{:.2}s", ns / 1e9))
}

impl Report {
    /// Look up a built view
    #[must_use]
    pub fn view(&self, view: ReportView) -> Option<&RankedView> {
        self.views.iter().find(|v| v.view == view)
    }

    /// Write every view to `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be written.
    pub fn write_views(&self, dir: &Path, options: &CsvOptions) -> Result<Vec<PathBuf>, ExportError> {
        self.views.iter().map(|v| v.write(dir, options)).collect()
    }

    /// Render report as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Render report as plain text tables
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        writeln!(
            output,
            "═══════════════════════════════════════════════════════════════"
        )
        .ok();
        writeln!(output, "  {}", self.metadata.title).ok();
        writeln!(
            output,
            "═══════════════════════════════════════════════════════════════"
        )
        .ok();
        writeln!(output).ok();

        writeln!(output, "SUMMARY").ok();
        writeln!(
            output,
            "───────────────────────────────────────────────────────────────"
        )
        .ok();
        if let Some(source) = &self.metadata.source {
            writeln!(output, "  Source:            {source}").ok();
        }
        writeln!(output, "  Models:            {}", self.summary.total_models).ok();
        writeln!(output, "  Attempts:          {}", self.summary.total_attempts).ok();
        writeln!(
            output,
            "  Success rate:      {:.2}%",
            self.summary.success_rate * 100.0
        )
        .ok();
        let levels: Vec<String> = self
            .summary
            .difficulty_levels
            .iter()
            .map(ToString::to_string)
            .collect();
        writeln!(output, "  Difficulty levels: {}", levels.join(", ")).ok();
        if let Some(best) = &self.summary.best_model {
            writeln!(
                output,
                "  Best model:        {best} (score {})",
                self.summary.best_score
            )
            .ok();
        }
        writeln!(output).ok();

        for view in &self.views {
            writeln!(output, "{}", view.view.title().to_uppercase()).ok();
            writeln!(
                output,
                "───────────────────────────────────────────────────────────────"
            )
            .ok();
            if view.rows.is_empty() {
                writeln!(output, "  (no results)").ok();
            } else {
                let table = Table::new(view.table_rows()).to_string();
                writeln!(output, "{table}").ok();
            }
            writeln!(output).ok();
        }

        output
    }
}
