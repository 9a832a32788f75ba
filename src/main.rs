//! Structured Eval CLI
//!
//! Structured JSON extraction benchmark for local language models

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use structured_eval::{
    aggregate, combine_results, load_corpus, rank_difficulty_entries, rank_models, write_corpus,
    AggregateProperty, BenchConfig, BenchRunner, JsonSchemaValidator, OllamaClient,
    ReportBuilder, RunnerConfig, SortSpec, TestCase, TestCaseLoader,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "structured-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Benchmark configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark, writing one result log per model
    Run {
        /// Models to benchmark (overrides config)
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,

        /// Test case files (glob pattern, overrides config)
        #[arg(long)]
        tasks: Option<String>,

        /// Trials per model and test case (overrides config)
        #[arg(long)]
        iterations: Option<u32>,

        /// Inference endpoint (overrides config)
        #[arg(long)]
        endpoint: Option<String>,

        /// Output directory for result logs (overrides config)
        #[arg(long)]
        output: Option<String>,
    },

    /// Combine per-model result logs into one corpus file
    Combine {
        /// Directory holding results_*.txt logs
        #[arg(long, default_value = ".")]
        input: PathBuf,

        /// Corpus file to write
        #[arg(long, default_value = "results.txt")]
        output: PathBuf,
    },

    /// Aggregate a corpus and write the ranked views
    Stats {
        /// Corpus file
        #[arg(long, default_value = "results.txt")]
        input: PathBuf,

        /// Directory for stats_*.csv (overrides config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print the full report as JSON instead of tables
        #[arg(long)]
        json: bool,

        /// Extra ranking, e.g. "averageIsSuccessful:desc,params"
        #[arg(long)]
        sort: Option<String>,

        /// Apply --sort to per-difficulty entries instead of models
        #[arg(long)]
        by_level: bool,
    },

    /// Score one response file against one test case
    Score {
        /// Test case YAML file
        #[arg(long)]
        case: PathBuf,

        /// File holding the raw model response
        #[arg(long)]
        response: PathBuf,
    },
}

fn main() {
    // Initialize tracing; stdout is reserved for reports
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    if let Err(e) = dispatch(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => BenchConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BenchConfig::default(),
    };

    match cli.command {
        Commands::Run {
            models,
            tasks,
            iterations,
            endpoint,
            output,
        } => {
            let mut config = config;
            if !models.is_empty() {
                config.models = models;
            }
            if let Some(tasks) = tasks {
                config.tasks = tasks;
            }
            if let Some(iterations) = iterations {
                config.iterations = iterations;
            }
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            run(&config)
        }
        Commands::Combine { input, output } => combine(&input, &output),
        Commands::Stats {
            input,
            output,
            json,
            sort,
            by_level,
        } => {
            let output = output.unwrap_or_else(|| PathBuf::from(&config.output_dir));
            stats(&config, &input, &output, json, sort.as_deref(), by_level)
        }
        Commands::Score { case, response } => score(&case, &response),
    }
}

fn run(config: &BenchConfig) -> Result<()> {
    config.validate_for_run()?;
    let cases = TestCaseLoader::load_glob(&config.tasks)?;

    tracing::info!(
        endpoint = %config.endpoint,
        models = ?config.models,
        test_cases = cases.len(),
        iterations = config.iterations,
        "Starting benchmark"
    );

    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create {}", config.output_dir))?;

    let client = OllamaClient::new(&config.endpoint, config.num_ctx, config.timeout());
    let runner = BenchRunner::new(client, RunnerConfig::from(config));
    let records = runner.run(&config.models, cases.cases())?;

    let successful = records.iter().filter(|r| r.is_successful).count();
    println!(
        "Completed {} attempts ({successful} fully successful), logs in {}",
        records.len(),
        config.output_dir
    );
    Ok(())
}

fn combine(input: &Path, output: &Path) -> Result<()> {
    let records = combine_results(input)
        .with_context(|| format!("Failed to combine logs in {}", input.display()))?;
    write_corpus(output, &records)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote {} records to {}", records.len(), output.display());
    Ok(())
}

fn stats(
    config: &BenchConfig,
    input: &Path,
    output: &Path,
    json: bool,
    sort: Option<&str>,
    by_level: bool,
) -> Result<()> {
    let records =
        load_corpus(input).with_context(|| format!("Failed to load {}", input.display()))?;
    let aggregates = aggregate(&records)?;

    let custom = sort
        .map(str::parse::<SortSpec<AggregateProperty>>)
        .transpose()
        .context("Invalid --sort")?;

    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    if let Some(spec) = &custom {
        let rendered = if by_level {
            serde_json::to_string_pretty(&rank_difficulty_entries(&aggregates, spec))?
        } else {
            serde_json::to_string_pretty(&rank_models(&aggregates, spec))?
        };
        println!("{rendered}");
    }

    let report = ReportBuilder::new("Structured Extraction Benchmark")
        .with_source(input.display().to_string())
        .build(aggregates);

    let paths = report.write_views(output, &config.export)?;
    for path in &paths {
        tracing::info!(path = %path.display(), "Wrote view");
    }

    if custom.is_none() {
        if json {
            println!("{}", report.to_json()?);
        } else {
            println!("{}", report.to_text());
        }
    }
    Ok(())
}

fn score(case: &Path, response: &Path) -> Result<()> {
    let case = TestCase::load(case)
        .with_context(|| format!("Failed to load test case {}", case.display()))?;
    let text = std::fs::read_to_string(response)
        .with_context(|| format!("Failed to read {}", response.display()))?;

    let outcome = case.validate(Some(&text), &JsonSchemaValidator);
    let v = outcome.validation;

    println!("Test case:          {} (level {})", case.id, case.difficulty_level);
    println!("Valid JSON:         {}", pass_fail(v.has_valid_json_format));
    println!("Valid schema:       {}", pass_fail(v.has_valid_schema));
    println!("Valid data:         {}", pass_fail(v.has_valid_data));
    println!("Absolute score:     {} / 100", v.absolute_score());
    println!(
        "Relative score:     {} / {}",
        v.relative_score(case.difficulty_level),
        100 * u64::from(case.difficulty_level)
    );
    if let Some(diagnostic) = &outcome.diagnostic {
        println!("Diagnostic:         {diagnostic}");
    }

    if !v.is_successful() {
        std::process::exit(1);
    }
    Ok(())
}

const fn pass_fail(ok: bool) -> &'static str {
    if ok {
        "PASS"
    } else {
        "FAIL"
    }
}
