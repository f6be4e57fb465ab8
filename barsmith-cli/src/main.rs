//! Barsmith CLI: process files, run configured batches, and demo the pipeline.
//!
//! Commands:
//! - `process`: validate, fill, enrich and quality-check one CSV/JSON file
//! - `run`: execute a batch from a TOML config file
//! - `demo`: run the whole pipeline over synthetic symbols
//!
//! Logs go to stderr; set `RUST_LOG` to change the level (default `info`).

use anyhow::{bail, Context, Result};
use barsmith_core::{Pipeline, PipelineConfig, PricePolicy, Processed, RawTable};
use barsmith_runner::{
    build_sink, run_batch, Batch, BatchSummary, CsvSink, ParquetSink, RunnerConfig, SeriesSink,
    StorageConfig, SymbolOutcome, SyntheticProvider, TracingAlertSink,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "barsmith",
    about = "Barsmith CLI: OHLCV processing and quality validation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one provider file and print its quality report.
    Process {
        /// Input file with a header row (CSV) or an array of records (JSON).
        #[arg(long)]
        input: PathBuf,

        /// Input format. Inferred from the file extension when omitted.
        #[arg(long, value_enum)]
        format: Option<InputFormat>,

        /// Symbol label. Defaults to the file stem.
        #[arg(long)]
        symbol: Option<String>,

        /// Abort on the first broken price relationship.
        #[arg(long, default_value_t = false)]
        strict: bool,

        /// Directory to store the processed series in.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Storage format used with --output.
        #[arg(long, value_enum, default_value_t = SinkKind::Parquet)]
        sink: SinkKind,
    },
    /// Execute a batch from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Start date (YYYY-MM-DD). Defaults to end minus lookback_days.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Print the batch summary as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run the pipeline end to end over synthetic symbols.
    Demo {
        /// Bars per symbol.
        #[arg(long, default_value_t = 300)]
        bars: usize,

        /// Master seed; each symbol's walk is derived from it.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Symbols to generate.
        #[arg(
            long,
            num_args = 1..,
            default_values_t = ["SPY".to_string(), "QQQ".to_string(), "IWM".to_string()]
        )]
        symbols: Vec<String>,

        /// Worker threads.
        #[arg(long, default_value_t = 2)]
        jobs: usize,

        /// Directory to store Parquet output in.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    Csv,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    Parquet,
    Csv,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            format,
            symbol,
            strict,
            output,
            sink,
        } => run_process(&input, format, symbol, strict, output, sink),
        Commands::Run {
            config,
            start,
            end,
            json,
        } => run_batch_cmd(&config, start, end, json),
        Commands::Demo {
            bars,
            seed,
            symbols,
            jobs,
            output,
        } => run_demo(bars, seed, symbols, jobs, output),
    }
}

fn run_process(
    input: &Path,
    format: Option<InputFormat>,
    symbol: Option<String>,
    strict: bool,
    output: Option<PathBuf>,
    sink: SinkKind,
) -> Result<()> {
    let format = match format {
        Some(f) => f,
        None => infer_format(input)?,
    };
    let raw = read_table(input, format)?;
    let symbol = symbol
        .or_else(|| input.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let mut config = PipelineConfig::default();
    if strict {
        config.validation.price_policy = PricePolicy::Strict;
    }
    let pipeline = Pipeline::new(config)?;
    let processed = pipeline
        .process_symbol(&symbol, &raw)
        .with_context(|| format!("processing {}", input.display()))?;

    print_processed(&symbol, &processed);

    if let Some(dir) = output {
        let sink: Box<dyn SeriesSink> = match sink {
            SinkKind::Parquet => Box::new(ParquetSink::new(dir)),
            SinkKind::Csv => Box::new(CsvSink::new(dir)),
        };
        let written = sink.store(&symbol, &processed.series)?;
        println!("Stored {written} bars via {} sink", sink.name());
    }

    Ok(())
}

fn infer_format(path: &Path) -> Result<InputFormat> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("csv") => Ok(InputFormat::Csv),
        Some("json") => Ok(InputFormat::Json),
        _ => bail!(
            "cannot infer format of {}; pass --format csv|json",
            path.display()
        ),
    }
}

fn read_table(path: &Path, format: InputFormat) -> Result<RawTable> {
    let table = match format {
        InputFormat::Csv => {
            let file =
                File::open(path).with_context(|| format!("opening {}", path.display()))?;
            RawTable::from_csv_reader(file)?
        }
        InputFormat::Json => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            RawTable::from_json_records(&text)?
        }
    };
    info!(rows = table.len(), columns = table.headers.len(), "read input");
    Ok(table)
}

fn print_processed(symbol: &str, processed: &Processed) {
    let series = &processed.series;
    let range = match (series.bars.first(), series.bars.last()) {
        (Some(first), Some(last)) => format!("{} → {}", first.timestamp, last.timestamp),
        _ => "empty".to_string(),
    };
    println!("{symbol}: {} bars ({range})", series.len());
    if !series.violations.is_empty() {
        println!("  {} price violation(s) kept", series.violations.len());
    }
    if let Some(last) = series.bars.last() {
        let fmt = |v: Option<f64>| v.map_or("-".to_string(), |v| format!("{v:.2}"));
        println!(
            "  last close {}  sma_20 {}  rsi_14 {}  macd {}",
            fmt(last.close),
            fmt(last.indicators.sma_20),
            fmt(last.indicators.rsi_14),
            fmt(last.indicators.macd),
        );
    }
    if processed.report.is_clean() {
        println!("  quality: clean");
    } else {
        println!("  quality issues:");
        for issue in &processed.report {
            println!("    - {issue}");
        }
    }
}

fn parse_date(value: Option<&str>, flag: &str) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("--{flag} must be YYYY-MM-DD, got '{s}'"))
        })
        .transpose()
}

fn run_batch_cmd(
    config_path: &Path,
    start: Option<String>,
    end: Option<String>,
    json: bool,
) -> Result<()> {
    let config = RunnerConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let start = parse_date(start.as_deref(), "start")?;
    let end = parse_date(end.as_deref(), "end")?
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let alerts = TracingAlertSink::new(config.monitoring.alert_level);
    let summary = run_batch(&config, start, end, &alerts)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_demo(
    bars: usize,
    seed: u64,
    symbols: Vec<String>,
    jobs: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    if jobs == 0 {
        bail!("--jobs must be greater than 0");
    }
    let pipeline = Pipeline::new(PipelineConfig::default())?;
    let provider = SyntheticProvider::new(bars, seed);
    let sink = output.and_then(|dir| build_sink(&StorageConfig::Parquet { dir }));
    let alerts = TracingAlertSink::default();
    let sla = Default::default();

    let today = chrono::Local::now().date_naive();
    let batch = Batch {
        pipeline: &pipeline,
        provider: &provider,
        sink: sink.as_deref(),
        alerts: &alerts,
        parallel_jobs: jobs,
        sla_secs: &sla,
    };
    let summary = batch.run(&symbols, today, today)?;
    print_summary(&summary);

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "Batch {} → {}: {}/{} symbols succeeded",
        summary.start,
        summary.end,
        summary.succeeded(),
        summary.outcomes.len()
    );
    for outcome in &summary.outcomes {
        match outcome {
            SymbolOutcome::Succeeded {
                symbol,
                bars,
                stored,
                report,
            } => {
                let stored = stored.map_or(String::new(), |n| format!(", stored {n}"));
                println!("  OK   {symbol}: {bars} bars{stored}, {} issue(s)", report.len());
                for issue in report {
                    println!("         - {issue}");
                }
            }
            SymbolOutcome::Failed {
                symbol,
                stage,
                error,
            } => println!("  FAIL {symbol} [{stage}]: {error}"),
        }
    }
    for issue in &summary.operation_issues {
        println!("  ! {issue}");
    }
}
