//! Steptally CLI - Command-line interface for Steptally
//!
//! Commands:
//! - replay: Feed a recorded accelerometer stream through a session
//! - status: Show the running (uncommitted) step count
//! - reset: Zero the running count
//! - commit: Save the running count as a dated record and reset it
//! - history: List committed records
//! - chart: Print the history as a chart series
//! - doctor: Diagnose storage and configuration

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use steptally::chart::ChartSeries;
use steptally::config::TallyConfig;
use steptally::prefs::RunningCountStore;
use steptally::sensor::{AccelerationSource, ReplaySource, SampleFormat};
use steptally::store::{parse_record_date, DailyStepStore};
use steptally::types::{StepEvent, StepRecord};
use steptally::{StepSession, StoreError, TallyError, PRODUCER_NAME, TALLY_VERSION};

/// Steptally - accelerometer step counter with a local daily history
#[derive(Parser)]
#[command(name = "steptally")]
#[command(version = TALLY_VERSION)]
#[command(about = "Count steps from accelerometer streams and keep a daily history", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding steps.db and running.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Step magnitude threshold
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Minimum milliseconds between steps
    #[arg(long, global = true)]
    cooldown_ms: Option<i64>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a recorded accelerometer stream through the session
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Print each accepted step as a JSON line
        #[arg(long)]
        events: bool,

        /// Commit the running count after the replay
        #[arg(long)]
        commit: bool,

        /// Record date when committing (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Show the running (uncommitted) step count
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Zero the running count
    Reset,

    /// Save the running count as a dated record and reset it
    Commit {
        /// Record date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },

    /// List committed records
    History {
        /// Output format
        #[arg(long, default_value = "table")]
        output_format: OutputFormat,
    },

    /// Print committed history as a chart series
    Chart {
        /// Output format
        #[arg(long, default_value = "table")]
        output_format: OutputFormat,
    },

    /// Diagnose storage and configuration
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON samples
    Ndjson,
    /// timestamp_ms,x,y,z lines
    Csv,
}

impl From<InputFormat> for SampleFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Ndjson => SampleFormat::Ndjson,
            InputFormat::Csv => SampleFormat::Csv,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable table
    Table,
    /// Newline-delimited JSON
    Ndjson,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn resolve_config(cli: &Cli) -> Result<TallyConfig, TallyCliError> {
    let mut config = match &cli.config {
        Some(path) => TallyConfig::load(path)?,
        None => TallyConfig::default(),
    };

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(threshold) = cli.threshold {
        config.detector.threshold = threshold;
    }
    if let Some(cooldown_ms) = cli.cooldown_ms {
        config.detector.cooldown_ms = cooldown_ms;
    }
    config.detector.validate()?;

    Ok(config)
}

fn run(cli: Cli) -> Result<(), TallyCliError> {
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Replay {
            input,
            input_format,
            events,
            commit,
            date,
        } => cmd_replay(&config, &input, input_format, events, commit, date.as_deref()),

        Commands::Status { json } => cmd_status(&config, json),

        Commands::Reset => {
            let mut session = StepSession::open(&config)?;
            session.reset()?;
            println!("Running count reset to 0");
            Ok(())
        }

        Commands::Commit { date } => {
            let date = date.as_deref().map(parse_date).transpose()?;
            let mut session = StepSession::open(&config)?;
            let count = session.running_count();
            let id = commit_session(&mut session, date)?;
            println!("Saved {} steps as record {}", count, id);
            Ok(())
        }

        Commands::History { output_format } => {
            let session = StepSession::open(&config)?;
            let records = session.history()?;
            print!("{}", format_history(&records, &output_format)?);
            Ok(())
        }

        Commands::Chart { output_format } => {
            let session = StepSession::open(&config)?;
            let series = session.chart()?;
            print!("{}", format_chart(&series, &output_format)?);
            Ok(())
        }

        Commands::Doctor { json } => cmd_doctor(&config, json),
    }
}

fn parse_date(date: &str) -> Result<NaiveDate, TallyCliError> {
    Ok(parse_record_date(date)?)
}

fn commit_session(session: &mut StepSession, date: Option<NaiveDate>) -> Result<i64, TallyCliError> {
    let id = match date {
        Some(date) => session.commit_on(date)?,
        None => session.commit()?,
    };
    Ok(id)
}

/// Open the replay input as an accelerometer. An interactive stdin has no
/// stream behind it, which is treated as a missing sensor.
fn open_source(
    input: &Path,
    format: SampleFormat,
) -> Result<Option<Box<dyn AccelerationSource>>, TallyCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Ok(None);
        }
        let reader = BufReader::new(io::stdin());
        return Ok(Some(Box::new(ReplaySource::new(reader, format))));
    }

    let file = File::open(input)?;
    Ok(Some(Box::new(ReplaySource::new(BufReader::new(file), format))))
}

fn cmd_replay(
    config: &TallyConfig,
    input: &Path,
    input_format: InputFormat,
    print_events: bool,
    commit: bool,
    date: Option<&str>,
) -> Result<(), TallyCliError> {
    // reject a bad --date before any samples move the running count
    let date = date.map(parse_date).transpose()?;
    let mut session = StepSession::open(config)?;
    let before = session.running_count();

    let source = open_source(input, input_format.into())?;
    let mut subscription = session.subscribe(source)?;
    let events: Vec<StepEvent> = subscription.pump()?;
    let running = subscription.detach()?;

    if print_events {
        for event in &events {
            println!("{}", serde_json::to_string(event)?);
        }
    }

    println!(
        "Detected {} steps (running count {} -> {})",
        events.len(),
        before,
        running
    );

    if commit {
        let id = commit_session(&mut session, date)?;
        println!("Saved {} steps as record {}", running, id);
    }

    Ok(())
}

fn cmd_status(config: &TallyConfig, json: bool) -> Result<(), TallyCliError> {
    let prefs = RunningCountStore::open(config.prefs_path())?;
    let status = StatusReport {
        running_count: prefs.load(),
        prefs_path: config.prefs_path().display().to_string(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Steps: {}", status.running_count);
    }
    Ok(())
}

fn cmd_doctor(config: &TallyConfig, json: bool) -> Result<(), TallyCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Steptally version {}", TALLY_VERSION),
    });

    checks.push(DoctorCheck {
        name: "detector".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "threshold {} / cooldown {} ms",
            config.detector.threshold, config.detector.cooldown_ms
        ),
    });

    let db_path = config.database_path();
    checks.push(match DailyStepStore::open(&db_path) {
        Ok(store) => match store.count() {
            Ok(count) => DoctorCheck {
                name: "database".to_string(),
                status: CheckStatus::Ok,
                message: format!("{} ({} records)", db_path.display(), count),
            },
            Err(e) => DoctorCheck {
                name: "database".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read {}: {}", db_path.display(), e),
            },
        },
        Err(e) => DoctorCheck {
            name: "database".to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot open {}: {}", db_path.display(), e),
        },
    });

    let prefs_path = config.prefs_path();
    checks.push(if !prefs_path.exists() {
        DoctorCheck {
            name: "running_count".to_string(),
            status: CheckStatus::Warning,
            message: "Running count file does not exist yet".to_string(),
        }
    } else {
        match RunningCountStore::open(&prefs_path) {
            Ok(prefs) => DoctorCheck {
                name: "running_count".to_string(),
                status: CheckStatus::Ok,
                message: format!("{} steps pending", prefs.load()),
            },
            Err(e) => DoctorCheck {
                name: "running_count".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        }
    });

    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: if atty::is(atty::Stream::Stdin) {
            "stdin is a TTY (no sample stream attached)".to_string()
        } else {
            "stdin is a pipe (replay from - ready)".to_string()
        },
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: TALLY_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Steptally Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(TallyCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn format_history(records: &[StepRecord], format: &OutputFormat) -> Result<String, TallyCliError> {
    match format {
        OutputFormat::Table => {
            if records.is_empty() {
                return Ok("No step history\n".to_string());
            }
            let mut out = format!("{:>6}  {:<10}  {:>8}\n", "id", "date", "steps");
            for record in records {
                out.push_str(&format!(
                    "{:>6}  {:<10}  {:>8}\n",
                    record.id, record.date, record.step_count
                ));
            }
            Ok(out)
        }
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)? + "\n"),
    }
}

fn format_chart(series: &ChartSeries, format: &OutputFormat) -> Result<String, TallyCliError> {
    match format {
        OutputFormat::Table => {
            if series.is_empty() {
                return Ok("No step history\n".to_string());
            }
            let max = series.max_steps().max(1) as f64;
            let mut out = format!("{}\n", series.title);
            for point in &series.points {
                let width = ((point.steps as f64 / max) * 40.0).round() as usize;
                out.push_str(&format!(
                    "{:>5} | {:<40} {}\n",
                    point.label,
                    "#".repeat(width),
                    point.steps
                ));
            }
            Ok(out)
        }
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for point in &series.points {
                lines.push(serde_json::to_string(point)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(series)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(series)? + "\n"),
    }
}

// Error types

#[derive(Debug)]
enum TallyCliError {
    Io(io::Error),
    Tally(TallyError),
    Store(StoreError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<io::Error> for TallyCliError {
    fn from(e: io::Error) -> Self {
        TallyCliError::Io(e)
    }
}

impl From<TallyError> for TallyCliError {
    fn from(e: TallyError) -> Self {
        match e {
            TallyError::Io(e) => TallyCliError::Io(e),
            TallyError::Store(e) => TallyCliError::Store(e),
            other => TallyCliError::Tally(other),
        }
    }
}

impl From<StoreError> for TallyCliError {
    fn from(e: StoreError) -> Self {
        TallyCliError::Store(e)
    }
}

impl From<serde_json::Error> for TallyCliError {
    fn from(e: serde_json::Error) -> Self {
        TallyCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<TallyCliError> for CliError {
    fn from(e: TallyCliError) -> Self {
        match e {
            TallyCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            TallyCliError::Store(e) => CliError {
                code: "STORE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'steptally doctor' to check the database".to_string()),
            },
            TallyCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            TallyCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            TallyCliError::Tally(e) => {
                let (code, hint) = match &e {
                    TallyError::SensorUnavailable => (
                        "SENSOR_UNAVAILABLE",
                        "Pipe a recorded stream or pass --input <file>",
                    ),
                    TallyError::InvalidSample { .. } => (
                        "INVALID_SAMPLE",
                        "Each line needs timestamp_ms, x, y and z",
                    ),
                    TallyError::Config(_) => ("CONFIG_ERROR", "Check --config and detector flags"),
                    TallyError::RunningCount { .. } => (
                        "RUNNING_COUNT_ERROR",
                        "Run 'steptally reset' to rewrite the running count file",
                    ),
                    TallyError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                    TallyError::Io(_) | TallyError::Store(_) => {
                        ("INTERNAL_ERROR", "Please report this issue")
                    }
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct StatusReport {
    running_count: u32,
    prefs_path: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> TallyConfig {
        TallyConfig {
            data_dir: dir.path().to_path_buf(),
            ..TallyConfig::default()
        }
    }

    #[test]
    fn test_replay_rejects_bad_date_before_counting() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let input = dir.path().join("walk.csv");
        std::fs::write(&input, "0,5,0,0\n450,14,0,0\n").unwrap();

        for date in ["2024-1-5", "+2024-01-01", "tomorrow"] {
            let result = cmd_replay(&config, &input, InputFormat::Csv, false, true, Some(date));
            assert!(matches!(
                result,
                Err(TallyCliError::Store(StoreError::InvalidDate(_)))
            ));
        }

        let session = StepSession::open(&config).unwrap();
        assert_eq!(session.running_count(), 0);
        assert!(session.history().unwrap().is_empty());
    }

    #[test]
    fn test_replay_commits_on_given_date() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let input = dir.path().join("walk.csv");
        std::fs::write(&input, "0,5,0,0\n450,14,0,0\n").unwrap();

        cmd_replay(&config, &input, InputFormat::Csv, false, true, Some("2024-06-03")).unwrap();

        let session = StepSession::open(&config).unwrap();
        assert_eq!(session.running_count(), 0);
        let history = session.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].step_count, 1);
        assert_eq!(history[0].date, "2024-06-03");
    }
}
