use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgGroup, Args, Parser, Subcommand};
use riskcheck_catalog::{AppConfig, LoggingConfig, QuestionCatalog};
use riskcheck_core::{CheckStatus, CheckType, NewCompany, QuestionResponse};
use riskcheck_probe::{
    DiagnosticEntry, ProbeCommand, ProbeDefinition, ProbeSet, ScanConfig, default_probes,
    run_environment_diagnostics, run_scan,
};
use riskcheck_sqlite::{AssessmentStore, Migration, ScanResultStore, check_health};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

mod render;

const DEFAULT_CONFIG_FILE: &str = "riskcheck.yml";
const LOG_FILE: &str = "riskcheck.log";
const ERROR_LOG_FILE: &str = "error.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliOutputFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "riskcheck", version)]
#[command(about = "Security self-assessment questionnaire and local system scan")]
struct Cli {
    /// Configuration file (default: ./riskcheck.yml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Database file, overriding `database.path` from the configuration.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    format: CliOutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Database schema operations.
    Migrate(MigrateArgs),
    /// Register or list companies.
    Company(CompanyArgs),
    /// Seed or list questionnaire questions.
    Questions(QuestionsArgs),
    /// Start an assessment.
    Assessment(AssessmentArgs),
    /// Record an answer to one question.
    Answer(AnswerArgs),
    /// Run the system scan and store its results for an assessment.
    #[command(visible_alias = "retry")]
    Scan(ScanArgs),
    /// Show the most recent stored scan.
    Status(StatusArgs),
    /// Recompute the risk score and show assessment results.
    Results(ResultsArgs),
    /// Check the shell, administrative rights, disk and database.
    Diagnose,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[command(subcommand)]
    operation: MigrateOperation,
}

#[derive(Debug, Subcommand)]
enum MigrateOperation {
    /// Create tables in the database.
    Up,
    /// Drop all tables from the database.
    Down,
    /// Show table status and row counts.
    Status,
}

#[derive(Debug, Args)]
struct CompanyArgs {
    #[command(subcommand)]
    operation: CompanyOperation,
}

#[derive(Debug, Subcommand)]
enum CompanyOperation {
    /// Register a company.
    Add {
        name: String,
        #[arg(long)]
        industry: Option<String>,
        #[arg(long)]
        size: Option<String>,
    },
    /// List registered companies.
    List,
}

#[derive(Debug, Args)]
struct QuestionsArgs {
    #[command(subcommand)]
    operation: QuestionsOperation,
}

#[derive(Debug, Subcommand)]
enum QuestionsOperation {
    /// Store the questionnaire (bundled unless --file is given).
    Seed {
        /// YAML question catalog.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List stored questions by category.
    List,
}

#[derive(Debug, Args)]
struct AssessmentArgs {
    #[command(subcommand)]
    operation: AssessmentOperation,
}

#[derive(Debug, Subcommand)]
enum AssessmentOperation {
    /// Start a new assessment for a company.
    Start {
        #[arg(long)]
        company: i64,
    },
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("reply").required(true).args(["yes", "no"])))]
struct AnswerArgs {
    #[arg(long)]
    assessment: i64,
    #[arg(long)]
    question: i64,
    #[arg(long)]
    yes: bool,
    #[arg(long)]
    no: bool,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Debug, Args)]
struct ScanArgs {
    #[arg(long)]
    assessment: i64,
    /// Comma-separated checks to run instead of `scan.checks`.
    #[arg(long, value_delimiter = ',')]
    checks: Option<Vec<CheckType>>,
}

#[derive(Debug, Args)]
struct StatusArgs {
    /// Only consider scans stored for this assessment.
    #[arg(long)]
    assessment: Option<i64>,
}

#[derive(Debug, Args)]
struct ResultsArgs {
    #[arg(long)]
    assessment: i64,
}

/// Resolved configuration shared by every subcommand.
struct Context {
    config: AppConfig,
    db_path: PathBuf,
    format: CliOutputFormat,
}

fn main() {
    let cli = Cli::parse();

    let result = load_context(&cli).and_then(|ctx| {
        // Dropping the guards flushes the log files.
        let _log_guards = init_logging(&ctx.config.logging)?;
        let result = match cli.command {
            Command::Migrate(args) => run_migrate(&ctx, args),
            Command::Company(args) => run_company(&ctx, args),
            Command::Questions(args) => run_questions(&ctx, args),
            Command::Assessment(args) => run_assessment(&ctx, args),
            Command::Answer(args) => run_answer(&ctx, args),
            Command::Scan(args) => run_scan_command(&ctx, args),
            Command::Status(args) => run_status(&ctx, args),
            Command::Results(args) => run_results(&ctx, args),
            Command::Diagnose => run_diagnose(&ctx),
        };
        if let Err(err) = &result {
            error!(error = %err, "Command failed");
        }
        result
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn load_context(cli: &Cli) -> Result<Context, String> {
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        None => AppConfig::load_or_default(DEFAULT_CONFIG_FILE)
            .map_err(|e| format!("Failed to load config '{DEFAULT_CONFIG_FILE}': {e}"))?,
    };
    config.validate().map_err(|e| e.to_string())?;

    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| config.database.path.clone());
    Ok(Context {
        config,
        db_path,
        format: cli.format,
    })
}

/// Logs go to stderr; `RUST_LOG` wins over `logging.filter`.
/// Installs the stderr subscriber, plus `riskcheck.log` and an error-only
/// `error.log` when `logging.directory` is set.
///
/// The returned guards must be held until the command finishes.
fn init_logging(config: &LoggingConfig) -> Result<Vec<WorkerGuard>, String> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let mut guards = Vec::new();

    let (file_layer, error_layer) = match &config.directory {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|err| {
                format!("Failed to create log directory '{}': {err}", dir.display())
            })?;
            let (all, guard) = tracing_appender::non_blocking(log_appender(dir, LOG_FILE)?);
            guards.push(guard);
            let (errors, guard) = tracing_appender::non_blocking(log_appender(dir, ERROR_LOG_FILE)?);
            guards.push(guard);
            (
                Some(fmt::layer().with_writer(all).with_ansi(false)),
                Some(
                    fmt::layer()
                        .with_writer(errors)
                        .with_ansi(false)
                        .with_filter(LevelFilter::ERROR),
                ),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .with(error_layer)
        .init();
    Ok(guards)
}

fn log_appender(dir: &Path, file_name: &str) -> Result<RollingFileAppender, String> {
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|err| format!("Failed to open log file '{}': {err}", dir.join(file_name).display()))
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

fn open_connection(path: &Path) -> Result<Connection, String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!("Failed to create directory '{}': {err}", parent.display())
            })?;
        }
    }
    Connection::open(path)
        .map_err(|e| format!("Failed to open database '{}': {e}", path.display()))
}

/// Opens the database and brings the schema up to date.
fn open_database(path: &Path) -> Result<Connection, String> {
    let mut migration = Migration::new(open_connection(path)?)
        .map_err(|e| format!("Failed to initialize migration: {e}"))?;
    migration
        .up()
        .map_err(|e| format!("Migration up failed: {e}"))?;
    Ok(migration.into_connection())
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn run_migrate(ctx: &Context, args: MigrateArgs) -> Result<(), String> {
    let mut migration = Migration::new(open_connection(&ctx.db_path)?)
        .map_err(|e| format!("Failed to initialize migration: {e}"))?;
    match args.operation {
        MigrateOperation::Up => {
            migration
                .up()
                .map_err(|e| format!("Migration up failed: {e}"))?;
            println!("Migration up complete in '{}'.", ctx.db_path.display());
        }
        MigrateOperation::Down => {
            migration
                .down()
                .map_err(|e| format!("Migration down failed: {e}"))?;
            println!("Migration down complete in '{}'.", ctx.db_path.display());
        }
        MigrateOperation::Status => {
            let status = migration
                .status()
                .map_err(|e| format!("Failed to get migration status: {e}"))?;
            emit(ctx.format, &status, render::migration_status)?;
        }
    }
    Ok(())
}

fn run_company(ctx: &Context, args: CompanyArgs) -> Result<(), String> {
    let conn = open_database(&ctx.db_path)?;
    let store = AssessmentStore::new(&conn);
    match args.operation {
        CompanyOperation::Add {
            name,
            industry,
            size,
        } => {
            let company = store
                .create_company(&NewCompany {
                    name,
                    industry,
                    size,
                })
                .map_err(|e| format!("Failed to create company: {e}"))?;
            emit(ctx.format, &company, |c| {
                format!("Created company {}: {}\n", c.id, c.name)
            })
        }
        CompanyOperation::List => {
            let companies = store
                .companies()
                .map_err(|e| format!("Failed to list companies: {e}"))?;
            emit(ctx.format, &companies, |c| render::companies(c))
        }
    }
}

fn run_questions(ctx: &Context, args: QuestionsArgs) -> Result<(), String> {
    let conn = open_database(&ctx.db_path)?;
    let store = AssessmentStore::new(&conn);
    match args.operation {
        QuestionsOperation::Seed { file } => {
            let catalog = match &file {
                Some(path) => QuestionCatalog::load(path).map_err(|e| {
                    format!("Failed to load question catalog '{}': {e}", path.display())
                })?,
                None => QuestionCatalog::bundled()
                    .map_err(|e| format!("Bundled question catalog is invalid: {e}"))?,
            };
            let report = store
                .seed_questions(&catalog.to_new_questions())
                .map_err(|e| format!("Seed failed: {e}"))?;
            emit(ctx.format, &report, render::seed_report)
        }
        QuestionsOperation::List => {
            let questions = store
                .questions()
                .map_err(|e| format!("Failed to list questions: {e}"))?;
            emit(ctx.format, &questions, |q| render::questions(q))
        }
    }
}

fn run_assessment(ctx: &Context, args: AssessmentArgs) -> Result<(), String> {
    let conn = open_database(&ctx.db_path)?;
    let store = AssessmentStore::new(&conn);
    match args.operation {
        AssessmentOperation::Start { company } => {
            let assessment = store
                .create_assessment(company)
                .map_err(|e| format!("Failed to start assessment: {e}"))?;
            emit(ctx.format, &assessment, |a| {
                format!(
                    "Started assessment {} for company {}\n",
                    a.id(),
                    a.company_id()
                )
            })
        }
    }
}

fn run_answer(ctx: &Context, args: AnswerArgs) -> Result<(), String> {
    let conn = open_database(&ctx.db_path)?;
    let store = AssessmentStore::new(&conn);
    let question = store
        .question(args.question)
        .map_err(|e| format!("Failed to load question: {e}"))?
        .ok_or_else(|| format!("question {} not found", args.question))?;

    let mut response = QuestionResponse::new(&question, args.yes);
    if let Some(notes) = args.notes {
        response = response.with_notes(notes);
    }
    store
        .save_response(args.assessment, &response)
        .map_err(|e| format!("Failed to save answer: {e}"))?;
    emit(ctx.format, &response, |r| {
        format!(
            "Recorded \"{}\" for question {}\n",
            if r.answer { "yes" } else { "no" },
            r.question_id
        )
    })
}

fn run_scan_command(ctx: &Context, args: ScanArgs) -> Result<(), String> {
    let conn = open_database(&ctx.db_path)?;
    let checks = args.checks.unwrap_or_else(|| ctx.config.scan.checks.clone());
    let probes = build_probe_set(&ctx.config, &checks)?;
    let scan_config = ScanConfig {
        probe_timeout: ctx.config.probe_timeout(),
        global_timeout: ctx.config.global_timeout(),
    };

    let run = run_scan(&probes, &scan_config);
    emit(ctx.format, &run.report, render::scan_report)?;

    ScanResultStore::new(&conn)
        .persist_with_raw(args.assessment, &run.report, &run.raw_outcomes)
        .map_err(|e| {
            format!(
                "Failed to save scan results for assessment {}: {e}; run `riskcheck retry --assessment {}` to scan again",
                args.assessment, args.assessment
            )
        })?;
    info!(
        scan_id = run.report.scan_id(),
        assessment_id = args.assessment,
        "scan stored"
    );
    Ok(())
}

/// Default probes with configured overrides, restricted to `checks`.
fn build_probe_set(config: &AppConfig, checks: &[CheckType]) -> Result<ProbeSet, String> {
    let overrides = config.probe_overrides().map_err(|e| e.to_string())?;
    let probes = overrides
        .into_iter()
        .fold(default_probes(), |probes, (check, probe)| {
            let mut definition = ProbeDefinition::new(
                check,
                ProbeCommand::new(probe.program.as_str(), probe.args.iter()),
            );
            if let Some(timeout) = probe.timeout() {
                definition = definition.with_timeout(timeout);
            }
            probes.with_override(definition)
        });
    probes
        .retain_checks(checks)
        .map_err(|e| format!("Invalid check selection: {e}"))
}

fn run_status(ctx: &Context, args: StatusArgs) -> Result<(), String> {
    let conn = open_database(&ctx.db_path)?;
    let store = ScanResultStore::new(&conn);
    let latest = match args.assessment {
        Some(id) => store.latest_scan_for_assessment(id),
        None => store.latest_scan(),
    }
    .map_err(|e| format!("Failed to load scan results: {e}"))?;

    emit(ctx.format, &latest, |report| match report {
        Some(report) => render::scan_report(report),
        None => "No scan has been stored yet.\n".to_string(),
    })
}

fn run_results(ctx: &Context, args: ResultsArgs) -> Result<(), String> {
    let conn = open_database(&ctx.db_path)?;
    let store = AssessmentStore::new(&conn);
    let assessment = store
        .assessment(args.assessment)
        .map_err(|e| format!("Failed to load assessment: {e}"))?
        .ok_or_else(|| format!("assessment {} not found", args.assessment))?;
    store
        .save_assessment(&assessment)
        .map_err(|e| format!("Failed to save assessment: {e}"))?;
    let results = store
        .assessment_results(args.assessment)
        .map_err(|e| format!("Failed to load assessment results: {e}"))?;
    emit(ctx.format, &results, render::assessment_results)
}

fn run_diagnose(ctx: &Context) -> Result<(), String> {
    let data_dir = match ctx.db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut entries = run_environment_diagnostics(&data_dir, ctx.config.probe_timeout());
    entries.push(database_diagnostic(&ctx.db_path));
    emit(ctx.format, &entries, |e| render::diagnostics(e))
}

fn database_diagnostic(path: &Path) -> DiagnosticEntry {
    let health = open_connection(path)
        .and_then(|conn| check_health(&conn).map_err(|e| e.to_string()));
    match health {
        Ok(health) => {
            let (status, message) = if health.is_healthy() {
                (CheckStatus::Success, "Database is ready".to_string())
            } else if !health.writable {
                (
                    CheckStatus::Error,
                    format!(
                        "Database is not writable: {}",
                        health.write_error.as_deref().unwrap_or("unknown error")
                    ),
                )
            } else {
                (
                    CheckStatus::Warning,
                    format!(
                        "Database is missing tables ({}); run `riskcheck migrate up`",
                        health.missing_tables.join(", ")
                    ),
                )
            };
            let entry = DiagnosticEntry::new("database", status, message);
            match serde_json::to_value(&health) {
                Ok(details) => entry.with_details(details),
                Err(_) => entry,
            }
        }
        Err(e) => {
            warn!(error = %e, "database diagnostic failed");
            DiagnosticEntry::new("database", CheckStatus::Error, e)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Prints `value` in the requested format; `text` renders the text form.
fn emit<T, F>(format: CliOutputFormat, value: &T, text: F) -> Result<(), String>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    match format {
        CliOutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)
                .map_err(|e| format!("JSON serialization failed: {e}"))?;
            println!("{json}");
        }
        CliOutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(value)
                .map_err(|e| format!("YAML serialization failed: {e}"))?;
            print!("{yaml}");
        }
        CliOutputFormat::Text => print!("{}", text(value)),
    }
    Ok(())
}
