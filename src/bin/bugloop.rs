//! Bugloop CLI - run the engine against a JSON store file
//!
//! Commands:
//! - init: create a store with a fresh user
//! - diagnose: run pattern detection (respects the weekly schedule unless forced)
//! - surface: show the pattern that should be surfaced next
//! - lifecycle: run automatic lifecycle checks
//! - transition: apply a manual lifecycle transition
//! - engage: record an engagement day
//! - streak: print the current streak
//! - recommend: print recommendations for a pattern type
//! - doctor: diagnose store and configuration health

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;

use bugloop::repository::{BugRepository, UserRepository};
use bugloop::types::{PatternType, UserProfile};
use bugloop::{
    recommendations_for, BugLifecycleService, DiagnosticEngine, EngineConfig, EngineError,
    MemoryStore, StreakService, BUGLOOP_VERSION,
};

/// Bugloop - behavioral analytics and lifecycle engine
#[derive(Parser)]
#[command(name = "bugloop")]
#[command(version = BUGLOOP_VERSION)]
#[command(about = "Detect behavior patterns, drive bug lifecycles and track streaks", long_about = None)]
struct Cli {
    /// Store file (JSON)
    #[arg(short, long, global = true, default_value = "bugloop.json")]
    store: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// User id (defaults to the store's only user)
    #[arg(long, global = true)]
    user: Option<Uuid>,

    /// Reference time (RFC 3339), defaults to now
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a store with a fresh user
    Init,

    /// Run pattern detection
    Diagnose {
        /// Run even if the last run was less than a week ago
        #[arg(long)]
        force: bool,
    },

    /// Show the next pattern to surface
    Surface {
        /// Mark the surfaced pattern as viewed
        #[arg(long)]
        mark_viewed: bool,
    },

    /// Run automatic lifecycle checks
    Lifecycle,

    /// Apply a manual lifecycle transition
    Transition {
        #[arg(value_enum)]
        action: TransitionAction,

        /// Bug id or slug
        bug: String,
    },

    /// Record an engagement day
    Engage {
        /// Calendar day (YYYY-MM-DD), defaults to the reference time's UTC day
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Print the current streak
    Streak,

    /// Print recommendations for a pattern type
    Recommend {
        #[arg(value_enum)]
        pattern_type: PatternArg,
    },

    /// Diagnose store and configuration health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TransitionAction {
    Activate,
    Resolve,
    Reactivate,
    Deactivate,
}

#[derive(Clone, Copy, ValueEnum)]
enum PatternArg {
    Avoidance,
    TemporalCrash,
    ContextualSpike,
    CorrelatedBugs,
    Plateau,
    Regression,
    Improvement,
}

impl From<PatternArg> for PatternType {
    fn from(arg: PatternArg) -> Self {
        match arg {
            PatternArg::Avoidance => PatternType::Avoidance,
            PatternArg::TemporalCrash => PatternType::TemporalCrash,
            PatternArg::ContextualSpike => PatternType::ContextualSpike,
            PatternArg::CorrelatedBugs => PatternType::CorrelatedBugs,
            PatternArg::Plateau => PatternType::Plateau,
            PatternArg::Regression => PatternType::Regression,
            PatternArg::Improvement => PatternType::Improvement,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), BugloopCliError> {
    let now = cli.now.unwrap_or_else(Utc::now);

    if let Commands::Doctor { json } = cli.command {
        return cmd_doctor(&cli.store, cli.config.as_deref(), json);
    }
    if let Commands::Recommend { pattern_type } = cli.command {
        return print_json(&recommendations_for(pattern_type.into()));
    }
    if let Commands::Init = cli.command {
        return cmd_init(&cli.store);
    }

    let config = load_config(cli.config.as_deref())?;
    let store = load_store(&cli.store)?;
    let user_id = resolve_user(&store, cli.user)?;

    match cli.command {
        Commands::Diagnose { force } => {
            let engine = DiagnosticEngine::with_config(&store, &store, &store, &store, config)?;
            if !force && !engine.should_run_diagnostics_at(user_id, now)? {
                return print_json(&Vec::<bugloop::types::DetectedPattern>::new());
            }
            let found = engine.run_diagnostics_at(user_id, now)?;
            save_store(&store, &cli.store)?;
            print_json(&found)
        }

        Commands::Surface { mark_viewed } => {
            let engine = DiagnosticEngine::with_config(&store, &store, &store, &store, config)?;
            let pattern = engine.get_pattern_to_surface(user_id)?;
            if let (true, Some(p)) = (mark_viewed, &pattern) {
                engine.mark_pattern_viewed_at(p.id, now)?;
                save_store(&store, &cli.store)?;
            }
            let surfaced = pattern.map(|p| SurfacedPattern {
                recommendations: p.recommendations(),
                pattern: p,
            });
            print_json(&surfaced)
        }

        Commands::Lifecycle => {
            let service = BugLifecycleService::with_config(&store, &store, &store, &store, config)?;
            let transitions = service.run_lifecycle_checks_at(user_id, now)?;
            save_store(&store, &cli.store)?;
            print_json(&transitions)
        }

        Commands::Transition { action, bug } => {
            let service = BugLifecycleService::with_config(&store, &store, &store, &store, config)?;
            let bug_id = resolve_bug(&store, &bug)?;
            let applied = match action {
                TransitionAction::Activate => service.activate_at(bug_id, now)?,
                TransitionAction::Resolve => service.resolve_at(bug_id, now)?,
                TransitionAction::Reactivate => service.reactivate_at(bug_id, now)?,
                TransitionAction::Deactivate => service.deactivate_at(bug_id, now)?,
            };
            save_store(&store, &cli.store)?;
            print_json(&serde_json::json!({ "bug_id": bug_id, "applied": applied }))
        }

        Commands::Engage { date } => {
            let service = StreakService::with_config(&store, config)?;
            let day = date.unwrap_or_else(|| now.date_naive());
            let info = service.record_engagement_on(user_id, day)?;
            save_store(&store, &cli.store)?;
            print_json(&info)
        }

        Commands::Streak => {
            let service = StreakService::with_config(&store, config)?;
            print_json(&service.get_streak_info(user_id)?)
        }

        Commands::Init | Commands::Recommend { .. } | Commands::Doctor { .. } => Ok(()),
    }
}

fn cmd_init(path: &Path) -> Result<(), BugloopCliError> {
    if path.exists() {
        return Err(BugloopCliError::StoreExists(path.display().to_string()));
    }
    let store = MemoryStore::new();
    let user = UserProfile::new(Uuid::new_v4());
    store.insert_user(user.clone())?;
    save_store(&store, path)?;
    print_json(&serde_json::json!({ "user_id": user.id }))
}

fn cmd_doctor(
    store_path: &Path,
    config_path: Option<&Path>,
    json: bool,
) -> Result<(), BugloopCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Bugloop version {}", BUGLOOP_VERSION),
    });

    match load_store(store_path) {
        Ok(store) => {
            let users = UserRepository::get(&store).ok().flatten();
            let bugs = store.get_all().map(|b| b.len()).unwrap_or(0);
            checks.push(DoctorCheck {
                name: "store".to_string(),
                status: if users.is_some() {
                    CheckStatus::Ok
                } else {
                    CheckStatus::Warning
                },
                message: match users {
                    Some(u) => format!("Store valid (user {}, {} bugs)", u.id, bugs),
                    None => "Store valid but has no user; run 'bugloop init'".to_string(),
                },
            });
        }
        Err(e) => checks.push(DoctorCheck {
            name: "store".to_string(),
            status: CheckStatus::Error,
            message: CliError::from(e).message,
        }),
    }

    if let Some(path) = config_path {
        checks.push(match load_config(Some(path)) {
            Ok(_) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: "Configuration valid".to_string(),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            },
        });
    }

    let report = DoctorReport {
        version: BUGLOOP_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Bugloop Doctor Report");
        println!("=====================");
        println!("Version: {}", report.version);
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
        Err(BugloopCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn load_config(path: Option<&Path>) -> Result<EngineConfig, BugloopCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn load_store(path: &Path) -> Result<MemoryStore, BugloopCliError> {
    if !path.exists() {
        return Err(BugloopCliError::NoStore(path.display().to_string()));
    }
    Ok(MemoryStore::from_json(&fs::read_to_string(path)?)?)
}

fn save_store(store: &MemoryStore, path: &Path) -> Result<(), BugloopCliError> {
    fs::write(path, store.to_json()?)?;
    Ok(())
}

fn resolve_user(store: &MemoryStore, user: Option<Uuid>) -> Result<Uuid, BugloopCliError> {
    let profile = match user {
        Some(id) => UserRepository::get_by_id(store, id)?,
        None => UserRepository::get(store)?,
    };
    profile.map(|u| u.id).ok_or(BugloopCliError::NoUser)
}

fn resolve_bug(store: &MemoryStore, key: &str) -> Result<Uuid, BugloopCliError> {
    if let Ok(id) = key.parse::<Uuid>() {
        return Ok(id);
    }
    store
        .get_all()?
        .into_iter()
        .find(|b| b.slug == key)
        .map(|b| b.id)
        .ok_or_else(|| BugloopCliError::UnknownBug(key.to_string()))
}

/// Pretty output for terminals, compact for pipes
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), BugloopCliError> {
    let out = if atty::is(atty::Stream::Stdout) {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

// Error types

#[derive(Debug)]
enum BugloopCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    NoStore(String),
    StoreExists(String),
    NoUser,
    UnknownBug(String),
    DoctorFailed,
}

impl From<io::Error> for BugloopCliError {
    fn from(e: io::Error) -> Self {
        BugloopCliError::Io(e)
    }
}

impl From<EngineError> for BugloopCliError {
    fn from(e: EngineError) -> Self {
        BugloopCliError::Engine(e)
    }
}

impl From<serde_json::Error> for BugloopCliError {
    fn from(e: serde_json::Error) -> Self {
        BugloopCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BugloopCliError> for CliError {
    fn from(e: BugloopCliError) -> Self {
        match e {
            BugloopCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BugloopCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the store and configuration files".to_string()),
            },
            BugloopCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            BugloopCliError::NoStore(path) => CliError {
                code: "NO_STORE".to_string(),
                message: format!("Store file not found: {}", path),
                hint: Some("Run 'bugloop init' first".to_string()),
            },
            BugloopCliError::StoreExists(path) => CliError {
                code: "STORE_EXISTS".to_string(),
                message: format!("Store file already exists: {}", path),
                hint: Some("Choose another path with --store".to_string()),
            },
            BugloopCliError::NoUser => CliError {
                code: "NO_USER".to_string(),
                message: "No matching user in store".to_string(),
                hint: Some("Pass --user or run 'bugloop init'".to_string()),
            },
            BugloopCliError::UnknownBug(key) => CliError {
                code: "UNKNOWN_BUG".to_string(),
                message: format!("No bug with slug '{}'", key),
                hint: Some("Use the bug id or an existing slug".to_string()),
            },
            BugloopCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct SurfacedPattern {
    pattern: bugloop::types::DetectedPattern,
    recommendations: &'static [bugloop::Recommendation],
}

#[derive(Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
