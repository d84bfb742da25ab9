//! Coursebook CLI - a terminal front end for a learning-management backend.
//!
//! Track courses, notes, todos and curriculums from the shell. The session
//! layer in `coursebook-core` refreshes expired credentials transparently;
//! `coursebook session` watches the expiry deadline and offers to extend it.

mod app;
mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use coursebook_core::config::Config;
use coursebook_core::models::{CourseStatus, Priority, TodoStatus};

// ============================================================================
// Constants
// ============================================================================

/// Log file prefix inside `<cache_dir>/logs`
const LOG_FILE_PREFIX: &str = "coursebook.log";

#[derive(Parser)]
#[command(name = "coursebook")]
#[command(about = "Coursebook - courses, notes and todos from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account and log in
    Register {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// End the session and forget stored credentials
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Watch the session expiry and offer to extend it
    Session,
    /// Courses you are taking
    Courses {
        #[command(subcommand)]
        action: CourseAction,
    },
    /// Study notes
    Notes {
        #[command(subcommand)]
        action: NoteAction,
    },
    /// Study todos
    Todos {
        #[command(subcommand)]
        action: TodoAction,
    },
    /// Ordered study plans
    Curriculums {
        #[command(subcommand)]
        action: CurriculumAction,
    },
    /// Course categories
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Note attachments
    Files {
        #[command(subcommand)]
        action: FileAction,
    },
}

#[derive(Subcommand)]
pub enum CourseAction {
    List {
        /// Bypass the local cache
        #[arg(long)]
        refresh: bool,
    },
    Show {
        id: i64,
    },
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Set progress (0-100)
    Progress {
        id: i64,
        percent: u8,
    },
    /// Set status: not_started, in_progress, completed
    Status {
        id: i64,
        status: CourseStatus,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum NoteAction {
    List {
        #[arg(long)]
        course: Option<i64>,
        #[arg(long)]
        refresh: bool,
    },
    Show {
        id: i64,
    },
    Add {
        title: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        course: Option<i64>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum TodoAction {
    List {
        #[arg(long)]
        status: Option<TodoStatus>,
        #[arg(long)]
        refresh: bool,
    },
    Add {
        title: String,
        #[arg(long)]
        priority: Option<Priority>,
        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        course: Option<i64>,
    },
    /// Set status: pending, in_progress, completed
    Status {
        id: i64,
        status: TodoStatus,
    },
    /// Mark completed
    Done {
        id: i64,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum CurriculumAction {
    List {
        #[arg(long)]
        refresh: bool,
    },
    Add {
        title: String,
        #[arg(long)]
        goal: Option<String>,
    },
    AddCourse {
        id: i64,
        course: i64,
    },
    RemoveCourse {
        id: i64,
        course: i64,
    },
    /// Reorder courses, e.g. `reorder 2 5 3 1`
    Reorder {
        id: i64,
        #[arg(required = true)]
        courses: Vec<i64>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum CategoryAction {
    List {
        #[arg(long)]
        refresh: bool,
    },
    Add {
        name: String,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum FileAction {
    List {
        note: i64,
    },
    Upload {
        note: i64,
        path: PathBuf,
    },
    Delete {
        id: i64,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). Events also go to a daily
/// log file when a log directory is available; the returned guard flushes it.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    let _log_guard = init_tracing(config.cache_dir().ok().map(|dir| dir.join("logs")));
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!(api = %config.api_url(), mode = ?config.credential_mode, "Coursebook starting");

    let mut app = App::new(config)?;

    let result = match cli.command {
        Commands::Login { email } => commands::account::login(&mut app, email).await,
        Commands::Register { email, name } => commands::account::register(&mut app, email, name).await,
        Commands::Logout => commands::account::logout(&mut app).await,
        Commands::Whoami => commands::account::whoami(&mut app).await,
        Commands::Session => commands::session::watch(&mut app).await,
        Commands::Courses { action } => commands::resources::courses(&mut app, action).await,
        Commands::Notes { action } => commands::resources::notes(&mut app, action).await,
        Commands::Todos { action } => commands::resources::todos(&mut app, action).await,
        Commands::Curriculums { action } => commands::resources::curriculums(&mut app, action).await,
        Commands::Categories { action } => commands::resources::categories(&mut app, action).await,
        Commands::Files { action } => commands::resources::files(&mut app, action).await,
    };

    // Bearer mode rotates the refresh credential on every refresh
    app.persist_tokens();
    result
}
