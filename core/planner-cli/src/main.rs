//! planner: command-line client for the course planner.
//!
//! Every invocation rehydrates the signed-in identity and session from the
//! state directory (`~/.course-planner` by default), runs one command against
//! the API and persists whatever changed.
//!
//! ## Subcommands
//!
//! - `register`, `login`, `confirm`, `logout`, `whoami`: identity
//! - `session`: probe, extend or end the held session
//! - `courses`, `sections`, `schedules`: catalog and schedule management
//! - `filters`: server-side tag filtering and suggestions

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use planner_core::{ClientConfig, PlannerClient, StorageConfig};
use planner_protocol::SuggestionVariant;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "planner")]
#[command(about = "Course planner client")]
#[command(version)]
struct Cli {
    /// State directory holding credentials, config.toml and logs
    #[arg(long, global = true, env = "PLANNER_STATE_DIR", value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// API base URL (overrides config.toml and PLANNER_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in as it
    Register {
        #[arg(long)]
        username: String,

        #[arg(long, env = "PLANNER_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, default_value = "")]
        email: String,
    },

    /// Sign in and adopt the returned session
    Login {
        #[arg(long)]
        username: String,

        #[arg(long, env = "PLANNER_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Confirm an email address with the emailed token
    Confirm {
        #[arg(long)]
        username: String,

        #[arg(long)]
        token: String,
    },

    /// End the session and forget the identity
    Logout,

    /// Show the signed-in identity and session
    Whoami,

    /// Session lifecycle
    #[command(subcommand)]
    Session(SessionCommand),

    /// Course catalog
    #[command(subcommand)]
    Courses(CourseCommand),

    /// Course sections
    #[command(subcommand)]
    Sections(SectionCommand),

    /// Your schedules
    #[command(subcommand)]
    Schedules(ScheduleCommand),

    /// Tag-based course filtering
    #[command(subcommand)]
    Filters(FilterCommand),
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Check the held session with the server (clears it if invalid)
    Probe,
    /// Rotate the session id and restart its validity window
    Extend,
    /// End the held session
    End,
    /// Expire every session on the server
    ExpireAll,
}

#[derive(Subcommand)]
enum CourseCommand {
    /// List all courses
    List {
        /// Only courses in this department
        #[arg(long)]
        department: Option<String>,

        /// Group the output by department
        #[arg(long, conflicts_with = "department")]
        grouped: bool,
    },
    /// Look up one course
    Show {
        #[arg(value_name = "COURSE_ID")]
        id: String,
    },
    /// Create a course
    Create {
        #[arg(long)]
        id: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        department: String,
    },
}

#[derive(Subcommand)]
enum SectionCommand {
    /// List all sections
    List {
        /// Only sections of this course
        #[arg(long)]
        course: Option<String>,

        /// Group the output by course
        #[arg(long, conflicts_with = "course")]
        grouped: bool,
    },
    /// Look up one section
    Show {
        #[arg(value_name = "SECTION_ID")]
        id: String,
    },
    /// Create a section
    Create {
        #[arg(long)]
        course: String,

        #[arg(long)]
        number: String,

        #[arg(long)]
        instructor: String,

        #[arg(long)]
        capacity: u32,

        /// JSON array of {"days", "startTime", "endTime", "location"}
        #[arg(long, default_value = "[]")]
        time_slots: String,

        #[arg(long)]
        distribution: Option<String>,
    },
    /// Change fields of a section
    Edit {
        #[arg(value_name = "SECTION_ID")]
        id: String,

        #[arg(long)]
        number: Option<String>,

        #[arg(long)]
        instructor: Option<String>,

        #[arg(long)]
        capacity: Option<u32>,

        /// JSON array of {"days", "startTime", "endTime", "location"}
        #[arg(long)]
        time_slots: Option<String>,

        #[arg(long)]
        distribution: Option<String>,
    },
}

#[derive(Subcommand)]
enum ScheduleCommand {
    /// List every schedule the server returns
    List,
    /// List schedules owned by the signed-in user
    Mine,
    /// Create an empty schedule
    Create {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Delete a schedule
    Delete {
        #[arg(value_name = "SCHEDULE_ID")]
        id: String,
    },
    /// Copy a schedule under a new name
    Duplicate {
        #[arg(value_name = "SCHEDULE_ID")]
        id: String,

        #[arg(value_name = "NEW_NAME")]
        new_name: String,
    },
    /// Link a section to a schedule
    AddSection {
        #[arg(value_name = "SCHEDULE_ID")]
        schedule: String,

        #[arg(value_name = "SECTION_ID")]
        section: String,
    },
    /// Unlink a section from a schedule
    RemoveSection {
        #[arg(value_name = "SCHEDULE_ID")]
        schedule: String,

        #[arg(value_name = "SECTION_ID")]
        section: String,
    },
}

#[derive(Subcommand)]
enum FilterCommand {
    /// Courses matching the active tags
    Courses {
        #[arg(long)]
        tag: Option<String>,

        #[arg(long, conflicts_with = "tag")]
        category: Option<String>,
    },
    /// Active tags (or, with --available, tags present on filtered courses)
    Tags {
        #[arg(long)]
        available: bool,
    },
    /// Activate a tag
    AddTag {
        #[arg(value_name = "TAG_ID")]
        id: String,

        #[arg(value_name = "CATEGORY")]
        category: String,
    },
    /// Deactivate a tag
    RemoveTag {
        #[arg(value_name = "TAG_ID")]
        id: String,

        #[arg(value_name = "CATEGORY")]
        category: String,
    },
    /// Deactivate every tag
    Clear,
    /// Search filtered courses by title, course code or professor
    Search {
        #[arg(value_name = "QUERY")]
        query: String,
    },
    /// Suggest alternatives to a filtered course
    Suggest {
        /// Course code and section, e.g. "CS 111-01"
        #[arg(value_name = "COURSE_KEY")]
        key: String,

        /// base, time-focused or topic-focused
        #[arg(long, default_value = "base")]
        variant: SuggestionVariant,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let storage = cli
        .state_dir
        .clone()
        .map(StorageConfig::with_root)
        .unwrap_or_default();
    let _logging_guard = logging::init(&storage);

    if let Err(e) = run(cli, storage).await {
        tracing::error!(error = %e, "planner command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, storage: StorageConfig) -> Result<(), String> {
    let mut config = ClientConfig::load(&storage)?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    let client = PlannerClient::open_with_config(storage, config)?;
    client.initialize();

    commands::dispatch(&client, cli.command).await
}
