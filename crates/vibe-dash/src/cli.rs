//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vibe",
    version,
    about = "Track AI-assisted coding projects: methodology, stage, and activity"
)]
pub struct Cli {
    /// Storage root (default: ~/.vibe-dash)
    #[arg(long, global = true, env = "VIBE_DASH_HOME")]
    pub config_dir: Option<PathBuf>,

    /// Debug logging unless VIBE_DASH_LOG or RUST_LOG says otherwise
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start tracking a project directory
    Add(AddOpts),
    /// Stop tracking a project and remove its stored state
    Remove(Target),
    /// List tracked projects
    List(ListOpts),
    /// Show one project in detail
    Status(StatusOpts),
    /// Set or clear a project's display name
    Rename(RenameOpts),
    /// Mark or unmark a project as favorite
    Favorite(FavoriteOpts),
    /// Replace a project's notes (no text clears them)
    Note(NoteOpts),
    /// Hibernate a project
    Hibernate(Target),
    /// Wake a hibernated project
    Activate(Target),
    /// Re-run detection for every project
    Refresh,
    /// Exit 0 if the project is tracked, 2 otherwise; prints nothing
    Exists(Target),
    /// Per-project configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Delete a project's state database and re-detect it
    Reset(ResetOpts),
    /// Watch every project for activity until interrupted
    Watch,
}

/// A project by id, name, display name, or path.
#[derive(Args)]
pub struct Target {
    pub project: String,
}

#[derive(Args)]
pub struct AddOpts {
    /// Directory to track
    pub path: String,

    /// Display name
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct ListOpts {
    /// Machine-readable output
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct StatusOpts {
    pub project: String,

    /// Machine-readable output
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct RenameOpts {
    pub project: String,

    /// New display name
    #[arg(required_unless_present = "clear", conflicts_with = "clear")]
    pub name: Option<String>,

    /// Remove the display name
    #[arg(long)]
    pub clear: bool,
}

#[derive(Args)]
pub struct FavoriteOpts {
    pub project: String,

    /// Unmark instead of mark
    #[arg(long, conflicts_with = "toggle")]
    pub off: bool,

    /// Flip the current value
    #[arg(long)]
    pub toggle: bool,
}

#[derive(Args)]
pub struct NoteOpts {
    pub project: String,

    /// Note text; words are joined with spaces
    #[arg(trailing_var_arg = true)]
    pub text: Vec<String>,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Set hibernation-days or waiting-threshold for a project
    Set(ConfigSetOpts),
}

#[derive(Args)]
pub struct ConfigSetOpts {
    pub project: String,
    /// hibernation-days | waiting-threshold
    pub key: String,
    /// Non-negative integer; 0 disables
    #[arg(allow_hyphen_values = true)]
    pub value: String,
}

#[derive(Args)]
pub struct ResetOpts {
    pub project: String,

    /// Required: the state database is deleted
    #[arg(long)]
    pub confirm: bool,
}

impl Command {
    /// Long-running verbs log at info by default, one-shot verbs at warn.
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Self::Watch => "info",
            _ => "warn",
        }
    }
}
