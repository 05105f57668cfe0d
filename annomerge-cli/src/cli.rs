//! CLI argument definitions

use clap::{Parser, Subcommand};

use crate::commands::check::CheckArgs;
use crate::commands::config::ConfigCommands;
use crate::commands::export::ExportArgs;
use crate::commands::merge::MergeArgs;
use crate::commands::projects::ProjectsCommands;
use crate::output::OutputFormat;

/// Merge labeled-data projects on an annotation server
#[derive(Debug, Parser)]
#[command(name = "annomerge", version)]
#[command(about = "Consolidate annotation projects: export, dedup, and re-import tasks")]
pub struct Cli {
    /// Server base URL
    #[arg(long, global = true, env = "ANNOMERGE_URL")]
    pub url: Option<String>,

    /// API token
    #[arg(long, global = true, env = "ANNOMERGE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Authorization header style (auto, bearer, token)
    #[arg(long, global = true)]
    pub auth_style: Option<String>,

    /// Configuration profile to use
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect projects on the server
    Projects(ProjectsCommands),

    /// Compare labeling schemas across projects
    Check(CheckArgs),

    /// Export one project's tasks to a JSON artifact
    Export(ExportArgs),

    /// Merge several source projects into a new destination project
    Merge(MergeArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigCommands),
}
