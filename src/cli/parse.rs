//! Command-line surface. Routing lives in `route`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "regimen")]
#[command(about = "Generate a consistent workout store from a free-form training request")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding `config/` and `.regimen/` state
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Single config file used instead of the layered lookup
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Shorthand for `--log-level debug`
    #[arg(long, global = true)]
    pub verbose: bool,

    /// trace, debug, info, warn, error or off
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// text or json
    #[arg(long, global = true)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline for a new request
    Generate {
        /// Request file: plain text, or JSON with `request`, `provided`, `settings`
        #[arg(long)]
        input: PathBuf,
        /// JSON file of equipment and accessories that already exist
        #[arg(long)]
        provided_equipment: Option<PathBuf>,
        /// Extra instructions appended to every prompt
        #[arg(long)]
        instructions: Option<String>,
        /// Session id to use instead of a generated one
        #[arg(long)]
        session: Option<String>,
        /// Where to write the final store
        #[arg(long)]
        out: PathBuf,
    },
    /// Continue a failed or cancelled session from its last checkpoint
    Resume {
        #[arg(long)]
        session: String,
        #[arg(long)]
        out: PathBuf,
        /// Current request file; warns when it differs from the checkpointed one
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// List sessions that have a stored checkpoint
    Sessions {
        /// text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
}
