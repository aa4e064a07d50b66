//! CLI domain: parse, route, output and presentation only.
//! A single route table dispatches to the pipeline and checkpoint store.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::{exit_code, map_error};
pub use parse::{Cli, Commands};
pub use presentation::{format_run_summary, format_sessions_json, format_sessions_text};
pub use route::{load_run_input, RunContext};
