//! Per-workspace layers: `config/config.toml`, then `config/<REGIMEN_ENV>.toml`.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::{Path, PathBuf};

const DEFAULT_ENV: &str = "development";

/// Candidate files in ascending precedence. Missing files are skipped by the caller.
pub fn layer_paths(workspace_root: &Path, env_name: &str) -> Vec<PathBuf> {
    let dir = workspace_root.join("config");
    vec![dir.join("config.toml"), dir.join(format!("{}.toml", env_name))]
}

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let env_name = std::env::var("REGIMEN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    let layered = layer_paths(workspace_root, &env_name)
        .into_iter()
        .filter(|path| path.is_file())
        .fold(builder, |builder, path| {
            builder.add_source(File::from(path).required(false))
        });
    Ok(layered)
}
