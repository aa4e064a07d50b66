//! User-level layer shared by every workspace.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::PathBuf;
use tracing::debug;

/// `$XDG_CONFIG_HOME/regimen/config.toml`, falling back to `~/.config` and then
/// the platform config dir. Returned whether or not the file exists.
pub fn global_config_path() -> Option<PathBuf> {
    let xdg = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    let home = || std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"));
    let platform = || directories::BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf());
    let base = xdg.or_else(home).or_else(platform)?;
    Some(base.join("regimen").join("config.toml"))
}

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let Some(path) = global_config_path() else {
        return Ok(builder);
    };
    if !path.is_file() {
        debug!(config_path = %path.display(), "global config absent");
        return Ok(builder);
    }
    Ok(builder.add_source(File::from(path).required(false)))
}
