//! Merge rules: built-in defaults at the bottom of every layer stack.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("pipeline.fail_fast", false)?
        .set_default("pipeline.contract_retry_budget", 2_i64)?
        .set_default("pipeline.repair_max_attempts", 6_i64)?
        .set_default("pipeline.accept_best_effort", false)?
        .set_default("pipeline.heal_attempts", 2_i64)?
        .set_default("pipeline.plan_attempts", 3_i64)?
        .set_default("pipeline.transport_max_attempts", 4_i64)?
        .set_default("pipeline.backoff_base_ms", 500_i64)?
        .set_default("pipeline.backoff_max_ms", 8000_i64)?
        .set_default("storage.checkpoint_path", ".regimen/state")?
        .set_default("logging.level", "info")
}
