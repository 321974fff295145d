//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

use std::path::Path;

use contracts::OutputConfig;

use crate::error::CliError;

/// Load and validate the configuration file shared by every command
fn load_config(path: &Path) -> Result<OutputConfig, CliError> {
    if !path.exists() {
        return Err(CliError::config_not_found(path));
    }
    Ok(config_loader::ConfigLoader::load_from_path(path)?)
}
