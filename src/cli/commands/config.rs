//! Config Command
//!
//! Thin wrappers over `ConfigLoader` for the `sos config` subcommands.

use console::style;

use crate::config::{Config, ConfigLoader};
use crate::types::Result;

/// Show the merged effective configuration, including any `--config` file
/// the caller loaded it from.
pub fn show(config: &Config, as_json: bool) -> Result<()> {
    ConfigLoader::show_config(config, as_json)
}

/// Show configuration file paths.
pub fn path() {
    ConfigLoader::show_path();
}

/// Write the default global config file.
pub fn init(force: bool) -> Result<()> {
    let path = ConfigLoader::init_global(force)?;
    println!(
        "{} Configuration at {}",
        style("✓").green(),
        path.display()
    );
    Ok(())
}
