//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/sos/config.toml)
//! 3. Environment variables (SOS_* prefix)
//!
//! CLI flags are applied on top by the command layer after extraction, which
//! gives the documented precedence flag > env > file > default.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{Result, SosError};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global config → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        // Sections split on a double underscore so snake_case keys stay
        // addressable: SOS_AI__TIMEOUT_SECS -> ai.timeout_secs.
        figment = figment.merge(Env::prefixed("SOS_").split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| SosError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only (for `--config`)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| SosError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/sos/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("sos"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file path
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global: {} {}", exists, global.display());
        } else {
            println!("  Global: (not available)");
        }
    }

    /// Show an effective configuration. The caller loads it, so `--config`
    /// overrides apply here exactly as they do for diagnose.
    pub fn show_config(config: &Config, as_json: bool) -> Result<()> {
        println!("{}", Self::render_config(config, as_json)?);
        Ok(())
    }

    fn render_config(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| SosError::Config(e.to_string()))
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir()
            .ok_or_else(|| SosError::Config("Cannot determine config directory".to_string()))?;

        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config_toml())?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Generate default config content (TOML)
    fn default_config_toml() -> String {
        r#"# SOS Agent Configuration
# CLI flags and SOS_* environment variables override these values.
# API keys come from the environment: OPENAI_API_KEY, GEMINI_API_KEY,
# INCEPTION_API_KEY. The claude-agent provider needs no key.

version = "1.0"

[ai]
provider_order = ["openai", "gemini", "mercury", "claude-agent"]
language = "en"
timeout_secs = 60

[ai.openai]
model = "gpt-4o"

[ai.gemini]
model = "gemini-2.0-flash-exp"

[ai.mercury]
model = "mercury-coder"

[ai.claude_agent]
api_url = "http://localhost:3284"

[logs]
time_range = "24h"
category_cap = 20
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let config = ConfigLoader::load().unwrap();
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[ai]
timeout_secs = 30
language = "cs"

[logs]
category_cap = 5
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.ai.timeout_secs, 30);
        assert_eq!(config.ai.language, crate::config::Language::Cs);
        assert_eq!(config.logs.category_cap, 5);
        // Untouched values keep defaults
        assert_eq!(config.logs.time_range, "24h");
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[logs]\ncategory_cap = 0\n").unwrap();

        assert!(ConfigLoader::load_from_file(&path).is_err());
    }

    #[test]
    fn test_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SOS_AI__LANGUAGE", "cs");
            let config = ConfigLoader::load().unwrap();
            assert_eq!(config.ai.language, crate::config::Language::Cs);
            Ok(())
        });
    }

    #[test]
    fn test_env_override_reaches_snake_case_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SOS_AI__TIMEOUT_SECS", "15");
            jail.set_env("SOS_LOGS__CATEGORY_CAP", "7");
            let config = ConfigLoader::load().unwrap();
            assert_eq!(config.ai.timeout_secs, 15);
            assert_eq!(config.logs.category_cap, 7);
            Ok(())
        });
    }

    #[test]
    fn test_render_config_reflects_loaded_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[ai]\ntimeout_secs = 30\n").unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        let toml_out = ConfigLoader::render_config(&config, false).unwrap();
        assert!(toml_out.contains("timeout_secs = 30"));

        let json_out = ConfigLoader::render_config(&config, true).unwrap();
        assert!(json_out.contains("\"timeout_secs\": 30"));
    }

    #[test]
    fn test_default_config_toml_parses() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, ConfigLoader::default_config_toml()).unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert!(config.validate().is_ok());
    }
}
