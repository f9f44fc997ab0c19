//! Plugin configuration.
//!
//! Handles loading, validating, and merging the `deferred-images.toml` file.
//! Stock defaults are overridden by whatever the user file sets; everything
//! is optional.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! input_root = "."          # Site input root; "/..." image paths resolve here
//! output_dir = "_site/img"  # Where built images are written
//! url_path = "/img"         # Public URL prefix for built images
//!
//! [processing]
//! max_processes = 4         # Max parallel builds (omit for auto = CPU cores)
//! ```
//!
//! ## URL Path
//!
//! `url_path` is used verbatim as the prefix of every public URL, joined
//! with forward slashes regardless of platform. It may be a path (`/img`)
//! or an absolute CDN prefix (`https://cdn.example.com/img`). Because URLs
//! follow the placeholder comment in rendered pages, it must not contain
//! whitespace or quotes.
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name looked up by the CLI.
pub const CONFIG_FILENAME: &str = "deferred-images.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Plugin configuration loaded from `deferred-images.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginConfig {
    /// Site input root that root-relative image paths (`/assets/a.jpg`) resolve against.
    pub input_root: String,
    /// Filesystem directory built images are written to.
    pub output_dir: PathBuf,
    /// URL prefix for built images.
    pub url_path: String,
    /// Parallel build settings.
    pub processing: ProcessingConfig,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            input_root: ".".to_string(),
            output_dir: PathBuf::from("_site/img"),
            url_path: "/img".to_string(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PluginConfig {
    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "output_dir must not be empty".into(),
            ));
        }
        if self
            .url_path
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '<')
        {
            return Err(ConfigError::Validation(
                "url_path must not contain whitespace, quotes or '<'".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Public URL for an artifact file name.
    ///
    /// Always joined with `/`; backslashes in `url_path` are normalized.
    pub fn public_url(&self, file_name: &str) -> String {
        let prefix = self.url_path.replace('\\', "/");
        format!("{}/{}", prefix.trim_end_matches('/'), file_name)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of concurrent image builds.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PluginConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file doesn't exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PluginConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PluginConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`, falling back to stock defaults when
/// the file is absent.
pub fn load_config(path: &Path) -> Result<PluginConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Deferred Images Configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Site input root. Image paths starting with "/" (e.g. "/assets/a.jpg")
# are resolved against this directory; relative paths and URLs are not.
input_root = "."

# Directory built images are written to. Files are named
# <name>-<fingerprint>.<ext>, so an existing file is reused as-is.
output_dir = "_site/img"

# Public URL prefix for built images (forward slashes, no whitespace or quotes).
url_path = "/img"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum concurrent image builds.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
