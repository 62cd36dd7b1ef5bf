//! Server configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. stock defaults ([`ServerConfig::default`])
//! 2. an optional TOML file passed with `--config`
//! 3. command-line flags (`--host`, `--port`, `--live`), applied in `main`
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! hostname = "0.0.0.0"
//! port = 3000
//! live = false              # Development mode (see below)
//! save_debounce_ms = 1000   # Quiet window before data.json is rewritten
//! max_upload_mb = 25        # Largest accepted upload request
//! site_title = "Screenshots"
//! # template = "site/index.html"   # Index template (bundled one if unset)
//! # static_dir = "site/static"     # Assets copied into the output root
//! ```
//!
//! Live mode re-reads the template on every regeneration, regenerates the
//! site before every page read, and symlinks static assets instead of
//! copying them, so edits show up without restarting.
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub hostname: String,
    pub port: u16,
    /// Development mode.
    pub live: bool,
    /// Quiet window, in milliseconds, before pending changes are written.
    pub save_debounce_ms: u64,
    /// Request body limit for uploads, in megabytes.
    pub max_upload_mb: u64,
    /// Text for the `{{TITLE}}` slot.
    pub site_title: String,
    /// Index template; the bundled template is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    /// Directory whose entries are installed into the output root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "0.0.0.0".to_string(),
            port: 3000,
            live: false,
            save_debounce_ms: 1000,
            max_upload_mb: 25,
            site_title: "Screenshots".to_string(),
            template: None,
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".into()));
        }
        if self.save_debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "save_debounce_ms must be greater than zero".into(),
            ));
        }
        if self.max_upload_mb == 0 {
            return Err(ConfigError::Validation(
                "max_upload_mb must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn save_window(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.max_upload_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }
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

/// Resolve the effective config: stock defaults with the file at `path`
/// (if any) merged on top, then validated.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let base = toml::Value::try_from(ServerConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config: {e}")))?;
    let merged = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            let overlay: toml::Value = toml::from_str(&content)?;
            merge_toml(base, overlay)
        }
        None => base,
    };
    let config: ServerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# servershots configuration
# ==========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys cause an error. Command-line flags override this file.

# Address and port the HTTP server binds to.
hostname = "0.0.0.0"
port = 3000

# Development mode: re-read the template on every regeneration, regenerate
# the site before serving pages, and symlink static assets instead of
# copying them.
live = false

# Quiet window (milliseconds) before pending changes are written to
# data.json. A burst of uploads inside the window is saved once.
save_debounce_ms = 1000

# Largest accepted upload request, in megabytes.
max_upload_mb = 25

# Text substituted for {{TITLE}} in the index template.
site_title = "Screenshots"

# Index template with {{TITLE}}, {{SERVER_LIST}}, {{UPLOAD}} and {{SERVERS}}
# slots. The bundled template is used when unset.
# template = "site/index.html"

# Directory whose entries are installed into the output root at startup
# (e.g. style.css, favicon.ico). A bundled style.css is written when unset.
# static_dir = "site/static"
"##
}
