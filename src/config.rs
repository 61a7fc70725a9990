//! # Generator Configuration
//!
//! Settings for one generation run, loaded from an optional TOML file and
//! overridden by environment variables.
//!
//! ## Configuration File
//!
//! `ensemble-gen.toml` next to the API description is picked up
//! automatically; `--config` names another file.
//!
//! ```toml
//! package = "inventory"
//! fetch_timeout_ms = 5000
//! elevated_schemes = ["operatorKey"]
//! standard_secret_env = "INVENTORY_API_KEY"
//! elevated_secret_env = "INVENTORY_ADMIN_TOKEN"
//! emitters = ["model", "route", "auth", "test"]
//! ```
//!
//! ## Environment Variables
//!
//! ### `ENSEMBLE_FETCH_TIMEOUT_MS`
//!
//! Upper bound on reading the document and fetching each external reference.
//! Default: `10000`.
//!
//! ### `ENSEMBLE_ELEVATED_SCHEMES`
//!
//! Comma-separated security scheme names treated as elevated. Replaces the
//! file's `elevated_schemes`.

use crate::generator::{ArtifactKind, EmitContext, DEFAULT_ELEVATED_SECRET_ENV, DEFAULT_STANDARD_SECRET_ENV};
use crate::spec::{ExtractOptions, LoaderOptions, DEFAULT_FETCH_TIMEOUT};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// File name looked for next to the API description
pub const CONFIG_FILE_NAME: &str = "ensemble-gen.toml";

pub const ENV_FETCH_TIMEOUT_MS: &str = "ENSEMBLE_FETCH_TIMEOUT_MS";
pub const ENV_ELEVATED_SCHEMES: &str = "ENSEMBLE_ELEVATED_SCHEMES";

/// Settings for one generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Timeout for reads and external fetches, in milliseconds
    pub fetch_timeout_ms: u64,
    /// Scheme names treated as elevated in addition to marked ones
    pub elevated_schemes: Vec<String>,
    /// Python package of the generated service
    pub package: String,
    /// Environment variable the standard guard reads its secret from
    pub standard_secret_env: String,
    /// Environment variable the elevated guard reads its secret from
    pub elevated_secret_env: String,
    /// Emitters to run
    pub emitters: Vec<ArtifactKind>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
            elevated_schemes: Vec::new(),
            package: "app".to_string(),
            standard_secret_env: DEFAULT_STANDARD_SECRET_ENV.to_string(),
            elevated_secret_env: DEFAULT_ELEVATED_SECRET_ENV.to_string(),
            emitters: ArtifactKind::ALL.to_vec(),
        }
    }
}

impl GeneratorConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: GeneratorConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !crate::naming::is_valid_identifier(&self.package) {
            anyhow::bail!("package '{}' is not a valid Python identifier", self.package);
        }
        if self.fetch_timeout_ms == 0 {
            anyhow::bail!("fetch_timeout_ms must be greater than zero");
        }
        Ok(())
    }

    /// Apply the process environment on top of this config
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; invalid values are logged and ignored
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(ENV_FETCH_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.fetch_timeout_ms = ms,
                _ => warn!(variable = ENV_FETCH_TIMEOUT_MS, value = %raw, "ignoring invalid timeout"),
            }
        }
        if let Some(raw) = lookup(ENV_ELEVATED_SCHEMES) {
            self.elevated_schemes = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            timeout: self.fetch_timeout(),
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            elevated_schemes: self.elevated_schemes.clone(),
        }
    }

    pub fn emit_context(&self) -> EmitContext {
        EmitContext {
            package: self.package.clone(),
            standard_secret_env: self.standard_secret_env.clone(),
            elevated_secret_env: self.elevated_secret_env.clone(),
        }
    }
}

/// Load a config file
///
/// Returns `Ok(None)` when the file does not exist and `Err` when it exists
/// but cannot be read or parsed.
pub fn load_config(config_path: &Path) -> anyhow::Result<Option<GeneratorConfig>> {
    if !config_path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
    let config = GeneratorConfig::from_toml(&contents)
        .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;
    Ok(Some(config))
}

/// `ensemble-gen.toml` in the directory of a local API description
pub fn auto_detect_config_path(spec: &str) -> Option<PathBuf> {
    if spec.contains("://") {
        return None;
    }
    let config_path = Path::new(spec).parent()?.join(CONFIG_FILE_NAME);
    config_path.exists().then_some(config_path)
}

/// Explicit path first, then the auto-detected one
pub fn resolve_config_path(explicit_path: Option<&Path>, spec: &str) -> Option<PathBuf> {
    match explicit_path {
        Some(path) => Some(path.to_path_buf()),
        None => auto_detect_config_path(spec),
    }
}

/// Resolve, load and apply env overrides; defaults when no file is found
pub fn load_generator_config(explicit_path: Option<&Path>, spec: &str) -> anyhow::Result<GeneratorConfig> {
    let config = match resolve_config_path(explicit_path, spec) {
        Some(path) => match load_config(&path)? {
            Some(config) => config,
            None if explicit_path.is_some() => {
                anyhow::bail!("config file not found: {}", path.display())
            }
            None => GeneratorConfig::default(),
        },
        None => GeneratorConfig::default(),
    };
    Ok(config.with_env_overrides())
}
