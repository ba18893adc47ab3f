//! Pipeline configuration
//!
//! TOML file, every field defaulted, then `SCENECAST_*` environment
//! overrides on top.

use crate::delivery::DEFAULT_CAPTION;
use crate::error::ConfigError;
use crate::render_pool::DEFAULT_MAX_CONCURRENT_RENDERS;
use crate::synthesizer::DEFAULT_GENERATION_TIMEOUT;
use scenecast_kernel::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Renderer program override
pub const ENV_RENDERER: &str = "SCENECAST_RENDERER";
/// Render timeout override, in seconds; `0` disables the timeout
pub const ENV_RENDER_TIMEOUT_SECS: &str = "SCENECAST_RENDER_TIMEOUT_SECS";
/// Staging root override
pub const ENV_STAGING_ROOT: &str = "SCENECAST_STAGING_ROOT";
/// Render concurrency override
pub const ENV_MAX_CONCURRENT_RENDERS: &str = "SCENECAST_MAX_CONCURRENT_RENDERS";

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Caption sent with a delivered video
    pub caption: String,
    /// Deadline for one code-generation call, in seconds; `0` disables it
    pub generation_timeout_secs: u64,
    /// Renders allowed to run at once
    pub max_concurrent_renders: usize,
    /// Staging directories
    pub staging: StagingOptions,
    /// External renderer
    pub renderer: RendererOptions,
    /// Final video lookup
    pub resolver: ResolverOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            caption: DEFAULT_CAPTION.to_string(),
            generation_timeout_secs: DEFAULT_GENERATION_TIMEOUT.as_secs(),
            max_concurrent_renders: DEFAULT_MAX_CONCURRENT_RENDERS,
            staging: StagingOptions::default(),
            renderer: RendererOptions::default(),
            resolver: ResolverOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// File if given (defaults otherwise), then `.env`, then process
    /// environment overrides
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        load_dotenv();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `SCENECAST_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = lookup(ENV_RENDERER).filter(|p| !p.trim().is_empty()) {
            self.renderer.program = program;
        }
        if let Some(value) = lookup(ENV_RENDER_TIMEOUT_SECS) {
            let secs: u64 = parse_env(ENV_RENDER_TIMEOUT_SECS, &value)?;
            self.renderer.timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(root) = lookup(ENV_STAGING_ROOT).filter(|r| !r.trim().is_empty()) {
            self.staging.root = Some(PathBuf::from(root));
        }
        if let Some(value) = lookup(ENV_MAX_CONCURRENT_RENDERS) {
            self.max_concurrent_renders = parse_env(ENV_MAX_CONCURRENT_RENDERS, &value)?;
        }
        Ok(())
    }

    /// Generation deadline, `None` when disabled
    #[must_use]
    pub fn generation_timeout(&self) -> Option<Duration> {
        (self.generation_timeout_secs > 0).then(|| Duration::from_secs(self.generation_timeout_secs))
    }
}

/// Load `.env` from the working directory or its parents, if present
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env"),
    }
}

fn parse_env<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}
