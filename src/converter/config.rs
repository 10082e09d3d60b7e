//! Configuration loading.
//!
//! `defaults/molconvert.default.toml` is embedded into the crate so the
//! documented defaults and runtime behavior stay in sync. [`Loader`] layers the
//! user file, an explicit file, `MOLCONVERT_*` environment variables and
//! programmatic overrides on top before deserializing into [`ConverterConfig`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, ValueKind};
use serde::{Deserialize, Serialize};

use super::backends::OBABEL_EXECUTABLE;
use super::selector::BackendPreference;

const DEFAULT_TOML: &str = include_str!("../../defaults/molconvert.default.toml");

const ENV_PREFIX: &str = "MOLCONVERT";
const APP_DIR: &str = "molconvert";
const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    pub backend: BackendPreference,
    pub add_hydrogens: bool,
    pub obabel: ObabelConfig,
}

/// How the obabel executable is run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObabelConfig {
    pub executable: String,
    /// 0 disables the limit
    pub timeout_seconds: u64,
    pub clear_babel_libdir: bool,
}

impl ObabelConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            add_hydrogens: true,
            obabel: ObabelConfig::default(),
        }
    }
}

impl Default for ObabelConfig {
    fn default() -> Self {
        Self {
            executable: OBABEL_EXECUTABLE.to_string(),
            timeout_seconds: 300,
            clear_babel_libdir: false,
        }
    }
}

/// `<config_dir>/molconvert/config.toml`, if the platform has a config dir
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Helper for layering configuration sources over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Full stack used by the binary: defaults, user file, `explicit`,
    /// then the process environment.
    pub fn standard(explicit: Option<&Path>) -> Self {
        let mut loader = Self::new();
        if let Some(path) = user_config_path() {
            loader = loader.with_optional_file(path);
        }
        if let Some(path) = explicit {
            loader = loader.with_file(path);
        }
        loader.with_environment()
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer `MOLCONVERT_*` variables from the process environment.
    pub fn with_environment(mut self) -> Self {
        self.builder = self.builder.add_source(environment());
        self
    }

    /// Layer variables from `vars` as if they were the environment.
    pub fn with_environment_from(mut self, vars: HashMap<String, String>) -> Self {
        self.builder = self.builder.add_source(environment().source(Some(vars)));
        self
    }

    /// Apply a single key/value override (useful for CLI settings).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<ConverterConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

fn environment() -> Environment {
    // MOLCONVERT_OBABEL__TIMEOUT_SECONDS -> obabel.timeout_seconds
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<ConverterConfig, ConfigError> {
    Loader::new().build()
}
