//! TOML configuration for the persistent-memory planner.
//!
//! A config file carries logging settings, the planner's persistent mode, an
//! optional static platform description (capabilities plus modules) and a
//! goal request expressed in percentages. [`NvmemConfig::plan`] runs the full
//! allocation pipeline against the described platform.

mod diagnostics;
mod logging;
mod platform;
mod validation;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use nvmem_alloc::{
    AllocationError, DeviceLibrary, MemoryAllocationLayout, MemoryAllocator, PersistentMode,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use diagnostics::{ConfigDiagnostics, ConfigValidationError, ConfigWarning, ValidationDiagnostics};
pub use logging::{global_log_buffer, init_tracing, LogBuffer};
pub use platform::{Capacity, DimmConfig, GoalRequestConfig, PlatformConfig};

/// Environment variable that points at an explicit config file.
///
/// Relative paths are resolved against the root passed to [`discover_config_path`].
pub const NVMEM_CONFIG_ENV_VAR: &str = "NVMEM_CONFIG_PATH";

const CONFIG_FILE_NAMES: [&str; 2] = ["nvmem.toml", ".nvmem.toml"];

static CONFIG_ENV_LOCK: OnceLock<parking_lot::ReentrantMutex<()>> = OnceLock::new();

/// Serializes code that reads or mutates [`NVMEM_CONFIG_ENV_VAR`].
///
/// Process environment is global; tests that set the variable must hold this
/// lock so concurrent discovery calls observe a consistent value.
pub fn with_config_env_lock<R>(f: impl FnOnce() -> R) -> R {
    let lock = CONFIG_ENV_LOCK.get_or_init(|| parking_lot::ReentrantMutex::new(()));
    let _guard = lock.lock();
    f()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NvmemConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub planner: PlannerConfig,

    /// Static platform description. Without one there is nothing to plan
    /// against.
    #[serde(default)]
    pub platform: Option<PlatformConfig>,

    #[serde(default)]
    pub goal: GoalRequestConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Which persistent capability set app-direct extents are laid out with.
    #[serde(default)]
    pub persistent_mode: PersistentMode,
}

impl NvmemConfig {
    /// Device library described by `[platform]`, if any.
    pub fn library(&self) -> Option<Arc<dyn DeviceLibrary>> {
        self.platform
            .as_ref()
            .map(|platform| Arc::new(platform.to_library()) as Arc<dyn DeviceLibrary>)
    }

    /// Build the configured goal request and lay it out on the configured
    /// platform. Returns `Ok(None)` when no platform is described.
    pub fn plan(&self) -> Result<Option<MemoryAllocationLayout>, AllocationError> {
        let Some(library) = self.library() else {
            return Ok(None);
        };
        let request = self.goal.to_builder(library.clone()).build()?;
        let allocator = MemoryAllocator::new(library, self.planner.persistent_mode)?;
        allocator.layout(&request).map(Some)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// A level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json: bool,

    /// Mirror logs to stderr in addition to the in-memory buffer.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to this file. If it cannot be opened, file logging is
    /// skipped and the other sinks stay active.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Number of formatted lines kept in memory.
    #[serde(default = "LoggingConfig::default_buffer_lines")]
    pub buffer_lines: usize,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    fn default_buffer_lines() -> usize {
        2_000
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// Effective filter: the configured level merged with `RUST_LOG`.
    ///
    /// An unparsable combination falls back to `RUST_LOG` alone, then to the
    /// configured level, then to `info`.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
            buffer_lines: Self::default_buffer_lines(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        let location = err
            .span()
            .map(|span| format!(" (at byte {})", span.start))
            .unwrap_or_default();
        ConfigError::Toml(format!("{}{location}", err.message()))
    }
}

impl NvmemConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_from_path_with_diagnostics(path).map(|(config, _)| config)
    }

    /// Load a config and report unknown keys and validation findings.
    ///
    /// A config is returned whenever the TOML deserializes; callers decide
    /// what to do with `diagnostics.errors`.
    pub fn load_from_path_with_diagnostics(
        path: impl AsRef<Path>,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str_with_diagnostics(&text)
    }

    pub fn load_from_str_with_diagnostics(
        text: &str,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let (config, unknown_keys): (NvmemConfig, Vec<String>) =
            diagnostics::deserialize_toml_with_unknown_keys(text)?;

        let mut diagnostics = ConfigDiagnostics {
            unknown_keys,
            ..ConfigDiagnostics::default()
        };
        diagnostics.extend_validation(config.validate());

        if !diagnostics.is_empty() {
            tracing::debug!(
                target: "nvmem.config",
                unknown_keys = diagnostics.unknown_keys.len(),
                warnings = diagnostics.warnings.len(),
                errors = diagnostics.errors.len(),
                "config loaded with diagnostics"
            );
        }
        Ok((config, diagnostics))
    }
}

/// Locate the config file for `root`.
///
/// [`NVMEM_CONFIG_ENV_VAR`] wins when set; otherwise the first of
/// `nvmem.toml` and `.nvmem.toml` that exists under `root`.
pub fn discover_config_path(root: &Path) -> Option<PathBuf> {
    with_config_env_lock(|| {
        if let Some(value) = std::env::var_os(NVMEM_CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
            let candidate = PathBuf::from(value);
            let path = if candidate.is_absolute() {
                candidate
            } else {
                root.join(candidate)
            };
            return Some(path.canonicalize().unwrap_or(path));
        }

        CONFIG_FILE_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file())
            .map(|path| path.canonicalize().unwrap_or(path))
    })
}

/// Load the config for `root`, or defaults when none is found.
pub fn load_for_root(root: &Path) -> Result<(NvmemConfig, Option<PathBuf>), ConfigError> {
    let (config, path, _) = load_for_root_with_diagnostics(root)?;
    Ok((config, path))
}

pub fn load_for_root_with_diagnostics(
    root: &Path,
) -> Result<(NvmemConfig, Option<PathBuf>, ConfigDiagnostics), ConfigError> {
    match discover_config_path(root) {
        Some(path) => {
            let (config, diagnostics) = NvmemConfig::load_from_path_with_diagnostics(&path)?;
            tracing::debug!(target: "nvmem.config", path = %path.display(), "loaded config");
            Ok((config, Some(path), diagnostics))
        }
        None => Ok((NvmemConfig::default(), None, ConfigDiagnostics::default())),
    }
}
