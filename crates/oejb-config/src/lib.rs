//! Container configuration for the embedded EJB container.
//!
//! Configuration is read from TOML. Every field has a default so an empty (or
//! missing) file yields a usable container.
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [naming]
//! federation = ["external"]
//! max_reference_depth = 8
//!
//! [classloader]
//! container_extensions = false
//!
//! [deployment]
//! excluded_libraries = ["arquillian-junit.jar"]
//! ```

use std::path::{Path, PathBuf};

use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod logging;

pub use logging::{init_tracing, LogBuffer};

/// Environment variable pointing at an explicit config file.
pub const OEJB_CONFIG_ENV_VAR: &str = "OEJB_CONFIG";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerConfig {
    /// Global logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Naming subsystem settings (federation, reference dereferencing).
    #[serde(default)]
    pub naming: NamingConfig,

    /// Archive class loader settings.
    #[serde(default)]
    pub classloader: ClassLoaderConfig,

    /// Archive processing settings.
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Either a simple level (`info`, `debug`, ...) or an `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Mirror logs to stderr (in addition to the in-memory buffer).
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to the given file path. Open failures disable only this sink.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Number of log lines kept in memory.
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
        1_000
    }

    /// The configured level as `EnvFilter` directives. Bare level names are
    /// case-insensitive and `warning` means `warn`; anything else is passed
    /// through as a directive string.
    pub fn directives(&self) -> String {
        let level = self.level.trim();
        if level.is_empty() {
            return Self::default_level();
        }
        if level.eq_ignore_ascii_case("warning") {
            return "warn".to_owned();
        }
        if ["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|name| level.eq_ignore_ascii_case(name))
        {
            return level.to_ascii_lowercase();
        }
        level.to_owned()
    }

    /// The effective filter: the configured directives followed by `RUST_LOG`,
    /// so the environment wins where both name a target. Whichever part does
    /// not parse is dropped; `info` is the last resort.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let configured = self.directives();
        let mut candidates = Vec::new();
        if let Some(env) = std::env::var("RUST_LOG")
            .ok()
            .filter(|env| !env.trim().is_empty())
        {
            let env = env.trim().to_owned();
            candidates.push(format!("{configured},{env}"));
            candidates.push(env);
        }
        candidates.push(configured);
        candidates
            .into_iter()
            .find_map(|directives| tracing_subscriber::EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("info"))
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamingConfig {
    /// Tags of registered federation factories consulted when a local lookup misses.
    ///
    /// Tags are resolved against the factories registered with the naming
    /// subsystem at startup; unknown tags are skipped with a warning.
    #[serde(default)]
    pub federation: Vec<String>,

    /// Upper bound on chained reference dereferencing during a single lookup.
    #[serde(default = "NamingConfig::default_max_reference_depth")]
    pub max_reference_depth: usize,

    /// Fail writes to read-only contexts instead of silently ignoring them.
    #[serde(default = "NamingConfig::default_exception_on_failed_write")]
    pub exception_on_failed_write: bool,
}

impl NamingConfig {
    fn default_max_reference_depth() -> usize {
        16
    }

    fn default_exception_on_failed_write() -> bool {
        true
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            federation: Vec::new(),
            max_reference_depth: Self::default_max_reference_depth(),
            exception_on_failed_write: Self::default_exception_on_failed_write(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassLoaderConfig {
    /// Append container-provided CDI extension service files found through the parent loader.
    #[serde(default = "ClassLoaderConfig::default_container_extensions")]
    pub container_extensions: bool,

    /// URL substrings identifying container-provided libraries.
    #[serde(default = "ClassLoaderConfig::default_extension_markers")]
    pub extension_markers: Vec<String>,
}

impl ClassLoaderConfig {
    fn default_container_extensions() -> bool {
        true
    }

    fn default_extension_markers() -> Vec<String> {
        ["openwebbeans-", "deltaspike-", "tomee-"]
            .into_iter()
            .map(str::to_owned)
            .collect()
    }
}

impl Default for ClassLoaderConfig {
    fn default() -> Self {
        Self {
            container_extensions: Self::default_container_extensions(),
            extension_markers: Self::default_extension_markers(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Library archive names never scanned for classes or beans.
    #[serde(default = "DeploymentConfig::default_excluded_libraries")]
    pub excluded_libraries: Vec<String>,

    /// Register the test class as a managed bean when one is supplied.
    #[serde(default = "DeploymentConfig::default_scan_test_class")]
    pub scan_test_class: bool,
}

impl DeploymentConfig {
    fn default_excluded_libraries() -> Vec<String> {
        [
            "arquillian-junit.jar",
            "arquillian-protocol.jar",
            "arquillian-core.jar",
        ]
        .into_iter()
        .map(str::to_owned)
        .collect()
    }

    fn default_scan_test_class() -> bool {
        true
    }

    pub fn is_excluded(&self, archive_name: &str) -> bool {
        self.excluded_libraries
            .iter()
            .any(|excluded| excluded == archive_name)
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            excluded_libraries: Self::default_excluded_libraries(),
            scan_test_class: Self::default_scan_test_class(),
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
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` embeds a source snippet; keep only the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl ContainerConfig {
    /// Load a config file from TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    /// Load a config from a TOML string.
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: ContainerConfig = toml::from_str(text)?;
        config.normalize();
        Ok(config)
    }

    fn normalize(&mut self) {
        self.naming.max_reference_depth = self.naming.max_reference_depth.max(1);
        self.logging.buffer_lines = self.logging.buffer_lines.max(1);
        self.naming.federation.retain(|tag| !tag.trim().is_empty());
        self.naming.federation.dedup();
    }
}

/// Held while discovery reads [`OEJB_CONFIG_ENV_VAR`]. Reentrant so that
/// discovery can run inside [`with_config_env_lock`].
static ENV_LOCK: ReentrantMutex<()> = parking_lot::const_reentrant_mutex(());

/// Runs `f` with discovery blocked, for callers that change
/// [`OEJB_CONFIG_ENV_VAR`] temporarily.
pub fn with_config_env_lock<R>(f: impl FnOnce() -> R) -> R {
    let _guard = ENV_LOCK.lock();
    f()
}

/// Discover the configuration file for a directory.
///
/// Search order:
/// 1) `OEJB_CONFIG` (absolute or relative to `root`)
/// 2) `oejb.toml` in `root`
/// 3) `.oejb/config.toml` in `root`
pub fn discover_config_path(root: &Path) -> Option<PathBuf> {
    let _guard = ENV_LOCK.lock();
    if let Some(value) = std::env::var_os(OEJB_CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            root.join(candidate)
        };
        return Some(path.canonicalize().unwrap_or(path));
    }

    ["oejb.toml", ".oejb/config.toml"]
        .into_iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
        .map(|path| path.canonicalize().unwrap_or(path))
}

/// Load the configuration for a directory.
///
/// If no config is present, returns [`ContainerConfig::default`] and `None`.
pub fn load_for_dir(root: &Path) -> Result<(ContainerConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(root) else {
        return Ok((ContainerConfig::default(), None));
    };

    let config = ContainerConfig::load_from_path(&path)?;
    Ok((config, Some(path)))
}
