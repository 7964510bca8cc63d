//! Configuration management with environment variable support.
//!
//! Precedence, lowest first: defaults, TOML file, `CLBENCH_*` environment
//! variables, then whatever the caller applies through
//! [`ConfigBuilder::update`] (the CLI uses this for its flags).

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::DeviceOrdinal;
use crate::error::{BenchError, Result};

/// Config file used when neither `--config` nor `CLBENCH_CONFIG` is given.
pub const DEFAULT_CONFIG_FILE: &str = "clbench.toml";

/// Kernel source path used unless overridden, relative to the working directory.
pub const DEFAULT_KERNEL_PATH: &str = "src/cl/aplusb.cl";

/// Complete benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BenchConfig {
    pub workload: WorkloadConfig,
    pub kernel: KernelConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
}

/// Dataset size and trial counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub elements: usize,
    pub work_group_size: usize,
    pub trials: usize,
    pub warmup: usize,
    /// Defaults to `elements`.
    pub seed: Option<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            elements: crate::DEFAULT_ELEMENTS,
            work_group_size: crate::DEFAULT_WORK_GROUP_SIZE,
            trials: crate::DEFAULT_TRIALS,
            warmup: 0,
            seed: None,
        }
    }
}

impl WorkloadConfig {
    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or(self.elements as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub source_path: PathBuf,
    pub build_options: String,
    /// Compile the source built into the binary instead of reading `source_path`.
    pub use_embedded: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(DEFAULT_KERNEL_PATH),
            build_options: String::new(),
            use_embedded: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeviceConfig {
    /// Explicit `platform:device`; the selection policy applies when unset.
    pub ordinal: Option<DeviceOrdinal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `clbench_opencl=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn".to_string(), format: LogFormat::Pretty }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(BenchError::Config(format!(
                "unknown log format '{other}', expected pretty, compact or json"
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Compact => write!(f, "compact"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl BenchConfig {
    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BenchError::Config(format!("cannot serialise configuration: {e}")))
    }
}

/// Configuration builder with environment variable support.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: BenchConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current configuration with the contents of a TOML file.
    /// Sections and keys missing from the file take their defaults.
    pub fn from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BenchError::Config(format!("cannot read config file '{}': {e}", path.display()))
        })?;
        self.config = toml::from_str(&content)
            .map_err(|e| BenchError::Config(format!("invalid config file '{}': {e}", path.display())))?;
        debug!(path = %path.display(), "loaded config file");
        Ok(self)
    }

    /// Apply `CLBENCH_*` environment variables.
    pub fn from_env(mut self) -> Result<Self> {
        let cfg = &mut self.config;

        if let Some(v) = env_parse("CLBENCH_ELEMENTS")? {
            cfg.workload.elements = v;
        }
        if let Some(v) = env_parse("CLBENCH_WORK_GROUP_SIZE")? {
            cfg.workload.work_group_size = v;
        }
        if let Some(v) = env_parse("CLBENCH_TRIALS")? {
            cfg.workload.trials = v;
        }
        if let Some(v) = env_parse("CLBENCH_WARMUP")? {
            cfg.workload.warmup = v;
        }
        if let Some(v) = env_parse("CLBENCH_SEED")? {
            cfg.workload.seed = Some(v);
        }
        if let Ok(path) = env::var("CLBENCH_KERNEL") {
            cfg.kernel.source_path = PathBuf::from(path);
        }
        if let Ok(flag) = env::var("CLBENCH_EMBEDDED_KERNEL") {
            cfg.kernel.use_embedded = parse_bool("CLBENCH_EMBEDDED_KERNEL", &flag)?;
        }
        if let Ok(options) = env::var("CLBENCH_BUILD_OPTIONS") {
            cfg.kernel.build_options = options;
        }
        if let Some(v) = env_parse("CLBENCH_DEVICE")? {
            cfg.device.ordinal = Some(v);
        }
        if let Ok(level) = env::var("CLBENCH_LOG_LEVEL") {
            cfg.logging.level = level;
        }
        if let Some(v) = env_parse("CLBENCH_LOG_FORMAT")? {
            cfg.logging.format = v;
        }

        Ok(self)
    }

    /// Apply arbitrary overrides.
    pub fn update(mut self, f: impl FnOnce(&mut BenchConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn validate(self) -> Result<Self> {
        let w = &self.config.workload;

        if w.elements == 0 {
            return Err(BenchError::Config("element count must be at least 1".into()));
        }
        if u32::try_from(w.elements).is_err() {
            return Err(BenchError::Config(format!(
                "element count {} exceeds the kernel's unsigned int limit {}",
                w.elements,
                u32::MAX
            )));
        }
        crate::buffers::fp32_buffer_bytes(w.elements)?;
        if w.work_group_size == 0 {
            return Err(BenchError::Config("work-group size must be at least 1".into()));
        }
        if w.trials == 0 {
            return Err(BenchError::Config("trial count must be at least 1".into()));
        }
        if self.config.logging.level.trim().is_empty() {
            return Err(BenchError::Config("log level cannot be empty".into()));
        }

        Ok(self)
    }

    pub fn build(self) -> BenchConfig {
        self.config
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| BenchError::Config(format!("{key}='{raw}': {e}"))),
        Err(_) => Ok(None),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(BenchError::Config(format!("{key}='{raw}' is not a boolean"))),
    }
}

/// Defaults, then a config file, then the environment.
///
/// `explicit` (from `--config`) wins over `CLBENCH_CONFIG`; both must exist.
/// Without either, [`DEFAULT_CONFIG_FILE`] is read if present. The result
/// is not validated so callers can still layer their own overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<ConfigBuilder> {
    let mut builder = ConfigBuilder::new();

    let from_env = env::var("CLBENCH_CONFIG").ok().map(PathBuf::from);
    match explicit.map(Path::to_path_buf).or(from_env) {
        Some(path) => builder = builder.from_file(path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                builder = builder.from_file(DEFAULT_CONFIG_FILE)?;
            }
        }
    }

    builder.from_env()
}

/// Default configuration rendered as TOML.
pub fn generate_example_config() -> String {
    BenchConfig::default()
        .to_toml()
        .unwrap_or_else(|_| "# Failed to generate config".to_string())
}
