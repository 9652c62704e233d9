//! Configuration loading and sidecar root resolution
//!
//! Bootstrap settings come from an optional TOML file. Every value can be
//! overridden from the command line or the environment.
//!
//! # Root folder priority
//!
//! 1. Command-line argument
//! 2. `NAI_ROOT` environment variable
//! 3. TOML config file (`root`)
//! 4. Nearest ancestor of the working directory containing `sidecar/`

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the project root
pub const ROOT_ENV: &str = "NAI_ROOT";

/// Environment variable overriding the Python interpreter
pub const PYTHON_ENV: &str = "NAI_PYTHON";

/// How many parent directories are searched for `sidecar/`
const ROOT_SEARCH_DEPTH: usize = 5;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Project root containing `sidecar/main.py`
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Python interpreter used to run the sidecar
    #[serde(default)]
    pub python: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the platform config file, falling back to defaults.
    ///
    /// A missing file is normal; an unreadable or invalid one is logged and
    /// ignored so the client still starts.
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Self::default();
        }
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// `<config dir>/nai/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nai").join("config.toml"))
}

/// Resolves where the sidecar lives and how to run it
#[derive(Debug, Clone)]
pub struct SidecarResolver {
    config: TomlConfig,
    start_dir: Option<PathBuf>,
}

impl SidecarResolver {
    pub fn new(config: TomlConfig) -> Self {
        Self {
            config,
            start_dir: None,
        }
    }

    /// Search for `sidecar/` from `dir` instead of the working directory
    pub fn with_start_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.start_dir = Some(dir.into());
        self
    }

    /// Resolve the project root following the priority order above.
    pub fn resolve_root(&self, cli_arg: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = cli_arg {
            return Ok(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(ROOT_ENV) {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = &self.config.root {
            return Ok(path.clone());
        }

        let mut dir = match &self.start_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        for _ in 0..ROOT_SEARCH_DEPTH {
            if dir.join("sidecar").is_dir() {
                return Ok(dir);
            }
            if !dir.pop() {
                break;
            }
        }
        Err(Error::Config(format!(
            "cannot resolve project root (set {})",
            ROOT_ENV
        )))
    }

    /// Resolve the Python interpreter for a given root.
    ///
    /// Priority: CLI argument, `NAI_PYTHON`, TOML `python`, the project's
    /// virtualenv, then `python` from `PATH`.
    pub fn resolve_python(&self, root: &Path, cli_arg: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(PYTHON_ENV) {
            return PathBuf::from(path);
        }
        if let Some(path) = &self.config.python {
            return path.clone();
        }

        let venv = root.join("venv");
        for candidate in [
            venv.join("Scripts").join("python.exe"),
            venv.join("bin").join("python"),
        ] {
            if candidate.exists() {
                return candidate;
            }
        }
        PathBuf::from("python")
    }
}

/// Path of the sidecar entry point under `root`
pub fn sidecar_script(root: &Path) -> PathBuf {
    root.join("sidecar").join("main.py")
}
