use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Static configuration for the effect runner binary: which external
/// collaborators to invoke and how verbosely to log. Everything specific to
/// a single run (the derivation, its secrets, the run directory) comes from
/// command-line arguments instead, since it varies per invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Low-level OCI runtime binary invoked by the Container Runner.
    pub runtime_binary: String,

    /// Worker subprocess binary, used both for evaluation/build workers and
    /// as the `nix-daemon` proxy.
    pub worker_binary: String,

    /// Base URL effects use to reach back to the controller's API.
    pub api_base_url: String,

    /// `tracing-subscriber` `EnvFilter` directive, e.g. "info" or
    /// "effect_core=debug,effect_container=info".
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime_binary: "runc".to_string(),
            worker_binary: "effect-worker".to_string(),
            api_base_url: "https://hercules-ci.com".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CliError::ConfigUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(CliError::ConfigMalformed)
    }

    pub fn load(path: Option<&PathBuf>) -> Result<Self, CliError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}
