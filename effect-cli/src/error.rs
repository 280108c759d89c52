use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("failed to read config file {path}: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file: {0}")]
    ConfigMalformed(#[from] toml::de::Error),

    #[error("failed to read derivation environment file {path}: {source}")]
    EnvFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed derivation environment file: {0}")]
    EnvFileMalformed(#[from] serde_json::Error),

    #[error(transparent)]
    Effect(#[from] effect_core::EffectError),
}
