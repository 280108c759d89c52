use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("bind-mount source does not exist on the host: {0}")]
    MissingBindMountSource(PathBuf),

    #[error("failed to create state directory {path}: {source}")]
    StateDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write runtime spec to {path}: {source}")]
    SpecWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn runtime binary '{binary}': {source}")]
    SpawnFailed {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for runtime binary: {0}")]
    WaitFailed(#[source] std::io::Error),
}
