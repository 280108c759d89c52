use thiserror::Error;

/// Errors surfaced by a single effect run, with their kind preserved rather
/// than collapsed into a string.
#[derive(Error, Debug)]
pub enum EffectError {
    #[error(transparent)]
    Secrets(#[from] effect_secrets::SecretsError),

    #[error(transparent)]
    Container(#[from] effect_container::ContainerError),

    #[error(transparent)]
    DaemonProxy(#[from] effect_daemon_proxy::ProxyError),

    /// A shortcut-build callback found `drvsInProgress` already held for this
    /// path; exactly one concurrent callback may proceed per path.
    #[error("concurrent shortcut build denied for {drv_path}")]
    ConcurrentBuildDenied { drv_path: String },

    /// Substitution failed even after the documented two retries.
    #[error("build of {drv_path} failed{}", detail.as_ref().map(|d| format!(": {d}")).unwrap_or_default())]
    BuildException {
        drv_path: String,
        detail: Option<String>,
    },

    /// The log-shipping drain did not finish within its 600-second budget.
    /// Unlike the daemon-proxy drain timeout, this one is fatal.
    #[error("log drain did not complete within the allotted time")]
    LogDrainTimeout,

    /// Catch-all for infrastructure invariants that should never trip.
    #[error("fatal error: {0}")]
    FatalError(String),

    #[error("failed to create run directory {path}: {source}")]
    RunDirUnavailable {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
