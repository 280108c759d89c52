use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("failed to spawn daemon-proxy worker '{binary}': {source}")]
    SpawnFailed {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("daemon-proxy worker exited before signaling readiness (exit code {0})")]
    DaemonExitedBeforeReady(i32),

    #[error("daemon-proxy protocol error: {0}")]
    Protocol(#[from] effect_protocol::ProtocolError),

    #[error("io error talking to daemon-proxy worker: {0}")]
    Io(#[from] std::io::Error),
}
