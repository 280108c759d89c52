use std::path::{Path, PathBuf};

use crate::error::EffectError;

/// The per-run directory layout. Created fresh for every invocation and
/// torn down by the caller once the effect has finished.
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub dir: PathBuf,
    pub build: PathBuf,
    pub etc: PathBuf,
    pub secrets: PathBuf,
    pub runc_state: PathBuf,
    pub nix_daemon_socket: PathBuf,
}

impl RunLayout {
    /// Create `build/`, `etc/`, `secrets/`, and `runc-state/` under `dir`.
    /// The `nix-daemon-socket` path is computed but never created here — the
    /// daemon-proxy worker creates the socket itself before it signals
    /// readiness.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self, EffectError> {
        let dir = dir.into();
        let layout = Self {
            build: dir.join("build"),
            etc: dir.join("etc"),
            secrets: dir.join("secrets"),
            runc_state: dir.join("runc-state"),
            nix_daemon_socket: dir.join("nix-daemon-socket"),
            dir,
        };

        for path in [&layout.build, &layout.etc, &layout.secrets, &layout.runc_state] {
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|source| EffectError::RunDirUnavailable {
                    path: path.clone(),
                    source,
                })?;
        }

        Ok(layout)
    }

    pub fn secrets_json(&self) -> PathBuf {
        self.secrets.join("secrets.json")
    }
}

/// Path to the host's own store-daemon socket, used as the bind-mount source
/// when the effect does not request a daemon proxy.
pub fn host_nix_daemon_socket() -> &'static Path {
    Path::new("/nix/var/nix/daemon-socket/socket")
}
