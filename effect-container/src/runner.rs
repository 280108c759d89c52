use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ContainerConfig;
use crate::error::ContainerError;
use crate::spec::build_spec;

/// Construct a runtime spec for `config`, invoke `runtime_binary` against
/// it under `state_dir`, and return the builder's exit code verbatim.
///
/// A missing bind-mount source fails fast, before the runtime is ever
/// spawned. Any other non-zero exit from the runtime is returned as-is —
/// it is not an error of the runner itself, only of the effect it ran.
///
/// `cancellation`, if given, is raced against the runtime's own exit; on
/// cancellation the runtime is killed and its (now largely meaningless)
/// exit code is still returned, since container runs have no error variant
/// of their own for "the caller gave up".
pub async fn run(
    runtime_binary: &str,
    state_dir: &Path,
    config: &ContainerConfig,
    cancellation: Option<&CancellationToken>,
) -> Result<i32, ContainerError> {
    for bind in &config.extra_bind_mounts {
        if tokio::fs::metadata(&bind.path_in_host).await.is_err() {
            return Err(ContainerError::MissingBindMountSource(
                bind.path_in_host.clone(),
            ));
        }
    }

    tokio::fs::create_dir_all(state_dir)
        .await
        .map_err(|source| ContainerError::StateDirUnavailable {
            path: state_dir.to_path_buf(),
            source,
        })?;

    let uid = nix::unistd::getuid().as_raw();
    let gid = nix::unistd::getgid().as_raw();
    let spec = build_spec(config, uid, gid);

    let spec_path = state_dir.join("config.json");
    let serialized = serde_json::to_vec_pretty(&spec).expect("RuntimeSpec is always serializable");
    tokio::fs::write(&spec_path, &serialized)
        .await
        .map_err(|source| ContainerError::SpecWriteFailed {
            path: spec_path.clone(),
            source,
        })?;

    debug!(binary = runtime_binary, bundle = %state_dir.display(), "invoking container runtime");

    let mut child = tokio::process::Command::new(runtime_binary)
        .arg("run")
        .arg("--bundle")
        .arg(state_dir)
        .arg(container_id(state_dir))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ContainerError::SpawnFailed {
            binary: runtime_binary.to_string(),
            source,
        })?;

    let mut stdout = child.stdout.take().expect("stdout was piped");
    let mut stderr = child.stderr.take().expect("stderr was piped");
    let stdout_forward = tokio::spawn(async move {
        let _ = tokio::io::copy(&mut stdout, &mut tokio::io::stderr()).await;
    });
    let stderr_forward = tokio::spawn(async move {
        let _ = tokio::io::copy(&mut stderr, &mut tokio::io::stderr()).await;
    });

    let status = match cancellation {
        Some(token) => {
            tokio::select! {
                status = child.wait() => status.map_err(ContainerError::WaitFailed)?,
                () = token.cancelled() => {
                    warn!("cancellation requested, killing container runtime");
                    let _ = child.start_kill();
                    child.wait().await.map_err(ContainerError::WaitFailed)?
                }
            }
        }
        None => child.wait().await.map_err(ContainerError::WaitFailed)?,
    };
    let _ = tokio::io::stderr().flush().await;
    let _ = stdout_forward.await;
    let _ = stderr_forward.await;

    let code = status.code().unwrap_or(-1);
    info!(exit_code = code, "container runtime exited");
    Ok(code)
}

/// Derive a stable container id from the state directory so repeated runs
/// in distinct state dirs never collide.
fn container_id(state_dir: &Path) -> String {
    state_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "effect".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BindMount;
    use std::collections::BTreeMap;

    fn base_config() -> ContainerConfig {
        ContainerConfig {
            extra_bind_mounts: Vec::new(),
            executable: "/bin/true".to_string(),
            arguments: Vec::new(),
            environment: BTreeMap::new(),
            working_directory: "/build".to_string(),
            hostname: "hercules-ci".to_string(),
            root_read_only: false,
        }
    }

    #[tokio::test]
    async fn missing_bind_mount_source_fails_before_launch() {
        let state_dir = tempfile::tempdir().unwrap();
        let mut config = base_config();
        config.extra_bind_mounts.push(BindMount {
            path_in_container: "/secrets".into(),
            path_in_host: "/nonexistent/path/for/this/test".into(),
            read_only: true,
        });

        let err = run("runc", state_dir.path(), &config, None).await.unwrap_err();
        assert!(matches!(err, ContainerError::MissingBindMountSource(_)));
    }

    #[tokio::test]
    async fn writes_runtime_spec_before_launch() {
        let state_dir = tempfile::tempdir().unwrap();
        let config = base_config();

        let code = run("/bin/true", state_dir.path(), &config, None).await.unwrap();
        assert_eq!(code, 0);
        assert!(state_dir.path().join("config.json").exists());
    }

    #[tokio::test]
    async fn exit_code_is_returned_verbatim_and_not_an_error() {
        let state_dir = tempfile::tempdir().unwrap();
        let config = base_config();

        let code = run("/bin/false", state_dir.path(), &config, None).await.unwrap();
        assert_eq!(code, 1);
    }
}
