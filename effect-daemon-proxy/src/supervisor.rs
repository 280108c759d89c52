use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use effect_protocol::{Command, Event, FrameReader, FrameWriter};
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ProxyError;
use crate::state::DaemonProxyState;

/// Overall budget for the worker to exit after being asked to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Spawn a `nix-daemon` worker, wait for it to report readiness on
/// `socket_path`, run `inner`, then drain and wait for the worker to exit.
///
/// `inner`'s result is returned regardless of how the drain goes — a stuck
/// or slow-to-exit worker is logged and abandoned, never surfaced as an
/// error of the effect itself.
///
/// If `cancellation` fires before the worker reports readiness, the worker
/// is killed and `ProxyError::DaemonExitedBeforeReady` is returned; `inner`
/// itself is expected to race the same token against its own work and
/// return promptly, so no separate cancellation race wraps `inner().await`
/// here.
pub async fn with_daemon_proxy<F, Fut, T>(
    worker_binary: &str,
    extra_options: &[String],
    socket_path: &Path,
    cancellation: Option<&CancellationToken>,
    inner: F,
) -> Result<T, ProxyError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let mut state = DaemonProxyState::Spawning;
    debug!(?state, binary = worker_binary, "spawning daemon-proxy worker");

    let options_arg = serde_json::to_string(extra_options).unwrap_or_default();
    let mut child = tokio::process::Command::new(worker_binary)
        .arg("nix-daemon")
        .arg(options_arg)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| ProxyError::SpawnFailed {
            binary: worker_binary.to_string(),
            source,
        })?;

    let stdin = child.stdin.take().expect("stdin was piped");
    let stdout = child.stdout.take().expect("stdout was piped");
    let mut writer = FrameWriter::new(stdin);
    let mut reader = FrameReader::new(stdout);

    writer
        .write_command(&Command::StartDaemon {
            socket_path: socket_path.display().to_string(),
        })
        .await?;

    let became_ready = match cancellation {
        Some(token) => {
            tokio::select! {
                ready = wait_for_ready(&mut reader) => ready?,
                () = token.cancelled() => {
                    warn!("cancellation requested before daemon-proxy worker became ready");
                    let _ = child.start_kill();
                    false
                }
            }
        }
        None => wait_for_ready(&mut reader).await?,
    };
    if !became_ready {
        state = DaemonProxyState::Failed;
        let exit_code = reap(&mut child).await;
        debug!(?state, exit_code, "daemon-proxy worker exited before readiness");
        return Err(ProxyError::DaemonExitedBeforeReady(exit_code));
    }

    state = DaemonProxyState::Ready;
    debug!(?state, "daemon-proxy worker ready");

    state = DaemonProxyState::Running;
    let result = inner().await;

    state = DaemonProxyState::Draining;
    debug!(?state, "draining daemon-proxy worker");
    let _ = writer.write_command(&Command::End).await;
    drop(writer);

    match tokio::time::timeout(DRAIN_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => {
            state = DaemonProxyState::Stopped;
            debug!(?state, code = status.code(), "daemon-proxy worker stopped");
        }
        Ok(Err(e)) => {
            state = DaemonProxyState::Failed;
            warn!(?state, error = %e, "error waiting for daemon-proxy worker to exit");
        }
        Err(_) => {
            state = DaemonProxyState::Failed;
            warn!(?state, "daemon-proxy worker did not exit within the drain timeout, abandoning it");
            let _ = child.start_kill();
        }
    }

    Ok(result)
}

/// Consume events until `DaemonStarted` arrives or the stream closes.
async fn wait_for_ready<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
) -> Result<bool, ProxyError> {
    loop {
        match reader.read_event().await? {
            Some(Event::DaemonStarted) => return Ok(true),
            Some(other) => debug!(?other, "event received before daemon readiness"),
            None => return Ok(false),
        }
    }
}

async fn reap(child: &mut Child) -> i32 {
    match child.wait().await {
        Ok(status) => status.code().unwrap_or(-1),
        Err(_) => -1,
    }
}
