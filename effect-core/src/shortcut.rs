use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use effect_protocol::{BuildStatus, Event};
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::debug;
use uuid::Uuid;

use crate::error::EffectError;

/// The store layer's substitution primitive, as seen from the shortcut-build
/// callback. A real implementation talks to the Nix daemon; tests supply a
/// scripted fake.
#[async_trait]
pub trait Substituter: Send + Sync {
    async fn ensure_path(&self, drv_path: &str, output_name: &str) -> bool;
    fn clear_caches(&self);
}

/// Controller-side state shared between the evaluation task and the
/// protocol-reader task that feeds `drvs_completed`.
///
/// Each field is independently synchronized rather than guarded by one
/// shared lock, since the two tasks touch disjoint fields most of the time.
pub struct HerculesState {
    drvs_completed: Mutex<HashMap<String, (Uuid, BuildStatus)>>,
    completed_notify: Notify,
    drvs_in_progress: Mutex<HashSet<String>>,
    shortcut_tx: mpsc::Sender<Option<Event>>,
}

impl HerculesState {
    pub fn new(shortcut_tx: mpsc::Sender<Option<Event>>) -> Self {
        Self {
            drvs_completed: Mutex::new(HashMap::new()),
            completed_notify: Notify::new(),
            drvs_in_progress: Mutex::new(HashSet::new()),
            shortcut_tx,
        }
    }

    /// Record a build result and wake any callback waiting on it.
    pub async fn record_completed(&self, drv_path: String, attempt: Uuid, status: BuildStatus) {
        self.drvs_completed.lock().await.insert(drv_path, (attempt, status));
        self.completed_notify.notify_waiters();
    }

    async fn await_completed(&self, drv_path: &str, after: Option<Uuid>) -> (Uuid, BuildStatus) {
        loop {
            let notified = self.completed_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let map = self.drvs_completed.lock().await;
                if let Some((uuid, status)) = map.get(drv_path) {
                    if after.map_or(true, |a| *uuid != a) {
                        return (*uuid, *status);
                    }
                }
            }

            notified.await;
        }
    }
}

/// RAII guard releasing a `drvsInProgress` marker on every exit path,
/// including early returns via `?`.
struct InProgressGuard {
    state: Arc<HerculesState>,
    drv_path: String,
}

impl Drop for InProgressGuard {
    fn drop(&mut self) {
        let state = Arc::clone(&self.state);
        let drv_path = self.drv_path.clone();
        tokio::spawn(async move {
            state.drvs_in_progress.lock().await.remove(&drv_path);
        });
    }
}

fn build_failed(status: BuildStatus) -> bool {
    matches!(status, BuildStatus::Failure | BuildStatus::DependencyFailure)
}

/// The store-builder callback invoked during evaluation when `drv_path`'s
/// output `output_name` is not locally available.
///
/// Acquires an exclusive in-progress marker, emits a `Build` event, then
/// attempts substitution up to twice more after two failed rebuild rounds,
/// each round gated on a fresh `drvs_completed` entry reported by the
/// protocol-reader task.
pub async fn shortcut_build(
    state: Arc<HerculesState>,
    substituter: &dyn Substituter,
    drv_path: &str,
    output_name: &str,
) -> Result<(), EffectError> {
    {
        let mut in_progress = state.drvs_in_progress.lock().await;
        if !in_progress.insert(drv_path.to_string()) {
            return Err(EffectError::ConcurrentBuildDenied {
                drv_path: drv_path.to_string(),
            });
        }
    }
    let _guard = InProgressGuard {
        state: Arc::clone(&state),
        drv_path: drv_path.to_string(),
    };

    emit_build(&state, drv_path, output_name, None).await;

    if substituter.ensure_path(drv_path, output_name).await {
        return Ok(());
    }

    let (attempt0, status0) = state.await_completed(drv_path, None).await;
    if build_failed(status0) {
        return Err(EffectError::BuildException {
            drv_path: drv_path.to_string(),
            detail: Some(format!("dependency build reported {status0:?}")),
        });
    }
    substituter.clear_caches();
    if substituter.ensure_path(drv_path, output_name).await {
        return Ok(());
    }

    emit_build(&state, drv_path, output_name, Some(attempt0)).await;
    let (attempt1, status1) = state.await_completed(drv_path, Some(attempt0)).await;
    if build_failed(status1) {
        return Err(EffectError::BuildException {
            drv_path: drv_path.to_string(),
            detail: Some(format!("dependency build reported {status1:?}")),
        });
    }
    debug_assert_ne!(attempt0, attempt1);
    substituter.clear_caches();
    if substituter.ensure_path(drv_path, output_name).await {
        return Ok(());
    }

    Err(EffectError::BuildException {
        drv_path: drv_path.to_string(),
        detail: Some("substitution failed despite a reported successful rebuild".to_string()),
    })
}

async fn emit_build(
    state: &HerculesState,
    drv_path: &str,
    output_name: &str,
    previous_attempt: Option<Uuid>,
) {
    let event = Event::Build {
        drv_path: drv_path.to_string(),
        output_name: output_name.to_string(),
        previous_attempt,
    };
    debug!(?event, "shortcut build callback emitting event");
    let _ = state.shortcut_tx.send(Some(event)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedSubstituter {
        successes_after: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Substituter for ScriptedSubstituter {
        async fn ensure_path(&self, _drv_path: &str, _output_name: &str) -> bool {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            call >= self.successes_after
        }

        fn clear_caches(&self) {}
    }

    fn new_state() -> (Arc<HerculesState>, mpsc::Receiver<Option<Event>>) {
        let (tx, rx) = mpsc::channel(8);
        (Arc::new(HerculesState::new(tx)), rx)
    }

    #[tokio::test]
    async fn first_substitution_success_short_circuits() {
        let (state, mut rx) = new_state();
        let substituter = ScriptedSubstituter {
            successes_after: 0,
            calls: AtomicUsize::new(0),
        };

        shortcut_build(Arc::clone(&state), &substituter, "/nix/store/foo.drv", "out")
            .await
            .unwrap();

        assert!(matches!(rx.recv().await, Some(Some(Event::Build { previous_attempt: None, .. }))));
        assert!(state.drvs_in_progress.lock().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_callback_on_same_path_is_denied() {
        let (state, _rx) = new_state();
        state
            .drvs_in_progress
            .lock()
            .await
            .insert("/nix/store/foo.drv".to_string());

        let substituter = ScriptedSubstituter {
            successes_after: 0,
            calls: AtomicUsize::new(0),
        };
        let err = shortcut_build(Arc::clone(&state), &substituter, "/nix/store/foo.drv", "out")
            .await
            .unwrap_err();
        assert!(matches!(err, EffectError::ConcurrentBuildDenied { .. }));
    }

    #[tokio::test]
    async fn retries_until_third_attempt_succeeds() {
        let (state, mut rx) = new_state();
        let substituter = ScriptedSubstituter {
            successes_after: 2,
            calls: AtomicUsize::new(0),
        };

        let drv_path = "/nix/store/foo.drv";
        let state_for_feeder = Arc::clone(&state);
        let feeder = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            state_for_feeder
                .record_completed(drv_path.to_string(), Uuid::new_v4(), BuildStatus::Success)
                .await;
        });

        shortcut_build(Arc::clone(&state), &substituter, drv_path, "out")
            .await
            .unwrap();
        feeder.await.unwrap();

        let first = rx.recv().await.unwrap().unwrap();
        assert!(matches!(first, Event::Build { previous_attempt: None, .. }));
        let second = rx.recv().await.unwrap().unwrap();
        assert!(matches!(second, Event::Build { previous_attempt: Some(_), .. }));
    }

    #[tokio::test]
    async fn dependency_failure_status_ends_the_callback() {
        let (state, _rx) = new_state();
        let substituter = ScriptedSubstituter {
            successes_after: 99,
            calls: AtomicUsize::new(0),
        };

        let drv_path = "/nix/store/foo.drv";
        let state_for_feeder = Arc::clone(&state);
        let feeder = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            state_for_feeder
                .record_completed(drv_path.to_string(), Uuid::new_v4(), BuildStatus::Failure)
                .await;
        });

        let err = shortcut_build(Arc::clone(&state), &substituter, drv_path, "out")
            .await
            .unwrap_err();
        feeder.await.unwrap();
        assert!(matches!(err, EffectError::BuildException { .. }));
    }
}
