use std::collections::BTreeMap;

use effect_container::{BindMount, ContainerConfig};
use effect_secrets::{Secret, TOKEN_SECRET_NAME};
use serde_json::Value;
use tracing::{info, instrument};

use crate::derivation::RunEffectParams;
use crate::environment::compose_environment;
use crate::error::EffectError;
use crate::layout::{host_nix_daemon_socket, RunLayout};
use crate::outcome::EffectOutcome;

/// Run one effect end to end: provision secrets, optionally bring up a
/// daemon proxy, launch the container, and report its exit code.
///
/// `runtime_binary` and `worker_binary` name the low-level OCI runtime and
/// the worker subprocess executable respectively; both are external
/// collaborators the core only knows how to invoke.
#[instrument(skip(params), fields(output = %params.derivation.output_name))]
pub async fn run_effect(
    params: RunEffectParams,
    runtime_binary: &str,
    worker_binary: &str,
) -> Result<EffectOutcome, EffectError> {
    let layout = RunLayout::create(&params.dir).await?;

    let secrets_map = effect_secrets::parse_secrets_map(&params.derivation.environment)
        .map_err(EffectError::Secrets)?;

    let mut extra_secrets = BTreeMap::new();
    if let Some(token) = &params.token {
        let mut data = BTreeMap::new();
        data.insert("token".to_string(), Value::String(token.reveal_ref().clone()));
        extra_secrets.insert(
            TOKEN_SECRET_NAME.to_string(),
            Secret { data, condition: None },
        );
    }

    let warnings = effect_secrets::provision(
        params.friendly,
        params.secret_context.as_ref(),
        params.secrets_config_path.as_deref(),
        &secrets_map,
        extra_secrets,
        &layout.secrets,
    )
    .await?;

    let daemon_socket_path = if params.use_nix_daemon_proxy {
        layout.nix_daemon_socket.clone()
    } else {
        host_nix_daemon_socket().to_path_buf()
    };

    let container_config = build_container_config(&params, &layout, &daemon_socket_path);

    info!(
        use_nix_daemon_proxy = params.use_nix_daemon_proxy,
        dir = %layout.dir.display(),
        "launching effect"
    );

    let cancellation = params.cancellation.as_ref();

    let exit_code = if params.use_nix_daemon_proxy {
        let extra_options: Vec<String> = params
            .extra_nix_options
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        effect_daemon_proxy::with_daemon_proxy(
            worker_binary,
            &extra_options,
            &layout.nix_daemon_socket,
            cancellation,
            || async {
                effect_container::run(runtime_binary, &layout.runc_state, &container_config, cancellation).await
            },
        )
        .await??
    } else {
        effect_container::run(runtime_binary, &layout.runc_state, &container_config, cancellation).await?
    };

    Ok(EffectOutcome { exit_code, warnings })
}

fn build_container_config(
    params: &RunEffectParams,
    layout: &RunLayout,
    daemon_socket_path: &std::path::Path,
) -> ContainerConfig {
    let environment = compose_environment(
        &params.derivation,
        &params.api_base_url,
        params.project_id.as_deref(),
        params.project_path.as_deref(),
    );

    let executable = String::from_utf8_lossy(&params.derivation.executable).into_owned();
    let arguments = params
        .derivation
        .arguments
        .iter()
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect();

    ContainerConfig {
        extra_bind_mounts: vec![
            BindMount {
                path_in_container: "/build".into(),
                path_in_host: layout.build.clone(),
                read_only: false,
            },
            BindMount {
                path_in_container: "/etc".into(),
                path_in_host: layout.etc.clone(),
                read_only: false,
            },
            BindMount {
                path_in_container: "/secrets".into(),
                path_in_host: layout.secrets.clone(),
                read_only: true,
            },
            BindMount {
                path_in_container: "/etc/resolv.conf".into(),
                path_in_host: "/etc/resolv.conf".into(),
                read_only: false,
            },
            BindMount {
                path_in_container: "/nix/var/nix/daemon-socket/socket".into(),
                path_in_host: daemon_socket_path.to_path_buf(),
                read_only: true,
            },
        ],
        executable,
        arguments,
        environment,
        working_directory: "/build".to_string(),
        hostname: "hercules-ci".to_string(),
        root_read_only: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::Derivation;

    fn trivial_params(dir: std::path::PathBuf) -> RunEffectParams {
        RunEffectParams {
            derivation: Derivation {
                executable: b"/bin/true".to_vec(),
                arguments: Vec::new(),
                environment: BTreeMap::new(),
                output_name: "out".to_string(),
            },
            token: None,
            secrets_config_path: None,
            secret_context: None,
            api_base_url: "https://hercules-ci.example".to_string(),
            dir,
            project_id: None,
            project_path: None,
            use_nix_daemon_proxy: false,
            extra_nix_options: Vec::new(),
            friendly: false,
            cancellation: None,
        }
    }

    #[tokio::test]
    async fn happy_path_no_secrets_no_proxy_returns_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let params = trivial_params(dir.path().to_path_buf());

        let outcome = run_effect(params, "/bin/true", "unused-worker-binary")
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.warnings.is_empty());
        assert!(!dir.path().join("secrets/secrets.json").exists());
    }
}
