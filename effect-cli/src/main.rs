mod cli;
mod config;
mod error;

use std::process::ExitCode;

use clap::Parser;
use effect_core::{Derivation, RunEffectParams};
use effect_secrets::SecretContext;
use effect_sensitive::Sensitive;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Args;
use crate::config::Config;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(exit_code) => ExitCode::from(exit_code as u8),
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<i32, CliError> {
    let config = Config::load(args.config.as_ref())?;
    init_tracing(&config.log_level);

    let mut environment = cli::load_env_json(args.env_json.as_ref())?;
    environment
        .entry("IN_HERCULES_CI_EFFECT".to_string())
        .or_insert_with(|| b"true".to_vec());

    let derivation = Derivation {
        executable: args.executable.into_bytes(),
        arguments: args.arguments.into_iter().map(String::into_bytes).collect(),
        environment,
        output_name: args.output_name,
    };

    let project_id = args.project_id.clone().unwrap_or_default();
    let secret_context = args.repo.map(|repo| SecretContext {
        project_id,
        repo,
        branch: args.branch,
        tag: args.tag,
        is_owner: args.is_owner,
    });

    let token = args
        .token_env
        .and_then(|name| std::env::var(name).ok())
        .map(Sensitive::wrap);

    let cancellation = CancellationToken::new();
    tokio::spawn(shutdown_on_ctrl_c(cancellation.clone()));

    let params = RunEffectParams {
        derivation,
        token,
        secrets_config_path: args.secrets_config,
        secret_context,
        api_base_url: config.api_base_url,
        dir: args.dir,
        project_id: args.project_id,
        project_path: args.project_path,
        use_nix_daemon_proxy: args.use_nix_daemon_proxy,
        extra_nix_options: args.extra_nix_options,
        friendly: args.friendly,
        cancellation: Some(cancellation),
    };

    let outcome = effect_core::run_effect(params, &config.runtime_binary, &config.worker_binary).await?;

    for warning in &outcome.warnings {
        warn!("{warning}");
    }

    Ok(outcome.exit_code)
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Cancel `token` on ctrl-c, so the running effect gets a chance to kill its
/// container and daemon-proxy worker instead of leaving them orphaned.
async fn shutdown_on_ctrl_c(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("received interrupt, cancelling running effect");
        token.cancel();
    }
}
