use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;

/// Run a single effect derivation through the execution core.
#[derive(Debug, Parser)]
#[command(name = "effect-runner", version, about)]
pub struct Args {
    /// Path to a TOML config file. Falls back to built-in defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run directory. Created fresh; `build/`, `etc/`, `secrets/`, and
    /// `runc-state/` are laid out underneath it.
    #[arg(long)]
    pub dir: PathBuf,

    /// Path to the builder executable, as seen inside the sandbox.
    #[arg(long)]
    pub executable: String,

    /// Builder argument, repeatable in order.
    #[arg(long = "arg")]
    pub arguments: Vec<String>,

    /// JSON file of string->string environment entries for the derivation,
    /// including a reserved `secretsMap` entry if secrets are needed.
    #[arg(long)]
    pub env_json: Option<PathBuf>,

    /// Nominal output name for this derivation.
    #[arg(long, default_value = "out")]
    pub output_name: String,

    /// Path to the secret database file.
    #[arg(long)]
    pub secrets_config: Option<PathBuf>,

    /// Project this effect runs for, surfaced to the derivation's
    /// environment and to secret-access conditions.
    #[arg(long)]
    pub project_id: Option<String>,

    #[arg(long)]
    pub project_path: Option<String>,

    /// Repository used by secret-access conditions (e.g. `acme/widgets`).
    #[arg(long)]
    pub repo: Option<String>,

    #[arg(long)]
    pub branch: Option<String>,

    #[arg(long)]
    pub tag: Option<String>,

    #[arg(long)]
    pub is_owner: bool,

    /// Relax secret-access control with warnings instead of denial.
    #[arg(long)]
    pub friendly: bool,

    /// Bring up a daemon-proxy worker and bind-mount its socket instead of
    /// the host's own store daemon.
    #[arg(long)]
    pub use_nix_daemon_proxy: bool,

    /// Extra `key=value` options forwarded to the daemon-proxy worker,
    /// repeatable.
    #[arg(long = "extra-nix-option", value_parser = parse_key_value)]
    pub extra_nix_options: Vec<(String, String)>,

    /// Name of an environment variable on this process holding the API
    /// token to merge into the effect's secrets under the conventional
    /// `hercules-ci` name. Never logged; read once and wrapped immediately.
    #[arg(long)]
    pub token_env: Option<String>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

/// Load the derivation's environment from `--env-json`, if given.
pub fn load_env_json(path: Option<&PathBuf>) -> Result<BTreeMap<String, Vec<u8>>, crate::error::CliError> {
    let Some(path) = path else {
        return Ok(BTreeMap::new());
    };
    let contents = std::fs::read(path).map_err(|source| crate::error::CliError::EnvFileUnreadable {
        path: path.clone(),
        source,
    })?;
    let raw: BTreeMap<String, String> = serde_json::from_slice(&contents)?;
    Ok(raw.into_iter().map(|(k, v)| (k, v.into_bytes())).collect())
}
