use std::collections::BTreeMap;

use effect_sensitive::Sensitive;
use effect_secrets::SecretContext;
use tokio_util::sync::CancellationToken;

/// A fully-resolved build recipe: executable, arguments, and environment,
/// each as opaque bytes. Immutable across the run it describes.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub executable: Vec<u8>,
    pub arguments: Vec<Vec<u8>>,
    pub environment: BTreeMap<String, Vec<u8>>,
    pub output_name: String,
}

/// Inputs to one effect run.
pub struct RunEffectParams {
    pub derivation: Derivation,
    pub token: Option<Sensitive<String>>,
    pub secrets_config_path: Option<std::path::PathBuf>,
    pub secret_context: Option<SecretContext>,
    pub api_base_url: String,
    pub dir: std::path::PathBuf,
    pub project_id: Option<String>,
    pub project_path: Option<String>,
    pub use_nix_daemon_proxy: bool,
    pub extra_nix_options: Vec<(String, String)>,
    pub friendly: bool,
    /// Cancelled when the enclosing scope gives up on this effect; raced
    /// against both the daemon-proxy worker and the container runtime so
    /// neither outlives the caller's interest in the result. `None` runs
    /// the effect with no cancellation path, e.g. in tests.
    pub cancellation: Option<CancellationToken>,
}
