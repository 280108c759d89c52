use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single bind mount from the host into the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub path_in_container: PathBuf,
    pub path_in_host: PathBuf,
    pub read_only: bool,
}

/// Everything the Container Runner needs to launch one builder.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub extra_bind_mounts: Vec<BindMount>,
    pub executable: String,
    pub arguments: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub working_directory: String,
    pub hostname: String,
    pub root_read_only: bool,
}
