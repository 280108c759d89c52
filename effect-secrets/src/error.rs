use thiserror::Error;

/// Errors raised while loading, evaluating, or provisioning secrets.
#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("secrets file at {path} is not valid JSON: {source}")]
    SecretsFileUnparseable {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read secrets file at {path}: {source}")]
    SecretsFileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Covers both a denied access condition and a `secretsMap` entry whose
    /// source secret doesn't exist in the merged store — spec.md §7 names
    /// both as the same error kind ("lookup miss or condition false").
    #[error("access denied for secret destination '{dest_name}'")]
    SecretAccessDenied { dest_name: String },

    #[error(
        "secret destination '{dest_name}' has no access condition and strict mode requires one"
    )]
    SecretConditionMissing { dest_name: String },

    #[error("secretsMap environment entry is not valid JSON: {0}")]
    SecretsMapUnparseable(#[source] serde_json::Error),

    #[error("failed to create secrets directory {path}: {source}")]
    DestDirUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write secrets.json: {0}")]
    WriteFailed(#[source] std::io::Error),
}
