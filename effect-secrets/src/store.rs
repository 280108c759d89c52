use std::collections::BTreeMap;
use std::path::Path;

use effect_sensitive::Sensitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::Condition;
use crate::error::SecretsError;

/// One entry in the secret database.
///
/// `data` is the material handed to the consumer; `condition` governs
/// whether the provisioner is allowed to hand it out. `condition` is
/// stripped before anything derived from `data` reaches disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub data: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

/// Load the secret database at `path`, if one is configured.
///
/// Reading is eager: the whole file is read into memory once per call. A
/// missing `path` is not an error — it yields an empty, still-sensitive map,
/// since an effect with no `secretsConfigPath` still owns zero secrets
/// rather than failing.
pub async fn load(path: Option<&Path>) -> Result<Sensitive<BTreeMap<String, Secret>>, SecretsError> {
    let Some(path) = path else {
        return Ok(Sensitive::wrap(BTreeMap::new()));
    };

    let contents = tokio::fs::read(path)
        .await
        .map_err(|source| SecretsError::SecretsFileUnreadable {
            path: path.display().to_string(),
            source,
        })?;

    let secrets: BTreeMap<String, Secret> =
        serde_json::from_slice(&contents).map_err(|source| SecretsError::SecretsFileUnparseable {
            path: path.display().to_string(),
            source,
        })?;

    Ok(Sensitive::wrap(secrets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_path_yields_empty_map() {
        let result = load(None).await.unwrap();
        assert!(result.reveal().is_empty());
    }

    #[tokio::test]
    async fn malformed_file_is_unparseable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let err = load(Some(&path)).await.unwrap_err();
        assert!(matches!(err, SecretsError::SecretsFileUnparseable { .. }));
    }

    #[tokio::test]
    async fn well_formed_file_loads_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        tokio::fs::write(
            &path,
            br#"{"deploy":{"data":{"k":"v"},"condition":{"type":"IsOwner"}}}"#,
        )
        .await
        .unwrap();

        let loaded = load(Some(&path)).await.unwrap().reveal();
        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded["deploy"].data.get("k").and_then(Value::as_str),
            Some("v")
        );
        assert_eq!(loaded["deploy"].condition, Some(Condition::IsOwner));
    }
}
