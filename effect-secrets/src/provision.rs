use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::condition::evaluate_trace;
use crate::context::SecretContext;
use crate::error::SecretsError;
use crate::store::{self, Secret};

/// destination-name -> source-secret-name, parsed from the derivation's
/// reserved `secretsMap` environment entry.
pub type SecretsMap = BTreeMap<String, String>;

/// Conventional extra-secret name under which a wrapped API token is merged
/// into the secret map before provisioning.
pub const TOKEN_SECRET_NAME: &str = "hercules-ci";

/// Parse the `secretsMap` entry out of a derivation's environment.
///
/// Absent entirely, this yields an empty map (nothing to provision).
pub fn parse_secrets_map(env: &BTreeMap<String, Vec<u8>>) -> Result<SecretsMap, SecretsError> {
    let Some(raw) = env.get("secretsMap") else {
        return Ok(SecretsMap::new());
    };
    serde_json::from_slice(raw).map_err(SecretsError::SecretsMapUnparseable)
}

/// Resolve `secrets_map` against the secret store at `source_path` (merged
/// with `extra_secrets`), enforce each entry's access condition, and write
/// the result to `dest_dir/secrets.json`.
///
/// Returns any friendly-mode warnings that were emitted along the way, so a
/// caller can surface them even when no logging subscriber is attached.
pub async fn provision(
    friendly: bool,
    ctx: Option<&SecretContext>,
    source_path: Option<&Path>,
    secrets_map: &SecretsMap,
    extra_secrets: BTreeMap<String, Secret>,
    dest_dir: &Path,
) -> Result<Vec<String>, SecretsError> {
    if secrets_map.is_empty() {
        debug!("secretsMap is empty, nothing to provision");
        return Ok(Vec::new());
    }

    let loaded = store::load(source_path).await?.reveal();
    let mut merged = loaded;
    merged.extend(extra_secrets);

    let mut warnings = Vec::new();
    let mut output: BTreeMap<String, Secret> = BTreeMap::new();

    for (dest_name, src_name) in secrets_map {
        let secret = merged
            .get(src_name)
            .ok_or_else(|| SecretsError::SecretAccessDenied {
                dest_name: dest_name.clone(),
            })?;

        match (friendly, &secret.condition, ctx) {
            (false, None, _) => {
                return Err(SecretsError::SecretConditionMissing {
                    dest_name: dest_name.clone(),
                });
            }
            (false, Some(cond), Some(ctx)) => {
                if !evaluate_trace(ctx, cond).1 {
                    return Err(SecretsError::SecretAccessDenied {
                        dest_name: dest_name.clone(),
                    });
                }
            }
            (false, Some(_), None) => {
                return Err(SecretsError::SecretAccessDenied {
                    dest_name: dest_name.clone(),
                });
            }
            (true, None, _) => {
                let msg = format!(
                    "secret '{dest_name}' has no access condition; allowing under friendly mode (deprecated)"
                );
                warn!("{msg}");
                warnings.push(msg);
            }
            (true, Some(cond), Some(ctx)) => {
                let (trace, allowed) = evaluate_trace(ctx, cond);
                if !allowed {
                    for line in &trace {
                        warn!("{line}");
                    }
                    return Err(SecretsError::SecretAccessDenied {
                        dest_name: dest_name.clone(),
                    });
                }
            }
            (true, Some(_), None) => {
                let msg = format!(
                    "secret '{dest_name}' has a condition but no context is available; access control skipped"
                );
                warn!("{msg}");
                warnings.push(msg);
            }
        }

        output.insert(
            dest_name.clone(),
            Secret {
                data: secret.data.clone(),
                condition: None,
            },
        );
    }

    write_secrets_json(dest_dir, &output).await?;

    Ok(warnings)
}

async fn write_secrets_json(
    dest_dir: &Path,
    secrets: &BTreeMap<String, Secret>,
) -> Result<(), SecretsError> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|source| SecretsError::DestDirUnavailable {
            path: dest_dir.display().to_string(),
            source,
        })?;

    let body: BTreeMap<&str, Value> = secrets
        .iter()
        .map(|(name, secret)| (name.as_str(), serde_json::to_value(secret).unwrap()))
        .collect();
    let serialized = serde_json::to_vec_pretty(&body).map_err(|e| {
        SecretsError::WriteFailed(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    let dest_dir = dest_dir.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), SecretsError> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dest_dir).map_err(SecretsError::WriteFailed)?;
        use std::io::Write;
        tmp.write_all(&serialized).map_err(SecretsError::WriteFailed)?;
        tmp.persist(dest_dir.join("secrets.json"))
            .map_err(|e| SecretsError::WriteFailed(e.error))?;
        Ok(())
    })
    .await
    .expect("spawn_blocking join")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;

    fn ctx(branch: &str, is_owner: bool) -> SecretContext {
        SecretContext {
            project_id: "proj".to_string(),
            repo: "acme/widgets".to_string(),
            branch: Some(branch.to_string()),
            tag: None,
            is_owner,
        }
    }

    fn source_with(branch_name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        let mut secrets = BTreeMap::new();
        secrets.insert(
            "deploy".to_string(),
            Secret {
                data: BTreeMap::from([("k".to_string(), Value::from("v"))]),
                condition: Some(Condition::IsBranch(branch_name.to_string())),
            },
        );
        std::fs::write(&path, serde_json::to_vec(&secrets).unwrap()).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn empty_secrets_map_writes_nothing() {
        let dest = tempfile::tempdir().unwrap();
        let warnings = provision(
            false,
            None,
            None,
            &SecretsMap::new(),
            BTreeMap::new(),
            dest.path(),
        )
        .await
        .unwrap();
        assert!(warnings.is_empty());
        assert!(!dest.path().join("secrets.json").exists());
    }

    #[tokio::test]
    async fn unknown_source_secret_is_denied() {
        let dest = tempfile::tempdir().unwrap();
        let mut map = SecretsMap::new();
        map.insert("aws".to_string(), "missing".to_string());

        let err = provision(true, None, None, &map, BTreeMap::new(), dest.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SecretsError::SecretAccessDenied { .. }));
    }

    #[tokio::test]
    async fn provisioning_twice_is_byte_identical() {
        let (_source_dir, source_path) = source_with("main");
        let dest = tempfile::tempdir().unwrap();
        let mut map = SecretsMap::new();
        map.insert("aws".to_string(), "deploy".to_string());
        let context = ctx("main", true);

        provision(
            false,
            Some(&context),
            Some(&source_path),
            &map,
            BTreeMap::new(),
            dest.path(),
        )
        .await
        .unwrap();
        let first = std::fs::read(dest.path().join("secrets.json")).unwrap();

        provision(
            false,
            Some(&context),
            Some(&source_path),
            &map,
            BTreeMap::new(),
            dest.path(),
        )
        .await
        .unwrap();
        let second = std::fs::read(dest.path().join("secrets.json")).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn extra_secrets_shadow_file_entries() {
        let (_source_dir, source_path) = source_with("main");
        let dest = tempfile::tempdir().unwrap();
        let mut map = SecretsMap::new();
        map.insert("aws".to_string(), "deploy".to_string());

        let mut extra = BTreeMap::new();
        extra.insert(
            "deploy".to_string(),
            Secret {
                data: BTreeMap::from([("k".to_string(), Value::from("override"))]),
                condition: None,
            },
        );

        let warnings = provision(true, None, Some(&source_path), &map, extra, dest.path())
            .await
            .unwrap();
        assert_eq!(warnings.len(), 1);

        let written: BTreeMap<String, Secret> =
            serde_json::from_slice(&std::fs::read(dest.path().join("secrets.json")).unwrap())
                .unwrap();
        assert_eq!(
            written["aws"].data.get("k").and_then(Value::as_str),
            Some("override")
        );
        assert!(written["aws"].condition.is_none());
    }
}
