use std::collections::BTreeMap;

use crate::derivation::Derivation;

/// Compose the in-container environment from three layers plus a fixed
/// tail, in increasing order of precedence: a derivation-overridable base,
/// the derivation's own environment, an impure-overridable layer, then a
/// fixed set that always wins.
pub fn compose_environment(
    derivation: &Derivation,
    api_base_url: &str,
    project_id: Option<&str>,
    project_path: Option<&str>,
) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();

    env.insert("PATH".to_string(), "/path-not-set".to_string());
    env.insert("HOME".to_string(), "/homeless-shelter".to_string());
    env.insert("NIX_STORE".to_string(), "/nix/store".to_string());
    env.insert("NIX_BUILD_CORES".to_string(), "1".to_string());
    env.insert("NIX_REMOTE".to_string(), "daemon".to_string());
    env.insert("IN_HERCULES_CI_EFFECT".to_string(), "true".to_string());
    env.insert("HERCULES_CI_API_BASE_URL".to_string(), api_base_url.to_string());
    env.insert(
        "HERCULES_CI_SECRETS_JSON".to_string(),
        "/secrets/secrets.json".to_string(),
    );
    if let Some(project_id) = project_id {
        env.insert("HERCULES_CI_PROJECT_ID".to_string(), project_id.to_string());
    }
    if let Some(project_path) = project_path {
        env.insert("HERCULES_CI_PROJECT_PATH".to_string(), project_path.to_string());
    }

    for (key, value) in &derivation.environment {
        env.insert(key.clone(), String::from_utf8_lossy(value).into_owned());
    }

    for (key, value) in impure_overridable() {
        env.insert(key.to_string(), value.to_string());
    }

    for (key, value) in fixed() {
        env.insert(key.to_string(), value.to_string());
    }

    env
}

fn impure_overridable() -> [(&'static str, &'static str); 5] {
    [
        ("NIX_BUILD_TOP", "/build"),
        ("TMPDIR", "/build"),
        ("TEMPDIR", "/build"),
        ("TMP", "/build"),
        ("TEMP", "/build"),
    ]
}

fn fixed() -> [(&'static str, &'static str); 2] {
    [("NIX_LOG_FD", "2"), ("TERM", "xterm-256color")]
}
