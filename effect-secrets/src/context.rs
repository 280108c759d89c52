use serde::{Deserialize, Serialize};

/// Runtime access context a [`crate::condition::Condition`] is evaluated
/// against.
///
/// Built by the controller from whatever it knows about the triggering
/// event (a push, a PR, a manual run) before handing an effect run to this
/// crate; this crate never constructs one itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretContext {
    /// Project identifier the effect is running for.
    pub project_id: String,
    /// Repository name/identifier the effect is running for.
    pub repo: String,
    /// The branch the run is on, if any (e.g. a tag-only run has none).
    pub branch: Option<String>,
    /// The tag the run is on, if any.
    pub tag: Option<String>,
    /// Whether the triggering actor owns the project (vs. e.g. a fork PR).
    pub is_owner: bool,
}
