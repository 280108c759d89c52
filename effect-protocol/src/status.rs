use serde::{Deserialize, Serialize};

/// Outcome of a build, as reported back through `drvsCompleted` and the
/// `BuildResult` command/event pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStatus {
    Success,
    Failure,
    DependencyFailure,
}
