use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::BuildStatus;

/// Messages sent from a worker subprocess back to the controller.
///
/// Events are emitted in producer order; the controller must not reorder
/// them. A single stream is owned by exactly one worker subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Attribute {
        path: Vec<String>,
        drv_path: String,
    },
    AttributeError {
        path: Vec<String>,
        message: String,
        error_derivation: Option<String>,
        error_type: Option<String>,
    },
    Build {
        drv_path: String,
        output_name: String,
        previous_attempt: Option<Uuid>,
    },
    BuildResult {
        drv_path: String,
        attempt: Uuid,
        status: BuildStatus,
    },
    DaemonStarted,
    Error(String),
    /// An uncaught error inside the worker; always followed by process exit
    /// with a failure status.
    Exception(String),
    EvaluationDone,
}
