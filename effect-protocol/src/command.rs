use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::BuildStatus;

/// Parameters for an `Eval` command: which attribute to walk from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalParams {
    pub attribute_path: Vec<String>,
}

/// Parameters for a `Build` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildParams {
    pub drv_path: String,
    pub outputs: Vec<String>,
}

/// Messages sent from the controller to a worker subprocess.
///
/// The worker processes exactly one *starting* command — [`Command::Eval`]
/// or [`Command::Build`] — as the first frame on the stream; every other
/// variant either follows a starting command or, for [`Command::StartDaemon`],
/// is itself the sole starting command of a daemon-proxy worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Eval(EvalParams),
    Build(BuildParams),
    BuildResult {
        drv_path: String,
        attempt: Uuid,
        status: BuildStatus,
    },
    StartDaemon {
        socket_path: String,
    },
    /// Distinguished end-of-stream marker for the command stream.
    End,
}

impl Command {
    /// Whether this command is a legal *first* frame for an eval/build
    /// worker. `StartDaemon` has its own, separate worker kind (the
    /// nix-daemon proxy) and is never sent to an eval/build worker.
    pub fn is_eval_or_build_starting(&self) -> bool {
        matches!(self, Command::Eval(_) | Command::Build(_))
    }
}
