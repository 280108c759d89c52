//! Framed, typed bidirectional stream between a controller and a worker
//! subprocess.
//!
//! A single stream carries one tagged value per frame — a [`Command`] in
//! the controller-to-worker direction, an [`Event`] in the other — each
//! prefixed on the wire by a big-endian `u32` byte length. This is the
//! transport two very different workers share: the eval/build worker
//! (`Command::Eval` / `Command::Build`) and the nix-daemon proxy worker
//! (`Command::StartDaemon`), each expecting a different starting command.

pub mod command;
pub mod error;
pub mod event;
pub mod framing;
pub mod status;

pub use command::{BuildParams, Command, EvalParams};
pub use error::ProtocolError;
pub use event::Event;
pub use framing::{FrameReader, FrameWriter};
pub use status::BuildStatus;
