//! Daemon Proxy Supervisor: spawns a `nix-daemon` worker subprocess, waits
//! for it to bind its store-gateway socket, runs a caller-supplied effect,
//! and drains the worker afterward.
//!
//! The supervised worker speaks the same framed protocol as the eval/build
//! worker (see `effect-protocol`), but is a distinct worker kind: its only
//! legal starting command is [`effect_protocol::Command::StartDaemon`].

mod error;
mod state;
mod supervisor;

pub use error::ProxyError;
pub use state::DaemonProxyState;
pub use supervisor::with_daemon_proxy;
