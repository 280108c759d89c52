//! Container Runner: builds a minimal runtime spec for one effect invocation
//! and shells out to a low-level OCI runtime (`runc` by default) to run it.
//!
//! This crate owns the boundary between "what the effect should see" (a
//! [`ContainerConfig`]) and "what the runtime binary is told" (a
//! [`RuntimeSpec`] written to disk as `config.json`). It does not know
//! anything about secrets, Nix derivations, or the worker protocol — those
//! are composed on top by the orchestrating crate.

mod config;
mod error;
mod runner;
mod spec;

pub use config::{BindMount, ContainerConfig};
pub use error::ContainerError;
pub use runner::run;
pub use spec::{
    build_spec, IdMapping, LinuxCapabilities, LinuxSpec, MountSpec, NamespaceSpec, ProcessSpec, Root,
    RuntimeSpec,
};
