/// Lifecycle of the supervised daemon-proxy child process.
///
/// `Failed` is reachable from every non-terminal state and is always final;
/// once reached, the supervisor never attempts further protocol I/O with
/// the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonProxyState {
    Spawning,
    Ready,
    Running,
    Draining,
    Stopped,
    Failed,
}
