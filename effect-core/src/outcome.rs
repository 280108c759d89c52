/// Result of a completed effect run: the container's exit code plus any
/// friendly-mode warnings accumulated along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectOutcome {
    pub exit_code: i32,
    pub warnings: Vec<String>,
}
