use serde::{Deserialize, Serialize};

use crate::context::SecretContext;

/// A small boolean expression tree evaluated against a [`SecretContext`].
///
/// Modeled as an exhaustively-matched tagged enum rather than an open trait
/// object: adding a new leaf is a compile error at every match site until
/// it's handled, which is what we want for an access-control DSL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    IsOwner,
    IsBranch(String),
    IsTag(String),
    IsRepo(String),
    True,
    False,
}

/// Evaluate `cond` against `ctx`, discarding the trace.
pub fn evaluate(ctx: &SecretContext, cond: &Condition) -> bool {
    evaluate_trace(ctx, cond).1
}

/// Evaluate `cond` against `ctx`, returning a human-readable trace of every
/// leaf verdict and aggregation decision in evaluation order, alongside the
/// final boolean result.
pub fn evaluate_trace(ctx: &SecretContext, cond: &Condition) -> (Vec<String>, bool) {
    let mut trace = Vec::new();
    let result = eval(ctx, cond, &mut trace);
    (trace, result)
}

fn eval(ctx: &SecretContext, cond: &Condition, trace: &mut Vec<String>) -> bool {
    match cond {
        Condition::True => {
            trace.push("True -> true".to_string());
            true
        }
        Condition::False => {
            trace.push("False -> false".to_string());
            false
        }
        Condition::IsOwner => {
            let result = ctx.is_owner;
            trace.push(format!("IsOwner -> {result}"));
            result
        }
        Condition::IsBranch(name) => {
            let result = ctx.branch.as_deref() == Some(name.as_str());
            trace.push(format!("IsBranch({name}) -> {result}"));
            result
        }
        Condition::IsTag(name) => {
            let result = ctx.tag.as_deref() == Some(name.as_str());
            trace.push(format!("IsTag({name}) -> {result}"));
            result
        }
        Condition::IsRepo(name) => {
            let result = ctx.repo == *name;
            trace.push(format!("IsRepo({name}) -> {result}"));
            result
        }
        Condition::And(conds) => {
            trace.push(format!("And(n={}) begin", conds.len()));
            let mut result = true;
            for c in conds {
                result &= eval(ctx, c, trace);
            }
            trace.push(format!("And -> {result}"));
            result
        }
        Condition::Or(conds) => {
            trace.push(format!("Or(n={}) begin", conds.len()));
            let mut result = false;
            for c in conds {
                result |= eval(ctx, c, trace);
            }
            trace.push(format!("Or -> {result}"));
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ctx(branch: Option<&str>, tag: Option<&str>, is_owner: bool) -> SecretContext {
        SecretContext {
            project_id: "proj".to_string(),
            repo: "acme/widgets".to_string(),
            branch: branch.map(str::to_string),
            tag: tag.map(str::to_string),
            is_owner,
        }
    }

    #[rstest]
    #[case(Condition::True, true)]
    #[case(Condition::False, false)]
    #[case(Condition::IsBranch("main".to_string()), true)]
    #[case(Condition::IsBranch("other".to_string()), false)]
    #[case(Condition::IsOwner, true)]
    #[case(Condition::And(vec![Condition::True, Condition::IsBranch("main".to_string())]), true)]
    #[case(Condition::And(vec![Condition::True, Condition::False]), false)]
    #[case(Condition::Or(vec![Condition::False, Condition::IsBranch("main".to_string())]), true)]
    fn evaluates_as_expected(#[case] cond: Condition, #[case] expected: bool) {
        let ctx = ctx(Some("main"), None, true);
        assert_eq!(evaluate(&ctx, &cond), expected);
    }

    #[test]
    fn evaluation_is_pure_and_repeatable() {
        let ctx = ctx(Some("main"), None, false);
        let cond = Condition::And(vec![Condition::IsBranch("main".to_string()), Condition::IsOwner]);

        let first = evaluate_trace(&ctx, &cond);
        let second = evaluate_trace(&ctx, &cond);
        assert_eq!(first, second);
        assert!(!first.1);
    }

    #[test]
    fn trace_records_every_leaf_in_order() {
        let ctx = ctx(Some("main"), None, true);
        let cond = Condition::And(vec![Condition::IsBranch("main".to_string()), Condition::IsOwner]);

        let (trace, result) = evaluate_trace(&ctx, &cond);
        assert!(result);
        assert_eq!(
            trace,
            vec![
                "And(n=2) begin".to_string(),
                "IsBranch(main) -> true".to_string(),
                "IsOwner -> true".to_string(),
                "And -> true".to_string(),
            ]
        );
    }
}
