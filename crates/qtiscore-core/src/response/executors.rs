use crate::context::ProcessingContext;
use crate::node::Node;
use crate::registry::ExecutorKind;
use crate::traits::{Calculator, Executor};
use crate::value::BaseValue;

use super::{evaluate_condition, execute_statement, resolve_values};

impl Executor for ExecutorKind {
    fn execute<C: ProcessingContext>(&self, node: &Node, ctx: &mut C) -> bool {
        match self {
            ExecutorKind::Condition => execute_condition(node, ctx),
            ExecutorKind::If | ExecutorKind::ElseIf => execute_conditional_branch(node, ctx),
            ExecutorKind::Else => {
                execute_body(&node.children, ctx);
                true
            }
            ExecutorKind::SetOutcomeValue => set_outcome_value(node, ctx),
        }
    }
}

/// Run branches in order and stop at the first one taken.
fn execute_condition<C: ProcessingContext>(node: &Node, ctx: &mut C) -> bool {
    node.children
        .iter()
        .any(|branch| execute_statement(branch, ctx))
}

fn execute_conditional_branch<C: ProcessingContext>(node: &Node, ctx: &mut C) -> bool {
    let Some((condition, body)) = node.children.split_first() else {
        ctx.log_error(format!("{} has no condition", node.name));
        return false;
    };
    if !evaluate_condition(condition, ctx) {
        return false;
    }
    execute_body(body, ctx);
    true
}

fn execute_body<C: ProcessingContext>(body: &[Node], ctx: &mut C) {
    let cap = ctx.config().max_branch_children;
    if body.len() > cap {
        ctx.log_warning(format!(
            "Branch has {} statements, only the first {cap} are executed",
            body.len()
        ));
    }
    for statement in body.iter().take(cap) {
        execute_statement(statement, ctx);
    }
}

fn set_outcome_value<C: ProcessingContext>(node: &Node, ctx: &mut C) -> bool {
    let Some(identifier) = node.non_empty_attr("identifier") else {
        ctx.log_error("Cannot find attribute identifier");
        return false;
    };
    let Some(declaration) = ctx.outcome_declaration(identifier) else {
        ctx.log_error(format!("Cannot find outcomeDeclaration: {identifier}"));
        return false;
    };

    if let Some(first) = node.children.first() {
        if let Some(kind) = ctx.registry().calculator(first) {
            let number = kind.calculate(first, ctx);
            ctx.store_outcome(&declaration, &BaseValue::float(number));
            return true;
        }
    }

    let mut values = resolve_values(&node.children, ctx);
    match values.len() {
        0 => ctx.store_outcome(&declaration, &BaseValue::string("")),
        1 => {
            let value = values.remove(0);
            ctx.store_outcome(&declaration, &value);
        }
        n => {
            ctx.log_error(format!(
                "setOutcomeValue {identifier} resolved {n} values, expected one"
            ));
            return false;
        }
    }
    true
}
