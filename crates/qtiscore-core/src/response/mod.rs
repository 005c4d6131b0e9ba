//! Response rule interpreter.
//!
//! Walks a processing tree statement by statement. The same walker drives
//! outcome processing; only the context differs.

mod executors;
mod expressions;
mod operators;

use crate::config::EngineConfig;
use crate::context::{label, ProcessingContext, ResponseContext};
use crate::diagnostics::DiagnosticsSink;
use crate::model::{AssessmentItem, ItemResult};
use crate::node::Node;
use crate::registry::Registry;
use crate::traits::{BooleanExpression, Calculator, Executor, Expression, Operator};
use crate::value::{parse_bool, BaseValue};

/// Run an item's response processing against one item result.
///
/// Outcome variables the result does not carry yet are created from their
/// declarations first, so every declared outcome exists afterwards.
pub fn process_item(
    item: &AssessmentItem,
    result: &mut ItemResult,
    assessment_result: &str,
    registry: &Registry,
    config: &EngineConfig,
    sink: &dyn DiagnosticsSink,
) {
    for declaration in &item.outcome_declarations {
        result.outcome_mut(declaration);
    }
    let Some(root) = item.response_processing.as_ref() else {
        return;
    };
    let mut ctx = ResponseContext::new(
        item,
        result,
        registry,
        config,
        sink,
        label(&item.identifier, assessment_result),
    );
    run_processing(root, &mut ctx);
}

/// Execute every statement under a processing root in document order.
pub fn run_processing<C: ProcessingContext>(root: &Node, ctx: &mut C) {
    for statement in &root.children {
        execute_statement(statement, ctx);
    }
}

/// Execute one statement; unknown tags are logged and skipped.
pub(crate) fn execute_statement<C: ProcessingContext>(node: &Node, ctx: &mut C) -> bool {
    match ctx.registry().executor(node) {
        Some(kind) => kind.execute(node, ctx),
        None => {
            ctx.log_error(format!("Cannot find executor for tag: {}", node.name));
            false
        }
    }
}

/// Evaluate a condition node: comparison operators first, then boolean
/// expressions, then a value that parses as a boolean.
pub(crate) fn evaluate_condition<C: ProcessingContext>(node: &Node, ctx: &C) -> bool {
    let registry = ctx.registry();
    if let Some(kind) = registry.operator(node) {
        return kind.compare(node, ctx);
    }
    if let Some(kind) = registry.boolean_expression(node) {
        return kind.evaluate(node, ctx);
    }
    if registry.expression(node).is_some() {
        let values = resolve_values(std::slice::from_ref(node), ctx);
        let raw = values.first().and_then(|v| v.value.clone()).unwrap_or_default();
        return match parse_bool(&raw) {
            Ok(flag) => flag,
            Err(err) => {
                ctx.log_error(format!("Condition {} is not boolean: {err}", node.name));
                false
            }
        };
    }
    ctx.log_error(format!("Cannot find operator for tag: {}", node.name));
    false
}

/// Resolve each node to a value through the expression or calculator
/// family. Nodes that resolve to nothing contribute nothing.
pub(crate) fn resolve_values<C: ProcessingContext>(nodes: &[Node], ctx: &C) -> Vec<BaseValue> {
    let registry = ctx.registry();
    let mut values = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let Some(kind) = registry.expression(node) {
            values.extend(kind.resolve(node, ctx));
        } else if let Some(kind) = registry.calculator(node) {
            values.push(BaseValue::float(kind.calculate(node, ctx)));
        } else {
            ctx.log_error(format!("Cannot find expression for tag: {}", node.name));
        }
    }
    values
}
