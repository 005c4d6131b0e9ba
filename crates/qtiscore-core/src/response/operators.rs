use std::cmp::Ordering;

use crate::context::ProcessingContext;
use crate::node::Node;
use crate::registry::{BooleanExpressionKind, OperatorKind};
use crate::traits::{BooleanExpression, Operator};
use crate::value::{format_float, parse_bool, typed_member, BaseType, BaseValue, Cardinality, TypedValue};

use super::{evaluate_condition, resolve_values};

/// Resolve exactly two operands, logging an error otherwise.
fn operand_pair<C: ProcessingContext>(node: &Node, ctx: &C) -> Option<(BaseValue, BaseValue)> {
    let mut values = resolve_values(&node.children, ctx);
    if values.len() != 2 {
        ctx.log_error(format!(
            "{} requires 2 values, got {}",
            node.name,
            values.len()
        ));
        return None;
    }
    let second = values.pop()?;
    let first = values.pop()?;
    Some((first, second))
}

fn case_sensitive(node: &Node, default: bool) -> bool {
    node.attr("caseSensitive")
        .and_then(|raw| parse_bool(raw).ok())
        .unwrap_or(default)
}

// ---------------------------------------------------------------------------
// Comparison operators
// ---------------------------------------------------------------------------

impl Operator for OperatorKind {
    fn compare<C: ProcessingContext>(&self, node: &Node, ctx: &C) -> bool {
        let Some((left, right)) = operand_pair(node, ctx) else {
            return false;
        };
        match self {
            OperatorKind::Match => match_values(node, &left, &right, ctx),
            OperatorKind::Equal => {
                if let Some(mode) = node.non_empty_attr("toleranceMode") {
                    if mode != "exact" {
                        ctx.log_error(format!("toleranceMode {mode} is not supported"));
                        return false;
                    }
                }
                numeric_ordering(node, &left, &right, ctx) == Some(Ordering::Equal)
            }
            OperatorKind::Gt => numeric_ordering(node, &left, &right, ctx) == Some(Ordering::Greater),
            OperatorKind::Gte => matches!(
                numeric_ordering(node, &left, &right, ctx),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            OperatorKind::Lt => numeric_ordering(node, &left, &right, ctx) == Some(Ordering::Less),
            OperatorKind::Lte => matches!(
                numeric_ordering(node, &left, &right, ctx),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

fn numeric_ordering<C: ProcessingContext>(
    node: &Node,
    left: &BaseValue,
    right: &BaseValue,
    ctx: &C,
) -> Option<Ordering> {
    if !left.base_type.is_numeric() || !right.base_type.is_numeric() {
        ctx.log_error(format!(
            "{} requires numeric values, got {} and {}",
            node.name, left.base_type, right.base_type
        ));
        return None;
    }
    let parsed = left.as_number().and_then(|a| right.as_number().map(|b| (a, b)));
    match parsed {
        Ok((a, b)) => a.partial_cmp(&b),
        Err(err) => {
            ctx.log_error(format!("{}: {err}", node.name));
            None
        }
    }
}

/// Canonical form of one member so typed equality reduces to string
/// equality: numbers are reformatted, booleans lower-cased.
fn canonical(base_type: BaseType, raw: &str) -> Option<String> {
    match typed_member(base_type, raw).ok()? {
        TypedValue::Number(n) => Some(format_float(n)),
        TypedValue::Boolean(b) => Some(b.to_string()),
        TypedValue::Text(text) => Some(text),
    }
}

fn match_values<C: ProcessingContext>(
    node: &Node,
    left: &BaseValue,
    right: &BaseValue,
    ctx: &C,
) -> bool {
    if left.base_type != right.base_type {
        ctx.log_error(format!(
            "{} requires identical base types, got {} and {}",
            node.name, left.base_type, right.base_type
        ));
        return false;
    }
    let base_type = left.base_type;
    let members = |value: &BaseValue| -> Option<Vec<String>> {
        match (&value.value, &value.values) {
            (_, Some(values)) => values.iter().map(|v| canonical(base_type, v)).collect(),
            (Some(v), None) => canonical(base_type, v).map(|v| vec![v]),
            (None, None) => Some(Vec::new()),
        }
    };
    let (Some(mut a), Some(mut b)) = (members(left), members(right)) else {
        ctx.log_error(format!("{}: values are not valid {base_type}", node.name));
        return false;
    };
    let ordered = left.cardinality == Cardinality::Ordered || right.cardinality == Cardinality::Ordered;
    if !ordered {
        a.sort();
        b.sort();
    }
    a == b
}

// ---------------------------------------------------------------------------
// Boolean expressions
// ---------------------------------------------------------------------------

impl BooleanExpression for BooleanExpressionKind {
    fn evaluate<C: ProcessingContext>(&self, node: &Node, ctx: &C) -> bool {
        match self {
            BooleanExpressionKind::StringMatch => string_match(node, ctx),
            BooleanExpressionKind::Substring => substring(node, ctx),
            BooleanExpressionKind::IsNull => {
                let values = resolve_values(&node.children, ctx);
                match values.as_slice() {
                    [] => true,
                    [value] => value.is_null(),
                    _ => {
                        ctx.log_error(format!("{} requires 1 value, got {}", node.name, values.len()));
                        false
                    }
                }
            }
            BooleanExpressionKind::And => {
                if node.children.is_empty() {
                    ctx.log_error(format!("{} has no operands", node.name));
                    return false;
                }
                node.children.iter().all(|child| evaluate_condition(child, ctx))
            }
            BooleanExpressionKind::Or => {
                node.children.iter().any(|child| evaluate_condition(child, ctx))
            }
            BooleanExpressionKind::Not => match node.children.as_slice() {
                [child] => !evaluate_condition(child, ctx),
                _ => {
                    ctx.log_error(format!("{} requires exactly one operand", node.name));
                    false
                }
            },
        }
    }
}

fn string_match<C: ProcessingContext>(node: &Node, ctx: &C) -> bool {
    let Some((left, right)) = operand_pair(node, ctx) else {
        return false;
    };
    let (Some(a), Some(b)) = (left.as_scalar(), right.as_scalar()) else {
        ctx.log_error(format!("{} requires single values", node.name));
        return false;
    };
    if case_sensitive(node, ctx.config().response.string_match_case_sensitive) {
        a == b
    } else {
        a.to_lowercase() == b.to_lowercase()
    }
}

// True when the first value occurs inside the second.
fn substring<C: ProcessingContext>(node: &Node, ctx: &C) -> bool {
    let Some((left, right)) = operand_pair(node, ctx) else {
        return false;
    };
    if left.base_type != BaseType::String || right.base_type != BaseType::String {
        ctx.log_error(format!(
            "{} requires string values, got {} and {}",
            node.name, left.base_type, right.base_type
        ));
        return false;
    }
    let needle = left.as_scalar().unwrap_or_default();
    let haystack = right.as_scalar().unwrap_or_default();
    if needle.is_empty() || haystack.is_empty() {
        ctx.log_warning(format!("{} has an empty operand", node.name));
        return false;
    }
    if case_sensitive(node, ctx.config().response.substring_case_sensitive) {
        haystack.contains(needle)
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}
