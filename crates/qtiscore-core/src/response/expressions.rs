use crate::context::ProcessingContext;
use crate::node::Node;
use crate::registry::{CalculatorKind, ExpressionKind};
use crate::traits::{Calculator, Expression};
use crate::value::{parse_float, BaseType, BaseValue, Cardinality};

use super::resolve_values;

impl Expression for ExpressionKind {
    fn resolve<C: ProcessingContext>(&self, node: &Node, ctx: &C) -> Option<BaseValue> {
        match self {
            ExpressionKind::Variable => Some(ctx.resolve_variable(node)),
            ExpressionKind::BaseValue => Some(base_value(node, ctx)),
            ExpressionKind::Correct => ctx.resolve_correct(node),
            ExpressionKind::Ordered => container(node, Cardinality::Ordered, ctx),
            ExpressionKind::Multiple => container(node, Cardinality::Multiple, ctx),
            ExpressionKind::CustomOperator => custom_operator(node, ctx),
            ExpressionKind::TestVariables => ctx.resolve_test_variables(node),
        }
    }
}

/// A literal. Text is trimmed for every base type except string. An
/// `identifier` attribute is kept, which is how `depcp:MathEqual` finds
/// setup code.
fn base_value<C: ProcessingContext>(node: &Node, ctx: &C) -> BaseValue {
    let base_type = match node.attr("baseType") {
        Some(raw) => raw.parse().unwrap_or_else(|err| {
            ctx.log_warning(format!("{err}, treating {} as string", node.name));
            BaseType::String
        }),
        None => BaseType::String,
    };
    let text = node.text_value();
    let text = if base_type == BaseType::String {
        text
    } else {
        text.trim().to_string()
    };
    let value = BaseValue::scalar(base_type, text);
    match node.non_empty_attr("identifier") {
        Some(identifier) => value.with_identifier(identifier),
        None => value,
    }
}

/// `ordered`/`multiple`: flatten the children into one container. Members
/// must share a base type.
fn container<C: ProcessingContext>(
    node: &Node,
    cardinality: Cardinality,
    ctx: &C,
) -> Option<BaseValue> {
    let values = resolve_values(&node.children, ctx);
    let base_type = values.first().map(|v| v.base_type).unwrap_or_default();
    let mut members = Vec::new();
    for value in values {
        if value.base_type != base_type {
            ctx.log_error(format!(
                "{} mixes base types {base_type} and {}",
                node.name, value.base_type
            ));
            return None;
        }
        members.extend(value.value.filter(|v| !v.is_empty()));
        members.extend(value.values.unwrap_or_default());
    }
    Some(BaseValue::list(base_type, members).with_cardinality(cardinality))
}

fn custom_operator<C: ProcessingContext>(node: &Node, ctx: &C) -> Option<BaseValue> {
    let values = resolve_values(&node.children, ctx);
    let class = node
        .non_empty_attr("class")
        .or_else(|| node.non_empty_attr("definition"))
        .unwrap_or_default();
    match ctx.registry().custom_operator(class) {
        Some(operator) => Some(operator.apply(values)),
        None => {
            ctx.log_error(format!("Cannot find custom operator: {class}"));
            values
                .into_iter()
                .next()
                .or_else(|| Some(BaseValue::string("")))
        }
    }
}

impl Calculator for CalculatorKind {
    fn calculate<C: ProcessingContext>(&self, node: &Node, ctx: &C) -> f64 {
        let numbers = numeric_operands(node, ctx);
        match self {
            CalculatorKind::Sum => numbers.iter().sum(),
            CalculatorKind::Product => {
                if numbers.is_empty() {
                    ctx.log_error(format!("{} has no operands", node.name));
                    return 0.0;
                }
                numbers.iter().product()
            }
            CalculatorKind::Subtract | CalculatorKind::Divide => {
                let [a, b] = numbers.as_slice() else {
                    ctx.log_error(format!(
                        "{} requires 2 values, got {}",
                        node.name,
                        numbers.len()
                    ));
                    return 0.0;
                };
                if *self == CalculatorKind::Subtract {
                    a - b
                } else if *b == 0.0 {
                    ctx.log_error(format!("{}: division by zero", node.name));
                    0.0
                } else {
                    a / b
                }
            }
        }
    }
}

/// Every operand as a number. Container members count individually and
/// values that do not parse are counted as zero.
fn numeric_operands<C: ProcessingContext>(node: &Node, ctx: &C) -> Vec<f64> {
    let mut numbers = Vec::new();
    for value in resolve_values(&node.children, ctx) {
        let raws: Vec<String> = match (value.value, value.values) {
            (_, Some(values)) => values,
            (Some(v), None) => vec![v],
            (None, None) => Vec::new(),
        };
        for raw in raws {
            numbers.push(parse_float(&raw).unwrap_or_else(|err| {
                ctx.log_warning(format!("{}: {err}, using 0", node.name));
                0.0
            }));
        }
    }
    numbers
}
