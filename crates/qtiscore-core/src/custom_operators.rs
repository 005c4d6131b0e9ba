//! Custom operators: post-processing filters applied to resolved values.
//!
//! A custom operator receives the values of its children and produces one
//! value. Operators are registered under a qualified name such as
//! `depcp:Trim` and referenced by the `class` (or `definition`) attribute of a
//! `customOperator` node.

use std::sync::Arc;

use crate::value::{parse_float, BaseValue};

/// A value transform registered under a qualified name.
pub trait CustomOperator: Send + Sync {
    /// Qualified name used to reference the operator.
    fn definition(&self) -> &str;

    /// Combine the child values into one value.
    fn apply(&self, values: Vec<BaseValue>) -> BaseValue;
}

/// Trims whitespace from the first value (scalar and list members alike).
pub struct Trim;

impl CustomOperator for Trim {
    fn definition(&self) -> &str {
        "depcp:Trim"
    }

    fn apply(&self, values: Vec<BaseValue>) -> BaseValue {
        let Some(mut value) = values.into_iter().next() else {
            return BaseValue::string("");
        };
        if let Some(scalar) = value.value.as_mut() {
            *scalar = scalar.trim().to_string();
        }
        if let Some(members) = value.values.as_mut() {
            for member in members.iter_mut() {
                *member = member.trim().to_string();
            }
        }
        value
    }
}

/// Capability that decides whether two math expressions are equivalent.
///
/// Implementations wrap whatever symbolic engine the host provides. `setup`
/// is run once before the comparison; the check succeeds when `lhs` is
/// equivalent to any of `rhs`.
pub trait EquivalenceChecker: Send + Sync {
    fn evaluate_equivalence(&self, setup: Option<&str>, lhs: &str, rhs: &[String]) -> bool;
}

/// Fallback checker for hosts without a symbolic engine.
///
/// Expressions are equal when they match after removing whitespace, or when
/// both parse as the same number. Setup code is ignored.
pub struct TextualEquivalence;

impl TextualEquivalence {
    fn normalize(expr: &str) -> String {
        expr.chars().filter(|c| !c.is_whitespace()).collect()
    }
}

impl EquivalenceChecker for TextualEquivalence {
    fn evaluate_equivalence(&self, _setup: Option<&str>, lhs: &str, rhs: &[String]) -> bool {
        let left = Self::normalize(lhs);
        let left_number = parse_float(&left).ok();
        rhs.iter().any(|candidate| {
            let right = Self::normalize(candidate);
            if left == right {
                return true;
            }
            matches!(
                (left_number, parse_float(&right).ok()),
                (Some(a), Some(b)) if a == b
            )
        })
    }
}

/// Symbolic equivalence through an injected [`EquivalenceChecker`].
///
/// A leading value whose identifier is `setup` carries setup code. The next
/// value is the candidate expression, every remaining value an accepted
/// answer. The result is a boolean value.
pub struct MathEqual {
    checker: Arc<dyn EquivalenceChecker>,
}

impl MathEqual {
    pub fn new(checker: Arc<dyn EquivalenceChecker>) -> Self {
        Self { checker }
    }
}

impl CustomOperator for MathEqual {
    fn definition(&self) -> &str {
        "depcp:MathEqual"
    }

    fn apply(&self, mut values: Vec<BaseValue>) -> BaseValue {
        let setup = match values.first() {
            Some(first) if first.identifier.as_deref() == Some("setup") => {
                Some(values.remove(0).value.unwrap_or_default())
            }
            _ => None,
        };
        if values.len() < 2 {
            return BaseValue::boolean(false);
        }
        let lhs = values[0].value.clone().unwrap_or_default();
        let rhs: Vec<String> = values[1..]
            .iter()
            .filter_map(|v| v.value.clone())
            .collect();
        let equal = self
            .checker
            .evaluate_equivalence(setup.as_deref(), &lhs, &rhs);
        BaseValue::boolean(equal)
    }
}
