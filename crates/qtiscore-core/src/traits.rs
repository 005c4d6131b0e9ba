//! Handler family traits.
//!
//! Every rule-tree tag belongs to exactly one family, selected by which
//! registry table resolved it. Handlers never fail: problems are reported
//! through the context and a safe default is returned.

use crate::context::ProcessingContext;
use crate::node::Node;
use crate::value::BaseValue;

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// Side-effecting statements (`responseCondition`, `setOutcomeValue`, ...).
pub trait Executor {
    /// Run the statement. Returns `true` when the statement "matched", which
    /// conditional chains use to stop at the first taken branch.
    fn execute<C: ProcessingContext>(&self, node: &Node, ctx: &mut C) -> bool;
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// Comparison operators (`equal`, `gte`, `match`, ...).
pub trait Operator {
    fn compare<C: ProcessingContext>(&self, node: &Node, ctx: &C) -> bool;
}

/// Non-comparison boolean expressions (`stringMatch`, `and`, `isNull`, ...).
pub trait BooleanExpression {
    fn evaluate<C: ProcessingContext>(&self, node: &Node, ctx: &C) -> bool;
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Value-producing expressions (`variable`, `baseValue`, `correct`, ...).
pub trait Expression {
    /// Resolve the node to a value, or to nothing when resolution failed.
    fn resolve<C: ProcessingContext>(&self, node: &Node, ctx: &C) -> Option<BaseValue>;
}

/// Numeric right-hand sides (`sum`, `product`, `subtract`, `divide`).
pub trait Calculator {
    fn calculate<C: ProcessingContext>(&self, node: &Node, ctx: &C) -> f64;
}
