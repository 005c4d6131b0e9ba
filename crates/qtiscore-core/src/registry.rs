//! Tag dispatch.
//!
//! Built-in handlers are closed enums, one per family, looked up by the
//! normalised tag through tables built once per process. Custom operators are
//! open: they are registered per engine under their qualified name.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::custom_operators::{CustomOperator, EquivalenceChecker, MathEqual, TextualEquivalence, Trim};
use crate::node::Node;

/// Statement handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    Condition,
    If,
    ElseIf,
    Else,
    SetOutcomeValue,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Equal,
    Gt,
    Gte,
    Lt,
    Lte,
    Match,
}

/// Boolean expressions outside the comparison family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanExpressionKind {
    StringMatch,
    Substring,
    IsNull,
    And,
    Or,
    Not,
}

/// Value-producing expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    Variable,
    BaseValue,
    Correct,
    Ordered,
    Multiple,
    CustomOperator,
    TestVariables,
}

/// Numeric expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculatorKind {
    Sum,
    Product,
    Subtract,
    Divide,
}

/// The family a tag resolved to, or the raw tag when nothing handles it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handler {
    Executor(ExecutorKind),
    Operator(OperatorKind),
    BooleanExpression(BooleanExpressionKind),
    Expression(ExpressionKind),
    Calculator(CalculatorKind),
    /// Structural tags such as the processing roots.
    Structural,
    Unknown(String),
}

static EXECUTORS: LazyLock<HashMap<&'static str, ExecutorKind>> = LazyLock::new(|| {
    HashMap::from([
        ("responsecondition", ExecutorKind::Condition),
        ("outcomecondition", ExecutorKind::Condition),
        ("responseif", ExecutorKind::If),
        ("outcomeif", ExecutorKind::If),
        ("responseelseif", ExecutorKind::ElseIf),
        ("outcomeelseif", ExecutorKind::ElseIf),
        ("responseelse", ExecutorKind::Else),
        ("outcomeelse", ExecutorKind::Else),
        ("setoutcomevalue", ExecutorKind::SetOutcomeValue),
    ])
});

static OPERATORS: LazyLock<HashMap<&'static str, OperatorKind>> = LazyLock::new(|| {
    HashMap::from([
        ("equal", OperatorKind::Equal),
        ("gt", OperatorKind::Gt),
        ("gte", OperatorKind::Gte),
        ("lt", OperatorKind::Lt),
        ("lte", OperatorKind::Lte),
        ("match", OperatorKind::Match),
    ])
});

static BOOLEAN_EXPRESSIONS: LazyLock<HashMap<&'static str, BooleanExpressionKind>> =
    LazyLock::new(|| {
        HashMap::from([
            ("stringmatch", BooleanExpressionKind::StringMatch),
            ("substring", BooleanExpressionKind::Substring),
            ("isnull", BooleanExpressionKind::IsNull),
            ("and", BooleanExpressionKind::And),
            ("or", BooleanExpressionKind::Or),
            ("not", BooleanExpressionKind::Not),
        ])
    });

static EXPRESSIONS: LazyLock<HashMap<&'static str, ExpressionKind>> = LazyLock::new(|| {
    HashMap::from([
        ("variable", ExpressionKind::Variable),
        ("basevalue", ExpressionKind::BaseValue),
        ("correct", ExpressionKind::Correct),
        ("ordered", ExpressionKind::Ordered),
        ("multiple", ExpressionKind::Multiple),
        ("customoperator", ExpressionKind::CustomOperator),
        ("testvariables", ExpressionKind::TestVariables),
    ])
});

static CALCULATORS: LazyLock<HashMap<&'static str, CalculatorKind>> = LazyLock::new(|| {
    HashMap::from([
        ("sum", CalculatorKind::Sum),
        ("product", CalculatorKind::Product),
        ("subtract", CalculatorKind::Subtract),
        ("divide", CalculatorKind::Divide),
    ])
});

const STRUCTURAL: &[&str] = &["responseprocessing", "outcomeprocessing"];

/// Handler lookup for one engine: the built-in tables plus the custom
/// operators registered on it.
#[derive(Clone)]
pub struct Registry {
    custom_operators: HashMap<String, Arc<dyn CustomOperator>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults(Arc::new(TextualEquivalence))
    }
}

impl Registry {
    /// A registry with no custom operators.
    pub fn empty() -> Self {
        Self {
            custom_operators: HashMap::new(),
        }
    }

    /// A registry with the shipped custom operators, using `checker` for
    /// `depcp:MathEqual`.
    pub fn with_defaults(checker: Arc<dyn EquivalenceChecker>) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(Trim));
        registry.register(Arc::new(MathEqual::new(checker)));
        registry
    }

    /// Register a custom operator under its definition, replacing any
    /// operator registered under the same name.
    pub fn register(&mut self, operator: Arc<dyn CustomOperator>) {
        let key = operator.definition().to_ascii_lowercase();
        self.custom_operators.insert(key, operator);
    }

    pub fn executor(&self, node: &Node) -> Option<ExecutorKind> {
        EXECUTORS.get(node.tag().as_str()).copied()
    }

    pub fn operator(&self, node: &Node) -> Option<OperatorKind> {
        OPERATORS.get(node.tag().as_str()).copied()
    }

    pub fn boolean_expression(&self, node: &Node) -> Option<BooleanExpressionKind> {
        BOOLEAN_EXPRESSIONS.get(node.tag().as_str()).copied()
    }

    pub fn expression(&self, node: &Node) -> Option<ExpressionKind> {
        EXPRESSIONS.get(node.tag().as_str()).copied()
    }

    pub fn calculator(&self, node: &Node) -> Option<CalculatorKind> {
        CALCULATORS.get(node.tag().as_str()).copied()
    }

    /// Find a custom operator by qualified name. Matching ignores case and
    /// falls back to the local name, so `Trim` finds `depcp:Trim`.
    pub fn custom_operator(&self, class: &str) -> Option<Arc<dyn CustomOperator>> {
        let wanted = class.trim().to_ascii_lowercase();
        if let Some(op) = self.custom_operators.get(&wanted) {
            return Some(Arc::clone(op));
        }
        let local = wanted.rsplit(':').next().unwrap_or(&wanted);
        self.custom_operators
            .iter()
            .find(|(key, _)| key.rsplit(':').next() == Some(local))
            .map(|(_, op)| Arc::clone(op))
    }

    /// Registered custom operator names, sorted.
    pub fn custom_operator_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .custom_operators
            .values()
            .map(|op| op.definition().to_string())
            .collect();
        names.sort();
        names
    }

    /// Resolve a node to its handler family.
    pub fn classify(&self, node: &Node) -> Handler {
        let tag = node.tag();
        let tag = tag.as_str();
        if let Some(kind) = EXECUTORS.get(tag) {
            Handler::Executor(*kind)
        } else if let Some(kind) = OPERATORS.get(tag) {
            Handler::Operator(*kind)
        } else if let Some(kind) = BOOLEAN_EXPRESSIONS.get(tag) {
            Handler::BooleanExpression(*kind)
        } else if let Some(kind) = EXPRESSIONS.get(tag) {
            Handler::Expression(*kind)
        } else if let Some(kind) = CALCULATORS.get(tag) {
            Handler::Calculator(*kind)
        } else if STRUCTURAL.contains(&tag) {
            Handler::Structural
        } else {
            Handler::Unknown(node.name.clone())
        }
    }

    /// Whether any family handles `tag` (in either dialect).
    pub fn knows(&self, tag: &str) -> bool {
        !matches!(self.classify(&Node::new(tag)), Handler::Unknown(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::BaseValue;

    #[test]
    fn both_dialects_resolve_to_the_same_handler() {
        let registry = Registry::default();
        assert_eq!(
            registry.executor(&Node::new("responseCondition")),
            Some(ExecutorKind::Condition)
        );
        assert_eq!(
            registry.executor(&Node::new("qti-response-condition")),
            Some(ExecutorKind::Condition)
        );
        assert_eq!(
            registry.executor(&Node::new("qti-outcome-else-if")),
            Some(ExecutorKind::ElseIf)
        );
        assert_eq!(registry.operator(&Node::new("qti-gte")), Some(OperatorKind::Gte));
        assert_eq!(
            registry.expression(&Node::new("qti-test-variables")),
            Some(ExpressionKind::TestVariables)
        );
    }

    #[test]
    fn families_are_disjoint() {
        let registry = Registry::default();
        let gte = Node::new("gte");
        assert!(registry.operator(&gte).is_some());
        assert!(registry.boolean_expression(&gte).is_none());
        assert!(registry.expression(&gte).is_none());
        assert!(registry.executor(&gte).is_none());
    }

    #[test]
    fn unknown_tags_carry_the_raw_name() {
        let registry = Registry::default();
        assert_eq!(
            registry.classify(&Node::new("qti-lookup-outcome-value")),
            Handler::Unknown("qti-lookup-outcome-value".into())
        );
        assert_eq!(
            registry.classify(&Node::new("qti-response-processing")),
            Handler::Structural
        );
        assert!(registry.knows("stringMatch"));
        assert!(!registry.knows("qti-random"));
    }

    #[test]
    fn custom_operators_resolve_by_qualified_or_local_name() {
        let registry = Registry::default();
        assert!(registry.custom_operator("depcp:Trim").is_some());
        assert!(registry.custom_operator("DEPCP:TRIM").is_some());
        assert!(registry.custom_operator("MathEqual").is_some());
        assert!(registry.custom_operator("depcp:Unknown").is_none());
        assert!(Registry::empty().custom_operator("depcp:Trim").is_none());
        assert_eq!(
            registry.custom_operator_names(),
            vec!["depcp:MathEqual".to_string(), "depcp:Trim".to_string()]
        );
    }

    struct Upper;

    impl CustomOperator for Upper {
        fn definition(&self) -> &str {
            "acme:Upper"
        }

        fn apply(&self, values: Vec<BaseValue>) -> BaseValue {
            let text = values
                .first()
                .and_then(|v| v.value.clone())
                .unwrap_or_default();
            BaseValue::string(text.to_uppercase())
        }
    }

    #[test]
    fn registered_operators_are_found() {
        let mut registry = Registry::default();
        registry.register(Arc::new(Upper));
        let op = registry.custom_operator("acme:Upper").unwrap();
        let out = op.apply(vec![BaseValue::string("abc")]);
        assert_eq!(out.value.as_deref(), Some("ABC"));
    }
}
