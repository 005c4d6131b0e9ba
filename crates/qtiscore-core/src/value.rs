//! The value model exchanged between all evaluators.
//!
//! Values keep their canonical string form (the form found in assessment
//! documents) and are parsed into a typed value only when an operator needs
//! to compare or compute with them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// QTI base types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BaseType {
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "float")]
    Float,
    #[default]
    #[serde(rename = "string")]
    String,
    #[serde(rename = "identifier")]
    Identifier,
    #[serde(rename = "duration")]
    Duration,
    #[serde(rename = "point")]
    Point,
    #[serde(rename = "pair")]
    Pair,
    #[serde(rename = "directedPair")]
    DirectedPair,
    #[serde(rename = "file")]
    File,
    #[serde(rename = "uri")]
    Uri,
}

impl BaseType {
    /// Integer and float values take part in numeric comparisons.
    pub fn is_numeric(self) -> bool {
        matches!(self, BaseType::Integer | BaseType::Float)
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BaseType::Boolean => "boolean",
            BaseType::Integer => "integer",
            BaseType::Float => "float",
            BaseType::String => "string",
            BaseType::Identifier => "identifier",
            BaseType::Duration => "duration",
            BaseType::Point => "point",
            BaseType::Pair => "pair",
            BaseType::DirectedPair => "directedPair",
            BaseType::File => "file",
            BaseType::Uri => "uri",
        };
        f.write_str(name)
    }
}

impl FromStr for BaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "").as_str() {
            "boolean" | "bool" => Ok(BaseType::Boolean),
            "integer" | "int" => Ok(BaseType::Integer),
            "float" => Ok(BaseType::Float),
            "string" => Ok(BaseType::String),
            "identifier" => Ok(BaseType::Identifier),
            "duration" => Ok(BaseType::Duration),
            "point" => Ok(BaseType::Point),
            "pair" => Ok(BaseType::Pair),
            "directedpair" => Ok(BaseType::DirectedPair),
            "file" => Ok(BaseType::File),
            "uri" => Ok(BaseType::Uri),
            other => Err(format!("unknown base type: {other}")),
        }
    }
}

/// Shape of a variable's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    Single,
    Multiple,
    Ordered,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::Single => write!(f, "single"),
            Cardinality::Multiple => write!(f, "multiple"),
            Cardinality::Ordered => write!(f, "ordered"),
        }
    }
}

impl FromStr for Cardinality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(Cardinality::Single),
            "multiple" => Ok(Cardinality::Multiple),
            "ordered" => Ok(Cardinality::Ordered),
            other => Err(format!("unknown cardinality: {other}")),
        }
    }
}

/// A transient typed value flowing through evaluation.
///
/// `value` carries single-cardinality values, `values` carries the members
/// of multiple/ordered containers. `identifier` names the variable the value
/// came from and is used for diagnostics and weight lookups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BaseValue {
    pub base_type: BaseType,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

/// A parsed scalar used for comparisons.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl BaseValue {
    pub fn scalar(base_type: BaseType, value: impl Into<String>) -> Self {
        Self {
            base_type,
            cardinality: Cardinality::Single,
            value: Some(value.into()),
            values: None,
            identifier: None,
        }
    }

    pub fn list(base_type: BaseType, values: Vec<String>) -> Self {
        Self {
            base_type,
            cardinality: Cardinality::Multiple,
            value: None,
            values: Some(values),
            identifier: None,
        }
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn float(value: f64) -> Self {
        Self::scalar(BaseType::Float, format_float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::scalar(BaseType::String, value)
    }

    pub fn boolean(value: bool) -> Self {
        Self::scalar(BaseType::Boolean, if value { "true" } else { "false" })
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// The scalar value, if this is a single-cardinality value.
    pub fn as_scalar(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// A value is null when it has neither a non-empty scalar nor any members.
    pub fn is_null(&self) -> bool {
        let empty_scalar = self.value.as_deref().map_or(true, str::is_empty);
        let empty_list = self.values.as_ref().map_or(true, Vec::is_empty);
        empty_scalar && empty_list
    }

    /// Parse the scalar as a number in the invariant format.
    pub fn as_number(&self) -> Result<f64, ValueError> {
        let raw = self.scalar_or_err()?;
        parse_float(raw)
    }

    /// Parse the scalar into the typed union according to the base type.
    pub fn typed(&self) -> Result<TypedValue, ValueError> {
        let raw = self.scalar_or_err()?;
        typed_member(self.base_type, raw)
    }

    fn scalar_or_err(&self) -> Result<&str, ValueError> {
        self.value.as_deref().ok_or_else(|| {
            ValueError::NotScalar(self.identifier.clone().unwrap_or_default())
        })
    }
}

/// Parse one canonical string according to a base type.
pub fn typed_member(base_type: BaseType, raw: &str) -> Result<TypedValue, ValueError> {
    match base_type {
        BaseType::Integer | BaseType::Float | BaseType::Duration => {
            parse_float(raw).map(TypedValue::Number)
        }
        BaseType::Boolean => parse_bool(raw).map(TypedValue::Boolean),
        _ => Ok(TypedValue::Text(raw.to_string())),
    }
}

/// Parse a number using the invariant format: `.` as decimal point, no
/// thousands separators, optional exponent. Non-finite results are rejected.
pub fn parse_float(raw: &str) -> Result<f64, ValueError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains(',') {
        return Err(ValueError::NotNumeric(raw.to_string()));
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ValueError::NotNumeric(raw.to_string())),
    }
}

/// Parse `true`/`false` case-insensitively.
pub fn parse_bool(raw: &str) -> Result<bool, ValueError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ValueError::NotBoolean(raw.to_string())),
    }
}

/// Canonical invariant string form of a number.
///
/// Whole numbers print without a fraction (`2`, not `2.0`) and results are
/// rounded to 12 significant digits so float noise does not leak into
/// result documents.
pub fn format_float(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let rounded = round_to_significant(value, 12) + 0.0;
    format!("{rounded}")
}

fn round_to_significant(value: f64, digits: i32) -> f64 {
    if value == 0.0 {
        return 0.0;
    }
    let magnitude = value.abs().log10().floor() as i32 + 1;
    let scale = 10f64.powi(digits - magnitude);
    if !scale.is_finite() || scale == 0.0 {
        return value;
    }
    (value * scale).round() / scale
}
