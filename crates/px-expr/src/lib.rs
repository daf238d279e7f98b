#![forbid(unsafe_code)]

use std::fmt;

use px_columnar::{ArithmeticOp, ColumnError, scalar_arithmetic};
use px_frame::{DataFrame, FrameError, Series};
use px_types::Scalar;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

// ── Operator registry ───────────────────────────────────────────────────
//
// Symbol → kernel. The builder, the evaluator and the config validator all
// read this table; adding an operator is one entry here plus the kernel in
// `ArithmeticOp`.

pub const BINARY_OPERATORS: &[(&str, ArithmeticOp)] =
    &[("+", ArithmeticOp::Add), ("-", ArithmeticOp::Sub)];

#[must_use]
pub fn binary_operator(symbol: &str) -> Option<ArithmeticOp> {
    BINARY_OPERATORS
        .iter()
        .find(|(candidate, _)| *candidate == symbol)
        .map(|(_, op)| *op)
}

/// Supported symbols, sorted, for diagnostics.
#[must_use]
pub fn supported_binary_operators() -> Vec<&'static str> {
    let mut symbols = BINARY_OPERATORS
        .iter()
        .map(|(symbol, _)| *symbol)
        .collect::<Vec<_>>();
    symbols.sort_unstable();
    symbols
}

// ── AST ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    ColumnRef {
        name: String,
    },
    Literal {
        value: Scalar,
    },
    BinaryOp {
        operator: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Reserved: no config syntax produces it and evaluation always fails.
    Function {
        name: String,
        arg: Box<Expr>,
    },
}

impl Expr {
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self::ColumnRef { name: name.into() }
    }

    #[must_use]
    pub fn literal(value: impl Into<Scalar>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    #[must_use]
    pub fn binary(operator: impl Into<String>, left: Self, right: Self) -> Self {
        Self::BinaryOp {
            operator: operator.into(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn function(name: impl Into<String>, arg: Self) -> Self {
        Self::Function {
            name: name.into(),
            arg: Box::new(arg),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnRef { name } => write!(f, "ColumnRef({name:?})"),
            Self::Literal { value } => write!(f, "Literal({value})"),
            Self::BinaryOp {
                operator,
                left,
                right,
            } => write!(f, "BinaryOp({operator:?}, {left}, {right})"),
            Self::Function { name, arg } => write!(f, "Function({name:?}, {arg})"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),
    #[error("invalid expression format: {0}")]
    InvalidExpressionFormat(String),
    #[error("function {0} is not implemented")]
    NotImplemented(String),
    #[error("unknown column reference: {0}")]
    UnknownColumn(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

// ── Expression builder ──────────────────────────────────────────────────
//
// JSON expression → AST. Purely structural: column names are not checked
// against any schema here.
//
//   "name"                       → ColumnRef
//   42 | 0.5                     → Literal
//   {"op", "left", "right"}      → BinaryOp (operands first, then the op)
//   anything else                → InvalidExpressionFormat

pub fn build_expr(value: &Value) -> Result<Expr, ExprError> {
    match value {
        Value::String(name) => Ok(Expr::column(name.clone())),
        Value::Number(number) => Ok(Expr::Literal {
            value: number_to_scalar(number)?,
        }),
        Value::Object(fields) if fields.contains_key("op") => {
            let operand = |key: &str| {
                fields.get(key).ok_or_else(|| {
                    ExprError::InvalidExpressionFormat(format!(
                        "binary operation is missing '{key}'"
                    ))
                })
            };
            let left = build_expr(operand("left")?)?;
            let right = build_expr(operand("right")?)?;

            match &fields["op"] {
                Value::String(symbol) if binary_operator(symbol).is_some() => {
                    Ok(Expr::binary(symbol.clone(), left, right))
                }
                Value::String(symbol) => Err(ExprError::UnsupportedOperator(symbol.clone())),
                other => Err(ExprError::UnsupportedOperator(other.to_string())),
            }
        }
        Value::Object(_) => Err(ExprError::InvalidExpressionFormat(
            "expression object must contain 'op'".to_owned(),
        )),
        other => Err(ExprError::InvalidExpressionFormat(format!(
            "expected column name, number or operation object, found {}",
            json_kind(other)
        ))),
    }
}

/// JSON number → `Int64` when it fits, otherwise `Float64`.
pub fn number_to_scalar(number: &Number) -> Result<Scalar, ExprError> {
    if let Some(v) = number.as_i64() {
        return Ok(Scalar::Int64(v));
    }
    number
        .as_f64()
        .map(Scalar::Float64)
        .ok_or_else(|| ExprError::InvalidExpressionFormat(format!("unrepresentable number {number}")))
}

#[must_use]
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

// ── Evaluator ───────────────────────────────────────────────────────────

/// Result of evaluating an expression: one value per row, or a single value
/// when no column is involved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExprValue {
    Column(Series),
    Scalar(Scalar),
}

impl ExprValue {
    #[must_use]
    pub fn as_series(&self) -> Option<&Series> {
        match self {
            Self::Column(series) => Some(series),
            Self::Scalar(_) => None,
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Column(_) => None,
            Self::Scalar(value) => Some(value),
        }
    }
}

/// Evaluate `expr` against `frame`.
///
/// Column existence is the validator's job; an unknown name here surfaces as
/// [`ExprError::UnknownColumn`].
pub fn evaluate(expr: &Expr, frame: &DataFrame) -> Result<ExprValue, ExprError> {
    match expr {
        Expr::ColumnRef { name } => match frame.series(name) {
            Ok(series) => Ok(ExprValue::Column(series)),
            Err(FrameError::UnknownColumn(name)) => Err(ExprError::UnknownColumn(name)),
            Err(err) => Err(err.into()),
        },
        Expr::Literal { value } => Ok(ExprValue::Scalar(value.clone())),
        Expr::BinaryOp {
            operator,
            left,
            right,
        } => {
            let lhs = evaluate(left, frame)?;
            let rhs = evaluate(right, frame)?;
            let op = binary_operator(operator)
                .ok_or_else(|| ExprError::UnsupportedOperator(operator.clone()))?;
            apply_binary(lhs, rhs, op)
        }
        Expr::Function { name, .. } => Err(ExprError::NotImplemented(name.clone())),
    }
}

fn apply_binary(lhs: ExprValue, rhs: ExprValue, op: ArithmeticOp) -> Result<ExprValue, ExprError> {
    let out = match (lhs, rhs) {
        (ExprValue::Column(left), ExprValue::Column(right)) => {
            ExprValue::Column(left.binary(&right, op)?)
        }
        (ExprValue::Column(left), ExprValue::Scalar(right)) => {
            ExprValue::Column(left.binary_scalar(&right, op, false)?)
        }
        (ExprValue::Scalar(left), ExprValue::Column(right)) => {
            ExprValue::Column(right.binary_scalar(&left, op, true)?)
        }
        (ExprValue::Scalar(left), ExprValue::Scalar(right)) => {
            ExprValue::Scalar(scalar_arithmetic(&left, &right, op)?)
        }
    };
    Ok(out)
}
