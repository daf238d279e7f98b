#![forbid(unsafe_code)]

use px_columnar::{ColumnError, ComparisonOp};
use px_expr::{json_kind, number_to_scalar};
use px_frame::{DataFrame, FrameError};
use px_types::Scalar;
use serde_json::Value;
use thiserror::Error;

/// Comparison registry shared by the filter stage and the config validator.
pub const FILTER_OPERATORS: &[(&str, ComparisonOp)] = &[
    (">", ComparisonOp::Gt),
    ("<", ComparisonOp::Lt),
    ("==", ComparisonOp::Eq),
];

#[must_use]
pub fn comparison_operator(symbol: &str) -> Option<ComparisonOp> {
    FILTER_OPERATORS
        .iter()
        .find(|(candidate, _)| *candidate == symbol)
        .map(|(_, op)| *op)
}

#[must_use]
pub fn supported_filter_operators() -> Vec<&'static str> {
    let mut symbols = FILTER_OPERATORS
        .iter()
        .map(|(symbol, _)| *symbol)
        .collect::<Vec<_>>();
    symbols.sort_unstable();
    symbols
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),
    #[error("unknown filter column: {0}")]
    UnknownColumn(String),
    #[error("malformed filter condition: {0}")]
    MalformedCondition(String),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// `column op value`, one row predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub column: String,
    pub op: String,
    pub value: Scalar,
}

impl FilterCondition {
    #[must_use]
    pub fn new(column: impl Into<String>, op: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self {
            column: column.into(),
            op: op.into(),
            value: value.into(),
        }
    }

    /// Read a `{column, op, value}` object. Only the shape is checked here;
    /// operator support and column existence are checked when applied.
    pub fn from_json(value: &Value) -> Result<Self, FilterError> {
        let fields = value.as_object().ok_or_else(|| {
            FilterError::MalformedCondition(format!("expected object, found {}", json_kind(value)))
        })?;
        let text = |key: &str| match fields.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            _ => Err(FilterError::MalformedCondition(format!(
                "'{key}' must be a string"
            ))),
        };

        let column = text("column")?;
        let op = text("op")?;
        let value = match fields.get("value") {
            Some(Value::Number(number)) => number_to_scalar(number)
                .map_err(|err| FilterError::MalformedCondition(err.to_string()))?,
            Some(Value::String(s)) => Scalar::Utf8(s.clone()),
            Some(other) => {
                return Err(FilterError::MalformedCondition(format!(
                    "'value' must be a number or string, found {}",
                    json_kind(other)
                )));
            }
            None => {
                return Err(FilterError::MalformedCondition(
                    "'value' is missing".to_owned(),
                ));
            }
        };

        Ok(Self { column, op, value })
    }
}

/// Read a JSON list of filter conditions.
pub fn filters_from_json(value: &Value) -> Result<Vec<FilterCondition>, FilterError> {
    value
        .as_array()
        .ok_or_else(|| {
            FilterError::MalformedCondition(format!(
                "filters must be a list, found {}",
                json_kind(value)
            ))
        })?
        .iter()
        .map(FilterCondition::from_json)
        .collect()
}

/// Apply `filters` in order, each narrowing the rows the previous one kept.
///
/// Surviving rows keep their original index labels. Filtering every row out
/// is not an error.
pub fn apply_filters(
    frame: &DataFrame,
    filters: &[FilterCondition],
) -> Result<DataFrame, FilterError> {
    let mut current = frame.clone();

    for condition in filters {
        let op = comparison_operator(&condition.op)
            .ok_or_else(|| FilterError::UnsupportedOperator(condition.op.clone()))?;
        let column = current
            .column(&condition.column)
            .ok_or_else(|| FilterError::UnknownColumn(condition.column.clone()))?;

        let mask = column.compare_scalar(&condition.value, op)?;
        let narrowed = current.filter_by_mask(&mask)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            column = %condition.column,
            op = op.symbol(),
            value = %condition.value,
            rows_in = current.len(),
            rows_out = narrowed.len(),
            "applied filter"
        );

        current = narrowed;
    }

    Ok(current)
}
