#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::collections::BTreeMap;

use px_columnar::{Column, ColumnError};
use px_frame::{DataFrame, FrameError, Series};
use px_index::{Index, IndexError, IndexLabel, align_union};
use px_types::{DType, Scalar};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Mean,
    Sum,
}

/// Aggregation registry shared by the group-by stage and the config validator.
pub const AGGREGATIONS: &[(&str, AggFunc)] = &[("mean", AggFunc::Mean), ("sum", AggFunc::Sum)];

#[must_use]
pub fn aggregation(name: &str) -> Option<AggFunc> {
    AGGREGATIONS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, func)| *func)
}

#[must_use]
pub fn supported_aggregations() -> Vec<&'static str> {
    let mut names = AGGREGATIONS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>();
    names.sort_unstable();
    names
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupByOptions {
    pub dropna: bool,
}

impl Default for GroupByOptions {
    fn default() -> Self {
        Self { dropna: true }
    }
}

#[derive(Debug, Error)]
pub enum GroupByError {
    #[error("unsupported aggregation: {0}")]
    UnsupportedAggregation(String),
    #[error("unknown group_by column: {0}")]
    UnknownColumn(String),
    #[error("malformed aggregation spec: {0}")]
    MalformedSpec(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

/// `{"func": "<name>"}` from a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationSpec {
    pub func: String,
}

impl AggregationSpec {
    #[must_use]
    pub fn new(func: impl Into<String>) -> Self {
        Self { func: func.into() }
    }

    pub fn from_json(value: &Value) -> Result<Self, GroupByError> {
        match value.get("func") {
            Some(Value::String(func)) => Ok(Self::new(func.clone())),
            _ => Err(GroupByError::MalformedSpec(
                "aggregation must be an object with a string 'func'".to_owned(),
            )),
        }
    }
}

/// Group `values` by the frame's `group_by` column and reduce each group.
///
/// The result is indexed by group key, ascending, and keeps the name of
/// `values`. Int64 and Utf8 keys become labels of the same kind; Bool and
/// Float64 keys become their Utf8 rendering (`"true"`, `"0.5"`), sorted by
/// the original value.
pub fn apply_aggregation(
    frame: &DataFrame,
    values: &Series,
    group_by: &str,
    spec: &AggregationSpec,
) -> Result<Series, GroupByError> {
    apply_aggregation_with_options(frame, values, group_by, spec, GroupByOptions::default())
}

pub fn apply_aggregation_with_options(
    frame: &DataFrame,
    values: &Series,
    group_by: &str,
    spec: &AggregationSpec,
    options: GroupByOptions,
) -> Result<Series, GroupByError> {
    let func = aggregation(&spec.func)
        .ok_or_else(|| GroupByError::UnsupportedAggregation(spec.func.clone()))?;
    let keys = frame
        .column(group_by)
        .ok_or_else(|| GroupByError::UnknownColumn(group_by.to_owned()))?;

    // Fast path: the value series came from this frame, so rows already line up.
    let (aligned_keys, aligned_values) = if values.index() == frame.index() {
        (keys.clone(), values.column().clone())
    } else {
        let plan = align_union(frame.index(), values.index());
        plan.validate()?;
        (
            keys.reindex_by_positions(&plan.left_positions)?,
            values.column().reindex_by_positions(&plan.right_positions)?,
        )
    };

    let (index, column) = groupby_reduce(&aligned_keys, &aligned_values, func, options)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        group_by,
        func = spec.func.as_str(),
        rows = aligned_keys.len(),
        groups = index.len(),
        "aggregated"
    );

    Ok(Series::new(values.name(), index, column)?)
}

/// Reduce `values` per distinct key. Keys ascend; a missing key forms its own
/// trailing group only when `dropna` is off.
pub fn groupby_reduce(
    keys: &Column,
    values: &Column,
    func: AggFunc,
    options: GroupByOptions,
) -> Result<(Index, Column), GroupByError> {
    if keys.len() != values.len() {
        return Err(ColumnError::LengthMismatch {
            left: keys.len(),
            right: values.len(),
        }
        .into());
    }
    if values.dtype() == DType::Utf8 {
        return Err(ColumnError::NonNumericDtype {
            dtype: DType::Utf8,
        }
        .into());
    }

    let integral = matches!(values.dtype(), DType::Int64 | DType::Bool);
    let mut groups = BTreeMap::<GroupKey, Accumulator>::new();

    for (key, value) in keys.values().iter().zip(values.values()) {
        if options.dropna && key.is_missing() {
            continue;
        }
        groups
            .entry(GroupKey::from_scalar(key))
            .or_default()
            .push(value, func)?;
    }

    let mut labels = Vec::with_capacity(groups.len());
    let mut out = Vec::with_capacity(groups.len());
    for (key, acc) in groups {
        labels.push(key.into_label());
        out.push(acc.finish(func, integral));
    }

    let out_dtype = match func {
        AggFunc::Sum if integral => DType::Int64,
        AggFunc::Sum | AggFunc::Mean => DType::Float64,
    };
    Ok((Index::new(labels), Column::new(out_dtype, out)?))
}

#[derive(Debug, Default)]
struct Accumulator {
    int_sum: i64,
    float_sum: f64,
    count: usize,
}

impl Accumulator {
    // Only `sum` keeps an exact integer total; `mean` works in f64 so large
    // integer values cannot overflow it.
    fn push(&mut self, value: &Scalar, func: AggFunc) -> Result<(), ColumnError> {
        if value.is_missing() {
            return Ok(());
        }
        if func == AggFunc::Sum {
            let v = match value {
                Scalar::Int64(v) => *v,
                Scalar::Bool(v) => i64::from(*v),
                _ => 0,
            };
            self.int_sum = self
                .int_sum
                .checked_add(v)
                .ok_or(ColumnError::IntegerOverflow {
                    lhs: self.int_sum,
                    op: "+",
                    rhs: v,
                })?;
        }
        self.float_sum += value.to_f64()?;
        self.count += 1;
        Ok(())
    }

    fn finish(&self, func: AggFunc, integral: bool) -> Scalar {
        match func {
            AggFunc::Sum if integral => Scalar::Int64(self.int_sum),
            AggFunc::Sum => Scalar::Float64(self.float_sum),
            AggFunc::Mean if self.count == 0 => Scalar::Float64(f64::NAN),
            AggFunc::Mean => Scalar::Float64(self.float_sum / self.count as f64),
        }
    }
}

/// Orderable group key. Variant order is the sort order across kinds, with
/// missing keys last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    Bool(bool),
    Int64(i64),
    Float64(FloatKey),
    Utf8(String),
    Missing,
}

impl GroupKey {
    fn from_scalar(key: &Scalar) -> Self {
        if key.is_missing() {
            return Self::Missing;
        }
        match key {
            Scalar::Bool(v) => Self::Bool(*v),
            Scalar::Int64(v) => Self::Int64(*v),
            // -0.0 and 0.0 are one group.
            Scalar::Float64(v) => Self::Float64(FloatKey(if *v == 0.0 { 0.0 } else { *v })),
            Scalar::Utf8(v) => Self::Utf8(v.clone()),
            Scalar::Null(_) => Self::Missing,
        }
    }

    fn into_label(self) -> IndexLabel {
        match self {
            Self::Bool(v) => IndexLabel::Utf8(v.to_string()),
            Self::Int64(v) => IndexLabel::Int64(v),
            Self::Float64(FloatKey(v)) => IndexLabel::Utf8(Scalar::Float64(v).to_string()),
            Self::Utf8(v) => IndexLabel::Utf8(v),
            Self::Missing => IndexLabel::Utf8("<null>".to_owned()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FloatKey(f64);

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for FloatKey {}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}
