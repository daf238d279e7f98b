#![forbid(unsafe_code)]

use std::cmp::Ordering;

use px_types::{
    DType, NullKind, Scalar, TypeError, cast_scalar, common_dtype, ensure_comparable,
    infer_dtype,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    dtype: DType,
    values: Vec<Scalar>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOp {
    Add,
    Sub,
}

impl ArithmeticOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
        }
    }

    fn apply_i64(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            Self::Add => lhs.checked_add(rhs),
            Self::Sub => lhs.checked_sub(rhs),
        }
    }

    fn apply_f64(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Gt,
    Lt,
    Eq,
}

impl ComparisonOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "==",
        }
    }

    #[must_use]
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Gt => ordering == Ordering::Greater,
            Self::Lt => ordering == Ordering::Less,
            Self::Eq => ordering == Ordering::Equal,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColumnError {
    #[error("column length mismatch: left={left}, right={right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("arithmetic on non-numeric dtype {dtype:?}")]
    NonNumericDtype { dtype: DType },
    #[error("int64 overflow evaluating {lhs} {op} {rhs}")]
    IntegerOverflow {
        lhs: i64,
        op: &'static str,
        rhs: i64,
    },
    #[error("row position {position} is out of bounds for column of length {len}")]
    PositionOutOfBounds { position: usize, len: usize },
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result dtype of `left op right`, or an error when either side cannot take
/// part in arithmetic.
pub fn arithmetic_dtype(left: DType, right: DType) -> Result<DType, ColumnError> {
    for dtype in [left, right] {
        if dtype == DType::Utf8 {
            return Err(ColumnError::NonNumericDtype { dtype });
        }
    }
    let out = common_dtype(left, right)?;
    Ok(match out {
        DType::Bool | DType::Null => DType::Int64,
        other => other,
    })
}

/// Apply `op` to two scalars already known to share `out_dtype`'s numeric
/// family. Missing operands yield the dtype's missing marker.
fn combine(
    left: &Scalar,
    right: &Scalar,
    op: ArithmeticOp,
    out_dtype: DType,
) -> Result<Scalar, ColumnError> {
    if left.is_missing() || right.is_missing() {
        return Ok(if left.is_nan() || right.is_nan() {
            Scalar::Null(NullKind::NaN)
        } else {
            Scalar::missing_for_dtype(out_dtype)
        });
    }

    if matches!(out_dtype, DType::Int64) {
        let lhs = integral(left)?;
        let rhs = integral(right)?;
        return op
            .apply_i64(lhs, rhs)
            .map(Scalar::Int64)
            .ok_or(ColumnError::IntegerOverflow {
                lhs,
                op: op.symbol(),
                rhs,
            });
    }

    Ok(Scalar::Float64(op.apply_f64(left.to_f64()?, right.to_f64()?)))
}

fn integral(value: &Scalar) -> Result<i64, ColumnError> {
    match value {
        Scalar::Int64(v) => Ok(*v),
        Scalar::Bool(v) => Ok(i64::from(*v)),
        other => Err(TypeError::InvalidCast {
            from: other.dtype(),
            to: DType::Int64,
        }
        .into()),
    }
}

/// Scalar-with-scalar arithmetic under the same dtype rules as columns.
pub fn scalar_arithmetic(
    left: &Scalar,
    right: &Scalar,
    op: ArithmeticOp,
) -> Result<Scalar, ColumnError> {
    let out_dtype = arithmetic_dtype(left.dtype(), right.dtype())?;
    combine(left, right, op, out_dtype)
}

impl Column {
    /// Construct a column, widening every value to `dtype`. Missing values
    /// take the dtype's missing marker.
    pub fn new(dtype: DType, values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let coerced = values
            .into_iter()
            .map(|value| cast_scalar(value, dtype))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            dtype,
            values: coerced,
        })
    }

    pub fn from_values(values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let dtype = infer_dtype(&values)?;
        Self::new(dtype, values)
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn reindex_by_positions(&self, positions: &[Option<usize>]) -> Result<Self, ColumnError> {
        let values = positions
            .iter()
            .map(|slot| match slot {
                Some(idx) => self
                    .values
                    .get(*idx)
                    .cloned()
                    .unwrap_or_else(|| Scalar::missing_for_dtype(self.dtype)),
                None => Scalar::missing_for_dtype(self.dtype),
            })
            .collect::<Vec<_>>();

        Self::new(self.dtype, values)
    }

    /// Gather rows by position. The dtype is kept even when no rows survive.
    pub fn take(&self, positions: &[usize]) -> Result<Self, ColumnError> {
        let values = positions
            .iter()
            .map(|&position| {
                self.values
                    .get(position)
                    .cloned()
                    .ok_or(ColumnError::PositionOutOfBounds {
                        position,
                        len: self.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(self.dtype, values)
    }

    pub fn binary_numeric(&self, right: &Self, op: ArithmeticOp) -> Result<Self, ColumnError> {
        if self.len() != right.len() {
            return Err(ColumnError::LengthMismatch {
                left: self.len(),
                right: right.len(),
            });
        }

        let out_dtype = arithmetic_dtype(self.dtype, right.dtype)?;
        let values = self
            .values
            .iter()
            .zip(&right.values)
            .map(|(left, right)| combine(left, right, op, out_dtype))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(out_dtype, values)
    }

    /// Broadcast a scalar across every row. `scalar_on_left` keeps operand
    /// order for non-commutative operators.
    pub fn binary_scalar(
        &self,
        scalar: &Scalar,
        op: ArithmeticOp,
        scalar_on_left: bool,
    ) -> Result<Self, ColumnError> {
        let out_dtype = arithmetic_dtype(self.dtype, scalar.dtype())?;
        let values = self
            .values
            .iter()
            .map(|value| {
                if scalar_on_left {
                    combine(scalar, value, op, out_dtype)
                } else {
                    combine(value, scalar, op, out_dtype)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(out_dtype, values)
    }

    /// Row mask for `self op value`. Missing cells never match.
    pub fn compare_scalar(&self, value: &Scalar, op: ComparisonOp) -> Result<Vec<bool>, ColumnError> {
        ensure_comparable(self.dtype, value.dtype())?;
        self.values
            .iter()
            .map(|cell| {
                Ok::<_, ColumnError>(
                    cell.compare(value)?
                        .is_some_and(|ordering| op.holds(ordering)),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use px_types::{DType, NullKind, Scalar, TypeError};

    use super::{ArithmeticOp, Column, ColumnError, ComparisonOp, scalar_arithmetic};

    #[test]
    fn reindex_injects_missing_values() {
        let column = Column::from_values(vec![Scalar::Int64(10), Scalar::Int64(20)])
            .expect("column should build");

        let out = column
            .reindex_by_positions(&[Some(1), None, Some(0)])
            .expect("reindex should work");

        assert_eq!(
            out.values(),
            &[
                Scalar::Int64(20),
                Scalar::Null(NullKind::Null),
                Scalar::Int64(10)
            ]
        );
    }

    #[test]
    fn numeric_addition_propagates_missing() {
        let left = Column::from_values(vec![
            Scalar::Int64(1),
            Scalar::Null(NullKind::Null),
            Scalar::Float64(f64::NAN),
        ])
        .expect("left");
        let right = Column::from_values(vec![Scalar::Int64(2), Scalar::Int64(5), Scalar::Int64(3)])
            .expect("right");

        let out = left
            .binary_numeric(&right, ArithmeticOp::Add)
            .expect("add should pass");

        assert_eq!(out.values()[0], Scalar::Float64(3.0));
        assert_eq!(out.values()[1], Scalar::Null(NullKind::NaN));
        assert_eq!(out.values()[2], Scalar::Null(NullKind::NaN));
    }

    #[test]
    fn int_subtraction_stays_int() {
        let left = Column::from_values(vec![Scalar::Int64(5), Scalar::Int64(7)]).expect("left");
        let right = Column::from_values(vec![Scalar::Int64(1), Scalar::Int64(9)]).expect("right");

        let out = left
            .binary_numeric(&right, ArithmeticOp::Sub)
            .expect("sub should pass");
        assert_eq!(out.dtype(), DType::Int64);
        assert_eq!(out.values(), &[Scalar::Int64(4), Scalar::Int64(-2)]);
    }

    #[test]
    fn scalar_broadcast_respects_operand_order() {
        let column = Column::from_values(vec![Scalar::Int64(1), Scalar::Int64(2)]).expect("col");

        let right = column
            .binary_scalar(&Scalar::Int64(10), ArithmeticOp::Sub, false)
            .expect("col - 10");
        assert_eq!(right.values(), &[Scalar::Int64(-9), Scalar::Int64(-8)]);

        let left = column
            .binary_scalar(&Scalar::Int64(10), ArithmeticOp::Sub, true)
            .expect("10 - col");
        assert_eq!(left.values(), &[Scalar::Int64(9), Scalar::Int64(8)]);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let left = Column::from_values(vec![Scalar::Int64(1)]).expect("left");
        let right = Column::from_values(vec![Scalar::Int64(1), Scalar::Int64(2)]).expect("right");
        let err = left
            .binary_numeric(&right, ArithmeticOp::Add)
            .expect_err("must fail");
        assert_eq!(err, ColumnError::LengthMismatch { left: 1, right: 2 });
    }

    #[test]
    fn string_arithmetic_is_rejected() {
        let column = Column::from_values(vec![Scalar::from("a")]).expect("col");
        let err = column
            .binary_scalar(&Scalar::Int64(1), ArithmeticOp::Add, false)
            .expect_err("must fail");
        assert_eq!(
            err,
            ColumnError::NonNumericDtype {
                dtype: DType::Utf8
            }
        );
    }

    #[test]
    fn integer_overflow_is_reported() {
        let err = scalar_arithmetic(&Scalar::Int64(i64::MAX), &Scalar::Int64(1), ArithmeticOp::Add)
            .expect_err("must overflow");
        assert!(matches!(err, ColumnError::IntegerOverflow { .. }));
    }

    #[test]
    fn take_keeps_dtype_on_empty_selection() {
        let column = Column::from_values(vec![Scalar::Int64(1), Scalar::Int64(2)]).expect("col");
        let out = column.take(&[]).expect("take");
        assert!(out.is_empty());
        assert_eq!(out.dtype(), DType::Int64);
    }

    #[test]
    fn compare_scalar_skips_missing_cells() {
        let column = Column::from_values(vec![
            Scalar::Float64(1.0),
            Scalar::Float64(f64::NAN),
            Scalar::Float64(7.5),
        ])
        .expect("col");

        let mask = column
            .compare_scalar(&Scalar::Int64(1), ComparisonOp::Gt)
            .expect("compare");
        assert_eq!(mask, vec![false, false, true]);
    }

    #[test]
    fn compare_scalar_rejects_mismatched_dtype_even_when_empty() {
        let column = Column::new(DType::Utf8, Vec::new()).expect("col");
        let err = column
            .compare_scalar(&Scalar::Int64(1), ComparisonOp::Eq)
            .expect_err("must fail");
        assert_eq!(
            err,
            ColumnError::Type(TypeError::IncomparableDtypes {
                left: DType::Utf8,
                right: DType::Int64
            })
        );
    }
}
