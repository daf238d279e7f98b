#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use px_columnar::{ArithmeticOp, Column, ColumnError};
use px_index::{Index, IndexError, IndexLabel, align_union};
use px_types::{DType, Scalar};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error("index length ({index_len}) does not match column length ({column_len})")]
    LengthMismatch { index_len: usize, column_len: usize },
    #[error("row mask length ({mask_len}) does not match row count ({rows})")]
    MaskLengthMismatch { rows: usize, mask_len: usize },
    #[error("duplicate index labels cannot be aligned")]
    DuplicateIndexUnsupported,
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// A named, indexed column: one evaluated value per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: String,
    index: Index,
    column: Column,
}

impl Series {
    pub fn new(name: impl Into<String>, index: Index, column: Column) -> Result<Self, FrameError> {
        if index.len() != column.len() {
            return Err(FrameError::LengthMismatch {
                index_len: index.len(),
                column_len: column.len(),
            });
        }

        Ok(Self {
            name: name.into(),
            index,
            column,
        })
    }

    pub fn from_values(
        name: impl Into<String>,
        index_labels: Vec<IndexLabel>,
        values: Vec<Scalar>,
    ) -> Result<Self, FrameError> {
        let index = Index::new(index_labels);
        let column = Column::from_values(values)?;
        Self::new(name, index, column)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn column(&self) -> &Column {
        &self.column
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.column.dtype()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        self.column.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.column.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.column.is_empty()
    }

    /// `self op other`. Identical indexes combine positionally; otherwise the
    /// operands are aligned on the union of their labels first.
    pub fn binary(&self, other: &Self, op: ArithmeticOp) -> Result<Self, FrameError> {
        let name = format!("{} {} {}", self.name, op.symbol(), other.name);

        if self.index == other.index {
            let column = self.column.binary_numeric(&other.column, op)?;
            return Self::new(name, self.index.clone(), column);
        }

        if self.index.has_duplicates() || other.index.has_duplicates() {
            return Err(FrameError::DuplicateIndexUnsupported);
        }

        let plan = align_union(&self.index, &other.index);
        plan.validate()?;

        let left = self.column.reindex_by_positions(&plan.left_positions)?;
        let right = other.column.reindex_by_positions(&plan.right_positions)?;
        let column = left.binary_numeric(&right, op)?;

        Self::new(name, plan.union_index, column)
    }

    /// Broadcast `scalar` over every row, keeping this series' index.
    pub fn binary_scalar(
        &self,
        scalar: &Scalar,
        op: ArithmeticOp,
        scalar_on_left: bool,
    ) -> Result<Self, FrameError> {
        let column = self.column.binary_scalar(scalar, op, scalar_on_left)?;
        let name = if scalar_on_left {
            format!("{scalar} {} {}", op.symbol(), self.name)
        } else {
            format!("{} {} {scalar}", self.name, op.symbol())
        };
        Self::new(name, self.index.clone(), column)
    }
}

/// The table operated on: ordered named columns sharing one row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    index: Index,
    column_order: Vec<String>,
    columns: BTreeMap<String, Column>,
}

impl DataFrame {
    pub fn new(index: Index, columns: Vec<(String, Column)>) -> Result<Self, FrameError> {
        let mut column_order = Vec::with_capacity(columns.len());
        let mut by_name = BTreeMap::new();

        for (name, column) in columns {
            if column.len() != index.len() {
                return Err(FrameError::LengthMismatch {
                    index_len: index.len(),
                    column_len: column.len(),
                });
            }
            if by_name.contains_key(&name) {
                return Err(FrameError::DuplicateColumn(name));
            }
            column_order.push(name.clone());
            by_name.insert(name, column);
        }

        Ok(Self {
            index,
            column_order,
            columns: by_name,
        })
    }

    /// Build a frame with the default `0..n` index.
    pub fn from_columns(columns: Vec<(String, Column)>) -> Result<Self, FrameError> {
        let rows = columns.first().map_or(0, |(_, column)| column.len());
        Self::new(Index::range(rows), columns)
    }

    /// Build a frame from raw values, in `column_order`. Every named column
    /// must have an entry in `data`.
    pub fn from_dict(
        column_order: &[&str],
        data: Vec<(&str, Vec<Scalar>)>,
    ) -> Result<Self, FrameError> {
        let mut data = data.into_iter().collect::<BTreeMap<_, _>>();
        let mut columns = Vec::with_capacity(column_order.len());
        for name in column_order {
            let values = data
                .remove(name)
                .ok_or_else(|| FrameError::UnknownColumn((*name).to_owned()))?;
            columns.push(((*name).to_owned(), Column::from_values(values)?));
        }
        Self::from_columns(columns)
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.column_order.len()
    }

    /// Column names in schema order.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_order
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// The named column as a series carrying this frame's index.
    pub fn series(&self, name: &str) -> Result<Series, FrameError> {
        let column = self
            .columns
            .get(name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_owned()))?;
        Series::new(name, self.index.clone(), column.clone())
    }

    /// Rows at `positions`, keeping their original index labels.
    pub fn take_rows(&self, positions: &[usize]) -> Result<Self, FrameError> {
        let index = self.index.take(positions)?;
        let mut columns = BTreeMap::new();
        for (name, column) in &self.columns {
            columns.insert(name.clone(), column.take(positions)?);
        }

        Ok(Self {
            index,
            column_order: self.column_order.clone(),
            columns,
        })
    }

    /// Rows whose mask entry is `true`.
    pub fn filter_by_mask(&self, mask: &[bool]) -> Result<Self, FrameError> {
        if mask.len() != self.len() {
            return Err(FrameError::MaskLengthMismatch {
                rows: self.len(),
                mask_len: mask.len(),
            });
        }

        let positions = mask
            .iter()
            .enumerate()
            .filter_map(|(pos, keep)| keep.then_some(pos))
            .collect::<Vec<_>>();

        #[cfg(feature = "tracing")]
        tracing::trace!(
            rows_in = self.len(),
            rows_out = positions.len(),
            "filter_by_mask"
        );

        self.take_rows(&positions)
    }
}
