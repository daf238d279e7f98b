#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use px_columnar::{Column, ColumnError};
use px_frame::{DataFrame, FrameError};
use px_index::Index;
use px_types::{DType, NullKind, Scalar};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("csv input has no headers")]
    MissingHeaders,
    #[error("table is empty")]
    EmptyTable,
    #[error("table must have exactly {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Shape constraints a loaded table must satisfy before evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableShape {
    /// Exact column count, or `None` to accept any.
    pub required_columns: Option<usize>,
}

impl Default for TableShape {
    fn default() -> Self {
        Self {
            required_columns: Some(4),
        }
    }
}

impl TableShape {
    #[must_use]
    pub fn any() -> Self {
        Self {
            required_columns: None,
        }
    }
}

pub fn validate_table(frame: &DataFrame, shape: TableShape) -> Result<(), IoError> {
    if frame.is_empty() || frame.num_columns() == 0 {
        return Err(IoError::EmptyTable);
    }
    if let Some(expected) = shape.required_columns {
        let found = frame.num_columns();
        if found != expected {
            return Err(IoError::ColumnCount { expected, found });
        }
    }
    Ok(())
}

/// Parse CSV text with a header row into a table. Column order follows the
/// header; rows get the range index `0..n`.
pub fn read_csv_str(input: &str) -> Result<DataFrame, IoError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let headers = reader.headers().cloned().map_err(IoError::from)?;

    if headers.is_empty() {
        return Err(IoError::MissingHeaders);
    }

    let mut raw = vec![Vec::<String>::new(); headers.len()];
    for row in reader.records() {
        let record = row?;
        for (idx, cells) in raw.iter_mut().enumerate() {
            cells.push(record.get(idx).unwrap_or_default().to_owned());
        }
    }

    let row_count = raw.first().map_or(0, Vec::len);
    let columns = headers
        .iter()
        .zip(raw)
        .map(|(name, cells)| Ok((name.to_owned(), column_from_cells(&cells)?)))
        .collect::<Result<Vec<_>, IoError>>()?;

    Ok(DataFrame::new(Index::range(row_count), columns)?)
}

pub fn read_csv_path(path: impl AsRef<Path>) -> Result<DataFrame, IoError> {
    read_csv_str(&read_to_string(path.as_ref())?)
}

/// Read a JSON plot document (a `plots` list or a single config).
pub fn read_plot_document(path: impl AsRef<Path>) -> Result<Value, IoError> {
    Ok(serde_json::from_str(&read_to_string(path.as_ref())?)?)
}

fn read_to_string(path: &Path) -> Result<String, IoError> {
    fs::read_to_string(path).map_err(|source| IoError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Typed column from raw cells; a column whose cells do not share a type is
/// kept as text.
fn column_from_cells(cells: &[String]) -> Result<Column, IoError> {
    let parsed = cells.iter().map(|cell| parse_scalar(cell)).collect::<Vec<_>>();
    match Column::from_values(parsed) {
        Ok(column) => Ok(column),
        Err(ColumnError::Type(_)) => {
            let text = cells
                .iter()
                .map(|cell| match cell.trim() {
                    "" => Scalar::Null(NullKind::Null),
                    trimmed => Scalar::Utf8(trimmed.to_owned()),
                })
                .collect();
            Ok(Column::new(DType::Utf8, text)?)
        }
        Err(err) => Err(err.into()),
    }
}

fn parse_scalar(field: &str) -> Scalar {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Scalar::Null(NullKind::Null);
    }

    if let Ok(value) = trimmed.parse::<i64>() {
        return Scalar::Int64(value);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return Scalar::Float64(value);
    }
    if let Ok(value) = trimmed.parse::<bool>() {
        return Scalar::Bool(value);
    }

    Scalar::Utf8(trimmed.to_owned())
}
