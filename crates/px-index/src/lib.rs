#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Row identity. Tables start with `0..n`; filtering keeps the labels of the
/// surviving rows and aggregation relabels rows by group key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IndexLabel {
    Int64(i64),
    Utf8(String),
}

impl From<i64> for IndexLabel {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<&str> for IndexLabel {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for IndexLabel {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl fmt::Display for IndexLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(label) => write!(f, "{label}"),
            Self::Utf8(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("alignment plan is inconsistent: union has {union_len} labels, left {left_len}, right {right_len}")]
    InconsistentPlan {
        union_len: usize,
        left_len: usize,
        right_len: usize,
    },
    #[error("row position {position} is out of bounds for index of length {len}")]
    PositionOutOfBounds { position: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    labels: Vec<IndexLabel>,
}

impl Index {
    #[must_use]
    pub fn new(labels: Vec<IndexLabel>) -> Self {
        Self { labels }
    }

    /// The default `0..len` row index.
    #[must_use]
    pub fn range(len: usize) -> Self {
        (0_i64..).take(len).map(IndexLabel::Int64).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn labels(&self) -> &[IndexLabel] {
        &self.labels
    }

    /// Labels at the given positions, in the given order.
    pub fn take(&self, positions: &[usize]) -> Result<Self, IndexError> {
        positions
            .iter()
            .map(|&position| {
                self.labels
                    .get(position)
                    .cloned()
                    .ok_or(IndexError::PositionOutOfBounds {
                        position,
                        len: self.len(),
                    })
            })
            .collect()
    }

    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.labels.len());
        !self.labels.iter().all(|label| seen.insert(label))
    }

    /// Position of each label's first occurrence.
    fn first_positions(&self) -> HashMap<&IndexLabel, usize> {
        let mut positions = HashMap::with_capacity(self.labels.len());
        for (position, label) in self.labels.iter().enumerate() {
            positions.entry(label).or_insert(position);
        }
        positions
    }
}

impl FromIterator<IndexLabel> for Index {
    fn from_iter<I: IntoIterator<Item = IndexLabel>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// How two indexes line up: the union of their labels, and for each union
/// slot the source row on either side (`None` where that side lacks it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentPlan {
    pub union_index: Index,
    pub left_positions: Vec<Option<usize>>,
    pub right_positions: Vec<Option<usize>>,
}

impl AlignmentPlan {
    pub fn validate(&self) -> Result<(), IndexError> {
        let union_len = self.union_index.len();
        let left_len = self.left_positions.len();
        let right_len = self.right_positions.len();
        if left_len == union_len && right_len == union_len {
            Ok(())
        } else {
            Err(IndexError::InconsistentPlan {
                union_len,
                left_len,
                right_len,
            })
        }
    }
}

/// Left labels in their order, followed by right labels the left lacks.
#[must_use]
pub fn align_union(left: &Index, right: &Index) -> AlignmentPlan {
    let left_first = left.first_positions();
    let right_first = right.first_positions();

    let union_index = left
        .labels
        .iter()
        .chain(
            right
                .labels
                .iter()
                .filter(|label| !left_first.contains_key(label)),
        )
        .cloned()
        .collect::<Index>();

    let slots = |side: &HashMap<&IndexLabel, usize>| {
        union_index
            .labels
            .iter()
            .map(|label| side.get(label).copied())
            .collect::<Vec<_>>()
    };
    let left_positions = slots(&left_first);
    let right_positions = slots(&right_first);

    AlignmentPlan {
        union_index,
        left_positions,
        right_positions,
    }
}
