//! Column ids, the column index, and the sorted-row grouping used to walk field value
//! combinations as a tree.
//!
//! A field table's "columns" are every distinct combination of its field values, including the
//! roll-ups at each level. Suppose a table with fields `age_group, gender` holds:
//!
//! ```text
//! 5-9,   male,   129
//! 5-9,   female, 131
//! 10-14, male,   221
//! ```
//!
//! Its columns are, indented to show nesting:
//!
//! ```text
//! total
//! 10-14:
//!   10-14-male
//! 5-9:
//!   5-9-female
//!   5-9-male
//! ```
//!
//! They are hierarchical but returned flat, so the order of the index matters.

use std::cmp::Ordering;

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub const COLUMN_ID_SEPARATOR: &str = "-";
/// Appended to purely numeric single-value ids so consumers that reorder integer-like keys
/// (e.g. javascript objects) keep them in place.
pub const NUMERIC_ID_MARKER: &str = "_";
/// Appended to the display name of columns that have nested columns below them.
pub const DRILL_DOWN_MARKER: &str = ":";
pub const TOTAL_COLUMN_NAME: &str = "Total";

fn is_integer_like(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// Stable id for a chain of field values.
pub fn column_id<S: AsRef<str>>(field_values: &[S]) -> String {
    match field_values {
        [single] if is_integer_like(single.as_ref()) => {
            format!("{}{NUMERIC_ID_MARKER}", single.as_ref())
        }
        _ => field_values
            .iter()
            .map(|value| value.as_ref())
            .join(COLUMN_ID_SEPARATOR),
    }
}

/// Ordering of field values: case-insensitive lexicographic, ties broken by exact byte order so
/// the result does not depend on storage collation or row order.
pub fn compare_field_values(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// A row carrying one value per declared field.
pub trait FieldValues {
    fn field_value(&self, level: usize) -> &str;
}

impl FieldValues for Vec<String> {
    fn field_value(&self, level: usize) -> &str {
        &self[level]
    }
}

/// Compare two rows field by field, in declared field order.
pub fn compare_rows<T: FieldValues>(a: &T, b: &T, n_fields: usize) -> Ordering {
    (0..n_fields).fold(Ordering::Equal, |ordering, level| {
        ordering.then_with(|| compare_field_values(a.field_value(level), b.field_value(level)))
    })
}

/// Split sorted `rows` into contiguous runs sharing the value of field `level`.
pub fn group_by_field<T: FieldValues>(rows: &[T], level: usize) -> Vec<(&str, &[T])> {
    let mut groups = Vec::new();
    let mut start = 0;
    for end in 1..=rows.len() {
        if end == rows.len()
            || rows[end].field_value(level) != rows[start].field_value(level)
        {
            groups.push((rows[start].field_value(level), &rows[start..end]));
            start = end;
        }
    }
    groups
}

/// Display metadata of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub indent: usize,
}

/// Ordered map from column id to display metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnIndex(pub IndexMap<String, ColumnInfo>);

impl ColumnIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a column. An id that is already present keeps its position.
    pub fn insert(&mut self, id: String, name: String, indent: usize) {
        self.0.insert(id, ColumnInfo { name, indent });
    }

    pub fn get(&self, id: &str) -> Option<&ColumnInfo> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnInfo)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ids of the columns at `indent`, in index order.
    pub fn ids_at_indent(&self, indent: usize) -> Vec<String> {
        self.0
            .iter()
            .filter(|(_, info)| info.indent == indent)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Comma separated ids, for error messages.
    pub fn describe(&self) -> String {
        self.0.keys().join(", ")
    }
}
