//! Shaping raw column values into named, percentage-annotated statistics.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    catalogue::{Release, ReleaseInfo},
    columns::ColumnIndex,
    config::Denominator,
    error::{ProfileError, ProfileResult},
    table::{RawValues, TableDescriptor},
    utils::percent,
};

/// Key of the geography a statistic was computed for, as opposed to its comparative levels.
pub const THIS: &str = "this";

/// One named statistic. Every map is keyed by level (`this`, `province`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatEntry {
    pub name: String,
    #[serde(default)]
    pub values: IndexMap<String, f64>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub index: IndexMap<String, f64>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub error: IndexMap<String, f64>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub error_ratio: IndexMap<String, f64>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub numerators: IndexMap<String, f64>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub numerator_errors: IndexMap<String, f64>,
}

impl StatEntry {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// An entry holding a single absolute value for `this`.
    pub fn with_value(name: &str, value: f64) -> Self {
        let mut entry = Self::named(name);
        entry.values.insert(THIS.to_string(), value);
        entry
    }

    pub fn value(&self) -> Option<f64> {
        self.values.get(THIS).copied()
    }

    pub fn numerator(&self) -> Option<f64> {
        self.numerators.get(THIS).copied()
    }

    /// Copy the `this` figures of `other` (the same statistic computed for an ancestor) in under
    /// `level`.
    pub fn merge_level(&mut self, level: &str, other: &StatEntry) {
        let copies = [
            (&mut self.values, &other.values),
            (&mut self.numerators, &other.numerators),
            (&mut self.error, &other.error),
            (&mut self.numerator_errors, &other.numerator_errors),
        ];
        for (target, source) in copies {
            if let Some(value) = source.get(THIS) {
                target.insert(level.to_string(), *value);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatMetadata {
    pub universe: String,
    pub table_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseInfo>,
}

/// Shaped statistics for one table and geography, in key order, plus their provenance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatData {
    #[serde(flatten)]
    pub entries: IndexMap<String, StatEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<StatMetadata>,
}

impl StatData {
    pub fn new(entries: IndexMap<String, StatEntry>) -> Self {
        Self {
            entries,
            metadata: None,
        }
    }

    /// Attach the universe, table id and release the values came from.
    pub fn add_metadata(&mut self, table: &TableDescriptor, release: Option<&Release>) {
        self.metadata = Some(StatMetadata {
            universe: table.universe.clone(),
            table_id: table.name.to_uppercase(),
            release: release.map(Release::as_info),
        });
    }

    pub fn get(&self, key: &str) -> Option<&StatEntry> {
        self.entries.get(key)
    }
}

/// What to compute from a table's raw values.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRequest {
    /// Columns to include; defaults depend on the table.
    pub fields: Option<Vec<String>>,
    /// Order of the (source) columns in the output; defaults to `fields`.
    pub key_order: Option<Vec<String>>,
    /// Source column -> output key. Columns recoded to the same key are summed.
    pub recode: IndexMap<String, String>,
    pub total: Denominator,
    pub percent: bool,
}

impl Default for StatRequest {
    fn default() -> Self {
        Self {
            fields: None,
            key_order: None,
            recode: IndexMap::new(),
            total: Denominator::Sum,
            percent: true,
        }
    }
}

impl StatRequest {
    pub fn fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.as_ref().to_string()).collect());
        self
    }

    pub fn key_order<S: AsRef<str>>(mut self, key_order: &[S]) -> Self {
        self.key_order = Some(key_order.iter().map(|f| f.as_ref().to_string()).collect());
        self
    }

    pub fn recode(mut self, field: &str, key: &str) -> Self {
        self.recode.insert(field.to_string(), key.to_string());
        self
    }

    pub fn total(mut self, total: Denominator) -> Self {
        self.total = total;
        self
    }

    pub fn percent(mut self, percent: bool) -> Self {
        self.percent = percent;
        self
    }
}

/// Build the named result set for `raw` values.
///
/// Returns the entries in key order together with the denominator used. Null raw values count
/// as 0.
pub fn shape(
    raw: &RawValues,
    columns: &ColumnIndex,
    default_fields: &[String],
    request: &StatRequest,
    table: &str,
) -> ProfileResult<(IndexMap<String, StatEntry>, f64)> {
    let invalid = |field: &str| ProfileError::InvalidField {
        field: field.to_string(),
        table: table.to_string(),
        valid: columns.describe(),
    };
    let value_of = |field: &str| raw.get(field).copied().flatten().unwrap_or(0.0);

    let fields: Vec<String> = match &request.fields {
        Some(fields) => {
            if let Some(field) = fields.iter().find(|f| !columns.contains(f)) {
                return Err(invalid(field));
            }
            fields.clone()
        }
        None => default_fields.to_vec(),
    };

    let total = match &request.total {
        Denominator::Sum => fields.iter().map(|f| value_of(f)).sum(),
        Denominator::Value(value) => *value,
        Denominator::Field(name) => {
            if !columns.contains(name) {
                return Err(invalid(name));
            }
            value_of(name)
        }
    };

    let key_order = request.key_order.as_ref().unwrap_or(&fields);
    let mut results: IndexMap<String, StatEntry> = IndexMap::new();
    for field in key_order {
        let info = columns.get(field).ok_or_else(|| invalid(field))?;
        let value = value_of(field);

        let (key, name) = match request.recode.get(field) {
            Some(key) => (key.clone(), key.clone()),
            None => (field.clone(), info.name.clone()),
        };
        // The key may already exist if another column was recoded to it
        let entry = results
            .entry(key)
            .or_insert_with(|| StatEntry::named(&name));

        if request.percent {
            let numerator = value + entry.numerator().unwrap_or(0.0);
            entry
                .values
                .insert(THIS.to_string(), percent(numerator, total));
            entry.numerators.insert(THIS.to_string(), numerator);
        } else {
            let value = value + entry.value().unwrap_or(0.0);
            entry.values.insert(THIS.to_string(), value);
        }
    }
    Ok((results, total))
}
