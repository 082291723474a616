//! Tables stored in long form: one row per geography and combination of categorical field
//! values, with a `total` measure. Their columns are built by walking the sorted combinations as
//! a tree (see [`crate::columns`]).

use std::cmp::Ordering;

use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use nonempty::NonEmpty;
use polars::prelude::{col, DataType, UniqueKeepStrategy};
use serde::{Deserialize, Serialize};

use crate::{
    binding::{PhysicalBinding, Session, StorageSchema, ValueType},
    columns::{
        column_id, compare_field_values, compare_rows, group_by_field, ColumnIndex, FieldValues,
        DRILL_DOWN_MARKER, TOTAL_COLUMN_NAME,
    },
    error::{ProfileError, ProfileResult},
    geo::Geography,
    query::{
        f64_column, geo_filter, geos_filter, string_column, string_exprs, value_in, value_not_in,
    },
    table::{GeoValues, RawData, StatTable, TableDescriptor},
    utils::capitalize,
    COL,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTable {
    #[serde(flatten)]
    pub descriptor: TableDescriptor,
    pub fields: Vec<String>,
    /// Value of the last field whose rows hold the denominator rather than a category.
    #[serde(default)]
    pub denominator_key: Option<String>,
    #[serde(default = "default_has_total")]
    pub has_total: bool,
    #[serde(default)]
    pub value_type: ValueType,
}

fn default_has_total() -> bool {
    true
}

/// The summed `total` of one combination of field values in one geography.
#[derive(Debug)]
struct GroupedRow {
    geo_key: String,
    values: Vec<String>,
    /// `None` when every summed value was null.
    total: Option<f64>,
}

impl FieldValues for GroupedRow {
    fn field_value(&self, level: usize) -> &str {
        &self.values[level]
    }
}

/// A ranking row: one combination of field values and its summed total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRow {
    pub fields: IndexMap<String, String>,
    pub total: Option<f64>,
}

/// Options for [`FieldTable::get_rows_for_geo`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowQuery {
    /// Fields to group by. Defaults to every field column of the physical table.
    pub fields: Option<Vec<String>>,
    /// `total` or a field name, prefixed with `-` for descending order.
    pub order_by: Option<String>,
    /// Field -> values to keep.
    pub only: IndexMap<String, Vec<String>>,
    /// Field -> values to drop.
    pub exclude: IndexMap<String, Vec<String>>,
}

impl FieldTable {
    fn is_denominator(&self, value: &str) -> bool {
        self.denominator_key.as_deref() == Some(value)
    }

    fn is_last_level(&self, level: usize) -> bool {
        level + 1 == self.fields.len()
    }

    /// Distinct combinations of field values, sorted field by field.
    fn distinct_combinations(
        &self,
        session: &Session,
        binding: &PhysicalBinding,
        geo: Option<&Geography>,
    ) -> ProfileResult<Vec<Vec<String>>> {
        let mut lf = session.scan(binding)?;
        if let Some(geo) = geo {
            lf = lf.filter(geo_filter(geo));
        }
        let df = lf
            .select(string_exprs(&self.fields))
            .unique(None, UniqueKeepStrategy::Any)
            .collect()?;
        let columns = self
            .fields
            .iter()
            .map(|field| string_column(&df, field))
            .collect::<ProfileResult<Vec<_>>>()?;
        let mut rows: Vec<Vec<String>> = (0..df.height())
            .map(|row| columns.iter().map(|column| column[row].clone()).collect())
            .collect();
        rows.sort_by(|a, b| compare_rows(a, b, self.fields.len()));
        // Nulls read back as empty strings and may collide with stored empty values
        rows.dedup();
        Ok(rows)
    }

    fn permute_columns(
        &self,
        rows: &[Vec<String>],
        level: usize,
        prefix: &mut Vec<String>,
        total_column: Option<&str>,
        index: &mut ColumnIndex,
    ) {
        let last = self.is_last_level(level);
        for (value, group) in group_by_field(rows, level) {
            if last && self.is_denominator(value) {
                continue;
            }
            prefix.push(value.to_string());
            let id = column_id(prefix);
            let mut name = capitalize(value);
            if !last {
                name.push_str(DRILL_DOWN_MARKER);
            }
            let indent = if total_column == Some(id.as_str()) {
                0
            } else {
                level + 1
            };
            index.insert(id, name, indent);
            if !last {
                self.permute_columns(group, level + 1, prefix, total_column, index);
            }
            prefix.pop();
        }
    }

    /// Record the values of one geography's rows, returning the value of the level above.
    fn permute_values(
        &self,
        rows: &[GroupedRow],
        level: usize,
        prefix: &mut Vec<String>,
        values: &mut GeoValues,
    ) -> Option<f64> {
        let last = self.is_last_level(level);
        let mut total: Option<f64> = None;
        let mut denominator: Option<f64> = Some(0.0);
        for (value, group) in group_by_field(rows, level) {
            prefix.push(value.to_string());
            let id = column_id(prefix);
            let node_value = if last {
                group
                    .iter()
                    .filter_map(|row| row.total)
                    .fold(None, |sum, v| Some(sum.unwrap_or(0.0) + v))
            } else {
                // Reserve the position of the parent ahead of its children
                values.estimate.insert(id.clone(), None);
                self.permute_values(group, level + 1, prefix, values)
            };
            prefix.pop();

            if last && self.is_denominator(value) {
                denominator = node_value;
                continue;
            }
            if let Some(v) = node_value {
                total = Some(total.unwrap_or(0.0) + v);
            }
            values.estimate.insert(id.clone(), node_value);
            values.error.insert(id, 0.0);
        }
        if last && self.denominator_key.is_some() {
            denominator
        } else {
            total
        }
    }

    fn invalid_field(&self, field: &str, binding: &PhysicalBinding) -> ProfileError {
        ProfileError::InvalidField {
            field: field.to_string(),
            table: self.descriptor.name.clone(),
            valid: binding.measure_columns().join(", "),
        }
    }

    /// Totals of `geo` grouped by field values, optionally filtered and ordered.
    ///
    /// Fails with `DataNotFound` when nothing matches.
    pub fn get_rows_for_geo(
        &self,
        session: &Session,
        binding: &PhysicalBinding,
        geo: &Geography,
        query: &RowQuery,
    ) -> ProfileResult<Vec<FieldRow>> {
        let fields = query.fields.clone().unwrap_or_else(|| {
            binding
                .measure_columns()
                .into_iter()
                .filter(|column| column != COL::TOTAL)
                .collect()
        });
        let filtered = query.only.keys().chain(query.exclude.keys());
        if let Some(field) = fields
            .iter()
            .chain(filtered)
            .find(|field| !binding.has_column(field) || *field == COL::TOTAL)
        {
            return Err(self.invalid_field(field, binding));
        }

        let mut filter = geo_filter(geo);
        for (field, values) in &query.only {
            filter = filter.and(value_in(field, values));
        }
        for (field, values) in &query.exclude {
            filter = filter.and(value_not_in(field, values));
        }
        let df = session
            .scan(binding)?
            .filter(filter)
            .group_by(string_exprs(&fields))
            .agg([
                col(COL::TOTAL)
                    .cast(DataType::Float64)
                    .sum()
                    .alias(COL::TOTAL),
                col(COL::TOTAL)
                    .count()
                    .cast(DataType::Float64)
                    .alias(COL::VALUE_COUNT),
            ])
            .collect()?;

        let columns = fields
            .iter()
            .map(|field| string_column(&df, field))
            .collect::<ProfileResult<Vec<_>>>()?;
        let totals = f64_column(&df, COL::TOTAL)?;
        let counts = f64_column(&df, COL::VALUE_COUNT)?;
        let mut rows: Vec<FieldRow> = (0..df.height())
            .map(|row| FieldRow {
                fields: fields
                    .iter()
                    .zip(columns.iter())
                    .map(|(field, column)| (field.clone(), column[row].clone()))
                    .collect(),
                total: match counts[row] {
                    Some(count) if count > 0.0 => totals[row],
                    _ => None,
                },
            })
            .collect();

        if rows.is_empty() {
            return Err(ProfileError::DataNotFound {
                table: binding.name.clone(),
                geo: geo.geo_key(),
                version: geo.version.clone(),
            });
        }

        let by_fields = |a: &FieldRow, b: &FieldRow| {
            a.fields
                .values()
                .zip(b.fields.values())
                .fold(Ordering::Equal, |ordering, (x, y)| {
                    ordering.then_with(|| compare_field_values(x, y))
                })
        };
        rows.sort_by(by_fields);
        if let Some(order_by) = &query.order_by {
            let (descending, key) = match order_by.strip_prefix('-') {
                Some(key) => (true, key),
                None => (false, order_by.as_str()),
            };
            if key == COL::TOTAL {
                rows.sort_by(|a, b| a.total.partial_cmp(&b.total).unwrap_or(Ordering::Equal));
            } else if fields.iter().any(|f| f == key) {
                rows.sort_by(|a, b| compare_field_values(&a.fields[key], &b.fields[key]));
            } else {
                return Err(self.invalid_field(key, binding));
            }
            if descending {
                rows.reverse();
            }
        }
        Ok(rows)
    }
}

impl StatTable for FieldTable {
    fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    fn descriptor_mut(&mut self) -> &mut TableDescriptor {
        &mut self.descriptor
    }

    fn total_column(&self) -> Option<String> {
        self.has_total
            .then(|| column_id(&[self.denominator_key.as_deref().unwrap_or(COL::TOTAL)]))
    }

    fn storage_schema(&self) -> Option<StorageSchema> {
        Some(StorageSchema {
            fields: self.fields.clone(),
            value_type: self.value_type,
        })
    }

    fn columns(
        &self,
        session: &Session,
        binding: &PhysicalBinding,
        geo: Option<&Geography>,
    ) -> ProfileResult<ColumnIndex> {
        let rows = self.distinct_combinations(session, binding, geo)?;
        let total_column = self.total_column();
        let mut index = ColumnIndex::new();
        if let Some(total) = &total_column {
            index.insert(total.clone(), TOTAL_COLUMN_NAME.to_string(), 0);
        }
        self.permute_columns(&rows, 0, &mut Vec::new(), total_column.as_deref(), &mut index);
        debug!("{} has {} columns", self.descriptor.name, index.len());
        Ok(index)
    }

    fn raw_data_for_geos(
        &self,
        session: &Session,
        binding: &PhysicalBinding,
        geos: &[Geography],
    ) -> ProfileResult<RawData> {
        let total_column = self.total_column();
        let mut data: RawData = geos
            .iter()
            .map(|geo| {
                let mut values = GeoValues::default();
                if let Some(total) = &total_column {
                    values.estimate.insert(total.clone(), None);
                }
                (geo.geo_key(), values)
            })
            .collect();
        let Some(geo_set) = NonEmpty::from_slice(geos) else {
            return Ok(data);
        };

        let mut keys = vec![
            col(COL::GEO_LEVEL).cast(DataType::String),
            col(COL::GEO_CODE).cast(DataType::String),
        ];
        keys.extend(string_exprs(&self.fields));
        let df = session
            .scan(binding)?
            .filter(geos_filter(&geo_set))
            .group_by(keys)
            .agg([
                col(COL::TOTAL)
                    .cast(DataType::Float64)
                    .sum()
                    .alias(COL::TOTAL),
                col(COL::TOTAL)
                    .count()
                    .cast(DataType::Float64)
                    .alias(COL::VALUE_COUNT),
            ])
            .collect()?;

        let levels = string_column(&df, COL::GEO_LEVEL)?;
        let codes = string_column(&df, COL::GEO_CODE)?;
        let columns = self
            .fields
            .iter()
            .map(|field| string_column(&df, field))
            .collect::<ProfileResult<Vec<_>>>()?;
        let totals = f64_column(&df, COL::TOTAL)?;
        let counts = f64_column(&df, COL::VALUE_COUNT)?;
        let rows: Vec<GroupedRow> = (0..df.height())
            .map(|row| GroupedRow {
                geo_key: format!("{}-{}", levels[row], codes[row]),
                values: columns.iter().map(|column| column[row].clone()).collect(),
                total: match counts[row] {
                    Some(count) if count > 0.0 => totals[row],
                    _ => None,
                },
            })
            .sorted_by(|a, b| {
                a.geo_key
                    .cmp(&b.geo_key)
                    .then_with(|| compare_rows(a, b, self.fields.len()))
            })
            .collect();

        // Rows are sorted by geography first, so each geography is one contiguous run
        let mut start = 0;
        while start < rows.len() {
            let geo_key = &rows[start].geo_key;
            let end = rows[start..]
                .iter()
                .position(|row| &row.geo_key != geo_key)
                .map_or(rows.len(), |offset| start + offset);
            if let Some(values) = data.get_mut(geo_key) {
                let total = self.permute_values(&rows[start..end], 0, &mut Vec::new(), values);
                if let Some(total_column) = &total_column {
                    values.estimate.insert(total_column.clone(), total);
                    values.error.insert(total_column.clone(), 0.0);
                }
            }
            start = end;
        }
        Ok(data)
    }

    fn default_fields(&self, columns: &ColumnIndex) -> Vec<String> {
        columns.ids_at_indent(1)
    }

    fn clean(&mut self) {
        let descriptor = &mut self.descriptor;
        if descriptor.name.is_empty() {
            descriptor.name = self.fields.join("_");
        }
        descriptor.name = descriptor.name.to_uppercase();
        if descriptor.description.is_none() {
            let fields = self.fields.iter().map(|f| f.replace('_', " ")).join(", ");
            descriptor.description = Some(format!("{} by {fields}", descriptor.universe));
        }
    }
}
