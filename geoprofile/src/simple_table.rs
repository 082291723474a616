//! Tables whose columns map one to one onto physical measure columns.

use indexmap::IndexMap;
use log::debug;
use nonempty::NonEmpty;
use polars::prelude::{col, DataType, Expr};
use serde::{Deserialize, Serialize};

use crate::{
    binding::{PhysicalBinding, Session, StorageSchema},
    columns::ColumnIndex,
    error::ProfileResult,
    geo::Geography,
    query::{f64_column, geo_filter, geos_filter, string_column},
    table::{GeoValues, RawData, RawValues, StatTable, TableDescriptor},
    utils::humanize,
    COL,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleTable {
    #[serde(flatten)]
    pub descriptor: TableDescriptor,
    #[serde(default)]
    pub total_column: Option<String>,
}

fn zero_row(columns: &[String]) -> RawValues {
    columns.iter().map(|c| (c.clone(), Some(0.0))).collect()
}

impl SimpleTable {
    /// Geo keys and measure values (as f64) of the rows matching `filter`.
    fn measure_query(
        &self,
        session: &Session,
        binding: &PhysicalBinding,
        filter: Expr,
    ) -> ProfileResult<(Vec<String>, Vec<RawValues>)> {
        let measures = binding.measure_columns();
        let mut select = vec![
            col(COL::GEO_LEVEL).cast(DataType::String),
            col(COL::GEO_CODE).cast(DataType::String),
        ];
        select.extend(measures.iter().map(|m| col(m).cast(DataType::Float64)));
        let df = session.scan(binding)?.filter(filter).select(select).collect()?;

        let levels = string_column(&df, COL::GEO_LEVEL)?;
        let codes = string_column(&df, COL::GEO_CODE)?;
        let values = measures
            .iter()
            .map(|m| f64_column(&df, m))
            .collect::<ProfileResult<Vec<_>>>()?;
        let keys: Vec<String> = levels
            .iter()
            .zip(codes.iter())
            .map(|(level, code)| format!("{level}-{code}"))
            .collect();
        let rows: Vec<RawValues> = (0..df.height())
            .map(|row| {
                measures
                    .iter()
                    .zip(values.iter())
                    .map(|(measure, column)| (measure.clone(), column[row]))
                    .collect()
            })
            .collect();
        Ok((keys, rows))
    }

    /// The row of `geo`, or `None` if the table has no row for it.
    pub fn fetch_row(
        &self,
        session: &Session,
        binding: &PhysicalBinding,
        geo: &Geography,
    ) -> ProfileResult<Option<RawValues>> {
        let (_, rows) = self.measure_query(session, binding, geo_filter(geo))?;
        Ok(rows.into_iter().next())
    }
}

impl StatTable for SimpleTable {
    fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    fn descriptor_mut(&mut self) -> &mut TableDescriptor {
        &mut self.descriptor
    }

    fn total_column(&self) -> Option<String> {
        self.total_column.clone()
    }

    fn storage_schema(&self) -> Option<StorageSchema> {
        None
    }

    fn columns(
        &self,
        _session: &Session,
        binding: &PhysicalBinding,
        _geo: Option<&Geography>,
    ) -> ProfileResult<ColumnIndex> {
        let mut index = ColumnIndex::new();
        for column in binding.measure_columns() {
            let indent = if self.total_column.as_deref() == Some(column.as_str()) {
                0
            } else {
                1
            };
            let name = humanize(&column);
            index.insert(column, name, indent);
        }
        Ok(index)
    }

    fn raw_data_for_geos(
        &self,
        session: &Session,
        binding: &PhysicalBinding,
        geos: &[Geography],
    ) -> ProfileResult<RawData> {
        let Some(geo_set) = NonEmpty::from_slice(geos) else {
            return Ok(RawData::new());
        };
        let (keys, rows) = self.measure_query(session, binding, geos_filter(&geo_set))?;
        let mut by_geo: IndexMap<String, RawValues> = IndexMap::new();
        for (key, row) in keys.into_iter().zip(rows) {
            by_geo.entry(key).or_insert(row);
        }

        let measures = binding.measure_columns();
        let data = geos
            .iter()
            .map(|geo| {
                let key = geo.geo_key();
                let estimate = by_geo.get(&key).cloned().unwrap_or_else(|| {
                    debug!("No row in {} for {key}, using zeros", binding.name);
                    zero_row(&measures)
                });
                let error = measures.iter().map(|m| (m.clone(), 0.0)).collect();
                (key, GeoValues { estimate, error })
            })
            .collect();
        Ok(data)
    }

    fn default_fields(&self, columns: &ColumnIndex) -> Vec<String> {
        columns
            .ids()
            .filter(|id| self.total_column.as_deref() != Some(id.as_str()))
            .cloned()
            .collect()
    }

    fn clean(&mut self) {
        self.descriptor.name = self.descriptor.name.to_uppercase();
    }
}
