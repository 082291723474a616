//! Data tables: the shared descriptor, release resolution, and the operations every table
//! variant implements.

use std::sync::Arc;

use enum_dispatch::enum_dispatch;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    binding::{PhysicalBinding, Session, StorageSchema},
    catalogue::{Catalogue, Release, ReleaseInfo},
    columns::ColumnIndex,
    context::current_context,
    error::{ProfileError, ProfileResult},
    field_table::FieldTable,
    geo::Geography,
    simple_table::SimpleTable,
    stat_data::{shape, StatData, StatRequest},
};

/// Release year that selects the most recent release of a table.
pub const LATEST: &str = "latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    #[default]
    Number,
    Percentage,
}

/// Physical table holding a table's data for one release year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRelease {
    pub year: String,
    pub db_table: String,
}

/// Attributes shared by every kind of data table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Upper-cased on load. Field tables without a name are named after their fields.
    #[serde(default)]
    pub name: String,
    pub universe: String,
    pub dataset: String,
    #[serde(default)]
    pub stat_type: StatType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub releases: Vec<TableRelease>,
}

/// Values keyed by column id. `None` where every underlying value was null.
pub type RawValues = IndexMap<String, Option<f64>>;

/// Estimates and errors of one geography.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoValues {
    pub estimate: RawValues,
    pub error: IndexMap<String, f64>,
}

/// Raw values keyed by geo key, in the order the geographies were requested.
pub type RawData = IndexMap<String, GeoValues>;

#[enum_dispatch]
pub trait StatTable {
    fn descriptor(&self) -> &TableDescriptor;

    fn descriptor_mut(&mut self) -> &mut TableDescriptor;

    /// Id of the column holding the table total, if it has one.
    fn total_column(&self) -> Option<String>;

    /// Layout to create the physical table with when it does not exist. `None` means the
    /// physical table must already exist.
    fn storage_schema(&self) -> Option<StorageSchema>;

    /// The column index, optionally restricted to the values present for `geo`.
    fn columns(
        &self,
        session: &Session,
        binding: &PhysicalBinding,
        geo: Option<&Geography>,
    ) -> ProfileResult<ColumnIndex>;

    /// Raw values per column for each of `geos`, fetched with a single query.
    fn raw_data_for_geos(
        &self,
        session: &Session,
        binding: &PhysicalBinding,
        geos: &[Geography],
    ) -> ProfileResult<RawData>;

    /// Columns a stat request covers when it does not list any.
    fn default_fields(&self, columns: &ColumnIndex) -> Vec<String>;

    /// Normalise the descriptor after loading.
    fn clean(&mut self);
}

#[enum_dispatch(StatTable)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataTable {
    Simple(SimpleTable),
    Field(FieldTable),
}

/// A data table resolved to the physical table of one release.
#[derive(Debug, Clone)]
pub struct BoundTable {
    pub binding: Arc<PhysicalBinding>,
    pub release: Release,
}

/// Description of a table for API consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableMetadata {
    pub title: String,
    pub universe: String,
    pub denominator_column_id: Option<String>,
    pub table_id: String,
    pub stat_type: StatType,
    pub releases: Vec<ReleaseInfo>,
}

impl DataTable {
    pub fn name(&self) -> &str {
        &self.descriptor().name
    }

    pub fn as_field_table(&self) -> Option<&FieldTable> {
        match self {
            DataTable::Field(table) => Some(table),
            DataTable::Simple(_) => None,
        }
    }

    /// The release of this table for `year`; `latest` picks the most recent one.
    pub fn get_release(
        &self,
        catalogue: &Catalogue,
        year: &str,
    ) -> ProfileResult<(Release, TableRelease)> {
        let descriptor = self.descriptor();
        let bound = if year == LATEST {
            descriptor.releases.iter().max_by(|a, b| a.year.cmp(&b.year))
        } else {
            descriptor.releases.iter().find(|r| r.year == year)
        };
        let not_found = || ProfileError::ReleaseNotFound {
            table: descriptor.name.clone(),
            year: year.to_string(),
        };
        let bound = bound.ok_or_else(not_found)?;
        let release = catalogue
            .release(&descriptor.dataset, &bound.year)
            .ok_or_else(not_found)?;
        Ok((release.clone(), bound.clone()))
    }

    /// Resolve the physical table for `year`, falling back to the current dataset context.
    pub fn get_db_table(
        &self,
        session: &Session,
        catalogue: &Catalogue,
        year: Option<&str>,
    ) -> ProfileResult<BoundTable> {
        let year = match year {
            Some(year) => year.to_string(),
            None => current_context()
                .year
                .ok_or_else(|| ProfileError::UnresolvedRelease(self.name().to_string()))?,
        };
        let (release, bound) = self.get_release(catalogue, &year)?;
        debug!(
            "Table {} release {release} is stored in {}",
            self.name(),
            bound.db_table
        );
        let binding = session.binding(&bound.db_table, self.storage_schema().as_ref())?;
        Ok(BoundTable { binding, release })
    }

    /// Percentage-annotated statistics of this table for `geo`, and the denominator used.
    pub fn get_stat_data(
        &self,
        session: &Session,
        catalogue: &Catalogue,
        geo: &Geography,
        request: &StatRequest,
        year: Option<&str>,
    ) -> ProfileResult<(StatData, f64)> {
        let bound = self.get_db_table(session, catalogue, year)?;
        let columns = self.columns(session, &bound.binding, None)?;
        let raw = self
            .raw_data_for_geos(session, &bound.binding, std::slice::from_ref(geo))?
            .shift_remove(&geo.geo_key())
            .map(|values| values.estimate)
            .unwrap_or_default();
        let default_fields = self.default_fields(&columns);
        let (entries, total) = shape(&raw, &columns, &default_fields, request, self.name())?;
        let mut data = StatData::new(entries);
        data.add_metadata(self.descriptor(), Some(&bound.release));
        Ok((data, total))
    }

    /// A single column's value for `geo`; `None` when the geography has no data for it.
    pub fn fetch_numerator(
        &self,
        session: &Session,
        catalogue: &Catalogue,
        geo: &Geography,
        column: &str,
        year: Option<&str>,
    ) -> ProfileResult<Option<f64>> {
        let bound = self.get_db_table(session, catalogue, year)?;
        let columns = self.columns(session, &bound.binding, None)?;
        if !columns.contains(column) {
            return Err(ProfileError::InvalidField {
                field: column.to_string(),
                table: self.name().to_string(),
                valid: columns.describe(),
            });
        }
        let value = match self {
            DataTable::Simple(table) => table
                .fetch_row(session, &bound.binding, geo)?
                .and_then(|row| row.get(column).copied().flatten()),
            DataTable::Field(table) => table
                .raw_data_for_geos(session, &bound.binding, std::slice::from_ref(geo))?
                .get(&geo.geo_key())
                .and_then(|values| values.estimate.get(column).copied().flatten()),
        };
        Ok(value)
    }

    pub fn metadata(&self, catalogue: &Catalogue) -> TableMetadata {
        let descriptor = self.descriptor();
        TableMetadata {
            title: descriptor
                .description
                .clone()
                .unwrap_or_else(|| descriptor.name.clone()),
            universe: descriptor.universe.clone(),
            denominator_column_id: self.total_column(),
            table_id: descriptor.name.clone(),
            stat_type: descriptor.stat_type,
            releases: catalogue
                .releases_for(self)
                .into_iter()
                .map(Release::as_info)
                .collect(),
        }
    }
}
