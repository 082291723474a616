use std::{path::Path, sync::Arc};

use log::{debug, warn};

use crate::{
    binding::BindingService,
    catalogue::Catalogue,
    columns::ColumnIndex,
    config::Config,
    context::current_context,
    enhance::enhance_profile,
    error::{ProfileError, ProfileResult},
    field_table::{FieldRow, RowQuery},
    geo::{GeoService, Geography, StoreGeoService},
    profile::Profile,
    sections::{SectionContext, SectionRegistry},
    stat_data::{StatData, StatRequest},
    store::{ParquetStore, TableStore},
    table::{DataTable, RawData, StatTable, TableMetadata},
};

// Re-exports
pub use column_names as COL;

// Modules
pub mod binding;
pub mod catalogue;
pub mod column_names;
pub mod columns;
pub mod config;
pub mod context;
pub mod enhance;
pub mod error;
pub mod field_table;
pub mod geo;
pub mod profile;
pub mod query;
pub mod sections;
pub mod simple_table;
pub mod stat_data;
pub mod store;
pub mod table;
#[cfg(test)]
mod test_fixtures;
pub mod utils;

/// Type for geoprofile data and API
pub struct GeoProfile {
    pub config: Config,
    pub catalogue: Catalogue,
    bindings: BindingService,
    geo_service: Box<dyn GeoService>,
    registry: SectionRegistry,
}

impl GeoProfile {
    /// Setup the GeoProfile object with default configuration
    pub fn new() -> ProfileResult<Self> {
        Self::new_with_config(Config::default())
    }

    /// Setup the GeoProfile object with custom configuration, reading parquet tables and the
    /// catalogue from `config.base_path`
    pub fn new_with_config(config: Config) -> ProfileResult<Self> {
        debug!("config: {config:?}");
        let catalogue =
            Catalogue::from_path(Path::new(&config.base_path).join(&config.catalogue_file))?;
        let store = Arc::new(ParquetStore::new(&config.base_path));
        Self::from_parts(config, catalogue, store)
    }

    /// Setup the GeoProfile object over any table store
    pub fn from_parts(
        config: Config,
        catalogue: Catalogue,
        store: Arc<dyn TableStore>,
    ) -> ProfileResult<Self> {
        let geo_service = Box::new(StoreGeoService::new(
            Arc::clone(&store),
            &config.geographies_table,
            config.comparative_levels.clone(),
        ));
        let registry = SectionRegistry::from_config(&config.sections)?;
        Ok(Self {
            config,
            catalogue,
            bindings: BindingService::new(store),
            geo_service,
            registry,
        })
    }

    pub fn with_geo_service(mut self, geo_service: Box<dyn GeoService>) -> Self {
        self.geo_service = geo_service;
        self
    }

    pub fn with_registry(mut self, registry: SectionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn bindings(&self) -> &BindingService {
        &self.bindings
    }

    pub fn geo_service(&self) -> &dyn GeoService {
        self.geo_service.as_ref()
    }

    pub fn registry(&self) -> &SectionRegistry {
        &self.registry
    }

    /// The release year to use: the one asked for, else the dataset context's, else the
    /// configured default.
    pub fn resolve_year(&self, year: Option<&str>) -> Option<String> {
        year.map(str::to_string)
            .or_else(|| current_context().year)
            .or_else(|| self.config.default_year.clone())
    }

    pub fn resolve_geography(
        &self,
        level: &str,
        code: &str,
        version: Option<&str>,
    ) -> ProfileResult<Geography> {
        self.geo_service.resolve(level, code, version)
    }

    pub fn table(&self, name: &str) -> ProfileResult<&DataTable> {
        self.catalogue.get_datatable(name)
    }

    pub fn table_metadata(&self, name: &str) -> ProfileResult<TableMetadata> {
        Ok(self.table(name)?.metadata(&self.catalogue))
    }

    /// Column index of a table, optionally restricted to what `geo` has data for
    pub fn columns(
        &self,
        table: &str,
        geo: Option<&Geography>,
        year: Option<&str>,
    ) -> ProfileResult<ColumnIndex> {
        let table = self.table(table)?;
        let session = self.bindings.session();
        let year = self.resolve_year(year);
        let bound = table.get_db_table(&session, &self.catalogue, year.as_deref())?;
        table.columns(&session, &bound.binding, geo)
    }

    /// Raw values of a table for several geographies
    pub fn raw_data(
        &self,
        table: &str,
        geos: &[Geography],
        year: Option<&str>,
    ) -> ProfileResult<RawData> {
        let table = self.table(table)?;
        let session = self.bindings.session();
        let year = self.resolve_year(year);
        let bound = table.get_db_table(&session, &self.catalogue, year.as_deref())?;
        table.raw_data_for_geos(&session, &bound.binding, geos)
    }

    /// Ranking rows of a field table for one geography
    pub fn rows_for_geo(
        &self,
        table: &str,
        geo: &Geography,
        query: &RowQuery,
        year: Option<&str>,
    ) -> ProfileResult<Vec<FieldRow>> {
        let data_table = self.table(table)?;
        let field_table = data_table
            .as_field_table()
            .ok_or_else(|| ProfileError::NotAFieldTable(data_table.name().to_string()))?;
        let session = self.bindings.session();
        let year = self.resolve_year(year);
        let bound = data_table.get_db_table(&session, &self.catalogue, year.as_deref())?;
        field_table.get_rows_for_geo(&session, &bound.binding, geo, query)
    }

    /// Percentage-annotated statistics of a table for one geography
    pub fn stat_data(
        &self,
        table: &str,
        geo: &Geography,
        request: &StatRequest,
        year: Option<&str>,
    ) -> ProfileResult<(StatData, f64)> {
        let table = self.table(table)?;
        let session = self.bindings.session();
        let year = self.resolve_year(year);
        table.get_stat_data(&session, &self.catalogue, geo, request, year.as_deref())
    }

    /// Build the profile of `geo`. All queries of the build share one session.
    pub fn get_profile(&self, geo: &Geography, year: Option<&str>) -> ProfileResult<Profile> {
        let session = self.bindings.session();
        let year = self.resolve_year(year);
        let ctx = SectionContext {
            session: &session,
            catalogue: &self.catalogue,
            geo_service: self.geo_service(),
            year: year.as_deref(),
        };
        Profile::build(&self.registry, geo, &ctx)
    }

    /// Build the profile of `geo` with the values of its comparative geographies alongside, and
    /// the ratios between them.
    pub fn get_comparative_profile(
        &self,
        geo: &Geography,
        year: Option<&str>,
    ) -> ProfileResult<Profile> {
        let mut profile = self.get_profile(geo, year)?;
        let levels = self.geo_service.comparative_levels(geo);
        for level in &levels {
            match self.geo_service.ancestor_at(geo, level) {
                Ok(Some(ancestor)) => {
                    let comparative = self.get_profile(&ancestor, year)?;
                    profile.merge_comparative(level, &comparative);
                }
                Ok(None) => debug!("{} has no {level} ancestor", geo.geo_key()),
                Err(err) => warn!("Could not find the {level} of {}: {err}", geo.geo_key()),
            }
        }
        enhance_profile(&mut profile, &levels, self.config.max_comparatives);
        Ok(profile)
    }
}
