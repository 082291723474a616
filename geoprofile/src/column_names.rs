//! This module stores the physical column names shared by every statistics table and by the
//! geographies table. Note that data loading tooling must write tables with these names: the
//! compound key `(geo_level, geo_code, geo_version)` is a storage contract.

pub const GEO_LEVEL: &str = "geo_level";
pub const GEO_CODE: &str = "geo_code";
pub const GEO_VERSION: &str = "geo_version";

/// The compound geography key, in primary key order.
pub const GEO_KEY_COLUMNS: [&str; 3] = [GEO_LEVEL, GEO_CODE, GEO_VERSION];

/// Measure column of field tables.
pub const TOTAL: &str = "total";
/// Count of non-null measures per group, used to tell "no data" apart from zero.
pub const VALUE_COUNT: &str = "__value_count";

pub const GEO_NAME: &str = "name";
pub const GEO_PARENT_LEVEL: &str = "parent_level";
pub const GEO_PARENT_CODE: &str = "parent_code";

/// Default name of the table holding geographies.
pub const GEOGRAPHIES_TABLE: &str = "geographies";

pub fn is_geo_column(name: &str) -> bool {
    GEO_KEY_COLUMNS.contains(&name)
}
