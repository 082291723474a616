//! Geographies and the geography service used to resolve them.

use std::{fmt::Display, str::FromStr, sync::Arc};

use log::debug;
use polars::prelude::{col, lit, DataType};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ProfileError, ProfileResult},
    query::{optional_string_column, string_column},
    store::TableStore,
    COL,
};

/// A resolved spatial or administrative unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geography {
    pub level: String,
    pub code: String,
    /// Boundary vintage; empty when the data is unversioned.
    pub version: String,
    pub name: String,
    pub parent_level: Option<String>,
    pub parent_code: Option<String>,
}

impl Geography {
    pub fn new(level: &str, code: &str, version: &str) -> Self {
        Self {
            level: level.to_string(),
            code: code.to_string(),
            version: version.to_string(),
            name: format!("{level}-{code}"),
            parent_level: None,
            parent_code: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_parent(mut self, level: &str, code: &str) -> Self {
        self.parent_level = Some(level.to_string());
        self.parent_code = Some(code.to_string());
        self
    }

    /// `"{level}-{code}"`, the key raw table data is reported under.
    pub fn geo_key(&self) -> String {
        format!("{}-{}", self.level, self.code)
    }
}

/// An unresolved `level-code` reference, as written on the command line or in API paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeoRef {
    pub level: String,
    pub code: String,
}

impl FromStr for GeoRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((level, code)) if !level.is_empty() && !code.is_empty() => Ok(GeoRef {
                level: level.to_string(),
                code: code.to_string(),
            }),
            _ => Err(format!("Invalid geography '{s}', expected LEVEL-CODE")),
        }
    }
}

impl Display for GeoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.level, self.code)
    }
}

/// Resolves geographies, their parents and the levels they are compared against.
pub trait GeoService: Send + Sync {
    /// Resolve a geography. Without a version the most recent one is used.
    fn resolve(&self, level: &str, code: &str, version: Option<&str>) -> ProfileResult<Geography>;

    fn parent(&self, geo: &Geography) -> ProfileResult<Option<Geography>>;

    /// Ancestor levels to compare `geo` against, in display order.
    fn comparative_levels(&self, geo: &Geography) -> Vec<String>;

    /// Walk up the parents of `geo` until one at `level` is found.
    fn ancestor_at(&self, geo: &Geography, level: &str) -> ProfileResult<Option<Geography>> {
        let mut current = self.parent(geo)?;
        while let Some(candidate) = current {
            if candidate.level == level {
                return Ok(Some(candidate));
            }
            current = self.parent(&candidate)?;
        }
        Ok(None)
    }
}

/// Geography service backed by a geographies table in a `TableStore`.
pub struct StoreGeoService {
    store: Arc<dyn TableStore>,
    table: String,
    comparative_levels: Vec<String>,
}

impl StoreGeoService {
    pub fn new(store: Arc<dyn TableStore>, table: &str, comparative_levels: Vec<String>) -> Self {
        Self {
            store,
            table: table.to_string(),
            comparative_levels,
        }
    }
}

impl GeoService for StoreGeoService {
    fn resolve(&self, level: &str, code: &str, version: Option<&str>) -> ProfileResult<Geography> {
        let mut filter = col(COL::GEO_LEVEL)
            .eq(lit(level))
            .and(col(COL::GEO_CODE).cast(DataType::String).eq(lit(code)));
        if let Some(version) = version {
            filter = filter.and(col(COL::GEO_VERSION).eq(lit(version)));
        }
        let df = self
            .store
            .scan(&self.table)?
            .filter(filter)
            .select([
                col(COL::GEO_VERSION).cast(DataType::String),
                col(COL::GEO_NAME).cast(DataType::String),
                col(COL::GEO_PARENT_LEVEL).cast(DataType::String),
                col(COL::GEO_PARENT_CODE).cast(DataType::String),
            ])
            .collect()?;

        let versions = string_column(&df, COL::GEO_VERSION)?;
        let names = string_column(&df, COL::GEO_NAME)?;
        let parent_levels = optional_string_column(&df, COL::GEO_PARENT_LEVEL)?;
        let parent_codes = optional_string_column(&df, COL::GEO_PARENT_CODE)?;

        // Most recent version wins when none was requested
        let row = (0..df.height()).max_by(|a, b| versions[*a].cmp(&versions[*b]));
        let Some(row) = row else {
            return Err(ProfileError::GeographyNotFound {
                geo: format!("{level}-{code}"),
                version: version.unwrap_or_default().to_string(),
            });
        };
        let geo = Geography {
            level: level.to_string(),
            code: code.to_string(),
            version: versions[row].clone(),
            name: names[row].clone(),
            parent_level: parent_levels[row].clone().filter(|s| !s.is_empty()),
            parent_code: parent_codes[row].clone().filter(|s| !s.is_empty()),
        };
        debug!("Resolved geography: {geo:?}");
        Ok(geo)
    }

    fn parent(&self, geo: &Geography) -> ProfileResult<Option<Geography>> {
        match (&geo.parent_level, &geo.parent_code) {
            (Some(level), Some(code)) => self.resolve(level, code, Some(&geo.version)).map(Some),
            _ => Ok(None),
        }
    }

    fn comparative_levels(&self, geo: &Geography) -> Vec<String> {
        self.comparative_levels
            .iter()
            .filter(|level| **level != geo.level)
            .cloned()
            .collect()
    }
}
