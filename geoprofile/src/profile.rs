//! Profiles: the sections of a geography, and their comparison with ancestor geographies.

use indexmap::IndexMap;
use log::{debug, info};
use serde::Serialize;

use crate::{
    error::ProfileResult,
    geo::Geography,
    sections::{ProfileSection, SectionContext, SectionData, SectionRegistry},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeographySummary {
    pub level: String,
    pub code: String,
    pub version: String,
    pub name: String,
    /// Comparative levels whose values appear next to this geography's.
    pub comparatives: Vec<String>,
}

impl From<&Geography> for GeographySummary {
    fn from(geo: &Geography) -> Self {
        Self {
            level: geo.level.clone(),
            code: geo.code.clone(),
            version: geo.version.clone(),
            name: geo.name.clone(),
            comparatives: Vec::new(),
        }
    }
}

/// A geography's profile: section name -> section data, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Profile {
    pub geography: GeographySummary,
    #[serde(flatten)]
    pub sections: IndexMap<String, SectionData>,
}

impl Profile {
    /// Build every registered section for `geo`.
    pub fn build(
        registry: &SectionRegistry,
        geo: &Geography,
        ctx: &SectionContext,
    ) -> ProfileResult<Self> {
        info!("Building profile for {} ({})", geo.geo_key(), geo.version);
        let mut sections = IndexMap::new();
        for section in registry.iter() {
            debug!("Building section {}", section.name());
            sections.insert(section.name().to_string(), section.build(geo, ctx)?);
        }
        Ok(Self {
            geography: geo.into(),
            sections,
        })
    }

    pub fn section(&self, name: &str) -> Option<&SectionData> {
        self.sections.get(name)
    }

    /// Copy the `this` figures of `other`, the profile of an ancestor at `level`, into the
    /// matching statistics of this profile.
    pub fn merge_comparative(&mut self, level: &str, other: &Profile) {
        for (name, section) in self.sections.iter_mut() {
            let Some(other_section) = other.sections.get(name) else {
                continue;
            };
            for (key, entry) in section.stats.iter_mut() {
                if let Some(other_entry) = other_section.stats.get(key) {
                    entry.merge_level(level, other_entry);
                }
            }
        }
    }
}
