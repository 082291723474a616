//! Profile sections and the registry that decides which sections a profile has, and in which
//! order.

use enum_dispatch::enum_dispatch;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;

use crate::{
    binding::Session,
    catalogue::Catalogue,
    config::SectionConfig,
    error::{ProfileError, ProfileResult},
    geo::{GeoService, Geography},
    stat_data::{StatEntry, StatMetadata, StatRequest},
};

/// Everything a section needs to build itself. One context is shared by every section of a
/// profile build.
pub struct SectionContext<'a> {
    pub session: &'a Session<'a>,
    pub catalogue: &'a Catalogue,
    pub geo_service: &'a dyn GeoService,
    pub year: Option<&'a str>,
}

/// Keys of a serialised section that statistics cannot use.
pub const RESERVED_STAT_KEYS: [&str; 3] = ["has_data", "parent", "metadata"];

/// The data of one profile section. Statistics are serialised next to the section attributes, so
/// their keys must not be one of [`RESERVED_STAT_KEYS`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectionData {
    pub has_data: bool,
    /// Display name of the geography's parent, when known.
    pub parent: Option<String>,
    #[serde(flatten)]
    pub stats: IndexMap<String, StatEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<StatMetadata>,
}

#[enum_dispatch]
pub trait ProfileSection {
    fn name(&self) -> &str;

    fn build(&self, geo: &Geography, ctx: &SectionContext) -> ProfileResult<SectionData>;
}

#[enum_dispatch(ProfileSection)]
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Headline(HeadlineSection),
    Table(TableSection),
}

impl From<&SectionConfig> for Section {
    fn from(config: &SectionConfig) -> Self {
        match config {
            SectionConfig::Headline { name, table, stats } => HeadlineSection {
                name: name.clone(),
                table: table.clone(),
                stats: stats.clone(),
            }
            .into(),
            SectionConfig::Table {
                name,
                table,
                fields,
                key_order,
                recode,
                total,
                percent,
            } => TableSection {
                name: name.clone(),
                table: table.clone(),
                request: StatRequest {
                    fields: fields.clone(),
                    key_order: key_order.clone(),
                    recode: recode.clone(),
                    total: total.clone(),
                    percent: *percent,
                },
            }
            .into(),
        }
    }
}

/// Headline figures, each fetched on its own so that one missing figure does not hide the others.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlineSection {
    pub name: String,
    pub table: String,
    /// Column -> display label.
    pub stats: IndexMap<String, String>,
}

impl ProfileSection for HeadlineSection {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self, geo: &Geography, ctx: &SectionContext) -> ProfileResult<SectionData> {
        let table = ctx.catalogue.get_datatable(&self.table)?;
        let mut stats = IndexMap::new();
        for (column, label) in &self.stats {
            let fetched = table.fetch_numerator(ctx.session, ctx.catalogue, geo, column, ctx.year);
            let value = match fetched {
                Ok(Some(value)) => value,
                Ok(None) => {
                    debug!("No {column} in {} for {}", table.name(), geo.geo_key());
                    0.0
                }
                Err(err) => {
                    warn!("Could not fetch {column} for {}: {err}", geo.geo_key());
                    0.0
                }
            };
            stats.insert(column.clone(), StatEntry::with_value(label, value));
        }

        let parent = match ctx.geo_service.parent(geo) {
            Ok(parent) => parent.map(|parent| parent.name),
            Err(err) => {
                warn!("Could not look up the parent of {}: {err}", geo.geo_key());
                None
            }
        };
        Ok(SectionData {
            has_data: true,
            parent,
            stats,
            metadata: None,
        })
    }
}

/// A recoded, percentage-annotated breakdown of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSection {
    pub name: String,
    pub table: String,
    pub request: StatRequest,
}

impl ProfileSection for TableSection {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self, geo: &Geography, ctx: &SectionContext) -> ProfileResult<SectionData> {
        let table = ctx.catalogue.get_datatable(&self.table)?;
        let (data, _) =
            table.get_stat_data(ctx.session, ctx.catalogue, geo, &self.request, ctx.year)?;
        let has_data = data
            .entries
            .values()
            .any(|entry| entry.numerator().or(entry.value()).is_some_and(|v| v != 0.0));
        Ok(SectionData {
            has_data,
            parent: None,
            stats: data.entries,
            metadata: data.metadata,
        })
    }
}

/// The sections of a profile, in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionRegistry {
    sections: Vec<Section>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sections in configuration order. Fails when a headline statistic, or a recoded table
    /// key, would be serialised under a reserved key.
    pub fn from_config(configs: &[SectionConfig]) -> ProfileResult<Self> {
        for config in configs {
            let keys: Vec<&String> = match config {
                SectionConfig::Headline { stats, .. } => stats.keys().collect(),
                SectionConfig::Table { recode, .. } => recode.values().collect(),
            };
            if let Some(key) = keys
                .into_iter()
                .find(|key| RESERVED_STAT_KEYS.contains(&key.as_str()))
            {
                return Err(ProfileError::ReservedStatKey {
                    section: config.name().to_string(),
                    key: key.clone(),
                });
            }
        }
        Ok(Self {
            sections: configs.iter().map(Section::from).collect(),
        })
    }

    /// Append a section. A section with the same name as an existing one replaces it in place.
    pub fn register(&mut self, section: impl Into<Section>) -> &mut Self {
        let section = section.into();
        match self.sections.iter().position(|s| s.name() == section.name()) {
            Some(i) => self.sections[i] = section,
            None => self.sections.push(section),
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{config::Denominator, stat_data::THIS, test_fixtures};

    fn build(section: &Section, geo: &Geography) -> ProfileResult<SectionData> {
        let geo_profile = test_fixtures::geo_profile();
        let session = geo_profile.bindings().session();
        let ctx = SectionContext {
            session: &session,
            catalogue: &geo_profile.catalogue,
            geo_service: geo_profile.geo_service(),
            year: Some("2016"),
        };
        section.build(geo, &ctx)
    }

    fn demographics() -> Section {
        Section::from(&SectionConfig::default_demographics())
    }

    #[test]
    fn headline_figures_and_parent() -> anyhow::Result<()> {
        let geo = test_fixtures::ward1().with_parent("province", "WC");
        let data = build(&demographics(), &geo)?;
        assert!(data.has_data);
        assert_eq!(data.parent.as_deref(), Some("Western Cape"));
        let summary: Vec<_> = data
            .stats
            .iter()
            .map(|(key, entry)| (key.as_str(), entry.name.as_str(), entry.value()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("total_users", "People", Some(1000.0)),
                ("total_isps", "ISPs", Some(4.0)),
                ("total_v6", "IPv6", Some(250.0)),
            ]
        );
        Ok(())
    }

    #[test]
    fn missing_headline_figures_degrade_to_zero() -> anyhow::Result<()> {
        // No row for the country, a null for ward 2, an unknown column and a broken parent
        let mut config = SectionConfig::default_demographics();
        if let SectionConfig::Headline { stats, .. } = &mut config {
            stats.insert("total_bogus".into(), "Bogus".into());
        }
        let section = Section::from(&config);

        let country = Geography::new("country", "ZA", "2016").with_name("South Africa");
        let data = build(&section, &country)?;
        assert!(data.has_data);
        assert_eq!(data.parent, None);
        assert!(data.stats.values().all(|e| e.value() == Some(0.0)));

        let ward2 = Geography::new("ward", "2", "2016").with_parent("province", "XX");
        let data = build(&section, &ward2)?;
        assert_eq!(data.stats["total_users"].value(), Some(10.0));
        assert_eq!(data.stats["total_v6"].value(), Some(0.0));
        assert_eq!(data.stats["total_bogus"].value(), Some(0.0));
        assert_eq!(data.parent, None);
        Ok(())
    }

    #[test]
    fn table_sections_carry_metadata() -> anyhow::Result<()> {
        let section: Section = TableSection {
            name: "access".into(),
            table: "internet_access".into(),
            request: StatRequest::default()
                .recode("yes", "Connected")
                .recode("no", "Offline")
                .total(Denominator::Field("total_pop".into())),
        }
        .into();
        let data = build(&section, &test_fixtures::ward1())?;
        assert!(data.has_data);
        assert_eq!(data.stats["Offline"].values[THIS], 50.0);
        assert_eq!(data.stats["Connected"].values[THIS], 30.0);
        assert_eq!(
            data.metadata.map(|m| m.table_id),
            Some("INTERNET_ACCESS".to_string())
        );

        let empty = build(&section, &Geography::new("ward", "2", "2016"))?;
        assert!(!empty.has_data);
        Ok(())
    }

    #[test]
    fn table_section_errors_propagate() {
        let section: Section = TableSection {
            name: "age".into(),
            table: "age_group_gender".into(),
            request: StatRequest::default().fields(&["5-9", "90-94"]),
        }
        .into();
        let err = build(&section, &test_fixtures::ward1()).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn registry_keeps_order_and_replaces_by_name() -> anyhow::Result<()> {
        let mut registry = SectionRegistry::from_config(&[SectionConfig::default_demographics()])?;
        registry.register(TableSection {
            name: "access".into(),
            table: "internet_access".into(),
            request: StatRequest::default(),
        });
        registry.register(HeadlineSection {
            name: "demographics".into(),
            table: "st_v6pop".into(),
            stats: IndexMap::new(),
        });
        assert_eq!(registry.names(), vec!["demographics", "access"]);
        assert_eq!(registry.len(), 2);
        assert!(matches!(
            registry.iter().next(),
            Some(Section::Headline(HeadlineSection { stats, .. })) if stats.is_empty()
        ));
        Ok(())
    }

    #[test]
    fn stats_cannot_shadow_section_attributes() {
        let headline = SectionConfig::Headline {
            name: "demographics".into(),
            table: "st_v6pop".into(),
            stats: IndexMap::from([
                ("total_users".to_string(), "People".to_string()),
                ("parent".to_string(), "Parent".to_string()),
            ]),
        };
        let err = SectionRegistry::from_config(&[headline]).unwrap_err();
        assert!(matches!(
            &err,
            ProfileError::ReservedStatKey { section, key }
                if section == "demographics" && key == "parent"
        ));
        assert!(err.is_configuration_error());

        let table = SectionConfig::Table {
            name: "access".into(),
            table: "internet_access".into(),
            fields: None,
            key_order: None,
            recode: IndexMap::from([("yes".to_string(), "has_data".to_string())]),
            total: Denominator::Sum,
            percent: true,
        };
        assert!(matches!(
            SectionRegistry::from_config(&[table]),
            Err(ProfileError::ReservedStatKey { .. })
        ));
    }
}
