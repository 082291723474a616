use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{column_names::GEOGRAPHIES_TABLE, enhance::DEFAULT_MAX_COMPARATIVES};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding one parquet file per physical table.
    pub base_path: String,
    /// Catalogue of datasets, releases and data tables, relative to `base_path`.
    pub catalogue_file: String,
    /// Physical table the geography service reads from.
    pub geographies_table: String,
    /// Release year used when neither the request nor the dataset context names one.
    pub default_year: Option<String>,
    /// Ancestor levels a geography is compared against, in display order.
    pub comparative_levels: Vec<String>,
    pub max_comparatives: usize,
    /// Profile sections, in the order they appear in a profile.
    pub sections: Vec<SectionConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_path: "data".into(),
            catalogue_file: "catalogue.json".into(),
            geographies_table: GEOGRAPHIES_TABLE.into(),
            default_year: None,
            comparative_levels: vec!["province".into(), "country".into()],
            max_comparatives: DEFAULT_MAX_COMPARATIVES,
            sections: vec![SectionConfig::default_demographics()],
        }
    }
}

/// Denominator used when expressing values as percentages.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(untagged)]
pub enum Denominator {
    /// Sum of all requested fields.
    #[default]
    Sum,
    /// An explicit number.
    Value(f64),
    /// The raw value of the named column.
    Field(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionConfig {
    /// Individually fetched headline numbers from a simple table.
    Headline {
        name: String,
        table: String,
        /// Column name -> display label.
        stats: IndexMap<String, String>,
    },
    /// A recoded, percentage-annotated breakdown of one table.
    Table {
        name: String,
        table: String,
        #[serde(default)]
        fields: Option<Vec<String>>,
        #[serde(default)]
        key_order: Option<Vec<String>>,
        #[serde(default)]
        recode: IndexMap<String, String>,
        #[serde(default)]
        total: Denominator,
        #[serde(default = "default_percent")]
        percent: bool,
    },
}

fn default_percent() -> bool {
    true
}

impl SectionConfig {
    pub fn default_demographics() -> Self {
        SectionConfig::Headline {
            name: "demographics".into(),
            table: "st_v6pop".into(),
            stats: IndexMap::from([
                ("total_users".to_string(), "People".to_string()),
                ("total_isps".to_string(), "ISPs".to_string()),
                ("total_v6".to_string(), "IPv6".to_string()),
            ]),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SectionConfig::Headline { name, .. } | SectionConfig::Table { name, .. } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"base_path": "/srv/profiles"}"#).unwrap();
        assert_eq!(config.base_path, "/srv/profiles");
        assert_eq!(config.max_comparatives, 2);
        assert_eq!(config.sections.len(), 1);
        assert_eq!(config.sections[0].name(), "demographics");
    }

    #[test]
    fn denominator_deserializes_untagged() {
        let total: Denominator = serde_json::from_str("null").unwrap();
        assert_eq!(total, Denominator::Sum);
        let total: Denominator = serde_json::from_str("250.0").unwrap();
        assert_eq!(total, Denominator::Value(250.0));
        let total: Denominator = serde_json::from_str(r#""total_users""#).unwrap();
        assert_eq!(total, Denominator::Field("total_users".into()));
    }

    #[test]
    fn table_section_defaults() {
        let section: SectionConfig = serde_json::from_str(
            r#"{"kind": "table", "name": "access", "table": "internet_access",
                "recode": {"yes": "Connected", "no": "Offline"}}"#,
        )
        .unwrap();
        match section {
            SectionConfig::Table {
                percent,
                total,
                recode,
                ..
            } => {
                assert!(percent);
                assert_eq!(total, Denominator::Sum);
                assert_eq!(recode.get("yes").map(String::as_str), Some("Connected"));
            }
            other => panic!("unexpected section {other:?}"),
        }
    }
}
