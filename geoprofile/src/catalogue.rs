//! Datasets, releases and the data tables defined over them.

use std::{collections::HashSet, fmt::Display, fs::File, io::BufReader, path::Path};

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ProfileError, ProfileResult},
    table::{DataTable, StatTable},
};

/// A named group of comparable releases, e.g. a census series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
}

/// One published vintage of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    pub year: String,
    pub dataset: String,
}

/// The parts of a release reported alongside statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub name: String,
    pub year: String,
}

impl Release {
    pub fn as_info(&self) -> ReleaseInfo {
        ReleaseInfo {
            name: self.name.clone(),
            year: self.year.clone(),
        }
    }
}

impl Display for Release {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.year)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalogue {
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub releases: Vec<Release>,
    #[serde(default)]
    pub tables: Vec<DataTable>,
}

fn matches_optional(value: &str, wanted: Option<&str>) -> bool {
    wanted.map_or(true, |wanted| value.eq_ignore_ascii_case(wanted))
}

impl Catalogue {
    pub fn from_path<P: AsRef<Path>>(path: P) -> ProfileResult<Self> {
        let path = path.as_ref();
        debug!("Loading catalogue from {}", path.display());
        let reader = BufReader::new(File::open(path)?);
        let mut catalogue: Catalogue = serde_json::from_reader(reader)?;
        catalogue.clean();
        info!(
            "Loaded {} tables over {} releases from {}",
            catalogue.tables.len(),
            catalogue.releases.len(),
            path.display()
        );
        Ok(catalogue)
    }

    pub fn from_json(json: &str) -> ProfileResult<Self> {
        let mut catalogue: Catalogue = serde_json::from_str(json)?;
        catalogue.clean();
        Ok(catalogue)
    }

    /// Normalise table names and fill in derived descriptions.
    pub fn clean(&mut self) {
        for table in &mut self.tables {
            table.clean();
        }
    }

    /// Look a table up by name, case-insensitively.
    pub fn get_datatable(&self, name: &str) -> ProfileResult<&DataTable> {
        self.tables
            .iter()
            .find(|table| table.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ProfileError::UnknownTable(name.to_string()))
    }

    /// Find a table by name, optionally also requiring its universe and dataset to match.
    pub fn find(
        &self,
        name: &str,
        universe: Option<&str>,
        dataset: Option<&str>,
    ) -> Option<&DataTable> {
        self.tables.iter().find(|table| {
            let descriptor = table.descriptor();
            descriptor.name.eq_ignore_ascii_case(name)
                && matches_optional(&descriptor.universe, universe)
                && matches_optional(&descriptor.dataset, dataset)
        })
    }

    /// The field table that covers all of `fields` with the fewest other fields.
    pub fn for_fields(
        &self,
        fields: &[String],
        universe: Option<&str>,
        dataset: Option<&str>,
    ) -> ProfileResult<&DataTable> {
        let wanted: HashSet<&str> = fields.iter().map(String::as_str).collect();
        let candidates: Vec<(usize, &DataTable)> = self
            .tables
            .iter()
            .filter_map(|table| {
                let field_table = table.as_field_table()?;
                let descriptor = table.descriptor();
                if !matches_optional(&descriptor.universe, universe)
                    || !matches_optional(&descriptor.dataset, dataset)
                {
                    return None;
                }
                let own: HashSet<&str> = field_table.fields.iter().map(String::as_str).collect();
                wanted
                    .is_subset(&own)
                    .then(|| (own.len() - wanted.len(), table))
            })
            .collect();

        let Some(fewest) = candidates.iter().map(|(extra, _)| *extra).min() else {
            return Err(ProfileError::NoMatchingTable(fields.to_vec()));
        };
        let best: Vec<&DataTable> = candidates
            .into_iter()
            .filter(|(extra, _)| *extra == fewest)
            .map(|(_, table)| table)
            .collect();
        match best.as_slice() {
            [table] => Ok(*table),
            _ => Err(ProfileError::AmbiguousTable {
                fields: fields.to_vec(),
                candidates: best.iter().map(|t| t.name().to_string()).collect(),
            }),
        }
    }

    pub fn release(&self, dataset: &str, year: &str) -> Option<&Release> {
        self.releases
            .iter()
            .find(|release| release.dataset.eq_ignore_ascii_case(dataset) && release.year == year)
    }

    /// Releases a table has data for, oldest first.
    pub fn releases_for(&self, table: &DataTable) -> Vec<&Release> {
        let descriptor = table.descriptor();
        descriptor
            .releases
            .iter()
            .filter_map(|bound| self.release(&descriptor.dataset, &bound.year))
            .unique_by(|release| release.year.clone())
            .sorted_by(|a, b| a.year.cmp(&b.year))
            .collect()
    }
}
