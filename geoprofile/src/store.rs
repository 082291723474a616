//! Storage backends for physical statistics tables.
//!
//! Each physical table is a polars frame keyed by `(geo_level, geo_code, geo_version)`. The
//! parquet store keeps one file per table under a base directory and scans it lazily, so filters
//! and aggregations are pushed down into the parquet reader.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use dashmap::DashMap;
use log::{debug, info};
use polars::prelude::{
    DataFrame, IntoLazy, LazyFrame, ParquetCompression, ParquetWriter, ScanArgsParquet,
};

use crate::error::{ProfileError, ProfileResult};

/// A source of physical tables, addressed by table name.
pub trait TableStore: Send + Sync {
    fn exists(&self, name: &str) -> bool;
    /// A lazy scan over the named table.
    fn scan(&self, name: &str) -> ProfileResult<LazyFrame>;
    /// Create the named table with the contents of `df`.
    fn create(&self, name: &str, df: DataFrame) -> ProfileResult<()>;
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}

/// Parquet files in a directory, one per table: `{base_path}/{name}.parquet`.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    base_path: PathBuf,
}

impl ParquetStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{}.parquet", normalize(name)))
    }
}

impl TableStore for ParquetStore {
    fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    fn scan(&self, name: &str) -> ProfileResult<LazyFrame> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(ProfileError::MissingTable(name.to_string()));
        }
        debug!("Scanning {}", path.display());
        Ok(LazyFrame::scan_parquet(path, ScanArgsParquet::default())?)
    }

    fn create(&self, name: &str, mut df: DataFrame) -> ProfileResult<()> {
        std::fs::create_dir_all(&self.base_path)?;
        let path = self.path_for(name);
        info!("Creating table '{name}' at {}", path.display());
        let file = File::create(path)?;
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Zstd(None))
            .finish(&mut df)?;
        Ok(())
    }
}

/// In-memory tables, used for tests and for embedding small datasets.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<String, DataFrame>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a table.
    pub fn insert(&self, name: &str, df: DataFrame) {
        self.tables.insert(normalize(name), df);
    }

    pub fn with_table(self, name: &str, df: DataFrame) -> Self {
        self.insert(name, df);
        self
    }
}

impl TableStore for MemoryStore {
    fn exists(&self, name: &str) -> bool {
        self.tables.contains_key(&normalize(name))
    }

    fn scan(&self, name: &str) -> ProfileResult<LazyFrame> {
        self.tables
            .get(&normalize(name))
            .map(|df| df.value().clone().lazy())
            .ok_or_else(|| ProfileError::MissingTable(name.to_string()))
    }

    fn create(&self, name: &str, df: DataFrame) -> ProfileResult<()> {
        info!("Creating in-memory table '{name}'");
        self.tables.entry(normalize(name)).or_insert(df);
        Ok(())
    }
}
