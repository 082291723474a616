//! Resolution of data tables to physical storage, and the session queries run through.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dashmap::DashMap;
use log::{debug, info};
use polars::prelude::{DataFrame, DataType, LazyFrame, Series};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ProfileError, ProfileResult},
    store::TableStore,
    COL,
};

/// Storage type of the `total` measure of a field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValueType {
    #[default]
    Integer,
    Float,
}

impl From<ValueType> for DataType {
    fn from(value: ValueType) -> Self {
        match value {
            ValueType::Integer => DataType::Int64,
            ValueType::Float => DataType::Float64,
        }
    }
}

/// Layout of a physical table that may be created on first use:
/// `geo_level, geo_code, geo_version, field, [field, ...], total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSchema {
    pub fields: Vec<String>,
    pub value_type: ValueType,
}

impl StorageSchema {
    pub fn empty_frame(&self) -> ProfileResult<DataFrame> {
        let mut columns: Vec<Series> = COL::GEO_KEY_COLUMNS
            .iter()
            .map(|name| Series::new_empty(name, &DataType::String))
            .collect();
        columns.extend(
            self.fields
                .iter()
                .map(|name| Series::new_empty(name, &DataType::String)),
        );
        columns.push(Series::new_empty(
            COL::TOTAL,
            &DataType::from(self.value_type),
        ));
        Ok(DataFrame::new(columns)?)
    }
}

/// A physical table and the columns it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalBinding {
    pub name: String,
    pub columns: Vec<String>,
}

impl PhysicalBinding {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Every column except the geography key columns, in storage order.
    pub fn measure_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !COL::is_geo_column(c))
            .cloned()
            .collect()
    }
}

/// Process-wide cache of physical bindings, keyed by physical table name.
///
/// Bindings are resolved once per name and then shared. Concurrent first lookups of the same name
/// may each resolve it; the first one published wins and the others are dropped.
pub struct BindingService {
    store: Arc<dyn TableStore>,
    bindings: DashMap<String, Arc<PhysicalBinding>>,
    session_ids: AtomicU64,
}

impl BindingService {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            bindings: DashMap::new(),
            session_ids: AtomicU64::new(0),
        }
    }

    /// Get the binding for `name`, creating the storage from `schema` if it does not exist yet.
    pub fn get_binding(
        &self,
        name: &str,
        schema: Option<&StorageSchema>,
    ) -> ProfileResult<Arc<PhysicalBinding>> {
        let key = name.to_lowercase();
        if let Some(binding) = self.bindings.get(&key) {
            return Ok(Arc::clone(binding.value()));
        }
        let resolved = Arc::new(self.resolve(&key, schema)?);
        Ok(Arc::clone(self.bindings.entry(key).or_insert(resolved).value()))
    }

    fn resolve(&self, name: &str, schema: Option<&StorageSchema>) -> ProfileResult<PhysicalBinding> {
        if !self.store.exists(name) {
            match schema {
                Some(schema) => {
                    info!("Physical table '{name}' does not exist, creating it");
                    self.store.create(name, schema.empty_frame()?)?;
                }
                None => return Err(ProfileError::MissingTable(name.to_string())),
            }
        }
        let mut lf = self.store.scan(name)?;
        let schema = lf.schema()?;
        let columns = schema.iter_names().map(|s| s.to_string()).collect();
        let binding = PhysicalBinding {
            name: name.to_string(),
            columns,
        };
        debug!("Resolved binding: {binding:?}");
        Ok(binding)
    }

    pub fn cached_bindings(&self) -> usize {
        self.bindings.len()
    }

    /// Open a session. All queries of one profile build go through a single session, which is
    /// closed when dropped.
    pub fn session(&self) -> Session<'_> {
        let id = self.session_ids.fetch_add(1, Ordering::Relaxed);
        debug!("Opening session {id}");
        Session { id, service: self }
    }
}

/// A scoped handle for running queries against physical tables.
pub struct Session<'a> {
    id: u64,
    service: &'a BindingService,
}

impl Session<'_> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn binding(
        &self,
        name: &str,
        schema: Option<&StorageSchema>,
    ) -> ProfileResult<Arc<PhysicalBinding>> {
        self.service.get_binding(name, schema)
    }

    /// Lazy scan over the table behind `binding`.
    pub fn scan(&self, binding: &PhysicalBinding) -> ProfileResult<LazyFrame> {
        self.service.store.scan(&binding.name)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        debug!("Closing session {}", self.id);
    }
}
