//! Error types.

/// Errors raised while resolving tables and building profiles.
///
/// Configuration errors (bad field names, unknown tables, unresolvable releases) are fatal for
/// the request. `DataNotFound` is only raised by the ranking query and can be rendered as "no
/// data" by the caller.
#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("Invalid field/column '{field}' for table '{table}'. Valid columns are: {valid}")]
    InvalidField {
        field: String,
        table: String,
        valid: String,
    },
    #[error(
        "Unclear which release year to use for table '{0}'. Specify a release or a year, or use a \
         dataset context"
    )]
    UnresolvedRelease(String),
    #[error("No release for year '{year}' of table '{table}'")]
    ReleaseNotFound { table: String, year: String },
    #[error("Unknown data table '{0}'")]
    UnknownTable(String),
    #[error("No field table supports the fields {0:?}")]
    NoMatchingTable(Vec<String>),
    #[error("Several field tables are equally suitable for fields {fields:?}: {candidates:?}")]
    AmbiguousTable {
        fields: Vec<String>,
        candidates: Vec<String>,
    },
    #[error("Table '{0}' is not a field table")]
    NotAFieldTable(String),
    #[error("Statistic '{key}' of section '{section}' clashes with a section attribute")]
    ReservedStatKey { section: String, key: String },
    #[error("Physical table '{0}' does not exist")]
    MissingTable(String),
    #[error("Entry in {table} for geography {geo} version '{version}' not found")]
    DataNotFound {
        table: String,
        geo: String,
        version: String,
    },
    #[error("Geography {geo} version '{version}' not found")]
    GeographyNotFound { geo: String, version: String },
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("serde JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl ProfileError {
    /// Whether the error comes from a misconfigured request or catalogue rather than from data.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ProfileError::InvalidField { .. }
                | ProfileError::UnresolvedRelease(_)
                | ProfileError::ReleaseNotFound { .. }
                | ProfileError::UnknownTable(_)
                | ProfileError::NoMatchingTable(_)
                | ProfileError::AmbiguousTable { .. }
                | ProfileError::NotAFieldTable(_)
                | ProfileError::ReservedStatKey { .. }
        )
    }

    pub fn is_data_not_found(&self) -> bool {
        matches!(self, ProfileError::DataNotFound { .. })
    }
}

pub type ProfileResult<T> = Result<T, ProfileError>;
