use geoprofile::error::ProfileError;

#[derive(thiserror::Error, Debug)]
pub enum GeoProfileCliError {
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),
    #[error("serde JSON error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("geoprofile error: {0}")]
    GeoProfileError(#[from] ProfileError),
    #[error("std IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid filter '{0}', expected FIELD=VALUE[,VALUE...]")]
    InvalidFilter(String),
}

pub type GeoProfileCliResult<T> = Result<T, GeoProfileCliError>;
