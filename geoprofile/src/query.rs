//! Polars expression helpers used by the table queries.

use nonempty::NonEmpty;
use polars::prelude::{col, lit, DataFrame, DataType, Expr, NamedFrom, Series};

use crate::{error::ProfileResult, geo::Geography, COL};

/// OR together a non-empty list of predicates.
pub fn any_of(exprs: NonEmpty<Expr>) -> Expr {
    let NonEmpty { head, tail } = exprs;
    tail.into_iter().fold(head, |query, expr| query.or(expr))
}

/// Match the rows of a single geography on the full compound key.
pub fn geo_filter(geo: &Geography) -> Expr {
    col(COL::GEO_LEVEL)
        .eq(lit(geo.level.as_str()))
        .and(col(COL::GEO_CODE).eq(lit(geo.code.as_str())))
        .and(col(COL::GEO_VERSION).eq(lit(geo.version.as_str())))
}

/// Match the rows of any of the given geographies, so a set of geographies is fetched in a
/// single query.
pub fn geos_filter(geos: &NonEmpty<Geography>) -> Expr {
    any_of(geos.clone().map(|geo| geo_filter(&geo)))
}

/// `column` (compared as a string) is one of `values`.
pub fn value_in(column: &str, values: &[String]) -> Expr {
    let values = Series::new(column, values.to_vec());
    col(column).cast(DataType::String).is_in(lit(values))
}

/// `column` (compared as a string) is none of `values`.
pub fn value_not_in(column: &str, values: &[String]) -> Expr {
    value_in(column, values).not()
}

/// Expressions selecting `columns` as strings, keeping their names.
pub fn string_exprs(columns: &[String]) -> Vec<Expr> {
    columns
        .iter()
        .map(|c| col(c).cast(DataType::String))
        .collect()
}

/// Read a string column, mapping nulls to empty strings.
pub fn string_column(df: &DataFrame, name: &str) -> ProfileResult<Vec<String>> {
    Ok(df
        .column(name)?
        .str()?
        .into_iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect())
}

/// Read a string column, keeping nulls.
pub fn optional_string_column(df: &DataFrame, name: &str) -> ProfileResult<Vec<Option<String>>> {
    Ok(df
        .column(name)?
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

/// Read a numeric column as f64, keeping nulls.
pub fn f64_column(df: &DataFrame, name: &str) -> ProfileResult<Vec<Option<f64>>> {
    Ok(df
        .column(name)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect())
}
