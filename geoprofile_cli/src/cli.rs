use std::{fs::File, io::Write, path::PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use enum_dispatch::enum_dispatch;
use geoprofile::{
    config::Config,
    field_table::RowQuery,
    geo::{GeoRef, Geography},
    table::{StatTable, TableMetadata},
    GeoProfile,
};
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

use crate::display::{
    display_columns, display_profile, display_rows, display_tables, display_values,
};
use crate::error::{GeoProfileCliError, GeoProfileCliResult};

/// Defines the output formats we are able to produce results in.
#[derive(Clone, Debug, Default, Deserialize, Serialize, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Args, Debug, Clone)]
struct OutputArgs {
    #[arg(
        short = 'f',
        long,
        default_value = "table",
        value_name = "table|json",
        help = "Output format for the results"
    )]
    output_format: OutputFormat,
    #[arg(short = 'o', long, help = "Output file to place the results")]
    output_file: Option<PathBuf>,
}

impl OutputArgs {
    /// Write `value` as JSON, or the table built by `table`, to the output file or stdout.
    fn write<T: Serialize>(
        &self,
        value: &T,
        table: impl FnOnce() -> Table,
    ) -> GeoProfileCliResult<()> {
        let rendered = match self.output_format {
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
            OutputFormat::Table => format!("\n{}", table()),
        };
        match &self.output_file {
            Some(path) => {
                let mut f = File::create(path)
                    .with_context(|| format!("Failed to write output to {}", path.display()))?;
                writeln!(f, "{rendered}")?;
            }
            None => println!("{rendered}"),
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
struct YearArgs {
    #[arg(
        short = 'y',
        long,
        help = "Release year, or 'latest'. Defaults to the configured year"
    )]
    year: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct GeographyArgs {
    #[arg(value_name = "LEVEL-CODE", help = "Geography, e.g. ward-1")]
    geo: GeoRef,
    #[arg(
        long = "geo-version",
        help = "Boundary version of the geography. Defaults to the most recent"
    )]
    geo_version: Option<String>,
}

impl GeographyArgs {
    fn resolve(&self, geo_profile: &GeoProfile) -> GeoProfileCliResult<Geography> {
        Ok(geo_profile.resolve_geography(
            &self.geo.level,
            &self.geo.code,
            self.geo_version.as_deref(),
        )?)
    }
}

/// Parse `FIELD=VALUE[,VALUE...]` arguments into a field -> values map. Repeated fields
/// accumulate their values.
fn parse_filters(filters: &[String]) -> GeoProfileCliResult<IndexMap<String, Vec<String>>> {
    let mut parsed: IndexMap<String, Vec<String>> = IndexMap::new();
    for filter in filters {
        let (field, values) = filter
            .split_once('=')
            .filter(|(field, values)| !field.is_empty() && !values.is_empty())
            .ok_or_else(|| GeoProfileCliError::InvalidFilter(filter.clone()))?;
        parsed
            .entry(field.to_string())
            .or_default()
            .extend(values.split(',').map(str::to_string));
    }
    Ok(parsed)
}

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    fn run(&self, config: Config) -> GeoProfileCliResult<()>;
}

/// The Tables command lists the data tables of the catalogue.
#[derive(Args, Debug)]
pub struct TablesCommand {
    #[arg(short, long, help = "Only tables of this dataset")]
    dataset: Option<String>,
    #[arg(short, long, help = "Only tables of this universe (case insensitive)")]
    universe: Option<String>,
    #[command(flatten)]
    output: OutputArgs,
}

impl TablesCommand {
    fn metadata(&self, geo_profile: &GeoProfile) -> Vec<TableMetadata> {
        geo_profile
            .catalogue
            .tables
            .iter()
            .filter(|table| {
                let descriptor = table.descriptor();
                self.dataset
                    .as_ref()
                    .map_or(true, |dataset| &descriptor.dataset == dataset)
                    && self.universe.as_ref().map_or(true, |universe| {
                        descriptor.universe.eq_ignore_ascii_case(universe)
                    })
            })
            .map(|table| table.metadata(&geo_profile.catalogue))
            .collect()
    }
}

impl RunCommand for TablesCommand {
    fn run(&self, config: Config) -> GeoProfileCliResult<()> {
        info!("Running `tables` subcommand");
        let geo_profile = GeoProfile::new_with_config(config)?;
        let tables = self.metadata(&geo_profile);
        self.output.write(&tables, || display_tables(&tables))
    }
}

/// The Columns command prints the column index of a table, optionally restricted to the columns
/// a geography has data for.
#[derive(Args, Debug)]
pub struct ColumnsCommand {
    #[arg(help = "Table name")]
    table: String,
    #[arg(short, long, value_name = "LEVEL-CODE", help = "Restrict to this geography")]
    geo: Option<GeoRef>,
    #[command(flatten)]
    year: YearArgs,
    #[command(flatten)]
    output: OutputArgs,
}

impl RunCommand for ColumnsCommand {
    fn run(&self, config: Config) -> GeoProfileCliResult<()> {
        info!("Running `columns` subcommand");
        let geo_profile = GeoProfile::new_with_config(config)?;
        let geo = self
            .geo
            .as_ref()
            .map(|geo| geo_profile.resolve_geography(&geo.level, &geo.code, None))
            .transpose()?;
        let columns = geo_profile.columns(&self.table, geo.as_ref(), self.year.year.as_deref())?;
        debug!("{} columns", columns.len());
        self.output.write(&columns, || display_columns(&columns))
    }
}

/// The Values command prints the raw values of a table for one or more geographies.
#[derive(Args, Debug)]
pub struct ValuesCommand {
    #[arg(help = "Table name")]
    table: String,
    #[arg(required = true, num_args = 1.., value_name = "LEVEL-CODE")]
    geos: Vec<GeoRef>,
    #[arg(
        long = "geo-version",
        help = "Boundary version of the geographies. Defaults to the most recent"
    )]
    geo_version: Option<String>,
    #[command(flatten)]
    year: YearArgs,
    #[command(flatten)]
    output: OutputArgs,
}

impl RunCommand for ValuesCommand {
    fn run(&self, config: Config) -> GeoProfileCliResult<()> {
        info!("Running `values` subcommand");
        let geo_profile = GeoProfile::new_with_config(config)?;
        let geos = self
            .geos
            .iter()
            .map(|geo| {
                geo_profile.resolve_geography(&geo.level, &geo.code, self.geo_version.as_deref())
            })
            .collect::<Result<Vec<_>, _>>()?;
        let data = geo_profile.raw_data(&self.table, &geos, self.year.year.as_deref())?;
        self.output.write(&data, || display_values(&data))
    }
}

/// The Rows command ranks the field value combinations of a field table for one geography.
#[derive(Args, Debug)]
pub struct RowsCommand {
    #[arg(help = "Field table name")]
    table: String,
    #[command(flatten)]
    geography: GeographyArgs,
    #[arg(long, value_delimiter = ',', help = "Fields to group by, comma separated")]
    fields: Option<Vec<String>>,
    #[arg(
        long,
        allow_hyphen_values = true,
        help = "'total' or a field name, prefix with '-' for descending order"
    )]
    order_by: Option<String>,
    #[arg(long, value_name = "FIELD=VALUE[,VALUE...]", help = "Only keep these values")]
    only: Vec<String>,
    #[arg(long, value_name = "FIELD=VALUE[,VALUE...]", help = "Drop these values")]
    exclude: Vec<String>,
    #[command(flatten)]
    year: YearArgs,
    #[command(flatten)]
    output: OutputArgs,
}

impl RowsCommand {
    fn query(&self) -> GeoProfileCliResult<RowQuery> {
        Ok(RowQuery {
            fields: self.fields.clone(),
            order_by: self.order_by.clone(),
            only: parse_filters(&self.only)?,
            exclude: parse_filters(&self.exclude)?,
        })
    }
}

impl RunCommand for RowsCommand {
    fn run(&self, config: Config) -> GeoProfileCliResult<()> {
        info!("Running `rows` subcommand");
        let query = self.query()?;
        debug!("{query:?}");
        let geo_profile = GeoProfile::new_with_config(config)?;
        let geo = self.geography.resolve(&geo_profile)?;
        let rows = geo_profile.rows_for_geo(&self.table, &geo, &query, self.year.year.as_deref())?;
        self.output.write(&rows, || display_rows(&rows))
    }
}

/// The Profile command builds the configured profile sections for a geography.
#[derive(Args, Debug)]
pub struct ProfileCommand {
    #[command(flatten)]
    geography: GeographyArgs,
    #[arg(
        short,
        long,
        help = "Add the values of comparative geographies and the ratios to them"
    )]
    comparative: bool,
    #[command(flatten)]
    year: YearArgs,
    #[command(flatten)]
    output: OutputArgs,
}

impl RunCommand for ProfileCommand {
    fn run(&self, config: Config) -> GeoProfileCliResult<()> {
        info!("Running `profile` subcommand");
        let geo_profile = GeoProfile::new_with_config(config)?;
        let geo = self.geography.resolve(&geo_profile)?;
        let year = self.year.year.as_deref();
        let profile = if self.comparative {
            geo_profile.get_comparative_profile(&geo, year)?
        } else {
            geo_profile.get_profile(&geo, year)?
        };
        self.output.write(&profile, || display_profile(&profile))
    }
}

/// The entrypoint for the CLI.
#[derive(Parser, Debug)]
#[command(version, about = "geoprofile builds demographic profiles of geographies", long_about = None, name = "geoprofile")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        long = "base-path",
        help = "Directory holding the catalogue and the parquet tables. Overrides the config file",
        global = true
    )]
    pub base_path: Option<String>,
}

/// Commands contains the list of subcommands available for use in the CLI.
/// Each command implements the RunCommand trait.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// List the data tables of the catalogue
    Tables(TablesCommand),
    /// Print the columns of a table
    Columns(ColumnsCommand),
    /// Print the raw values of a table for geographies
    Values(ValuesCommand),
    /// Rank the rows of a field table for a geography
    Rows(RowsCommand),
    /// Build the profile of a geography
    Profile(ProfileCommand),
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use geoprofile::{
        store::{ParquetStore, TableStore},
        COL,
    };
    use polars::df;
    use tempfile::TempDir;

    use super::*;

    const CATALOGUE_JSON: &str = r#"{
      "datasets": [{"name": "Internet"}],
      "releases": [{"name": "Internet survey", "year": "2016", "dataset": "Internet"}],
      "tables": [
        {
          "type": "simple",
          "name": "st_v6pop",
          "universe": "Internet users",
          "dataset": "Internet",
          "releases": [{"year": "2016", "db_table": "st_v6pop"}]
        }
      ]
    }"#;

    fn data_dir() -> anyhow::Result<TempDir> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("catalogue.json"), CATALOGUE_JSON)?;
        let store = ParquetStore::new(dir.path());
        store.create(
            COL::GEOGRAPHIES_TABLE,
            df!(
                COL::GEO_LEVEL => &["country", "province", "ward"],
                COL::GEO_CODE => &["ZA", "WC", "1"],
                COL::GEO_VERSION => &["2016", "2016", "2016"],
                COL::GEO_NAME => &["South Africa", "Western Cape", "Ward 1"],
                COL::GEO_PARENT_LEVEL => &[None, Some("country"), Some("province")],
                COL::GEO_PARENT_CODE => &[None, Some("ZA"), Some("WC")],
            )?,
        )?;
        store.create(
            "st_v6pop",
            df!(
                COL::GEO_LEVEL => &["ward", "province"],
                COL::GEO_CODE => &["1", "WC"],
                COL::GEO_VERSION => &["2016", "2016"],
                "total_users" => &[1000i64, 50000],
                "total_isps" => &[4i64, 20],
                "total_v6" => &[250i64, 10000],
            )?,
        )?;
        Ok(dir)
    }

    fn config_for(dir: &TempDir) -> Config {
        Config {
            base_path: dir.path().to_string_lossy().to_string(),
            default_year: Some("2016".into()),
            ..Default::default()
        }
    }

    #[test]
    fn profile_command_writes_json() -> anyhow::Result<()> {
        let dir = data_dir()?;
        let output_file = dir.path().join("profile.json");
        let cli = Cli::try_parse_from([
            "geoprofile",
            "profile",
            "ward-1",
            "--comparative",
            "-f",
            "json",
            "-o",
            output_file.to_str().unwrap(),
        ])?;
        cli.command.unwrap().run(config_for(&dir))?;

        let profile: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output_file)?)?;
        assert_eq!(profile["geography"]["name"], "Ward 1");
        let users = &profile["demographics"]["total_users"];
        assert_eq!(users["values"]["this"], 1000.0);
        assert_eq!(users["values"]["province"], 50000.0);
        assert_eq!(users["index"]["province"], 0.02);
        Ok(())
    }

    #[test]
    fn tables_command_filters_by_universe() -> anyhow::Result<()> {
        let dir = data_dir()?;
        let geo_profile = GeoProfile::new_with_config(config_for(&dir))?;
        let cli = Cli::try_parse_from(["geoprofile", "tables", "--universe", "internet USERS"])?;
        let Some(Commands::Tables(command)) = cli.command else {
            panic!("expected the tables command");
        };
        let tables = command.metadata(&geo_profile);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].table_id, "ST_V6POP");

        let cli = Cli::try_parse_from(["geoprofile", "tables", "--dataset", "Census"])?;
        let Some(Commands::Tables(command)) = cli.command else {
            panic!("expected the tables command");
        };
        assert!(command.metadata(&geo_profile).is_empty());
        Ok(())
    }

    #[test]
    fn missing_table_is_an_error() -> anyhow::Result<()> {
        let dir = data_dir()?;
        let cli = Cli::try_parse_from(["geoprofile", "columns", "no_such_table"])?;
        let result = cli.command.unwrap().run(config_for(&dir));
        assert!(matches!(
            result,
            Err(GeoProfileCliError::GeoProfileError(_))
        ));
        Ok(())
    }

    #[test]
    fn rows_arguments_parse() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "geoprofile",
            "--base-path",
            "/srv/profiles",
            "rows",
            "age_gender",
            "ward-1",
            "--fields",
            "age_group,gender",
            "--order-by",
            "-total",
            "--only",
            "gender=male,female",
            "--exclude",
            "age_group=5-9",
        ])?;
        assert_eq!(cli.base_path.as_deref(), Some("/srv/profiles"));
        let Some(Commands::Rows(command)) = cli.command else {
            panic!("expected the rows command");
        };
        assert_eq!(
            command.geography.geo,
            GeoRef {
                level: "ward".into(),
                code: "1".into()
            }
        );
        let query = command.query()?;
        assert_eq!(
            query.fields,
            Some(vec!["age_group".to_string(), "gender".to_string()])
        );
        assert_eq!(query.order_by.as_deref(), Some("-total"));
        assert_eq!(
            query.only,
            IndexMap::from([(
                "gender".to_string(),
                vec!["male".to_string(), "female".to_string()]
            )])
        );
        assert_eq!(
            query.exclude,
            IndexMap::from([("age_group".to_string(), vec!["5-9".to_string()])])
        );
        Ok(())
    }

    #[test]
    fn geography_must_be_level_and_code() {
        assert!(Cli::try_parse_from(["geoprofile", "profile", "ward"]).is_err());
    }

    #[test]
    fn filters_accumulate_and_reject_malformed_input() {
        let filters = parse_filters(&["gender=male".into(), "gender=female".into()]).unwrap();
        assert_eq!(
            filters["gender"],
            vec!["male".to_string(), "female".to_string()]
        );
        assert!(matches!(
            parse_filters(&["gender".into()]),
            Err(GeoProfileCliError::InvalidFilter(_))
        ));
        assert!(parse_filters(&["=male".into()]).is_err());
    }

    #[test]
    fn output_type_should_deserialize_properly() {
        let output_format = OutputFormat::from_str("json");
        assert_eq!(
            output_format.unwrap(),
            OutputFormat::Json,
            "json format should be parsed correctly"
        );
        let output_format = OutputFormat::from_str("TABLE");
        assert_eq!(
            output_format.unwrap(),
            OutputFormat::Table,
            "parsing should be case insensitive"
        );
        let output_format = OutputFormat::from_str("geojson");
        assert!(output_format.is_err(), "non listed formats should fail");
    }

    #[test]
    fn cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
