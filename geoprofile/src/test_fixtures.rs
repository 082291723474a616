//! Small in-memory dataset shared by the unit tests.

use std::sync::Arc;

use indexmap::IndexMap;
use polars::{df, prelude::DataFrame};

use crate::{
    catalogue::Catalogue,
    config::{Config, Denominator, SectionConfig},
    geo::Geography,
    store::MemoryStore,
    GeoProfile, COL,
};

pub const CATALOGUE_JSON: &str = r#"{
  "datasets": [{"name": "Census"}, {"name": "Internet"}],
  "releases": [
    {"name": "Census", "year": "2011", "dataset": "Census"},
    {"name": "Census", "year": "2016", "dataset": "Census"},
    {"name": "Internet survey", "year": "2016", "dataset": "Internet"}
  ],
  "tables": [
    {
      "type": "field",
      "universe": "Population",
      "dataset": "Census",
      "fields": ["age_group", "gender"],
      "releases": [
        {"year": "2011", "db_table": "age_gender_2011"},
        {"year": "2016", "db_table": "age_gender"}
      ]
    },
    {
      "type": "field",
      "name": "gender",
      "universe": "Population",
      "dataset": "Census",
      "fields": ["gender"],
      "releases": [{"year": "2016", "db_table": "gender_2016"}]
    },
    {
      "type": "field",
      "name": "internet_access",
      "universe": "Households",
      "dataset": "Internet",
      "fields": ["access"],
      "denominator_key": "total_pop",
      "releases": [{"year": "2016", "db_table": "internet_access"}]
    },
    {
      "type": "simple",
      "name": "st_v6pop",
      "universe": "Internet users",
      "dataset": "Internet",
      "releases": [{"year": "2016", "db_table": "st_v6pop"}]
    }
  ]
}"#;

fn geographies() -> DataFrame {
    df!(
        COL::GEO_LEVEL => &["country", "province", "ward", "ward", "ward"],
        COL::GEO_CODE => &["ZA", "WC", "1", "1", "2"],
        COL::GEO_VERSION => &["2016", "2016", "2016", "2011", "2016"],
        COL::GEO_NAME => &["South Africa", "Western Cape", "Ward 1", "Ward 1 (2011)", "Ward 2"],
        COL::GEO_PARENT_LEVEL => &[None, Some("country"), Some("province"), Some("province"), Some("province")],
        COL::GEO_PARENT_CODE => &[None, Some("ZA"), Some("WC"), Some("WC"), Some("WC")],
    )
    .unwrap()
}

fn st_v6pop() -> DataFrame {
    df!(
        COL::GEO_LEVEL => &["ward", "ward", "province"],
        COL::GEO_CODE => &["1", "2", "WC"],
        COL::GEO_VERSION => &["2016", "2016", "2016"],
        "total_users" => &[1000i64, 10, 50000],
        "total_isps" => &[4i64, 1, 20],
        "total_v6" => &[Some(250i64), None, Some(10000)],
    )
    .unwrap()
}

fn age_gender() -> DataFrame {
    let rows: [(&str, &str, &str, &str, Option<i64>); 13] = [
        ("ward", "1", "5-9", "male", Some(129)),
        ("ward", "1", "5-9", "female", Some(131)),
        ("ward", "1", "10-14", "male", Some(221)),
        ("ward", "2", "5-9", "male", Some(10)),
        ("ward", "2", "10-14", "female", Some(20)),
        ("ward", "2", "10-14", "female", Some(5)),
        ("ward", "2", "10-14", "male", None),
        ("province", "WC", "5-9", "male", Some(1000)),
        ("province", "WC", "5-9", "female", Some(1100)),
        ("province", "WC", "10-14", "male", Some(900)),
        ("province", "WC", "10-14", "female", Some(1000)),
        ("country", "ZA", "5-9", "male", Some(5000)),
        ("country", "ZA", "5-9", "female", Some(5200)),
    ];
    df!(
        COL::GEO_LEVEL => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        COL::GEO_CODE => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
        COL::GEO_VERSION => vec!["2016"; rows.len()],
        "age_group" => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
        "gender" => rows.iter().map(|r| r.3).collect::<Vec<_>>(),
        COL::TOTAL => rows.iter().map(|r| r.4).collect::<Vec<_>>(),
    )
    .unwrap()
}

fn age_gender_2011() -> DataFrame {
    df!(
        COL::GEO_LEVEL => &["ward"],
        COL::GEO_CODE => &["1"],
        COL::GEO_VERSION => &["2011"],
        "age_group" => &["5-9"],
        "gender" => &["male"],
        COL::TOTAL => &[100i64],
    )
    .unwrap()
}

fn internet_access() -> DataFrame {
    df!(
        COL::GEO_LEVEL => &["ward", "ward", "ward", "province", "province", "province", "country", "country", "country"],
        COL::GEO_CODE => &["1", "1", "1", "WC", "WC", "WC", "ZA", "ZA", "ZA"],
        COL::GEO_VERSION => vec!["2016"; 9],
        "access" => &["yes", "no", "total_pop", "yes", "no", "total_pop", "yes", "no", "total_pop"],
        COL::TOTAL => &[300i64, 500, 1000, 20000, 25000, 50000, 100000, 150000, 300000],
    )
    .unwrap()
}

pub fn store() -> MemoryStore {
    MemoryStore::new()
        .with_table(COL::GEOGRAPHIES_TABLE, geographies())
        .with_table("st_v6pop", st_v6pop())
        .with_table("age_gender", age_gender())
        .with_table("age_gender_2011", age_gender_2011())
        .with_table("internet_access", internet_access())
}

pub fn catalogue() -> Catalogue {
    Catalogue::from_json(CATALOGUE_JSON).unwrap()
}

pub fn config() -> Config {
    Config {
        default_year: Some("2016".into()),
        sections: vec![
            SectionConfig::default_demographics(),
            SectionConfig::Table {
                name: "access".into(),
                table: "internet_access".into(),
                fields: None,
                key_order: Some(vec!["yes".into(), "no".into()]),
                recode: IndexMap::from([
                    ("yes".to_string(), "Connected".to_string()),
                    ("no".to_string(), "Offline".to_string()),
                ]),
                total: Denominator::Field("total_pop".into()),
                percent: true,
            },
        ],
        ..Default::default()
    }
}

pub fn geo_profile() -> GeoProfile {
    GeoProfile::from_parts(config(), catalogue(), Arc::new(store())).unwrap()
}

/// Ward 1 at its 2016 boundaries.
pub fn ward1() -> Geography {
    Geography::new("ward", "1", "2016")
        .with_name("Ward 1")
        .with_parent("province", "WC")
}
