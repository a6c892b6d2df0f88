//! Shared test utilities and fixture generators

#![allow(dead_code)]

use gamcoach::model::{Feature, FeatureValue, Gam, ModelKind};
use gamcoach::pipeline::ReferenceStats;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tempfile::TempDir;

/// Loan approval classifier with two continuous features, two categorical
/// features and one interaction term.
///
/// The input from [`loan_row`] scores -1.2 and is predicted as class 0.
pub const LOAN_MODEL_JSON: &str = r#"{
    "featureNames": ["loan_amnt", "annual_inc", "term", "home_ownership"],
    "featureTypes": ["continuous", "continuous", "categorical", "categorical"],
    "intercept": -0.2,
    "isClassifier": true,
    "features": [
        {"name": "loan_amnt", "type": "continuous",
         "binEdge": [0, 3000, 5000, 8000, 10000, 20000, 40000],
         "additive": [0.6, 0.4, 0.2, 0.0, -0.3, -0.6]},
        {"name": "annual_inc", "type": "continuous",
         "binEdge": [0, 30000, 60000, 100000, 500000],
         "additive": [-0.5, 0.0, 0.3, 0.5]},
        {"name": "term", "type": "categorical",
         "binLabel": ["36 months", "60 months"],
         "additive": [0.2, -0.4]},
        {"name": "home_ownership", "type": "categorical",
         "binLabel": ["RENT", "MORTGAGE", "OWN"],
         "additive": [-0.1, 0.1, 0.07]},
        {"name": "loan_amnt x term", "type": "interaction",
         "name1": "loan_amnt", "name2": "term",
         "binLabel1": [0, 10000, 40000],
         "binLabel2": ["36 months", "60 months"],
         "additive": [[0.05, -0.05], [0.0, -0.2]]}
    ]
}"#;

pub fn loan_model() -> Gam {
    Gam::from_json_str(LOAN_MODEL_JSON).unwrap()
}

pub fn loan_row() -> Vec<FeatureValue> {
    vec![
        FeatureValue::Number(15000.0),
        FeatureValue::Number(40000.0),
        FeatureValue::Level("60 months".to_string()),
        FeatureValue::Level("RENT".to_string()),
    ]
}

/// Request file for [`loan_row`]
pub const LOAN_REQUEST_JSON: &str = r#"{
    "input": {
        "loan_amnt": 15000,
        "annual_inc": 40000,
        "term": "60 months",
        "home_ownership": "RENT"
    },
    "total_cfs": 3,
    "continuous_integer_features": ["loan_amnt", "annual_inc"]
}"#;

/// Deterministic reference data for the loan model
pub fn loan_reference_dataframe(rows: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);

    let loan_amnt: Vec<f64> = (0..rows)
        .map(|_| (rng.gen_range(1000.0..35000.0_f64) / 500.0).round() * 500.0)
        .collect();
    let annual_inc: Vec<f64> = (0..rows)
        .map(|_| (rng.gen_range(15000.0..150000.0_f64) / 1000.0).round() * 1000.0)
        .collect();
    let term: Vec<&str> = (0..rows)
        .map(|_| if rng.gen_bool(0.7) { "36 months" } else { "60 months" })
        .collect();
    let home: Vec<&str> = (0..rows)
        .map(|_| match rng.gen_range(0..10) {
            0..=4 => "RENT",
            5..=8 => "MORTGAGE",
            _ => "OWN",
        })
        .collect();

    df! {
        "loan_amnt" => loan_amnt,
        "annual_inc" => annual_inc,
        "term" => term,
        "home_ownership" => home,
    }
    .unwrap()
}

pub fn loan_reference_stats() -> ReferenceStats {
    ReferenceStats::from_dataframe(&loan_model(), &loan_reference_dataframe(200, 42)).unwrap()
}

/// Regressor predicting 5.0 for [`regression_row`]
///
/// `x` options gain 1, 2, 3 or 5; `c` options gain 1.5 or 4.5.
pub fn regression_model() -> Gam {
    Gam::new(
        vec![
            Feature::continuous(
                "x",
                vec![0.0, 10.0, 20.0, 30.0, 40.0],
                vec![0.0, 1.0, 2.0, 3.0, 5.0],
            ),
            Feature::categorical(
                "c",
                vec!["a".to_string(), "b".to_string(), "c".to_string()],
                vec![0.0, 1.5, 4.5],
            ),
        ],
        5.0,
        ModelKind::Regressor,
    )
    .unwrap()
}

pub fn regression_row() -> Vec<FeatureValue> {
    vec![FeatureValue::Number(5.0), FeatureValue::Level("a".to_string())]
}

/// Write a DataFrame to a CSV file in a temporary directory
pub fn write_temp_csv(df: &mut DataFrame, filename: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(filename);
    let mut file = std::fs::File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
    (temp_dir, path)
}

/// Write a DataFrame to a Parquet file in a temporary directory
pub fn write_temp_parquet(df: &mut DataFrame, filename: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(filename);
    let file = std::fs::File::create(&path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();
    (temp_dir, path)
}

/// Write a text file into an existing temporary directory
pub fn write_text(dir: &TempDir, filename: &str, content: &str) -> PathBuf {
    let path = dir.path().join(filename);
    std::fs::write(&path, content).unwrap();
    path
}
