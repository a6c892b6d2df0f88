//! Reference dataset loader for CSV and Parquet files

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

use super::reference::ReferenceStats;
use crate::model::AdditiveModel;

/// Load a dataset from a file (CSV or Parquet based on extension)
pub fn load_dataset(path: &Path) -> Result<LazyFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_has_header(true)
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    Ok(lf)
}

/// Load the columns of `model`'s main features from a reference dataset
pub fn load_reference_frame<M: AdditiveModel + ?Sized>(path: &Path, model: &M) -> Result<DataFrame> {
    let df = load_dataset(path)?
        .collect()
        .with_context(|| format!("Failed to read reference data: {}", path.display()))?;

    let names: Vec<&str> = model
        .features()
        .iter()
        .filter(|f| !f.is_interaction())
        .map(|f| f.name.as_str())
        .collect();

    let missing: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| df.column(name).is_err())
        .collect();
    if !missing.is_empty() {
        anyhow::bail!(
            "Reference data {} is missing columns: {}",
            path.display(),
            missing.join(", ")
        );
    }

    Ok(df.select(names)?)
}

/// Load a reference dataset and compute its distance statistics
pub fn load_reference_stats<M: AdditiveModel + ?Sized>(path: &Path, model: &M) -> Result<(ReferenceStats, DatasetStats)> {
    let df = load_reference_frame(path, model)?;
    let info = DatasetStats::of(&df);
    let stats = ReferenceStats::from_dataframe(model, &df)
        .with_context(|| format!("Failed to compute statistics for {}", path.display()))?;
    Ok((stats, info))
}

/// Shape and size of a loaded dataset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetStats {
    pub rows: usize,
    pub columns: usize,
    pub memory_mb: f64,
}

impl DatasetStats {
    pub fn of(df: &DataFrame) -> Self {
        let (rows, columns) = df.shape();
        Self {
            rows,
            columns,
            memory_mb: df.estimated_size() as f64 / (1024.0 * 1024.0),
        }
    }
}
