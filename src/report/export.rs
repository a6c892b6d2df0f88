//! Counterfactual export functionality

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use super::counterfactuals::{Counterfactual, Counterfactuals};
use crate::pipeline::CfRequest;

/// Metadata about the run
#[derive(Serialize)]
pub struct ExportMetadata {
    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,
    pub gamcoach_version: String,
    pub model_file: String,
    pub reference_file: String,
    /// Request settings after CLI overrides
    pub request: CfRequest,
}

/// Search summary
#[derive(Serialize)]
pub struct ExportSummary {
    pub requested: usize,
    pub found: usize,
    pub success: bool,
    /// `+1` or `-1`
    pub direction: String,
    pub needed_score_gain: f64,
    pub variables: usize,
    pub constraints: usize,
    pub original_prediction: f64,
}

/// One strategy with its new prediction
#[derive(Serialize)]
pub struct StrategyEntry {
    pub strategy: usize,
    #[serde(flatten)]
    pub counterfactual: Counterfactual,
    pub new_prediction: f64,
}

#[derive(Serialize)]
pub struct CounterfactualExport {
    pub metadata: ExportMetadata,
    pub summary: ExportSummary,
    pub strategies: Vec<StrategyEntry>,
}

/// Paths and settings recorded in the export metadata
pub struct ExportParams<'a> {
    pub model_file: &'a str,
    pub reference_file: &'a str,
    pub request: &'a CfRequest,
    pub original_prediction: f64,
}

/// Build the export document
pub fn build_export(cfs: &Counterfactuals, predictions: &[f64], params: &ExportParams) -> CounterfactualExport {
    let strategies = cfs
        .solutions
        .iter()
        .zip(predictions)
        .enumerate()
        .map(|(i, (cf, prediction))| StrategyEntry {
            strategy: i + 1,
            counterfactual: cf.clone(),
            new_prediction: *prediction,
        })
        .collect();

    CounterfactualExport {
        metadata: ExportMetadata {
            timestamp: Utc::now().to_rfc3339(),
            gamcoach_version: env!("CARGO_PKG_VERSION").to_string(),
            model_file: params.model_file.to_string(),
            reference_file: params.reference_file.to_string(),
            request: params.request.clone(),
        },
        summary: ExportSummary {
            requested: cfs.requested,
            found: cfs.len(),
            success: cfs.is_successful(),
            direction: cfs.direction.to_string(),
            needed_score_gain: cfs.needed_score_gain,
            variables: cfs.model_size.variables,
            constraints: cfs.model_size.constraints,
            original_prediction: params.original_prediction,
        },
        strategies,
    }
}

/// Export counterfactuals to a JSON file
pub fn export_counterfactuals(
    cfs: &Counterfactuals,
    predictions: &[f64],
    output_path: &Path,
    params: &ExportParams,
) -> Result<()> {
    let export = build_export(cfs, predictions, params);

    let json = serde_json::to_string_pretty(&export).context("Failed to serialize counterfactuals to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write counterfactuals to {}", output_path.display()))?;

    Ok(())
}
