//! GAM Coach CLI
//!
//! Loads a model, a reference dataset and a request file, then prints (and
//! optionally exports) diverse counterfactual strategies.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

use gamcoach::cli::{apply_cli_overrides, categorical_cost, Cli, RequestFile};
use gamcoach::model::{AdditiveModel, Gam};
use gamcoach::pipeline::{load_reference_stats, GamCoach};
use gamcoach::report::{display_counterfactuals, export_counterfactuals, ExportParams};
use gamcoach::utils::{
    create_spinner, finish_with_success, print_banner, print_completion, print_config, print_info,
    print_step_header, print_step_time, print_success, ConfigCard,
};

fn enable_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    enable_tracing();

    let request_file = RequestFile::from_path(&cli.request)?;
    let request = apply_cli_overrides(request_file.to_request()?, &cli);

    if !cli.quiet {
        print_banner(env!("CARGO_PKG_VERSION"));
        print_config(&ConfigCard {
            model: &cli.model,
            reference: &cli.reference,
            request: &cli.request,
            output: cli.output.as_deref(),
            total_cfs: request.total_cfs,
            max_features_to_vary: request.max_features_to_vary,
            similarity: request.similarity.to_string(),
            categorical_weight: request.categorical_weight.to_string(),
        });
    }

    // Step 1: Load model
    let step_start = Instant::now();
    if !cli.quiet {
        print_step_header(1, "Load Model");
    }
    let gam = Gam::from_path(&cli.model)
        .with_context(|| format!("Failed to load model: {}", cli.model.display()))?;
    if !cli.quiet {
        print_success(&format!(
            "Loaded {} features ({} main effects)",
            gam.features().len(),
            gam.main_feature_count()
        ));
        print_step_time(step_start.elapsed());
    }

    // Step 2: Reference statistics
    let step_start = Instant::now();
    if !cli.quiet {
        print_step_header(2, "Reference Statistics");
    }
    let spinner = (!cli.quiet).then(|| create_spinner("Computing MAD and level frequencies..."));
    let (stats, info) = load_reference_stats(&cli.reference, &gam)?;
    let stats = stats.with_categorical_cost(categorical_cost(&cli));
    if let Some(pb) = &spinner {
        finish_with_success(pb, "Reference statistics ready");
    }
    if !cli.quiet {
        print_info(&format!(
            "{} rows, {} columns, {:.2} MB",
            info.rows, info.columns, info.memory_mb
        ));
        print_step_time(step_start.elapsed());
    }

    // Step 3: Search
    let step_start = Instant::now();
    if !cli.quiet {
        print_step_header(3, "Generate Strategies");
    }
    let row = request_file.row(&gam)?;
    let coach = GamCoach::new(gam, stats);
    let original_prediction = coach.model().predict(&row);

    let cfs = coach
        .generate_cfs(&row, &request)
        .context("Counterfactual generation failed")?;
    let predictions = cfs.new_predictions(coach.model());
    if !cli.quiet {
        print_step_time(step_start.elapsed());
    }

    display_counterfactuals(&cfs, original_prediction, &predictions);

    if let Some(output) = &cli.output {
        let model_file = cli.model.display().to_string();
        let reference_file = cli.reference.display().to_string();
        export_counterfactuals(
            &cfs,
            &predictions,
            output,
            &ExportParams {
                model_file: &model_file,
                reference_file: &reference_file,
                request: &request,
                original_prediction,
            },
        )?;
        if !cli.quiet {
            println!();
            print_success(&format!("Saved strategies to {}", output.display()));
        }
    }

    if !cli.quiet {
        if cfs.is_successful() {
            print_completion();
        } else {
            println!(
                "\n    {}",
                style("Some rounds had no feasible strategy; try relaxing the constraints.").yellow()
            );
        }
    }

    Ok(())
}
