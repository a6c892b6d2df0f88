//! Counterfactual summary tables

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use super::counterfactuals::{Counterfactual, Counterfactuals};

/// Render one strategy as a table
pub fn strategy_table(cf: &Counterfactual) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Feature").add_attribute(Attribute::Bold),
        Cell::new("Current").add_attribute(Attribute::Bold),
        Cell::new("New").add_attribute(Attribute::Bold),
        Cell::new("Target bin").add_attribute(Attribute::Bold),
        Cell::new("Score gain").add_attribute(Attribute::Bold),
        Cell::new("Distance").add_attribute(Attribute::Bold),
    ]);

    for change in &cf.changes {
        table.add_row(vec![
            Cell::new(&change.feature),
            Cell::new(&change.from),
            Cell::new(&change.to).fg(Color::Green),
            Cell::new(&change.target_bin).fg(Color::Cyan),
            Cell::new(format!("{:+.4}", change.score_gain)),
            Cell::new(format!("{:.4}", change.distance)),
        ]);
    }

    for trigger in &cf.interactions {
        table.add_row(vec![
            Cell::new(format!("↳ {}", trigger.feature)).fg(Color::DarkGrey),
            Cell::new(""),
            Cell::new(""),
            Cell::new(format!("{} x {}", trigger.bins.0, trigger.bins.1)).fg(Color::DarkGrey),
            Cell::new(format!("{:+.4}", trigger.score_gain)),
            Cell::new("0"),
        ]);
    }

    table
}

/// Print every strategy with its new prediction
pub fn display_counterfactuals(cfs: &Counterfactuals, original_prediction: f64, predictions: &[f64]) {
    println!();
    println!(
        "    {} {}",
        style("📋").cyan(),
        style("COUNTERFACTUAL STRATEGIES").white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
    println!(
        "      Direction {}, needed score gain {}",
        style(cfs.direction).yellow(),
        style(format!("{:+.4}", cfs.needed_score_gain)).yellow()
    );
    println!(
        "      Model: {}",
        style(cfs.model_size).dim()
    );

    for (i, (cf, prediction)) in cfs.solutions.iter().zip(predictions).enumerate() {
        println!();
        println!(
            "    {} {}  {}",
            style(format!("Strategy {}", i + 1)).cyan().bold(),
            style(format!("(distance {:.4})", cf.objective)).dim(),
            style(format!("prediction {} → {}", original_prediction, prediction)).green()
        );

        if cf.is_empty() {
            println!("      {}", style("No change needed").dim());
            continue;
        }

        for line in strategy_table(cf).to_string().lines() {
            println!("    {}", line);
        }
    }

    println!();
    if cfs.is_successful() {
        println!(
            "    {} Found {} of {} requested strategies",
            style("✓").green().bold(),
            cfs.len(),
            cfs.requested
        );
    } else {
        println!(
            "    {} Found {} of {} requested strategies",
            style("⚠").yellow().bold(),
            style(cfs.len()).yellow(),
            cfs.requested
        );
    }
}
