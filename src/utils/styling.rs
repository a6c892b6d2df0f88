//! Terminal styling utilities

use console::{style, Emoji};
use std::path::Path;
use std::time::Duration;

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");

/// Print the application banner
pub fn print_banner(version: &str) {
    let banner = r#"
     ██████   █████  ███    ███      ██████  ██████   █████   ██████ ██   ██
    ██       ██   ██ ████  ████     ██      ██    ██ ██   ██ ██      ██   ██
    ██   ███ ███████ ██ ████ ██     ██      ██    ██ ███████ ██      ███████
    ██    ██ ██   ██ ██  ██  ██     ██      ██    ██ ██   ██ ██      ██   ██
     ██████  ██   ██ ██      ██      ██████  ██████  ██   ██  ██████ ██   ██
    "#;

    println!();
    println!("{}", style(banner).cyan().bold());
    println!(
        "    {}",
        style("Actionable strategies for additive models").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Settings shown in the configuration card
pub struct ConfigCard<'a> {
    pub model: &'a Path,
    pub reference: &'a Path,
    pub request: &'a Path,
    pub output: Option<&'a Path>,
    pub total_cfs: usize,
    pub max_features_to_vary: Option<usize>,
    pub similarity: String,
    pub categorical_weight: String,
}

/// Print configuration card
pub fn print_config(card: &ConfigCard) {
    let box_width = 60;
    let line = "─".repeat(box_width - 2);

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        style("⚙️  Configuration").cyan().bold(),
        " ".repeat(box_width - 20)
    );
    println!("    ├{}┤", line);
    println!("    │  {} Model:     {:<40}│", FOLDER, truncate_path(card.model, 39));
    println!("    │  {} Reference: {:<40}│", CHART, truncate_path(card.reference, 39));
    println!("    │  {} Request:   {:<40}│", TARGET, truncate_path(card.request, 39));
    if let Some(output) = card.output {
        println!("    │  {} Output:    {:<40}│", SAVE, truncate_path(output, 39));
    }
    println!("    ├{}┤", line);
    println!(
        "    │  Strategies:          {:<35}│",
        style(card.total_cfs).yellow()
    );
    println!(
        "    │  Max changed features: {:<34}│",
        style(
            card.max_features_to_vary
                .map(|m| m.to_string())
                .unwrap_or_else(|| "any".to_string())
        )
        .yellow()
    );
    println!(
        "    │  Similarity:          {:<35}│",
        style(&card.similarity).yellow()
    );
    println!(
        "    │  Categorical weight:  {:<35}│",
        style(&card.categorical_weight).yellow()
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

/// Print how long a step took
pub fn print_step_time(elapsed: Duration) {
    println!(
        "      {}",
        style(format!("({:.2}s)", elapsed.as_secs_f64())).dim()
    );
}

/// Print the final completion message
pub fn print_completion() {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        style("GAM Coach finished!").green().bold()
    );
    println!();
}

// Helper functions

fn truncate_path(path: &Path, max_len: usize) -> String {
    let path_str = path.display().to_string();
    truncate_string(&path_str, max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}
