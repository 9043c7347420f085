use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use super::config_path;
use crate::core::Config;

pub fn handle_config(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", sub_matches)) => show(sub_matches),
        Some(("init", sub_matches)) => init(sub_matches),
        _ => {
            println!("Use 'spinfan config --help' for more information.");
            Ok(())
        }
    }
}

/// Print the effective (normalized) configuration as JSON.
fn show(matches: &ArgMatches) -> Result<()> {
    let path = config_path(matches)?;
    let config = Config::load_or_init(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;

    eprintln!("{} {}", "Config file:".dimmed(), path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn init(matches: &ArgMatches) -> Result<()> {
    let path = config_path(matches)?;

    if path.exists() && !matches.get_flag("force") {
        println!(
            "{}",
            format!("⚠️  Config already exists at {}", path.display()).yellow()
        );
        println!("{}", "Use --force to overwrite it with the defaults.".dimmed());
        return Ok(());
    }

    Config::default()
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} {}",
        "✓ Default config written to:".green(),
        path.display()
    );
    Ok(())
}
