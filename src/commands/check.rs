use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use serde::Serialize;

use super::config_path;
use crate::core::fan_control::decision::{decide, Decision, DecisionState};
use crate::core::fan_control::disk_state::{DiskCollector, DiskObservation};
use crate::core::Config;

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub config_path: String,
    pub disks_ini: String,
    pub observation: DiskObservation,
    pub decision: Decision,
}

/// One collector pass and one decision from a fresh state.
pub fn run_check(config: &Config, collector: &DiskCollector) -> (DiskObservation, Decision) {
    let observation = collector.collect(&config.disk_source.path, &config.live_query);
    let decision = decide(config, &observation, &mut DecisionState::default());
    (observation, decision)
}

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let path = config_path(matches)?;
    let config = Config::load_or_init(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;

    let collector = DiskCollector::with_smartctl(&config.live_query.command);
    let (observation, decision) = run_check(&config, &collector);

    let report = CheckReport {
        config_path: path.display().to_string(),
        disks_ini: config.disk_source.path.display().to_string(),
        observation,
        decision,
    };

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &CheckReport) {
    let obs = &report.observation;

    println!("{}", "Drive check".white().bold());
    println!("  {:<16} {}", "Config:".dimmed(), report.config_path);
    println!("  {:<16} {}", "Disk source:".dimmed(), report.disks_ini);
    println!();

    println!("  {:<16} {}", "Spinning:".dimmed(), obs.spinning_count);
    println!("  {:<16} {}", "Temperatures:".dimmed(), obs.temps_observed);
    match obs.max_temperature {
        Some(t) => println!("  {:<16} {}", "Max temp:".dimmed(), format!("{:.1} °C", t).cyan()),
        None => println!("  {:<16} {}", "Max temp:".dimmed(), "unknown".yellow()),
    }
    if !obs.source_tag.is_empty() {
        println!("  {:<16} {}", "Sensor source:".dimmed(), obs.source_tag);
    }
    println!();

    println!(
        "  {:<16} {}",
        "Target duty:".dimmed(),
        format!("{}%", report.decision.duty).green().bold()
    );
    println!(
        "  {:<16} {} ({})",
        "Mode:".dimmed(),
        report.decision.mode.as_str(),
        report.decision.source.as_str()
    );
}
