use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use super::config_path;
use crate::core::fan_control::curve::{clamp_duty, evaluate};
use crate::core::Config;

const TABLE_FROM_C: i32 = 20;
const TABLE_TO_C: i32 = 60;
const TABLE_STEP_C: usize = 2;

/// Curve value at `temperature`, rounded and clamped to the configured limits.
pub fn duty_at(config: &Config, temperature: f64) -> u8 {
    let raw = evaluate(temperature, &config.curve, config.curve_mode);
    clamp_duty(
        raw.round(),
        f64::from(config.limits.min_duty),
        f64::from(config.limits.max_duty),
    ) as u8
}

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let path = config_path(matches)?;
    let config = Config::load_or_init(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;

    if let Some(temperature) = matches.get_one::<f64>("temp") {
        println!("{}", duty_at(&config, *temperature));
        return Ok(());
    }

    println!(
        "{} ({} mode, limits {}-{}%)",
        "Fan curve".white().bold(),
        config.curve_mode.as_str(),
        config.limits.min_duty,
        config.limits.max_duty
    );
    for point in &config.curve {
        println!(
            "  {} {:>5.1} °C → {:>3}%",
            "•".dimmed(),
            point.temperature,
            point.duty
        );
    }
    println!();

    println!("  {:>6}  {:>6}", "Temp".dimmed(), "Duty".dimmed());
    for temperature in (TABLE_FROM_C..=TABLE_TO_C).step_by(TABLE_STEP_C) {
        let duty = duty_at(&config, f64::from(temperature));
        println!("  {:>4} °C  {:>5}%", temperature, duty.to_string().cyan());
    }

    Ok(())
}
