use std::fs;
use std::process::Command;

use spinfan::commands::check::run_check;
use spinfan::commands::curve::duty_at;
use spinfan::core::config::Config;
use spinfan::core::fan_control::decision::DecisionMode;
use spinfan::core::fan_control::disk_state::DiskCollector;
use tempfile::TempDir;

fn spinfan() -> Command {
    Command::new(env!("CARGO_BIN_EXE_spinfan"))
}

#[test]
fn test_check_reads_source_once() {
    let temp_dir = TempDir::new().unwrap();
    let ini = temp_dir.path().join("disks.ini");
    fs::write(
        &ini,
        "[\"disk1\"]\nrotational=\"1\"\nspundown=\"0\"\ntemp=\"43\"\n",
    )
    .unwrap();

    let mut config = Config::default();
    config.disk_source.path = ini;
    config.live_query.enabled = false;

    let collector = DiskCollector::with_smartctl("smartctl");
    let (observation, decision) = run_check(&config, &collector);

    assert_eq!(observation.spinning_count, 1);
    assert_eq!(observation.max_temperature, Some(43.0));
    assert_eq!(decision.duty, 75);
    assert_eq!(decision.mode, DecisionMode::Normal);
}

#[test]
fn test_curve_steps_mode() {
    let mut config = Config::default();
    config.curve_mode = spinfan::core::fan_control::CurveMode::Steps;

    assert_eq!(duty_at(&config, 39.9), 25);
    assert_eq!(duty_at(&config, 42.0), 50);
    assert_eq!(duty_at(&config, 49.0), 75);
    assert_eq!(duty_at(&config, 50.0), 100);
}

#[test]
fn test_cli_version() {
    let output = spinfan().arg("version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_config_init_and_show() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");

    let output = spinfan()
        .args(["config", "init", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(path.exists());

    let output = spinfan()
        .args(["config", "show", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["limits"]["max_pwm"], 100);
}

#[test]
fn test_cli_curve_single_temperature() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{"curve": [{"temp_c": 30, "pwm": 30}, {"temp_c": 50, "pwm": 90}]}"#).unwrap();

    let output = spinfan()
        .args(["curve", "--temp", "40", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "60");
}

#[test]
fn test_cli_check_json() {
    let temp_dir = TempDir::new().unwrap();
    let ini = temp_dir.path().join("disks.ini");
    let path = temp_dir.path().join("config.json");
    fs::write(&ini, "[\"parity\"]\nrotational=\"1\"\nspundown=\"1\"\n").unwrap();
    fs::write(
        &path,
        serde_json::json!({
            "unraid_disks_ini": {"path": ini},
            "live_query": {"enabled": false},
            "all_spun_down": {"enabled": true, "after_pwm": 20}
        })
        .to_string(),
    )
    .unwrap();

    let output = spinfan()
        .args(["check", "--json", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["observation"]["spinning_count"], 0);
    assert_eq!(report["decision"]["duty"], 20);
    assert_eq!(report["decision"]["mode"], "idle");
}
