use std::fs;

use spinfan::core::config::{Config, ConfigProvider, FileConfigProvider};
use spinfan::core::fan_control::curve::{ControlPoint, CurveMode};
use tempfile::TempDir;

#[test]
fn test_load_or_init_writes_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("spinfan").join("config.json");

    let config = Config::load_or_init(&path).unwrap();
    assert_eq!(config, Config::default());
    assert!(path.exists());

    // the written file parses back to the same values
    let reloaded = Config::load(&path).unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn test_saved_file_uses_wire_names() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    Config::default().save(&path).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["limits"]["min_pwm"], 25);
    assert_eq!(raw["unraid_disks_ini"]["poll_s"], 15);
    assert_eq!(raw["all_spun_down"]["after_pwm"], 25);
    assert_eq!(raw["curve"][0]["temp_c"], 0.0);
    assert_eq!(raw["curve_mode"], "linear");
    assert!(!temp_dir.path().join("config.json.tmp").exists());
}

#[test]
fn test_save_and_load_custom_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");

    let mut config = Config::default();
    config.curve = vec![ControlPoint::new(30.0, 30), ControlPoint::new(45.0, 90)];
    config.curve_mode = CurveMode::Steps;
    config.actuator_ip = "192.168.1.50".to_string();
    config.idle_override.enabled = true;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.curve, config.curve);
    assert_eq!(loaded.curve_mode, CurveMode::Steps);
    assert_eq!(loaded.actuator_ip, "192.168.1.50");
    assert!(loaded.idle_override.enabled);
}

#[test]
fn test_unparseable_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(Config::load(&path).is_err());
    assert_eq!(Config::load_or_init(&path).unwrap(), Config::default());
    // the broken file is left alone
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
}

#[test]
fn test_legacy_file_is_understood() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
            "mqtt": {"host": "broker.lan", "user": "fan", "pass": "pw"},
            "esp_ip": "10.0.0.9",
            "hysteresis_c": 2.5,
            "idle_when_all_spun_down": {"enabled": true, "after_pwm": 15},
            "unraid_disks_ini": {"path": "/tmp/disks.ini", "poll_s": 5}
        }"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.mqtt.host, "broker.lan");
    assert_eq!(config.mqtt.port, 1883);
    assert_eq!(config.mqtt.username, "fan");
    assert_eq!(config.actuator_ip, "10.0.0.9");
    assert_eq!(config.hysteresis_up, 2.5);
    assert_eq!(config.hysteresis_down, 2.5);
    assert_eq!(config.idle_override.after_duty, 15);
    assert_eq!(config.disk_source.poll_s, 5);
}

#[test]
fn test_file_provider_sees_edits() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    let provider = FileConfigProvider::new(path.clone());

    assert_eq!(provider.snapshot().limits.min_duty, 25);

    fs::write(&path, r#"{"limits": {"min_pwm": 40}}"#).unwrap();
    assert_eq!(provider.snapshot().limits.min_duty, 40);
    assert_eq!(provider.path(), path.as_path());
}
