use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use spinfan::core::config::LiveQuery;
use spinfan::core::fan_control::disk_state::DiskCollector;
use spinfan::core::fan_control::smart::{ProbeOutcome, TemperatureProbe};
use tempfile::TempDir;

const DISKS_INI: &str = r#"["parity"]
name="parity"
device="sdb"
rotational="1"
spundown="0"
temp="36"
["disk1"]
name="disk1"
device="sdc"
rotational="1"
spundown="0"
temp="*"
["disk2"]
name="disk2"
device="sdd"
rotational="1"
spundown="1"
temp="*"
["cache"]
name="cache"
device="nvme0n1"
rotational="0"
spundown="0"
temp="51"
["flash"]
name="flash"
device="sda"
rotational="1"
spundown="0"
temp="30"
"#;

struct MapProbe(HashMap<String, ProbeOutcome>);

impl TemperatureProbe for MapProbe {
    fn query(&self, device: &str, _timeout: Duration) -> ProbeOutcome {
        self.0.get(device).cloned().unwrap_or(ProbeOutcome::NoReading)
    }
}

fn write_disks_ini(dir: &TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("disks.ini");
    fs::write(&path, text).unwrap();
    path
}

fn file_only() -> LiveQuery {
    LiveQuery {
        enabled: false,
        ..LiveQuery::default()
    }
}

#[test]
fn test_file_fallback_only() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_disks_ini(&temp_dir, DISKS_INI);
    let collector = DiskCollector::new(Box::new(MapProbe(HashMap::new())));

    let obs = collector.collect(&path, &file_only());

    // parity and disk1 spin; cache and flash are not array members
    assert_eq!(obs.spinning_count, 2);
    assert_eq!(obs.temps_observed, 1);
    assert_eq!(obs.max_temperature, Some(36.0));
    assert_eq!(obs.source_tag, "file-fallback");
}

#[test]
fn test_live_readings_take_precedence() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_disks_ini(&temp_dir, DISKS_INI);
    let probe = MapProbe(HashMap::from([
        ("sdc".to_string(), ProbeOutcome::Temperature(41.0)),
        ("sdd".to_string(), ProbeOutcome::Temperature(60.0)),
    ]));
    let collector = DiskCollector::new(Box::new(probe));

    let obs = collector.collect(&path, &LiveQuery::default());

    // sdb has no live reading and falls back to the file; sdd is spun down
    assert_eq!(obs.spinning_count, 2);
    assert_eq!(obs.temps_observed, 2);
    assert_eq!(obs.max_temperature, Some(41.0));
    assert_eq!(obs.source_tag, "live/file-fallback");
}

#[test]
fn test_permission_failure_warns_once_and_falls_back() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_disks_ini(&temp_dir, DISKS_INI);
    let probe = MapProbe(HashMap::from([
        ("sdb".to_string(), ProbeOutcome::PermissionDenied("rc=2".to_string())),
        ("sdc".to_string(), ProbeOutcome::PermissionDenied("rc=2".to_string())),
    ]));
    let collector = DiskCollector::new(Box::new(probe));

    let obs = collector.collect(&path, &LiveQuery::default());
    assert!(collector.permission_warning_logged());
    assert_eq!(obs.max_temperature, Some(36.0));
    assert_eq!(obs.source_tag, "file-fallback");
}

#[test]
fn test_missing_source_is_unavailable() {
    let temp_dir = TempDir::new().unwrap();
    let collector = DiskCollector::new(Box::new(MapProbe(HashMap::new())));

    let missing = temp_dir.path().join("nope.ini");
    let obs = collector.collect(&missing, &file_only());
    assert_eq!(obs.spinning_count, 0);
    assert_eq!(obs.max_temperature, None);

    // recovers once the file appears
    fs::write(&missing, DISKS_INI).unwrap();
    let obs = collector.collect(&missing, &file_only());
    assert_eq!(obs.spinning_count, 2);
}

#[test]
fn test_all_spun_down() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_disks_ini(
        &temp_dir,
        "[\"disk1\"]\nrotational=\"1\"\nspundown=\"1\"\ntemp=\"*\"\n",
    );
    let collector = DiskCollector::new(Box::new(MapProbe(HashMap::new())));

    let obs = collector.collect(&path, &LiveQuery::default());
    assert_eq!(obs.spinning_count, 0);
    assert_eq!(obs.temps_observed, 0);
    assert_eq!(obs.max_temperature, None);
    assert_eq!(obs.source_tag, "none");
}

#[cfg(unix)]
fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join(name);
    fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
const ATTRIBUTE_TABLE: &str = "\
echo 'ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE      UPDATED  WHEN_FAILED RAW_VALUE'\n\
echo '  9 Power_On_Hours          0x0032   088   088   000    Old_age   Always       -       9123'\n\
echo '194 Temperature_Celsius     0x0022   034   045   000    Old_age   Always       -       34'\n";

#[cfg(unix)]
#[test]
fn test_smartctl_compatible_script() {
    use spinfan::core::fan_control::smart::SmartctlProbe;

    let temp_dir = TempDir::new().unwrap();
    let reading = write_script(&temp_dir, "smartctl-ok", ATTRIBUTE_TABLE);
    let denied = write_script(
        &temp_dir,
        "smartctl-denied",
        "echo 'Smartctl open device: /dev/sdb failed: Permission denied' >&2\nexit 2\n",
    );
    // well past the pipe buffer before the attribute row shows up
    let chatty = write_script(
        &temp_dir,
        "smartctl-chatty",
        &format!("yes 'vendor specific log line' | head -n 8000\n{}", ATTRIBUTE_TABLE),
    );

    let timeout = Duration::from_secs(5);

    let probe = SmartctlProbe::new(reading.to_string_lossy());
    assert_eq!(probe.query("sdb", timeout), ProbeOutcome::Temperature(34.0));

    let probe = SmartctlProbe::new(denied.to_string_lossy());
    assert!(matches!(
        probe.query("sdb", timeout),
        ProbeOutcome::PermissionDenied(_)
    ));

    let probe = SmartctlProbe::new(chatty.to_string_lossy());
    let started = Instant::now();
    assert_eq!(probe.query("sdb", timeout), ProbeOutcome::Temperature(34.0));
    assert!(started.elapsed() < Duration::from_secs(3));

    let probe = SmartctlProbe::new(temp_dir.path().join("missing").to_string_lossy());
    assert!(matches!(probe.query("sdb", timeout), ProbeOutcome::Failed(_)));
}

#[cfg(unix)]
#[test]
fn test_slow_query_is_cut_off_at_timeout() {
    use spinfan::core::fan_control::smart::SmartctlProbe;

    let temp_dir = TempDir::new().unwrap();
    let hanging = write_script(&temp_dir, "smartctl-hang", "exec sleep 10\n");

    let probe = SmartctlProbe::new(hanging.to_string_lossy());
    let started = Instant::now();
    let outcome = probe.query("sdb", Duration::from_millis(500));
    let elapsed = started.elapsed();

    assert!(matches!(outcome, ProbeOutcome::Failed(_)), "{:?}", outcome);
    assert!(elapsed >= Duration::from_millis(500), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "{:?}", elapsed);
}

#[cfg(unix)]
#[test]
fn test_timed_out_drive_falls_back_to_file_value() {
    let temp_dir = TempDir::new().unwrap();
    let hanging = write_script(&temp_dir, "smartctl-hang", "exec sleep 10\n");
    let path = write_disks_ini(
        &temp_dir,
        "[\"disk1\"]\ndevice=\"sdb\"\nrotational=\"1\"\nspundown=\"0\"\ntemp=\"37\"\n",
    );

    let collector = DiskCollector::with_smartctl(&hanging.to_string_lossy());
    let live = LiveQuery {
        enabled: true,
        command: hanging.to_string_lossy().into_owned(),
        timeout_s: 1,
    };

    let started = Instant::now();
    let obs = collector.collect(&path, &live);

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(obs.spinning_count, 1);
    assert_eq!(obs.temps_observed, 1);
    assert_eq!(obs.max_temperature, Some(37.0));
    assert_eq!(obs.source_tag, "file-fallback");
    assert!(!collector.permission_warning_logged());
}
