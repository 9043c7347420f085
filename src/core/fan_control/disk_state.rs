//! Array disk state collection.
//!
//! The storage layer exports one bracketed record per device:
//!
//! ```text
//! ["disk1"]
//! name="disk1"
//! device="sdb"
//! rotational="1"
//! spundown="0"
//! temp="34"
//! ```
//!
//! Only array data and parity drives are considered. Cache, boot and transfer
//! devices are skipped by name, flash media by the rotational flag.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::smart::{ProbeOutcome, SmartctlProbe, TemperatureProbe};
use crate::core::config::LiveQuery;

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("static regex is valid"));

/// Device name prefixes that belong to the monitored array.
const ARRAY_PREFIXES: [&str; 2] = ["disk", "parity"];

/// Values the storage layer writes when it has no temperature.
const TEMPERATURE_PLACEHOLDERS: [&str; 2] = ["", "*"];

/// Raw fields of one device record. Every field is kept as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskRecord {
    pub name: String,
    pub rotational: Option<String>,
    pub spun_down: Option<String>,
    pub temperature: Option<String>,
    pub device: Option<String>,
}

impl DiskRecord {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Data disks (`disk1`, `disk2`, ...) and parity disks (`parity`, `parity2`).
    pub fn is_array_member(&self) -> bool {
        let name = self.name.to_ascii_lowercase();
        ARRAY_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
    }

    pub fn is_rotational(&self) -> bool {
        self.rotational.as_deref() == Some("1")
    }

    /// Only an explicit `spundown="0"` counts as spinning.
    pub fn is_spinning(&self) -> bool {
        self.spun_down.as_deref() == Some("0")
    }

    /// Temperature written by the storage layer, if it holds a number.
    pub fn reported_temperature(&self) -> Option<f64> {
        let raw = self.temperature.as_deref()?.trim();
        if TEMPERATURE_PLACEHOLDERS.contains(&raw) {
            return None;
        }
        parse_leading_number(raw)
    }
}

/// First numeric token in `text`, tolerating unit suffixes (`"34 C"`, `"41.5°"`).
pub fn parse_leading_number(text: &str) -> Option<f64> {
    LEADING_NUMBER
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

/// Split the disk state document into device records.
///
/// Lines outside a record, lines without `=`, and unknown keys are ignored.
pub fn parse_records(text: &str) -> Vec<DiskRecord> {
    let mut records = Vec::new();
    let mut current: Option<DiskRecord> = None;

    for line in text.lines() {
        let line = line.trim();

        if let Some(name) = line
            .strip_prefix("[\"")
            .and_then(|rest| rest.strip_suffix("\"]"))
        {
            if let Some(done) = current.replace(DiskRecord::new(name)) {
                records.push(done);
            }
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim().to_ascii_lowercase();
        let value = value.trim().trim_matches('"').to_string();

        match key.as_str() {
            "rotational" => record.rotational = Some(value),
            "spundown" => record.spun_down = Some(value),
            "temp" | "temperature" => record.temperature = Some(value),
            "device" => record.device = Some(value),
            _ => {}
        }
    }

    records.extend(current);
    records
}

/// Where a drive temperature came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TemperatureSource {
    Live,
    FileFallback,
}

impl TemperatureSource {
    pub fn label(&self) -> &'static str {
        match self {
            TemperatureSource::Live => "live",
            TemperatureSource::FileFallback => "file-fallback",
        }
    }
}

/// Aggregate result of one collector pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskObservation {
    pub spinning_count: u32,
    pub temps_observed: u32,
    pub max_temperature: Option<f64>,
    pub source_tag: String,
}

impl DiskObservation {
    /// Observation used when the disk state source cannot be read.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// Reads the disk state source and resolves drive temperatures.
pub struct DiskCollector {
    probe: Box<dyn TemperatureProbe>,
    permission_warned: AtomicBool,
    source_missing: AtomicBool,
}

impl DiskCollector {
    pub fn new(probe: Box<dyn TemperatureProbe>) -> Self {
        Self {
            probe,
            permission_warned: AtomicBool::new(false),
            source_missing: AtomicBool::new(false),
        }
    }

    /// Collector backed by `smartctl` (or a compatible binary).
    pub fn with_smartctl(program: &str) -> Self {
        Self::new(Box::new(SmartctlProbe::new(program)))
    }

    /// Run one pass over the source at `path`. Never fails.
    pub fn collect(&self, path: &Path, live: &LiveQuery) -> DiskObservation {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                if !self.source_missing.swap(true, Ordering::Relaxed) {
                    log::warn!("Disk state source {} unavailable: {}", path.display(), e);
                } else {
                    log::debug!("Disk state source {} still unavailable: {}", path.display(), e);
                }
                return DiskObservation::unavailable();
            }
        };

        if self.source_missing.swap(false, Ordering::Relaxed) {
            log::info!("Disk state source {} is readable again", path.display());
        }

        self.observe(&String::from_utf8_lossy(&bytes), live)
    }

    /// Aggregate already-loaded disk state text.
    pub fn observe(&self, text: &str, live: &LiveQuery) -> DiskObservation {
        let timeout = Duration::from_secs(live.timeout_s);
        let mut observation = DiskObservation::default();
        let mut sources = BTreeSet::new();

        let spinning = parse_records(text)
            .into_iter()
            .filter(|r| r.is_array_member() && r.is_rotational() && r.is_spinning());

        for record in spinning {
            observation.spinning_count += 1;

            let live_reading = match record.device.as_deref() {
                Some(device) if live.enabled && !device.is_empty() => {
                    self.live_temperature(device, timeout)
                }
                _ => None,
            };

            let reading = live_reading
                .map(|t| (t, TemperatureSource::Live))
                .or_else(|| {
                    record
                        .reported_temperature()
                        .map(|t| (t, TemperatureSource::FileFallback))
                });

            if let Some((temperature, source)) = reading {
                observation.temps_observed += 1;
                sources.insert(source);
                observation.max_temperature = Some(match observation.max_temperature {
                    Some(max) => max.max(temperature),
                    None => temperature,
                });
            }
        }

        observation.source_tag = if sources.is_empty() {
            "none".to_string()
        } else {
            sources
                .iter()
                .map(TemperatureSource::label)
                .collect::<Vec<_>>()
                .join("/")
        };

        observation
    }

    fn live_temperature(&self, device: &str, timeout: Duration) -> Option<f64> {
        match self.probe.query(device, timeout) {
            ProbeOutcome::Temperature(t) if t.is_finite() => Some(t),
            ProbeOutcome::Temperature(_) | ProbeOutcome::NoReading => None,
            ProbeOutcome::PermissionDenied(detail) => {
                if !self.permission_warned.swap(true, Ordering::Relaxed) {
                    log::warn!(
                        "SMART: query failed ({}). If this persists for active drives, \
                         check container privileges (needs --privileged and /dev mapping).",
                        detail
                    );
                }
                None
            }
            ProbeOutcome::Failed(reason) => {
                log::debug!("SMART query for {} failed: {}", device, reason);
                None
            }
        }
    }

    pub fn permission_warning_logged(&self) -> bool {
        self.permission_warned.load(Ordering::Relaxed)
    }
}
