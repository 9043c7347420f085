//! Shared runtime state.
//!
//! The poll loop is the only writer; the status surface reads copies. Every
//! write happens under one lock so a reader never sees fields from two
//! different cycles.

use parking_lot::Mutex;
use serde::Serialize;

use super::decision::Decision;
use super::disk_state::DiskObservation;
use super::history::{DutyHistory, HistorySample};

/// Everything one decision cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub observation: DiskObservation,
    pub decision: Decision,
    pub at: i64,
}

/// Point-in-time copy of the controller state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeSnapshot {
    #[serde(rename = "max_temp")]
    pub max_temperature: Option<f64>,
    pub spinning_disks: Option<u32>,
    #[serde(rename = "temps_seen")]
    pub temps_observed: Option<u32>,
    #[serde(rename = "target_pwm")]
    pub target_duty: Option<u8>,
    pub mode: String,
    pub source: String,
    pub sensor_source: String,
    pub updated_at: Option<i64>,
    pub updated_age_s: Option<i64>,
    pub actuator_online: bool,
    pub publisher_connected: bool,
    pub history: DutyHistory,
}

impl Default for RuntimeSnapshot {
    fn default() -> Self {
        Self {
            max_temperature: None,
            spinning_disks: None,
            temps_observed: None,
            target_duty: None,
            mode: "boot".to_string(),
            source: "boot".to_string(),
            sensor_source: String::new(),
            updated_at: None,
            updated_age_s: None,
            actuator_online: false,
            publisher_connected: false,
            history: DutyHistory::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RuntimeStore {
    inner: Mutex<RuntimeSnapshot>,
}

impl RuntimeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply all fields of one cycle at once.
    pub fn publish(&self, report: &CycleReport) {
        let mut state = self.inner.lock();
        state.max_temperature = report.observation.max_temperature;
        state.spinning_disks = Some(report.observation.spinning_count);
        state.temps_observed = Some(report.observation.temps_observed);
        state.target_duty = Some(report.decision.duty);
        state.mode = report.decision.mode.as_str().to_string();
        state.source = report.decision.source.as_str().to_string();
        state.sensor_source = report.observation.source_tag.clone();
        state.updated_at = Some(report.at);
        state.updated_age_s = Some(0);
    }

    pub fn read(&self) -> RuntimeSnapshot {
        self.inner.lock().clone()
    }

    pub fn append_history(&self, sample: HistorySample) {
        self.inner.lock().history.push(sample);
    }

    /// Record the current temperature and duty, if a temperature is known.
    pub fn sample_history(&self, now: i64) -> Option<HistorySample> {
        let mut state = self.inner.lock();
        let sample = HistorySample {
            ts: now,
            temp: state.max_temperature?,
            duty: state.target_duty.unwrap_or(0),
        };
        state.history.push(sample);
        Some(sample)
    }

    /// Recompute the age of the last update from the wall clock.
    pub fn refresh_age(&self, now: i64) {
        let mut state = self.inner.lock();
        if let Some(updated_at) = state.updated_at {
            state.updated_age_s = Some((now - updated_at).max(0));
        }
    }

    pub fn set_actuator_online(&self, online: bool) {
        self.inner.lock().actuator_online = online;
    }

    pub fn set_publisher_connected(&self, connected: bool) {
        self.inner.lock().publisher_connected = connected;
    }
}
