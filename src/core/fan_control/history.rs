use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// 60 samples at the 30 s history cadence is half an hour.
pub const DEFAULT_HISTORY_SIZE: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub ts: i64,
    pub temp: f64,
    #[serde(rename = "pwm")]
    pub duty: u8,
}

/// Circular buffer of temperature/duty samples (for the status graph)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<HistorySample>", from = "Vec<HistorySample>")]
pub struct DutyHistory {
    capacity: usize,
    samples: VecDeque<HistorySample>,
}

impl DutyHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a sample, dropping the oldest one when full.
    pub fn push(&mut self, sample: HistorySample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistorySample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&HistorySample> {
        self.samples.back()
    }

    pub fn to_vec(&self) -> Vec<HistorySample> {
        self.samples.iter().copied().collect()
    }
}

impl Default for DutyHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl From<DutyHistory> for Vec<HistorySample> {
    fn from(history: DutyHistory) -> Self {
        history.samples.into()
    }
}

impl From<Vec<HistorySample>> for DutyHistory {
    fn from(samples: Vec<HistorySample>) -> Self {
        let mut history = DutyHistory::new();
        for sample in samples {
            history.push(sample);
        }
        history
    }
}
