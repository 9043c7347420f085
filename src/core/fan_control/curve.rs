//! Temperature → duty curve evaluation.
//!
//! A curve is a list of control points sorted by temperature. Below the first
//! point and above the last one the curve is flat; in between it is either
//! linearly interpolated or held as a staircase.

use serde::{Deserialize, Serialize};

/// A single temperature/duty pair on the fan curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    #[serde(rename = "temp_c")]
    pub temperature: f64,
    #[serde(rename = "pwm")]
    pub duty: u8,
}

impl ControlPoint {
    pub const fn new(temperature: f64, duty: u8) -> Self {
        Self { temperature, duty }
    }
}

/// How duty values between two control points are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveMode {
    #[default]
    Linear,
    Steps,
}

impl CurveMode {
    /// Parse a mode name, case-insensitively. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "linear" => Some(CurveMode::Linear),
            "steps" | "step" => Some(CurveMode::Steps),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CurveMode::Linear => "linear",
            CurveMode::Steps => "steps",
        }
    }
}

/// Built-in curve used whenever the configured one is empty or unusable.
pub const DEFAULT_CURVE: [ControlPoint; 4] = [
    ControlPoint::new(0.0, 25),
    ControlPoint::new(40.0, 50),
    ControlPoint::new(43.0, 75),
    ControlPoint::new(50.0, 100),
];

pub fn default_curve() -> Vec<ControlPoint> {
    DEFAULT_CURVE.to_vec()
}

/// Evaluate the duty (in percent) for `temperature`.
///
/// `curve` must be non-empty and sorted by temperature; the config layer
/// guarantees both. An empty slice yields the first default point's duty so
/// the function stays total.
pub fn evaluate(temperature: f64, curve: &[ControlPoint], mode: CurveMode) -> f64 {
    let (Some(first), Some(last)) = (curve.first(), curve.last()) else {
        return f64::from(DEFAULT_CURVE[0].duty);
    };

    if temperature <= first.temperature {
        return f64::from(first.duty);
    }
    if temperature >= last.temperature {
        return f64::from(last.duty);
    }

    for pair in curve.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if temperature > hi.temperature {
            continue;
        }

        let (t0, p0) = (lo.temperature, f64::from(lo.duty));
        let (t1, p1) = (hi.temperature, f64::from(hi.duty));

        return match mode {
            CurveMode::Steps => p0,
            CurveMode::Linear if t1 == t0 => p1,
            CurveMode::Linear => p0 + (temperature - t0) / (t1 - t0) * (p1 - p0),
        };
    }

    f64::from(last.duty)
}

/// Clamp `value` into `[lo, hi]`.
///
/// Unlike `f64::clamp` this never panics: with `lo > hi` the lower bound wins.
pub fn clamp_duty(value: f64, lo: f64, hi: f64) -> f64 {
    lo.max(hi.min(value))
}
