//! Target duty decision.
//!
//! Precedence, first match wins:
//!
//! 1. idle override (no drive spinning)
//! 2. no temperature: hold the last duty, or fall back to the minimum
//! 3. curve value, clamped to the limits, subject to hysteresis
//!
//! Hysteresis is measured against the last *accepted* temperature band, so a
//! temperature wobbling around one curve point cannot re-trigger small moves.

use serde::{Deserialize, Serialize};

use super::curve::{clamp_duty, evaluate};
use super::disk_state::DiskObservation;
use crate::core::config::Config;

/// Decision history carried from one cycle to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecisionState {
    pub last_duty: Option<u8>,
    pub last_temp_band: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    Idle,
    NoTempHold,
    NoTempMin,
    HysteresisHold,
    Normal,
}

impl DecisionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionMode::Idle => "idle",
            DecisionMode::NoTempHold => "no_temp_hold",
            DecisionMode::NoTempMin => "no_temp_min",
            DecisionMode::HysteresisHold => "hysteresis_hold",
            DecisionMode::Normal => "normal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    IdleOverride,
    HoldLast,
    MinDuty,
    Hysteresis,
    Curve,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::IdleOverride => "idle_override",
            DecisionSource::HoldLast => "hold_last",
            DecisionSource::MinDuty => "min_duty",
            DecisionSource::Hysteresis => "hysteresis",
            DecisionSource::Curve => "curve",
        }
    }
}

/// Outcome of one decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub duty: u8,
    pub mode: DecisionMode,
    pub source: DecisionSource,
}

impl Decision {
    fn new(duty: u8, mode: DecisionMode, source: DecisionSource) -> Self {
        Self { duty, mode, source }
    }
}

/// Compute the next target duty and record it in `state`.
///
/// `state.last_duty` is updated on every path. `state.last_temp_band` only
/// moves when a curve value is accepted.
pub fn decide(config: &Config, observation: &DiskObservation, state: &mut DecisionState) -> Decision {
    let decision = next_decision(config, observation, state);
    state.last_duty = Some(decision.duty);
    decision
}

fn next_decision(
    config: &Config,
    observation: &DiskObservation,
    state: &mut DecisionState,
) -> Decision {
    let limits = config.limits;

    // The override bypasses the limits on purpose.
    let idle = config.idle_override;
    if idle.enabled && observation.spinning_count == 0 {
        return Decision::new(idle.after_duty, DecisionMode::Idle, DecisionSource::IdleOverride);
    }

    let Some(temperature) = observation.max_temperature else {
        return match state.last_duty {
            Some(last) => Decision::new(last, DecisionMode::NoTempHold, DecisionSource::HoldLast),
            None => Decision::new(limits.min_duty, DecisionMode::NoTempMin, DecisionSource::MinDuty),
        };
    };

    let raw = evaluate(temperature, &config.curve, config.curve_mode);
    let clamped = clamp_duty(raw, f64::from(limits.min_duty), f64::from(limits.max_duty));
    let candidate = clamped.round().clamp(0.0, 100.0) as u8;

    if let (Some(band), Some(last)) = (state.last_temp_band, state.last_duty) {
        let diff = temperature - band;
        let h = if diff >= 0.0 {
            config.hysteresis_up
        } else {
            config.hysteresis_down
        };

        if h > 0.0 && diff.abs() < h {
            return Decision::new(last, DecisionMode::HysteresisHold, DecisionSource::Hysteresis);
        }
    }

    state.last_temp_band = Some(temperature);
    Decision::new(candidate, DecisionMode::Normal, DecisionSource::Curve)
}
