//! Data models for machine status, parameters and tools
//!
//! This module provides:
//! - The machine state machine (IDLE, RUN, HOLD, ALARM)
//! - Machine status snapshots with alarm bookkeeping
//! - Named numeric machine parameters
//! - The static tool table
//! - Helpers for the loosely typed value maps exchanged with a backend

pub mod parameters;
pub mod tools;
pub mod value;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use value::ValueMap;

/// Machine state machine states
///
/// Represents the operational state of the (real or simulated) machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MachineState {
    /// Ready for commands
    #[default]
    Idle,
    /// Executing motion
    Run,
    /// Motion paused, awaiting resume
    Hold,
    /// Fault state, requires an explicit reset
    Alarm,
}

impl MachineState {
    /// Check if this state indicates active or paused motion
    pub fn is_busy(&self) -> bool {
        matches!(self, MachineState::Run | MachineState::Hold)
    }

    /// Check if this state indicates an error condition
    pub fn is_alarm(&self) -> bool {
        matches!(self, MachineState::Alarm)
    }

    /// Check if a transition from this state to `target` is valid.
    ///
    /// - Any state can enter Alarm (emergency stop, limit violation)
    /// - Alarm only leaves through a reset to Idle
    /// - Run and Hold toggle through feed hold
    /// - Run and Hold return to Idle when motion ends
    pub fn can_transition_to(&self, target: MachineState) -> bool {
        use MachineState::*;
        if *self == target {
            return true;
        }
        match (self, target) {
            (_, Alarm) => true,
            (Alarm, Idle) => true,
            (Alarm, _) => false,
            (Idle, Run) => true,
            (Idle, Hold) => false,
            (Run, Hold | Idle) => true,
            (Hold, Run | Idle) => true,
            _ => false,
        }
    }

    /// Upper-case wire name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Run => "RUN",
            Self::Hold => "HOLD",
            Self::Alarm => "ALARM",
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IDLE" => Ok(Self::Idle),
            "RUN" => Ok(Self::Run),
            "HOLD" => Ok(Self::Hold),
            "ALARM" => Ok(Self::Alarm),
            other => Err(format!("Unknown machine state: {}", other)),
        }
    }
}

/// Machine status snapshot
///
/// Mutated only by the machine (or simulator) that owns it; everyone else
/// reads clones. `state == Alarm` holds exactly when `alarm` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineStatus {
    /// X position
    pub x: f64,
    /// Y position
    pub y: f64,
    /// Z position
    pub z: f64,
    /// Current feed rate (units per minute)
    pub feed: f64,
    /// Current spindle speed (RPM)
    pub speed: f64,
    /// Current state
    pub state: MachineState,
    /// Alarm reason, empty when no alarm is active
    pub alarm: String,
    /// Spindle temperature in degrees Celsius
    pub temp: f64,
}

impl Default for MachineStatus {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            feed: 0.0,
            speed: 0.0,
            state: MachineState::Idle,
            alarm: String::new(),
            temp: 0.0,
        }
    }
}

impl MachineStatus {
    /// Create a new idle status at the origin
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the position
    pub fn with_position(mut self, x: f64, y: f64, z: f64) -> Self {
        self.x = x;
        self.y = y;
        self.z = z;
        self
    }

    /// Builder method to set the feed rate
    pub fn with_feed(mut self, feed: f64) -> Self {
        self.feed = feed;
        self
    }

    /// Builder method to set the spindle speed
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Builder method to set the temperature
    pub fn with_temp(mut self, temp: f64) -> Self {
        self.temp = temp;
        self
    }

    /// Current position as a tuple
    pub fn position(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    /// Enter the alarm state with a reason.
    ///
    /// An empty reason is replaced with a generic one so that the
    /// alarm/reason pairing always holds.
    pub fn raise_alarm(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.alarm = if reason.trim().is_empty() {
            "Alarm".to_string()
        } else {
            reason
        };
        self.state = MachineState::Alarm;
    }

    /// Leave the alarm state and return to idle.
    pub fn clear_alarm(&mut self) {
        self.alarm.clear();
        self.state = MachineState::Idle;
    }

    /// Move to a non-alarm state if the transition is allowed.
    ///
    /// Entering Alarm goes through [`MachineStatus::raise_alarm`] and leaving it
    /// through [`MachineStatus::clear_alarm`]; both are refused here.
    pub fn transition_to(&mut self, target: MachineState) -> bool {
        if target.is_alarm() || self.state.is_alarm() {
            return self.state == target;
        }
        if !self.state.can_transition_to(target) {
            return false;
        }
        self.state = target;
        true
    }

    /// Convert the snapshot into a value map (`x`, `y`, `z`, `feed`, `speed`, `state`, `alarm`, `temp`)
    pub fn to_value_map(&self) -> ValueMap {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => ValueMap::new(),
        }
    }

    /// Build a snapshot from a value map; missing fields take their defaults
    pub fn from_value_map(map: &ValueMap) -> Option<Self> {
        let mut status = Self::default();
        for (key, value) in map {
            match key.to_ascii_lowercase().as_str() {
                "x" => status.x = value::as_f64(value)?,
                "y" => status.y = value::as_f64(value)?,
                "z" => status.z = value::as_f64(value)?,
                "feed" => status.feed = value::as_f64(value)?,
                "speed" => status.speed = value::as_f64(value)?,
                "temp" => status.temp = value::as_f64(value)?,
                "state" => status.state = value.as_str()?.parse().ok()?,
                "alarm" => status.alarm = value.as_str().unwrap_or_default().to_string(),
                _ => {}
            }
        }
        Some(status)
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} X:{:.2} Y:{:.2} Z:{:.2} F:{:.0} S:{:.0}",
            self.state, self.x, self.y, self.z, self.feed, self.speed
        )?;
        if !self.alarm.is_empty() {
            write!(f, " ({})", self.alarm)?;
        }
        Ok(())
    }
}
