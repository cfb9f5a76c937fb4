//! Soft-limit checks
//!
//! Inclusive bounds `0 <= v <= <AXIS>_MAX` per axis, taken from the
//! current machine parameters at the time of the check.

use cncterm_core::MachineParameters;

/// Axis bounds snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftLimits {
    /// X travel
    pub x_max: f64,
    /// Y travel
    pub y_max: f64,
    /// Z travel
    pub z_max: f64,
}

impl SoftLimits {
    /// Read the bounds from a parameter table
    pub fn from_parameters(params: &MachineParameters) -> Self {
        Self {
            x_max: params.axis_max('X').unwrap_or(0.0),
            y_max: params.axis_max('Y').unwrap_or(0.0),
            z_max: params.axis_max('Z').unwrap_or(0.0),
        }
    }

    /// Whether a target lies inside the work envelope
    pub fn contains(&self, x: f64, y: f64, z: f64) -> bool {
        within(x, self.x_max) && within(y, self.y_max) && within(z, self.z_max)
    }

    /// Check a target, returning the alarm reason on violation
    pub fn check(&self, x: f64, y: f64, z: f64) -> Result<(), String> {
        if self.contains(x, y, z) {
            Ok(())
        } else {
            Err(violation_reason(x, y, z))
        }
    }
}

fn within(value: f64, max: f64) -> bool {
    value.is_finite() && (0.0..=max).contains(&value)
}

/// Alarm reason for a rejected target
pub fn violation_reason(x: f64, y: f64, z: f64) -> String {
    format!("Soft limit triggered at X:{:.2} Y:{:.2} Z:{:.2}", x, y, z)
}
