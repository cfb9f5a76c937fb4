//! Named numeric machine parameters
//!
//! The parameter set is fixed when the machine is created; updates may
//! change values but never add keys. Keys are stored upper-case and
//! matched case-insensitively.

use crate::error::MachineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// X axis soft limit
pub const X_MAX: &str = "X_MAX";
/// Y axis soft limit
pub const Y_MAX: &str = "Y_MAX";
/// Z axis soft limit
pub const Z_MAX: &str = "Z_MAX";
/// Feed used when a motion command gives no `F` word
pub const DEFAULT_FEED: &str = "DEFAULT_FEED";
/// Spindle speed ceiling
pub const MAX_SPINDLE: &str = "MAX_SPINDLE";

/// Machine parameter table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineParameters {
    values: BTreeMap<String, f64>,
}

impl MachineParameters {
    /// Create the standard parameter set
    pub fn new(x_max: f64, y_max: f64, z_max: f64, default_feed: f64, max_spindle: f64) -> Self {
        let values = [
            (X_MAX, x_max),
            (Y_MAX, y_max),
            (Z_MAX, z_max),
            (DEFAULT_FEED, default_feed),
            (MAX_SPINDLE, max_spindle),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self { values }
    }

    /// Look up a parameter value
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(&key.trim().to_ascii_uppercase()).copied()
    }

    /// Look up a parameter value, falling back to `default` when absent
    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }

    /// Update an existing parameter.
    ///
    /// Returns the canonical key on success.
    pub fn set(&mut self, key: &str, value: f64) -> Result<String, MachineError> {
        let canonical = key.trim().to_ascii_uppercase();
        if !value.is_finite() {
            return Err(MachineError::InvalidParameterValue {
                key: canonical,
                value: value.to_string(),
            });
        }
        match self.values.get_mut(&canonical) {
            Some(slot) => {
                *slot = value;
                Ok(canonical)
            }
            None => Err(MachineError::UnknownParameter {
                key: key.trim().to_string(),
            }),
        }
    }

    /// Soft limit for an axis letter (`X`, `Y`, `Z`)
    pub fn axis_max(&self, axis: char) -> Option<f64> {
        match axis.to_ascii_uppercase() {
            'X' => self.get(X_MAX),
            'Y' => self.get(Y_MAX),
            'Z' => self.get(Z_MAX),
            _ => None,
        }
    }

    /// Iterate parameters in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for MachineParameters {
    fn default() -> Self {
        Self::new(500.0, 500.0, 100.0, 1000.0, 12000.0)
    }
}
