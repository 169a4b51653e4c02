//! Observation model - the fixed set of named telemetry values published
//! to monitoring agents.

use crate::error::ObservationError;
use std::fmt;

pub const AVAIL: &str = "avail";
pub const BED_TEMP: &str = "bed_temp";
pub const EXT_TEMP: &str = "ext_temp";
pub const X_POS: &str = "x_pos";
pub const Y_POS: &str = "y_pos";
pub const Z_POS: &str = "z_pos";
pub const EXEC: &str = "exec";
pub const PROG: &str = "prog";
pub const FIL_STATUS: &str = "fil_status";
pub const PRINT_STATUS: &str = "print_status";
pub const PRINT_PROGRESS: &str = "print_progress";

/// Value published for `avail` on every successful cycle
pub const AVAILABLE: &str = "AVAILABLE";

/// Registration order of the standard observation set
const STANDARD: [(&str, ObservationKind); 11] = [
    (AVAIL, ObservationKind::Event),
    (BED_TEMP, ObservationKind::Sample),
    (EXT_TEMP, ObservationKind::Sample),
    (X_POS, ObservationKind::Sample),
    (Y_POS, ObservationKind::Sample),
    (Z_POS, ObservationKind::Sample),
    (EXEC, ObservationKind::Event),
    (PROG, ObservationKind::Event),
    (FIL_STATUS, ObservationKind::Event),
    (PRINT_STATUS, ObservationKind::Event),
    (PRINT_PROGRESS, ObservationKind::Sample),
];

/// Discrete (string) or continuous (numeric) observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    Event,
    Sample,
}

/// Current value of an observation
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationValue {
    Text(String),
    Number(f64),
    Unavailable,
}

impl ObservationValue {
    pub fn text(s: impl Into<String>) -> Self {
        ObservationValue::Text(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ObservationValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ObservationValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ObservationValue::Unavailable)
    }
}

impl fmt::Display for ObservationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationValue::Text(s) => f.write_str(s),
            ObservationValue::Number(n) => write!(f, "{}", n),
            ObservationValue::Unavailable => f.write_str("UNAVAILABLE"),
        }
    }
}

/// One named, typed telemetry value
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub name: &'static str,
    pub kind: ObservationKind,
    pub value: ObservationValue,
}

/// The process-lifetime registry of observations.
///
/// Built once at startup and mutated in place every cycle. Observations are
/// never added or removed after construction.
#[derive(Debug, Clone)]
pub struct ObservationSet {
    items: Vec<Observation>,
}

impl ObservationSet {
    /// The eleven observations exposed by the bridge, all `UNAVAILABLE`
    pub fn standard() -> Self {
        Self {
            items: STANDARD
                .iter()
                .map(|&(name, kind)| Observation {
                    name,
                    kind,
                    value: ObservationValue::Unavailable,
                })
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Observation> {
        self.items.iter().find(|o| o.name == name)
    }

    /// Update an observation, returning whether its value changed
    pub fn set(&mut self, name: &str, value: ObservationValue) -> Result<bool, ObservationError> {
        let item = self
            .items
            .iter_mut()
            .find(|o| o.name == name)
            .ok_or_else(|| ObservationError::Unknown(name.to_string()))?;

        if item.value == value {
            return Ok(false);
        }
        item.value = value;
        Ok(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for ObservationSet {
    fn default() -> Self {
        Self::standard()
    }
}
