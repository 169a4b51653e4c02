//! Telemetry Translator
//!
//! Maps a raw printer status document onto the fixed observation schema.
//! The mapping is a table of [`FieldRule`]s interpreted by [`translate`]:
//! every rule is defaulted independently, so a missing or malformed
//! subsystem never affects the others and translation never fails.

use crate::observation::{
    ObservationKind, ObservationValue, BED_TEMP, EXEC, EXT_TEMP, FIL_STATUS, PRINT_PROGRESS,
    PRINT_STATUS, PROG, X_POS, Y_POS, Z_POS,
};
use crate::status::RawStatus;
use serde_json::Value;

/// How a value is pulled out of `object.field`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extract {
    /// Numeric field
    Number { default: f64 },
    /// Element of a numeric sequence
    Element { index: usize, default: f64 },
    /// String field
    Text { default: &'static str },
    /// Boolean field rendered as one of two words
    Flag { on: &'static str, off: &'static str },
}

/// Post-processing applied to the extracted value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    UpperCase,
    /// Fraction 0..1 to percent with one decimal place
    Percent,
}

/// One row of the translation table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: ObservationKind,
    pub object: &'static str,
    pub field: &'static str,
    pub extract: Extract,
    pub transform: Transform,
}

/// A translated observation value
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub name: &'static str,
    pub kind: ObservationKind,
    pub value: ObservationValue,
}

const FILAMENT_SENSOR: &str = "filament_switch_sensor filament_sensor";

/// The translation table, in publish order.
///
/// The fourth toolhead coordinate (extruder position) is not published.
pub const FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        name: EXT_TEMP,
        kind: ObservationKind::Sample,
        object: "extruder",
        field: "temperature",
        extract: Extract::Number { default: 0.0 },
        transform: Transform::Identity,
    },
    FieldRule {
        name: BED_TEMP,
        kind: ObservationKind::Sample,
        object: "heater_bed",
        field: "temperature",
        extract: Extract::Number { default: 0.0 },
        transform: Transform::Identity,
    },
    FieldRule {
        name: X_POS,
        kind: ObservationKind::Sample,
        object: "toolhead",
        field: "position",
        extract: Extract::Element { index: 0, default: 0.0 },
        transform: Transform::Identity,
    },
    FieldRule {
        name: Y_POS,
        kind: ObservationKind::Sample,
        object: "toolhead",
        field: "position",
        extract: Extract::Element { index: 1, default: 0.0 },
        transform: Transform::Identity,
    },
    FieldRule {
        name: Z_POS,
        kind: ObservationKind::Sample,
        object: "toolhead",
        field: "position",
        extract: Extract::Element { index: 2, default: 0.0 },
        transform: Transform::Identity,
    },
    FieldRule {
        name: EXEC,
        kind: ObservationKind::Event,
        object: "print_stats",
        field: "state",
        extract: Extract::Text { default: "standby" },
        transform: Transform::UpperCase,
    },
    FieldRule {
        name: PROG,
        kind: ObservationKind::Event,
        object: "print_stats",
        field: "filename",
        extract: Extract::Text { default: "NONE" },
        transform: Transform::Identity,
    },
    FieldRule {
        name: PRINT_PROGRESS,
        kind: ObservationKind::Sample,
        object: "virtual_sdcard",
        field: "progress",
        extract: Extract::Number { default: 0.0 },
        transform: Transform::Percent,
    },
    FieldRule {
        name: PRINT_STATUS,
        kind: ObservationKind::Event,
        object: "display_status",
        field: "message",
        extract: Extract::Text { default: "Idle" },
        transform: Transform::Identity,
    },
    FieldRule {
        name: FIL_STATUS,
        kind: ObservationKind::Event,
        object: FILAMENT_SENSOR,
        field: "filament_detected",
        extract: Extract::Flag { on: "LOADED", off: "OUT" },
        transform: Transform::Identity,
    },
];

/// Translate a status document into one reading per table rule
pub fn translate(status: &RawStatus) -> Vec<Reading> {
    FIELD_RULES.iter().map(|rule| apply(rule, status)).collect()
}

/// Apply a single rule
pub fn apply(rule: &FieldRule, status: &RawStatus) -> Reading {
    let raw = status.field(rule.object, rule.field);
    let value = transform(rule.transform, extract(rule.extract, raw));
    Reading {
        name: rule.name,
        kind: rule.kind,
        value,
    }
}

/// Printer objects the table reads, deduplicated, in table order
pub fn queried_objects() -> Vec<&'static str> {
    let mut objects: Vec<&'static str> = Vec::new();
    for rule in FIELD_RULES {
        if !objects.contains(&rule.object) {
            objects.push(rule.object);
        }
    }
    objects
}

fn extract(extract: Extract, raw: Option<&Value>) -> ObservationValue {
    match extract {
        Extract::Number { default } => {
            ObservationValue::Number(raw.and_then(Value::as_f64).unwrap_or(default))
        }
        Extract::Element { index, default } => ObservationValue::Number(
            raw.and_then(Value::as_array)
                .and_then(|seq| seq.get(index))
                .and_then(Value::as_f64)
                .unwrap_or(default),
        ),
        Extract::Text { default } => {
            ObservationValue::text(raw.and_then(Value::as_str).unwrap_or(default))
        }
        Extract::Flag { on, off } => {
            let detected = raw.and_then(Value::as_bool).unwrap_or(false);
            ObservationValue::text(if detected { on } else { off })
        }
    }
}

fn transform(transform: Transform, value: ObservationValue) -> ObservationValue {
    match (transform, value) {
        (Transform::Identity, value) => value,
        (Transform::UpperCase, ObservationValue::Text(s)) => ObservationValue::Text(s.to_uppercase()),
        (Transform::Percent, ObservationValue::Number(fraction)) => {
            ObservationValue::Number(round_to_tenth(fraction * 100.0))
        }
        (_, value) => value,
    }
}

/// Round to one decimal place from the exact binary value (0.05 -> 0.1)
fn round_to_tenth(value: f64) -> f64 {
    format!("{:.1}", value).parse().unwrap_or(value)
}
