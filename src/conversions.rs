//! ==============================================================================
//! conversions.rs - unit conversion and precision truncation
//! ==============================================================================
//!
//! purpose:
//!     pure numeric transforms applied to sensor values before they are stored.
//!     - truncate(): floor-quantize a value to a precision step
//!     - ConversionTable: ordered (from, to) unit pair -> conversion function
//!
//! relationships:
//!     - used by: store.rs (every accepted update runs through here)
//!
//! notes:
//!     each direction of a conversion is registered on its own. nothing is
//!     inferred from its inverse, so a table may hold A->B without B->A.
//!     unknown pairs and missing units are identity, never errors.
//!
//! ==============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

/// a single-direction numeric conversion
pub type ConversionFn = fn(f64) -> f64;

/// quantize `value` down to a multiple of `step`
///
/// floor-based, so negative values move away from zero:
/// `truncate(-19.343, 0.01) == -19.35`. a non-positive step disables
/// truncation and returns the value unchanged.
pub fn truncate(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    (value / step).floor() * step
}

pub fn celsius_to_fahrenheit(value: f64) -> f64 {
    value * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(value: f64) -> f64 {
    (value - 32.0) * 5.0 / 9.0
}

pub fn meters_to_feet(value: f64) -> f64 {
    value * 3.28084
}

pub fn feet_to_meters(value: f64) -> f64 {
    value / 3.28084
}

// ==============================================================================
// conversion table
// ==============================================================================

/// registry of unit conversions keyed by the ordered pair (from, to)
#[derive(Debug, Clone, Default)]
pub struct ConversionTable {
    entries: HashMap<(String, String), ConversionFn>,
}

impl ConversionTable {
    /// an empty table; every lookup is identity
    pub fn new() -> Self {
        Self::default()
    }

    /// table with the temperature and length conversions the dashboard ships with
    ///
    /// symbolic (`°C`) and ascii (`C`) spellings are separate keys.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.register("°C", "°F", celsius_to_fahrenheit);
        table.register("°F", "°C", fahrenheit_to_celsius);
        table.register("C", "F", celsius_to_fahrenheit);
        table.register("F", "C", fahrenheit_to_celsius);
        table.register("m", "ft", meters_to_feet);
        table.register("ft", "m", feet_to_meters);
        table
    }

    /// register (or replace) the conversion for one direction
    pub fn register(&mut self, from: &str, to: &str, f: ConversionFn) {
        self.entries.insert((from.to_string(), to.to_string()), f);
    }

    fn lookup(&self, from: &str, to: &str) -> Option<ConversionFn> {
        self.entries
            .get(&(from.to_string(), to.to_string()))
            .copied()
    }

    /// convert `value` from `unit_in` to `unit_out`
    ///
    /// identity when either unit is absent, when they are equal, or when no
    /// conversion is registered for the pair.
    pub fn convert(&self, value: f64, unit_in: Option<&str>, unit_out: Option<&str>) -> f64 {
        let (Some(from), Some(to)) = (unit_in, unit_out) else {
            return value;
        };
        if from == to {
            return value;
        }
        match self.lookup(from, to) {
            Some(f) => f(value),
            None => value,
        }
    }

    /// whether `convert` would do anything other than pass through
    ///
    /// equal units count as convertible; an absent unit does not.
    pub fn has_conversion(&self, unit_in: Option<&str>, unit_out: Option<&str>) -> bool {
        let (Some(from), Some(to)) = (unit_in, unit_out) else {
            return false;
        };
        from == to || self.lookup(from, to).is_some()
    }
}

static BUILTIN: OnceLock<ConversionTable> = OnceLock::new();

/// the process-wide builtin table
pub fn builtin_table() -> &'static ConversionTable {
    BUILTIN.get_or_init(ConversionTable::builtin)
}

/// convert with the builtin table
pub fn convert(value: f64, unit_in: Option<&str>, unit_out: Option<&str>) -> f64 {
    builtin_table().convert(value, unit_in, unit_out)
}

/// capability check against the builtin table
pub fn has_conversion(unit_in: Option<&str>, unit_out: Option<&str>) -> bool {
    builtin_table().has_conversion(unit_in, unit_out)
}
