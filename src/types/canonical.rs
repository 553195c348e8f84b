//! Canonical cell forms used for order-independent result comparison.
//!
//! A canonical cell is totally ordered and hashable, so a row of canonical
//! cells can serve as a sort key and a bag of rows can be compared as a
//! multiset by sorting.

use crate::types::value::{CellValue, Temporal};
use serde::Serialize;

/// Comparable, totally ordered form of a [`CellValue`].
///
/// Variant order defines the sort order across types (NULL first).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CanonicalCell {
    Null,
    Boolean(bool),
    /// Fixed-point value scaled by `10^decimal_places`
    Number(i128),
    /// Float too large for the fixed-point form, or infinite, keyed by
    /// its IEEE 754 total order
    Float(i64),
    NotANumber,
    Temporal(String),
    Text(String),
}

/// Per-column normalization decided from both sides of a comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnPolicy {
    /// Column holds date/time values on at least one side
    pub temporal: bool,
    /// At least one side omits time-of-day, so compare dates only
    pub date_precision: bool,
}

impl ColumnPolicy {
    /// Fold one cell into the policy.
    pub fn observe(&mut self, cell: &CellValue) {
        if let CellValue::Timestamp(temporal) = cell {
            self.temporal = true;
            if temporal.is_date_only() {
                self.date_precision = true;
            }
        }
    }

    /// Second pass for text cells, once the column is known to be temporal.
    pub fn observe_text(&mut self, cell: &CellValue) {
        if !self.temporal {
            return;
        }
        if let CellValue::Text(text) = cell {
            if Temporal::parse(text).is_some_and(|t| t.is_date_only()) {
                self.date_precision = true;
            }
        }
    }
}

/// 2^127; scaled floats at or beyond it do not fit in i128.
const I128_LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

/// Map a float to an integer whose order matches `f64::total_cmp`.
fn total_order_key(v: f64) -> i64 {
    let bits = v.to_bits() as i64;
    bits ^ (((bits >> 63) as u64) >> 1) as i64
}

/// Converts cells to canonical form with a fixed numeric precision.
#[derive(Debug, Clone, Copy)]
pub struct Canonicalizer {
    decimal_places: u32,
}

impl Canonicalizer {
    /// Create a canonicalizer rounding numbers to `decimal_places`.
    pub fn new(decimal_places: u32) -> Self {
        // 10^18 scaled i64 values still fit in i128
        Self {
            decimal_places: decimal_places.min(18),
        }
    }

    /// Canonicalize one cell under its column policy.
    ///
    /// # Rules
    ///
    /// - Integer and Float share one numeric domain, rounded to the
    ///   configured decimal places
    /// - Temporal values render as ISO strings, at date precision when the
    ///   column policy says so
    /// - Text in a temporal column is parsed as a date/time when possible
    /// - Text otherwise stays case-sensitive
    pub fn canonicalize(&self, cell: &CellValue, policy: ColumnPolicy) -> CanonicalCell {
        match cell {
            CellValue::Null => CanonicalCell::Null,
            CellValue::Boolean(v) => CanonicalCell::Boolean(*v),
            CellValue::Integer(v) => {
                CanonicalCell::Number(i128::from(*v) * 10i128.pow(self.decimal_places))
            }
            CellValue::Float(v) if v.is_nan() => CanonicalCell::NotANumber,
            CellValue::Float(v) => {
                let scaled = (v * 10f64.powi(self.decimal_places as i32)).round();
                if scaled.is_finite() && scaled.abs() < I128_LIMIT {
                    // -0.0 becomes 0
                    CanonicalCell::Number(scaled as i128)
                } else {
                    CanonicalCell::Float(total_order_key(*v))
                }
            }
            CellValue::Timestamp(temporal) => {
                CanonicalCell::Temporal(temporal.canonical(policy.date_precision))
            }
            CellValue::Text(text) if policy.temporal => match Temporal::parse(text) {
                Some(temporal) => {
                    CanonicalCell::Temporal(temporal.canonical(policy.date_precision))
                }
                None => CanonicalCell::Text(text.clone()),
            },
            CellValue::Text(text) => CanonicalCell::Text(text.clone()),
        }
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(6)
    }
}
