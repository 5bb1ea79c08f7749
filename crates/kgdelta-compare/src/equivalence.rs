//! Pluggable value equivalence.
//!
//! Resources are equivalent when the correspondence engine says they refer
//! to the same real-world entity; literals are equivalent under a tolerant
//! equality that can bridge datatype boundaries: date vs dateTime at day
//! granularity, language-tagged vs untagged strings, and numeric subtypes
//! compared by value (including IEEE-754 specials).

use chrono::NaiveDate;
use kgdelta_engine::CorrespondenceStore;
use kgdelta_model::{Literal, Value};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Capability seam the value comparator is parameterized over.
pub trait ValueEquivalence {
    fn equivalent(&self, a: &Value, b: &Value) -> bool;
}

// ============================================================================
// Language tag matching (value exclusion filter)
// ============================================================================

/// Language-range matching for the exclusion filter: `""` matches only
/// untagged strings, `"*"` matches any tagged string, anything else is a
/// basic language range (case-insensitive, `de` matches `de-DE`).
pub fn lang_matches(tag: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return !tag.is_empty();
    }
    if pattern.is_empty() {
        return tag.is_empty();
    }
    let tag = tag.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    tag == pattern || tag.strip_prefix(&pattern).is_some_and(|rest| rest.starts_with('-'))
}

// ============================================================================
// Literal tolerance rules
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralTolerance {
    /// xsd:date and xsd:dateTime with equal year, month and day match.
    pub allow_time_skip: bool,
    /// String literals with equal lexical value but different language tag
    /// match.
    pub allow_lang_tag_skip: bool,
}

impl LiteralTolerance {
    pub fn equivalent_literals(&self, a: &Literal, b: &Literal) -> bool {
        if a == b {
            return true;
        }

        if self.allow_time_skip
            && ((a.is_date() && b.is_date_time()) || (a.is_date_time() && b.is_date()))
        {
            return match (day_of(a), day_of(b)) {
                (Some(da), Some(db)) => da == db,
                _ => false,
            };
        }

        if self.allow_lang_tag_skip && a.is_string_like() && b.is_string_like() {
            return a.lexical == b.lexical;
        }

        equivalent_numbers(a, b)
    }
}

/// Calendar day of an xsd:date or the date part of an xsd:dateTime,
/// ignoring any timezone suffix.
fn day_of(literal: &Literal) -> Option<NaiveDate> {
    let date_part = literal.lexical.split('T').next()?;
    let date_part = date_part.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Numeric {
    /// Arbitrary-precision value (xsd:decimal family).
    Exact(Decimal),
    /// Finite binary value (xsd:float widened losslessly, or xsd:double).
    Binary(f64),
    NaN,
    PositiveInfinity,
    NegativeInfinity,
}

fn numeric_value(literal: &Literal) -> Option<Numeric> {
    if literal.is_decimal_family() {
        return Decimal::from_str(literal.lexical.trim()).ok().map(Numeric::Exact);
    }
    let value = if literal.is_double() {
        parse_xsd_float(&literal.lexical)?
    } else if literal.is_float() {
        parse_xsd_float(&literal.lexical)? as f32 as f64
    } else {
        return None;
    };
    Some(if value.is_nan() {
        Numeric::NaN
    } else if value == f64::INFINITY {
        Numeric::PositiveInfinity
    } else if value == f64::NEG_INFINITY {
        Numeric::NegativeInfinity
    } else {
        Numeric::Binary(value)
    })
}

/// xsd float/double lexical space: `INF`, `-INF`, `NaN`, otherwise the usual
/// decimal/scientific notation.
fn parse_xsd_float(lexical: &str) -> Option<f64> {
    match lexical.trim() {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        s => s.parse::<f64>().ok(),
    }
}

/// Exact numeric-value equality across numeric subtypes. Specials only ever
/// equal the same special; a decimal-family value meets a binary value via
/// the binary value's exact decimal expansion, so `xsd:decimal "0.1"` and
/// `xsd:double "0.1"` are NOT equivalent (the double holds
/// 0.1000000000000000055511...).
fn equivalent_numbers(a: &Literal, b: &Literal) -> bool {
    let (Some(na), Some(nb)) = (numeric_value(a), numeric_value(b)) else {
        return false;
    };
    match (na, nb) {
        (Numeric::Exact(da), Numeric::Exact(db)) => da == db,
        (Numeric::Binary(fa), Numeric::Binary(fb)) => fa == fb,
        (Numeric::Exact(d), Numeric::Binary(f)) | (Numeric::Binary(f), Numeric::Exact(d)) => {
            binary_equals_decimal(f, d)
        }
        (Numeric::NaN, Numeric::NaN) => true,
        (Numeric::PositiveInfinity, Numeric::PositiveInfinity) => true,
        (Numeric::NegativeInfinity, Numeric::NegativeInfinity) => true,
        _ => false,
    }
}

/// True iff the exact value of `f` equals the exact value of `d`.
///
/// `f` is decomposed into `mantissa * 2^exponent` with an odd mantissa.
/// With a negative exponent `-k` the exact decimal expansion of `f` is
/// `mantissa * 5^k` at scale `k` with a nonzero last digit, so it can only
/// equal `d` when `d`, trailing zeros stripped, has exactly that scale and
/// coefficient. Overflowing `u128` on the way means the expansion exceeds
/// any representable decimal coefficient and the values differ.
fn binary_equals_decimal(f: f64, d: Decimal) -> bool {
    if f == 0.0 {
        return d.is_zero();
    }
    if d.is_zero() || (f < 0.0) != d.is_sign_negative() {
        return false;
    }
    let (mut mantissa, mut exponent) = decode_f64(f.abs());
    while mantissa & 1 == 0 {
        mantissa >>= 1;
        exponent += 1;
    }
    let d = d.abs().normalize();
    let coefficient = d.mantissa().unsigned_abs();
    if exponent >= 0 {
        // f is the integer mantissa * 2^exponent
        if d.scale() != 0 {
            return false;
        }
        let mut value = mantissa as u128;
        for _ in 0..exponent {
            match value.checked_mul(2) {
                Some(doubled) => value = doubled,
                None => return false,
            }
        }
        value == coefficient
    } else {
        let k = (-exponent) as u32;
        if d.scale() != k {
            return false;
        }
        let mut expansion = mantissa as u128;
        for _ in 0..k {
            match expansion.checked_mul(5) {
                Some(scaled) => expansion = scaled,
                None => return false,
            }
        }
        expansion == coefficient
    }
}

/// Splits a finite positive f64 into `(mantissa, exponent)` with
/// `value == mantissa * 2^exponent`.
fn decode_f64(value: f64) -> (u64, i32) {
    let bits = value.to_bits();
    let exponent_bits = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & 0x000f_ffff_ffff_ffff;
    if exponent_bits == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1 << 52), exponent_bits - 1075)
    }
}

// ============================================================================
// Resource-aware equivalence
// ============================================================================

/// The equivalence the value comparator runs with: resources delegate to
/// the correspondence engine, literals to the tolerance rules. An entity
/// and a literal are never equivalent.
pub struct ResourceAwareEquivalence<'a> {
    store: &'a CorrespondenceStore,
    tolerance: LiteralTolerance,
}

impl<'a> ResourceAwareEquivalence<'a> {
    pub fn new(store: &'a CorrespondenceStore, tolerance: LiteralTolerance) -> Self {
        Self { store, tolerance }
    }
}

impl ValueEquivalence for ResourceAwareEquivalence<'_> {
    fn equivalent(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Entity(ea), Value::Entity(eb)) => self.store.correspond(ea, eb),
            (Value::Literal(la), Value::Literal(lb)) => self.tolerance.equivalent_literals(la, lb),
            _ => false,
        }
    }
}
