// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalization of free-form set input before it is written remotely.
//!
//! All functions are total: malformed input degrades to zero.

use crate::models::TrackingKind;

/// Parse a weight or repetition field.
///
/// Everything except digits and the decimal point is stripped, then the
/// remainder is parsed. Unparseable or non-finite input yields `0.0`.
pub fn normalize_number(input: &str) -> f64 {
    let cleaned: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse a whole-number count (repetitions).
pub fn normalize_count(input: &str) -> u32 {
    let value = normalize_number(input).floor();
    if value >= u32::MAX as f64 {
        u32::MAX
    } else {
        value as u32
    }
}

/// Parse a duration field into total seconds.
///
/// Accepts a bare number of seconds (`"45"`, `"45s"`) or colon-separated
/// `minutes:seconds` (`"1:30"`); a leading hours field (`"1:02:03"`) is
/// folded in the same way. Each field keeps only its first run of digits,
/// so fractional seconds are truncated.
pub fn normalize_duration(input: &str) -> u32 {
    if !input.contains(':') {
        return leading_digits(input);
    }

    input
        .split(':')
        .fold(0u32, |total, part| {
            total.saturating_mul(60).saturating_add(leading_digits(part))
        })
}

/// Parse the count field according to the exercise's tracking kind.
pub fn normalize_reps(input: &str, tracking: TrackingKind) -> u32 {
    match tracking {
        TrackingKind::Reps => normalize_count(input),
        TrackingKind::Duration => normalize_duration(input),
    }
}

fn leading_digits(input: &str) -> u32 {
    let digits: String = input
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return 0;
    }
    // Overlong digit runs saturate rather than fail.
    digits.parse::<u32>().unwrap_or(u32::MAX)
}
