//! battery voltage → state of charge bucket
//!
//! single lithium cell discharge curve, deliberately coarse. each bucket is
//! closed on its lower threshold, so 4.10 V is already 90%.

/// (lower threshold in volts, percent), highest first
const DISCHARGE_STEPS: [(f64, u8); 7] = [
    (4.20, 100),
    (4.10, 90),
    (4.00, 80),
    (3.85, 60),
    (3.70, 40),
    (3.50, 20),
    (3.30, 10),
];

/// anything under the last threshold
const FLOOR_PERCENT: u8 = 5;

/// map a battery voltage to a percent bucket
///
/// returns None for a missing voltage, a non-finite one, or exactly 0 V
/// (nodes report 0 when the battery sense line is broken).
pub fn percent(voltage: Option<f64>) -> Option<u8> {
    let v = voltage?;
    if !v.is_finite() || v == 0.0 {
        return None;
    }

    let pct = DISCHARGE_STEPS
        .iter()
        .find(|(threshold, _)| v >= *threshold)
        .map(|(_, pct)| *pct)
        .unwrap_or(FLOOR_PERCENT);
    Some(pct)
}
