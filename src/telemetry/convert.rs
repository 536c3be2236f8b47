//! Raw-count conversions shared by the update and command paths.

/// Signed shortest-path difference between two readings of a periodic counter.
///
/// The result lies in `[-period/2, period/2)`, so a reading that crosses the
/// counter's wrap point stays continuous instead of jumping by a full period.
pub fn period_diff(raw: i32, reference: i32, period: i32) -> i32 {
    let half = period / 2;
    let diff = (raw - reference).rem_euclid(period);
    if diff >= half { diff - period } else { diff }
}

/// Decode a 14-bit two's-complement value (bit 13 is the sign).
pub fn decode_14bit(raw: u16) -> i32 {
    let magnitude = i32::from(raw & 0x1FFF);
    if raw & 0x2000 != 0 { -((magnitude ^ 0x1FFF) + 1) } else { magnitude }
}

/// Pack a value back into its 14-bit two's-complement pattern.
pub fn encode_14bit(value: i32) -> u16 {
    (value as u16) & 0x3FFF
}

/// `(raw - zero) * scale`, the servo and encoder conversion to degrees.
pub fn counts_to_degrees(raw: u16, zero: i32, scale: f64) -> f64 {
    f64::from(i32::from(raw) - zero) * scale
}

/// Inverse of the degree scale, truncating toward zero like the board expects.
pub fn degrees_to_counts(degrees: f64, scale: f64) -> i32 {
    (degrees / scale) as i32
}

/// Clamp a computed setpoint into the packet's `u16` field.
///
/// Takes `i64` so mixed sums of saturated `i32` counts never overflow.
pub fn saturate_setpoint(counts: i64) -> u16 {
    counts.clamp(0, i64::from(u16::MAX)) as u16
}
