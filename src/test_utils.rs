//! Test utilities for building board records and radio buffers
//!
//! Shared by unit tests, integration tests and the criterion benches so that
//! every test speaks the same wire format the boards do.

#![cfg(any(test, feature = "benchmark"))]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::framing::{AcmRecord, AirflowRecord, CmpRecord, Frame, RigRecord, SensorRecord, encode_batch};

/// Neutral counts of the flight-surface servos in the default calibration.
pub const ACM_NEUTRAL: [u16; 6] = [1967, 2259, 2000, 2200, 1820, 2210];

/// Neutral counts of the compensator servos in the default calibration.
pub const CMP_NEUTRAL: [u16; 4] = [2020, 2050, 2000, 2020];

/// A path under the system temp directory that no other test uses.
///
/// The file is not created.
pub fn temp_path(label: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("groundlink-{label}-{}-{n}.dat", std::process::id()))
}

/// Encoded rig record payload.
pub fn rig_record(roll: u16, pitch: u16, yaw: u16, ts_adc: u32) -> Vec<u8> {
    SensorRecord::Rig(RigRecord { roll, pitch, yaw, ts_adc }).encode()
}

/// Encoded airflow record payload.
pub fn airflow_record(velocity: f32, differential_pressure: f32) -> Vec<u8> {
    SensorRecord::Airflow(AirflowRecord { velocity, differential_pressure }).encode()
}

/// ACM record with servos at neutral and the given attitude encoder counts.
pub fn acm_at(ts_adc: u32, encoder_positions: [u16; 3]) -> AcmRecord {
    AcmRecord {
        servo_positions: ACM_NEUTRAL,
        encoder_positions,
        gyro: [0; 3],
        accel: [0; 3],
        ts_adc,
        servo_ctrl: [0; 6],
        servo_ref: ACM_NEUTRAL,
        cmd_time: 0,
    }
}

/// Encoded ACM record payload, see [`acm_at`].
pub fn acm_record(ts_adc: u32, encoder_positions: [u16; 3]) -> Vec<u8> {
    SensorRecord::Acm(acm_at(ts_adc, encoder_positions)).encode()
}

/// Encoded CMP record payload with servos and encoders at neutral.
pub fn cmp_record(ts_adc: u32) -> Vec<u8> {
    SensorRecord::Cmp(CmpRecord {
        servo_positions: CMP_NEUTRAL,
        encoder_positions: CMP_NEUTRAL,
        ts_adc,
        servo_ctrl: [0; 4],
        servo_ref: CMP_NEUTRAL,
        cmd_time: 0,
    })
    .encode()
}

/// A complete radio buffer carrying `(generation_ts, payload)` records.
pub fn radio_buffer(records: &[(u32, Vec<u8>)], sent_ts: u32) -> Vec<u8> {
    let frames: Vec<Frame> = records.iter().map(|(ts, payload)| Frame::new(*ts, payload.clone())).collect();
    encode_batch(&frames, sent_ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::unpack;

    #[test]
    fn temp_paths_are_unique() {
        assert_ne!(temp_path("x"), temp_path("x"));
    }

    #[test]
    fn radio_buffer_decodes_to_its_records() {
        let buffer = radio_buffer(&[(1, rig_record(1, 2, 3, 4)), (2, cmp_record(5))], 9);
        let batch = unpack(&buffer).unwrap().unwrap();

        assert_eq!(batch.sent_timestamp, 9);
        assert_eq!(batch.frames.len(), 2);
        assert!(matches!(SensorRecord::decode(&batch.frames[1].payload).unwrap(), SensorRecord::Cmp(_)));
    }
}
