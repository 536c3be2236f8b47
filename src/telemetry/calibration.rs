//! Deployment calibration constants.
//!
//! Loaded once with the link configuration and never mutated afterwards. The
//! defaults are the constants of the FIWT rig as commissioned.

use serde::{Deserialize, Serialize};

use super::filter::ButterworthCoefficients;

/// Degrees per ADC count of a servo potentiometer or absolute encoder.
const SERVO_SCALE: f64 = 180.0 / 4096.0;

/// Zero offsets, scale factors and sensor gains for all three subsystems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Neutral counts of the six flight-surface servos
    pub acm_servo_zero: [i32; 6],
    /// Neutral counts of the four compensator servos
    pub cmp_servo_zero: [i32; 4],

    /// Flight-surface servo scale (deg/count)
    pub acm_scale: f64,
    /// Compensator servo scale (deg/count)
    pub cmp_scale: f64,
    /// Model attitude encoder scale (deg/count)
    pub encoder_scale: f64,
    /// Counter period of the attitude encoders
    pub encoder_period: i32,
    /// Encoder readings at zero roll, pitch, yaw
    pub encoder_zero: [i32; 3],

    /// Rig roll encoder scale (deg/count)
    pub rig_roll_scale: f64,
    /// Rig pitch and yaw encoder scale (deg/count)
    pub rig_pitch_yaw_scale: f64,

    /// Gyro gain and sign per axis
    pub gyro_gain: [f64; 3],
    /// Accelerometer gain and sign per axis
    pub accel_gain: [f64; 3],

    /// Low-pass filter for every rate-tracked channel
    pub filter: ButterworthCoefficients,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            acm_servo_zero: [1967, 2259, 2000, 2200, 1820, 2210],
            cmp_servo_zero: [2020, 2050, 2000, 2020],
            acm_scale: SERVO_SCALE,
            cmp_scale: SERVO_SCALE,
            encoder_scale: SERVO_SCALE,
            encoder_period: 4096,
            encoder_zero: [4964, 236, 0],
            rig_roll_scale: 120.0 / 3873.0,
            rig_pitch_yaw_scale: 360.0 / 4095.0,
            gyro_gain: [0.05, -0.05, -0.05],
            accel_gain: [-0.003333, 0.003333, 0.003333],
            filter: ButterworthCoefficients::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let yaml = "acm_servo_zero: [2000, 2000, 2000, 2000, 2000, 2000]\nencoder_period: 8192\n";
        let cal: Calibration = serde_yaml_ng::from_str(yaml).unwrap();

        assert_eq!(cal.acm_servo_zero, [2000; 6]);
        assert_eq!(cal.encoder_period, 8192);
        assert_eq!(cal.cmp_servo_zero, Calibration::default().cmp_servo_zero);
        assert_eq!(cal.filter, ButterworthCoefficients::TEN_HZ_AT_100HZ);
    }
}
