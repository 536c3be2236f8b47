//! Point-in-time view of the telemetry state.

use serde::Serialize;

/// Length of the operator state vector.
pub const GUI_STATE_LEN: usize = 41;

/// Length of the Matlab reply vector.
pub const MATLAB_STATE_LEN: usize = 20;

/// Calibrated, filtered and differentiated view of one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AxisState {
    /// Calibrated sample in degrees
    pub value: f64,
    /// Low-pass filtered value in degrees
    pub filtered: f64,
    /// Rate of the filtered value in degrees per second
    pub rate: f64,
    pub rate_valid: bool,
}

/// Full state of all three subsystems at one instant.
///
/// Axis arrays are ordered roll, pitch, yaw. ADC timestamps are in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub rig_adc_ts: f64,
    /// Rig encoder counts relative to the current zero
    pub rig_raw: [i32; 3],
    pub rig: [AxisState; 3],

    pub velocity: f64,
    pub differential_pressure: f64,

    pub acm_adc_ts: f64,
    pub acm_cmd_time: u32,
    pub acm_servo: [f64; 6],
    pub acm_servo_ref: [f64; 6],
    pub acm_servo_ctrl: [i16; 6],
    pub acm_attitude: [AxisState; 3],
    /// Body rates in deg/s
    pub gyro: [f64; 3],
    /// Accelerations in g
    pub accel: [f64; 3],

    pub cmp_adc_ts: f64,
    pub cmp_cmd_time: u32,
    pub cmp_servo: [f64; 4],
    pub cmp_servo_ref: [f64; 4],
    pub cmp_servo_ctrl: [i16; 4],
    /// Potentiometer counts of the compensator servos, unconverted
    pub cmp_servo_raw: [u16; 4],
}

impl TelemetrySnapshot {
    /// State vector pushed to the operator interface.
    ///
    /// Order: rig ADC time, gyro×3, accel×3, ACM roll/pitch/yaw (filtered, rate),
    /// rig roll/pitch/yaw (filtered, rate), six ACM (reference, actual) pairs,
    /// four CMP (actual, reference) pairs, velocity, differential pressure.
    pub fn gui_states(&self) -> [f64; GUI_STATE_LEN] {
        let mut states = [0.0; GUI_STATE_LEN];
        let mut i = 0;
        let mut push = |v: f64| {
            states[i] = v;
            i += 1;
        };

        push(self.rig_adc_ts);
        self.gyro.iter().for_each(|&v| push(v));
        self.accel.iter().for_each(|&v| push(v));
        for axis in &self.acm_attitude {
            push(axis.filtered);
            push(axis.rate);
        }
        for axis in &self.rig {
            push(axis.filtered);
            push(axis.rate);
        }
        for (reference, actual) in self.acm_servo_ref.iter().zip(&self.acm_servo) {
            push(*reference);
            push(*actual);
        }
        for (actual, reference) in self.cmp_servo.iter().zip(&self.cmp_servo_ref) {
            push(*actual);
            push(*reference);
        }
        push(self.velocity);
        push(self.differential_pressure);

        states
    }

    /// Reply vector for the Matlab co-simulation peer.
    ///
    /// Order: ACM command time, gyro×3, accel×3, ACM roll/pitch/yaw (filtered,
    /// rate), rig roll/pitch/yaw (filtered, rate), velocity.
    pub fn matlab_states(&self) -> [f64; MATLAB_STATE_LEN] {
        let mut states = [0.0; MATLAB_STATE_LEN];
        states[0] = f64::from(self.acm_cmd_time);
        states[1..4].copy_from_slice(&self.gyro);
        states[4..7].copy_from_slice(&self.accel);
        for (k, axis) in self.acm_attitude.iter().chain(&self.rig).enumerate() {
            states[7 + 2 * k] = axis.filtered;
            states[8 + 2 * k] = axis.rate;
        }
        states[19] = self.velocity;
        states
    }
}
