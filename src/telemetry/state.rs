//! Stateful telemetry pipeline.
//!
//! [`TelemetryState`] turns raw board samples into engineering units and turns
//! operator deltas into actuator setpoints. It is owned by the Message Center's
//! processing task, which is its only mutator, so no locking happens here.

use tracing::{debug, trace};

use super::calibration::Calibration;
use super::command::{ActuatorCommand, CommandDeltas};
use super::convert::{counts_to_degrees, decode_14bit, period_diff};
use super::filter::RateChannel;
use super::snapshot::{AxisState, TelemetrySnapshot};
use crate::framing::{AcmRecord, AirflowRecord, CmpRecord, RigRecord, SensorRecord};

/// Default minimum ADC-time gap between two observer notifications.
pub const DEFAULT_NOTIFY_INTERVAL_US: i64 = 50_000;

/// Receives snapshots whenever the notification throttle lets one through.
pub trait Observer: Send {
    fn notify(&mut self, snapshot: &TelemetrySnapshot);
}

/// Observer that drops every notification.
#[derive(Debug, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn notify(&mut self, _snapshot: &TelemetrySnapshot) {}
}

/// Calibrated state of the rig, flight-surface (ACM) and compensator (CMP) subsystems.
pub struct TelemetryState {
    calibration: Calibration,
    rig_zero: [i32; 3],
    rig_channels: [RateChannel; 3],
    acm_channels: [RateChannel; 3],
    current: TelemetrySnapshot,
    last_command: Option<ActuatorCommand>,
    notify_interval_us: i64,
    last_notified_us: i64,
    observer: Box<dyn Observer>,
}

impl TelemetryState {
    pub fn new(
        calibration: Calibration,
        notify_interval_us: i64,
        observer: Box<dyn Observer>,
    ) -> Self {
        let filter = calibration.filter;
        Self {
            rig_channels: std::array::from_fn(|_| RateChannel::butterworth(filter)),
            acm_channels: std::array::from_fn(|_| RateChannel::butterworth(filter)),
            calibration,
            rig_zero: [0; 3],
            current: TelemetrySnapshot::default(),
            last_command: None,
            notify_interval_us,
            last_notified_us: 0,
            observer,
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.current
    }

    /// Setpoints of the most recent command, if any was issued.
    pub fn last_command(&self) -> Option<&ActuatorCommand> {
        self.last_command.as_ref()
    }

    /// Route a decoded board record to its update method.
    pub fn apply_record(&mut self, record: &SensorRecord) {
        match record {
            SensorRecord::Rig(rig) => self.update_rig(rig),
            SensorRecord::Airflow(air) => self.update_airflow(air),
            SensorRecord::Acm(acm) => self.update_flight_surfaces(acm),
            SensorRecord::Cmp(cmp) => self.update_compensator(cmp),
        }
    }

    /// Fold the current rig reading into the zero offsets.
    ///
    /// The next sample with the same encoder counts reads as zero on every axis.
    pub fn zero_rig(&mut self) {
        for (zero, raw) in self.rig_zero.iter_mut().zip(self.current.rig_raw) {
            *zero += raw;
        }
        debug!(zero = ?self.rig_zero, "Rig angles zeroed");
    }

    pub fn update_rig(&mut self, rig: &RigRecord) {
        let counts = [rig.roll, rig.pitch, rig.yaw];
        let scales = [
            self.calibration.rig_roll_scale,
            self.calibration.rig_pitch_yaw_scale,
            self.calibration.rig_pitch_yaw_scale,
        ];

        let ts = f64::from(rig.ts_adc) * 1e-6;
        let dt = ts - self.current.rig_adc_ts;
        self.current.rig_adc_ts = ts;

        for axis in 0..3 {
            let raw = i32::from(counts[axis]) - self.rig_zero[axis];
            self.current.rig_raw[axis] = raw;
            let degrees = f64::from(raw) * scales[axis];
            self.current.rig[axis] = track(&mut self.rig_channels[axis], degrees, dt);
        }

        trace!(ts_adc = rig.ts_adc, "Rig update");
        self.notify_if_due(rig.ts_adc);
    }

    pub fn update_airflow(&mut self, air: &AirflowRecord) {
        self.current.velocity = f64::from(air.velocity);
        self.current.differential_pressure = f64::from(air.differential_pressure);
    }

    pub fn update_flight_surfaces(&mut self, acm: &AcmRecord) {
        let cal = &self.calibration;

        for i in 0..6 {
            let zero = cal.acm_servo_zero[i];
            self.current.acm_servo[i] =
                counts_to_degrees(acm.servo_positions[i], zero, cal.acm_scale);
            self.current.acm_servo_ref[i] =
                counts_to_degrees(acm.servo_ref[i], zero, cal.acm_scale);
        }
        self.current.acm_servo_ctrl = acm.servo_ctrl;
        self.current.acm_cmd_time = acm.cmd_time;

        for axis in 0..3 {
            self.current.gyro[axis] = f64::from(decode_14bit(acm.gyro[axis])) * cal.gyro_gain[axis];
            self.current.accel[axis] =
                f64::from(decode_14bit(acm.accel[axis])) * cal.accel_gain[axis];
        }

        let attitude: [f64; 3] = std::array::from_fn(|axis| {
            let diff = period_diff(
                i32::from(acm.encoder_positions[axis]),
                cal.encoder_zero[axis],
                cal.encoder_period,
            );
            f64::from(diff) * cal.encoder_scale
        });

        let ts = f64::from(acm.ts_adc) * 1e-6;
        let dt = ts - self.current.acm_adc_ts;
        self.current.acm_adc_ts = ts;

        for (axis, degrees) in attitude.into_iter().enumerate() {
            self.current.acm_attitude[axis] = track(&mut self.acm_channels[axis], degrees, dt);
        }

        trace!(ts_adc = acm.ts_adc, "ACM update");
        self.notify_if_due(acm.ts_adc);
    }

    /// Compensator positions are read from its encoders; the potentiometer
    /// counts are kept verbatim.
    pub fn update_compensator(&mut self, cmp: &CmpRecord) {
        let cal = &self.calibration;

        for i in 0..4 {
            let zero = cal.cmp_servo_zero[i];
            self.current.cmp_servo[i] =
                counts_to_degrees(cmp.encoder_positions[i], zero, cal.cmp_scale);
            self.current.cmp_servo_ref[i] = counts_to_degrees(cmp.servo_ref[i], zero, cal.cmp_scale);
        }
        self.current.cmp_servo_raw = cmp.servo_positions;
        self.current.cmp_servo_ctrl = cmp.servo_ctrl;
        self.current.cmp_cmd_time = cmp.cmd_time;
        self.current.cmp_adc_ts = f64::from(cmp.ts_adc) * 1e-6;

        trace!(ts_adc = cmp.ts_adc, "CMP update");
        self.notify_if_due(cmp.ts_adc);
    }

    /// Build the setpoint packets for a set of operator deltas.
    pub fn command(
        &mut self,
        time_token: u32,
        intent_ts: u32,
        deltas: &CommandDeltas,
    ) -> ActuatorCommand {
        let command = ActuatorCommand::synthesize(&self.calibration, time_token, intent_ts, deltas);
        self.last_command = Some(command);
        command
    }

    /// Notify the observer when the ADC clock moved past the throttle interval
    /// or went backwards (board reset), which also resynchronises the throttle.
    fn notify_if_due(&mut self, ts_adc: u32) {
        let delta = i64::from(ts_adc) - self.last_notified_us;
        if delta > self.notify_interval_us || delta < 0 {
            self.last_notified_us = i64::from(ts_adc);
            self.observer.notify(&self.current);
        }
    }
}

fn track(channel: &mut RateChannel, degrees: f64, dt: f64) -> AxisState {
    let (filtered, rate) = channel.update(degrees, dt);
    AxisState { value: degrees, filtered, rate, rate_valid: channel.rate_valid() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<TelemetrySnapshot>>>);

    impl Observer for Recorder {
        fn notify(&mut self, snapshot: &TelemetrySnapshot) {
            self.0.lock().unwrap().push(snapshot.clone());
        }
    }

    impl Recorder {
        fn count(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    fn state_with_recorder() -> (TelemetryState, Recorder) {
        let recorder = Recorder::default();
        let state = TelemetryState::new(
            Calibration::default(),
            DEFAULT_NOTIFY_INTERVAL_US,
            Box::new(recorder.clone()),
        );
        (state, recorder)
    }

    fn acm_at(ts_adc: u32, roll_counts: u16) -> AcmRecord {
        AcmRecord {
            servo_positions: [1967, 2259, 2000, 2200, 1820, 2210],
            encoder_positions: [roll_counts, 236, 0],
            gyro: [0; 3],
            accel: [0; 3],
            ts_adc,
            servo_ctrl: [0; 6],
            servo_ref: [1967, 2259, 2000, 2200, 1820, 2210],
            cmd_time: 0,
        }
    }

    fn rig_at(ts_adc: u32, roll: u16, pitch: u16, yaw: u16) -> RigRecord {
        RigRecord { roll, pitch, yaw, ts_adc }
    }

    #[test]
    fn notifications_every_update_when_spaced_past_interval() {
        let (mut state, recorder) = state_with_recorder();
        for k in 1..=10u32 {
            state.update_rig(&rig_at(k * 50_001, 0, 0, 0));
        }
        assert_eq!(recorder.count(), 10);
    }

    #[test]
    fn notifications_throttled_for_fast_updates() {
        let (mut state, recorder) = state_with_recorder();
        for k in 1..=60u32 {
            state.update_rig(&rig_at(k * 10_000, 0, 0, 0));
        }
        // Gap accumulates against the last notified sample: 60 ms, 120 ms, ...
        assert_eq!(recorder.count(), 10);
    }

    #[test]
    fn clock_rollback_notifies_and_resyncs() {
        let (mut state, recorder) = state_with_recorder();
        state.update_rig(&rig_at(1_000_000, 0, 0, 0));
        assert_eq!(recorder.count(), 1);

        state.update_rig(&rig_at(500, 0, 0, 0));
        assert_eq!(recorder.count(), 2);

        state.update_rig(&rig_at(10_500, 0, 0, 0));
        assert_eq!(recorder.count(), 2);
    }

    #[test]
    fn zero_rig_makes_next_identical_reading_zero() {
        let (mut state, _) = state_with_recorder();
        state.update_rig(&rig_at(10_000, 1200, 300, 4000));
        assert!(state.snapshot().rig[0].value > 0.0);

        state.zero_rig();
        state.update_rig(&rig_at(20_000, 1200, 300, 4000));
        assert_eq!(state.snapshot().rig_raw, [0, 0, 0]);
        for axis in &state.snapshot().rig {
            assert_eq!(axis.value, 0.0);
        }

        // Zeroing twice accumulates relative to the already-zeroed reading.
        state.update_rig(&rig_at(30_000, 1210, 300, 4000));
        state.zero_rig();
        state.update_rig(&rig_at(40_000, 1210, 300, 4000));
        assert_eq!(state.snapshot().rig_raw, [0, 0, 0]);
    }

    #[test]
    fn rig_scales_per_axis() {
        let (mut state, _) = state_with_recorder();
        state.update_rig(&rig_at(10_000, 3873, 4095, 4095));
        let rig = &state.snapshot().rig;
        assert!((rig[0].value - 120.0).abs() < 1e-9);
        assert!((rig[1].value - 360.0).abs() < 1e-9);
        assert!((rig[2].value - 360.0).abs() < 1e-9);
        assert!((state.snapshot().rig_adc_ts - 0.01).abs() < 1e-12);
    }

    #[test]
    fn encoder_wrap_keeps_attitude_continuous() {
        let (mut state, _) = state_with_recorder();
        let scale = state.calibration().encoder_scale;

        let mut previous: Option<f64> = None;
        for (k, raw) in [4090u16, 4100, 10].into_iter().enumerate() {
            state.update_flight_surfaces(&acm_at(10_000 * (k as u32 + 1), raw));
            let roll = state.snapshot().acm_attitude[0];

            if let Some(prev) = previous {
                assert!((roll.value - prev).abs() < 1.0, "roll jumped from {prev} to {}", roll.value);
            }
            assert!(roll.rate.is_finite());
            // A full-period jump would show up as roughly 180 deg over 10 ms.
            assert!(roll.rate.abs() < 2048.0 * scale / 0.01);
            previous = Some(roll.value);
        }

        let roll = state.snapshot().acm_attitude[0];
        assert!((roll.value - f64::from(-858) * scale).abs() < 1e-9);
        assert!(roll.rate_valid);
    }

    #[test]
    fn first_acm_sample_rate_is_zero_and_invalid() {
        let (mut state, _) = state_with_recorder();
        state.update_flight_surfaces(&acm_at(10_000, 100));
        let roll = state.snapshot().acm_attitude[0];
        assert_eq!(roll.rate, 0.0);
        assert!(!roll.rate_valid);
    }

    #[test]
    fn imu_channels_decode_and_apply_gains() {
        let (mut state, _) = state_with_recorder();
        let mut acm = acm_at(10_000, 0);
        acm.gyro = [100, 0x3FFF, 0x2000];
        acm.accel = [300, 300, 0x3FFF];
        state.update_flight_surfaces(&acm);

        let snap = state.snapshot();
        assert!((snap.gyro[0] - 5.0).abs() < 1e-9);
        assert!((snap.gyro[1] - 0.05).abs() < 1e-9);
        assert!((snap.gyro[2] - 409.6).abs() < 1e-9);
        assert!((snap.accel[0] + 0.9999).abs() < 1e-9);
        assert!((snap.accel[1] - 0.9999).abs() < 1e-9);
        assert!((snap.accel[2] + 0.003333).abs() < 1e-9);
    }

    #[test]
    fn servo_references_use_servo_conversion() {
        let (mut state, _) = state_with_recorder();
        let mut acm = acm_at(10_000, 0);
        acm.servo_positions[0] = 1967 + 4096 / 180;
        acm.servo_ref[0] = 1967 - 4096 / 180;
        acm.servo_ctrl = [1, 2, 3, 4, 5, -6];
        acm.cmd_time = 1234;
        state.update_flight_surfaces(&acm);

        let snap = state.snapshot();
        let scale = 180.0 / 4096.0;
        assert!((snap.acm_servo[0] - 22.0 * scale).abs() < 1e-12);
        assert!((snap.acm_servo_ref[0] + 22.0 * scale).abs() < 1e-12);
        assert_eq!(snap.acm_servo_ctrl, [1, 2, 3, 4, 5, -6]);
        assert_eq!(snap.acm_cmd_time, 1234);
    }

    #[test]
    fn compensator_reads_encoders_without_rate_tracking() {
        let (mut state, recorder) = state_with_recorder();
        let cmp = CmpRecord {
            servo_positions: [1, 2, 3, 4],
            encoder_positions: [2020 + 100, 2050, 2000 - 100, 2020],
            ts_adc: 60_000,
            servo_ctrl: [0; 4],
            servo_ref: [2020, 2050, 2000, 2020],
            cmd_time: 5,
        };
        state.update_compensator(&cmp);

        let snap = state.snapshot();
        let scale = 180.0 / 4096.0;
        assert!((snap.cmp_servo[0] - 100.0 * scale).abs() < 1e-12);
        assert!((snap.cmp_servo[2] + 100.0 * scale).abs() < 1e-12);
        assert_eq!(snap.cmp_servo_ref, [0.0; 4]);
        assert_eq!(snap.cmp_servo_raw, [1, 2, 3, 4]);
        assert!((snap.cmp_adc_ts - 0.06).abs() < 1e-12);
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn command_with_zero_deltas_reproduces_zero_offsets() {
        let (mut state, _) = state_with_recorder();
        let cmd = state.command(1, 2, &CommandDeltas::default());
        assert_eq!(cmd.flight_surface.setpoints, [1967, 2259, 2000, 2200, 1820, 2210]);
        assert_eq!(&cmd.compensator.setpoints[..4], &[2020, 2050, 2000, 2020]);
        assert_eq!(state.last_command(), Some(&cmd));
    }

    #[test]
    fn apply_record_routes_airflow() {
        let (mut state, recorder) = state_with_recorder();
        state.apply_record(&SensorRecord::Airflow(AirflowRecord {
            velocity: 12.5,
            differential_pressure: 80.0,
        }));
        assert_eq!(state.snapshot().velocity, 12.5);
        assert_eq!(state.snapshot().differential_pressure, 80.0);
        assert_eq!(recorder.count(), 0);
    }
}
