//! Operator deltas to actuator setpoints.
//!
//! Deltas arrive in degrees of control-surface deflection and leave as raw
//! servo counts around the calibrated neutral positions.

use serde::{Deserialize, Serialize};

use super::calibration::Calibration;
use super::convert::{degrees_to_counts, saturate_setpoint};
use crate::framing::{ActuatorKind, ActuatorPacket, CommandLogRecord};

/// Flag byte carried by every setpoint packet.
pub const SETPOINT_FLAG: u8 = 1;

/// Setpoint written to the compensator packet's two unused servo slots.
pub const COMPENSATOR_PADDING: u16 = 2000;

/// Control deflections requested by the operator or the Matlab peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandDeltas {
    /// Aileron
    pub dac: f64,
    /// Differential elevator
    pub deac: f64,
    /// Elevator
    pub dec: f64,
    /// Rudder
    pub drc: f64,
    /// Compensator aileron
    pub dac_cmp: f64,
    /// Compensator elevator
    pub dec_cmp: f64,
    /// Compensator rudder
    pub drc_cmp: f64,
}

impl CommandDeltas {
    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite())
    }

    pub fn as_array(&self) -> [f64; 7] {
        [self.dac, self.deac, self.dec, self.drc, self.dac_cmp, self.dec_cmp, self.drc_cmp]
    }
}

/// Setpoint packets for both actuator boards plus the flight record entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorCommand {
    pub flight_surface: ActuatorPacket,
    pub compensator: ActuatorPacket,
    pub log_record: CommandLogRecord,
}

impl ActuatorCommand {
    pub fn synthesize(
        calibration: &Calibration,
        time_token: u32,
        intent_ts: u32,
        deltas: &CommandDeltas,
    ) -> Self {
        let acm = flight_surface_setpoints(calibration, deltas);
        let cmp = compensator_setpoints(calibration, deltas);

        let flight_surface = ActuatorPacket {
            kind: ActuatorKind::FlightSurface,
            time_token,
            flag: SETPOINT_FLAG,
            setpoints: acm,
        };
        let compensator = ActuatorPacket {
            kind: ActuatorKind::Compensator,
            time_token,
            flag: SETPOINT_FLAG,
            setpoints: [cmp[0], cmp[1], cmp[2], cmp[3], COMPENSATOR_PADDING, COMPENSATOR_PADDING],
        };
        let log_record =
            CommandLogRecord { intent_ts, deltas: deltas.as_array().map(|v| v as f32) };

        Self { flight_surface, compensator, log_record }
    }
}

/// Six flight-surface servo setpoints.
///
/// Servos 1/2 carry the aileron, 3/4 the rudder, 5/6 the elevator with the
/// differential elevator applied with the same sign on both sides.
pub fn flight_surface_setpoints(calibration: &Calibration, deltas: &CommandDeltas) -> [u16; 6] {
    let scale = calibration.acm_scale;
    let da = i64::from(degrees_to_counts(deltas.dac, scale));
    let dea = i64::from(degrees_to_counts(deltas.deac, scale));
    let de = i64::from(degrees_to_counts(deltas.dec, scale));
    let dr = i64::from(degrees_to_counts(deltas.drc, scale));
    let zero = calibration.acm_servo_zero.map(i64::from);

    [
        zero[0] - da,
        zero[1] - da,
        zero[2] + dr,
        zero[3] + dr,
        zero[4] + de - dea,
        zero[5] - de - dea,
    ]
    .map(saturate_setpoint)
}

/// Four compensator servo setpoints.
pub fn compensator_setpoints(calibration: &Calibration, deltas: &CommandDeltas) -> [u16; 4] {
    let scale = calibration.cmp_scale;
    let da = i64::from(degrees_to_counts(deltas.dac_cmp, scale));
    let de = i64::from(degrees_to_counts(deltas.dec_cmp, scale));
    let dr = i64::from(degrees_to_counts(deltas.drc_cmp, scale));
    let zero = calibration.cmp_servo_zero.map(i64::from);

    [zero[0] + da + de, zero[1] + da - dr, zero[2] + da - de, zero[3] + da + dr]
        .map(saturate_setpoint)
}
