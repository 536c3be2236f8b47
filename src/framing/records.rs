//! Record layouts carried inside radio frames.
//!
//! All multi-byte fields are big-endian and every record starts with a one-byte
//! type code:
//!
//! | Code | Record | Direction |
//! |------|--------|-----------|
//! | `0x11` | rig encoder positions | board -> ground |
//! | `0x12` | tunnel velocity / differential pressure | board -> ground |
//! | `0x22` | flight-surface servos, encoders and IMU (ACM) | board -> ground |
//! | `0x33` | compensator servos and encoders (CMP) | board -> ground |
//! | `0xA5` | flight-surface servo setpoints | ground -> board |
//! | `0xA6` | compensator servo setpoints | ground -> board |
//! | `0xAA` | commanded deltas (flight record only) | ground -> log |

use crate::{LinkError, Result};

pub const RIG_RECORD: u8 = 0x11;
pub const AIRFLOW_RECORD: u8 = 0x12;
pub const ACM_RECORD: u8 = 0x22;
pub const CMP_RECORD: u8 = 0x33;
pub const FLIGHT_SURFACE_PACKET: u8 = 0xA5;
pub const COMPENSATOR_PACKET: u8 = 0xA6;
pub const COMMAND_LOG_RECORD: u8 = 0xAA;

const RIG_RECORD_SIZE: usize = 1 + 3 * 2 + 4;
const AIRFLOW_RECORD_SIZE: usize = 1 + 2 * 4;
const ACM_RECORD_SIZE: usize = 1 + 15 * 2 + 4 + 12 * 2 + 4;
const CMP_RECORD_SIZE: usize = 1 + 8 * 2 + 4 + 8 * 2 + 4;
const ACTUATOR_PACKET_SIZE: usize = 1 + 4 + 1 + 6 * 2;

/// Rig encoder counts from the ground board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RigRecord {
    pub roll: u16,
    pub pitch: u16,
    pub yaw: u16,
    pub ts_adc: u32,
}

/// Tunnel airflow measurements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirflowRecord {
    pub velocity: f32,
    pub differential_pressure: f32,
}

/// Flight-surface actuation and IMU sample from the aircraft model board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcmRecord {
    pub servo_positions: [u16; 6],
    pub encoder_positions: [u16; 3],
    /// 14-bit two's-complement packed gyro channels
    pub gyro: [u16; 3],
    /// 14-bit two's-complement packed accelerometer channels
    pub accel: [u16; 3],
    pub ts_adc: u32,
    pub servo_ctrl: [i16; 6],
    pub servo_ref: [u16; 6],
    pub cmd_time: u32,
}

/// Compensator actuation sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmpRecord {
    pub servo_positions: [u16; 4],
    pub encoder_positions: [u16; 4],
    pub ts_adc: u32,
    pub servo_ctrl: [i16; 4],
    pub servo_ref: [u16; 4],
    pub cmd_time: u32,
}

/// Any record the boards send to the ground station.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorRecord {
    Rig(RigRecord),
    Airflow(AirflowRecord),
    Acm(AcmRecord),
    Cmp(CmpRecord),
}

impl SensorRecord {
    /// Decode a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let Some(&code) = payload.first() else {
            return Err(LinkError::decode_error("sensor record", "empty payload"));
        };

        match code {
            RIG_RECORD => {
                let mut r = FieldReader::new(payload, RIG_RECORD_SIZE, "rig record")?;
                Ok(SensorRecord::Rig(RigRecord {
                    roll: r.u16(),
                    pitch: r.u16(),
                    yaw: r.u16(),
                    ts_adc: r.u32(),
                }))
            }
            AIRFLOW_RECORD => {
                let mut r = FieldReader::new(payload, AIRFLOW_RECORD_SIZE, "airflow record")?;
                Ok(SensorRecord::Airflow(AirflowRecord {
                    velocity: r.f32(),
                    differential_pressure: r.f32(),
                }))
            }
            ACM_RECORD => {
                let mut r = FieldReader::new(payload, ACM_RECORD_SIZE, "ACM record")?;
                Ok(SensorRecord::Acm(AcmRecord {
                    servo_positions: r.u16_array(),
                    encoder_positions: r.u16_array(),
                    gyro: r.u16_array(),
                    accel: r.u16_array(),
                    ts_adc: r.u32(),
                    servo_ctrl: r.i16_array(),
                    servo_ref: r.u16_array(),
                    cmd_time: r.u32(),
                }))
            }
            CMP_RECORD => {
                let mut r = FieldReader::new(payload, CMP_RECORD_SIZE, "CMP record")?;
                Ok(SensorRecord::Cmp(CmpRecord {
                    servo_positions: r.u16_array(),
                    encoder_positions: r.u16_array(),
                    ts_adc: r.u32(),
                    servo_ctrl: r.i16_array(),
                    servo_ref: r.u16_array(),
                    cmd_time: r.u32(),
                }))
            }
            other => Err(LinkError::decode_error(
                "sensor record",
                format!("unknown record type {:#04x}", other),
            )),
        }
    }

    /// Encode the record the way the boards put it on the wire.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            SensorRecord::Rig(rig) => {
                let mut out = Vec::with_capacity(RIG_RECORD_SIZE);
                out.push(RIG_RECORD);
                put_u16s(&mut out, &[rig.roll, rig.pitch, rig.yaw]);
                out.extend_from_slice(&rig.ts_adc.to_be_bytes());
                out
            }
            SensorRecord::Airflow(air) => {
                let mut out = Vec::with_capacity(AIRFLOW_RECORD_SIZE);
                out.push(AIRFLOW_RECORD);
                out.extend_from_slice(&air.velocity.to_be_bytes());
                out.extend_from_slice(&air.differential_pressure.to_be_bytes());
                out
            }
            SensorRecord::Acm(acm) => {
                let mut out = Vec::with_capacity(ACM_RECORD_SIZE);
                out.push(ACM_RECORD);
                put_u16s(&mut out, &acm.servo_positions);
                put_u16s(&mut out, &acm.encoder_positions);
                put_u16s(&mut out, &acm.gyro);
                put_u16s(&mut out, &acm.accel);
                out.extend_from_slice(&acm.ts_adc.to_be_bytes());
                put_i16s(&mut out, &acm.servo_ctrl);
                put_u16s(&mut out, &acm.servo_ref);
                out.extend_from_slice(&acm.cmd_time.to_be_bytes());
                out
            }
            SensorRecord::Cmp(cmp) => {
                let mut out = Vec::with_capacity(CMP_RECORD_SIZE);
                out.push(CMP_RECORD);
                put_u16s(&mut out, &cmp.servo_positions);
                put_u16s(&mut out, &cmp.encoder_positions);
                out.extend_from_slice(&cmp.ts_adc.to_be_bytes());
                put_i16s(&mut out, &cmp.servo_ctrl);
                put_u16s(&mut out, &cmp.servo_ref);
                out.extend_from_slice(&cmp.cmd_time.to_be_bytes());
                out
            }
        }
    }
}

/// Which actuator board a setpoint packet addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorKind {
    FlightSurface,
    Compensator,
}

impl ActuatorKind {
    pub fn type_code(self) -> u8 {
        match self {
            ActuatorKind::FlightSurface => FLIGHT_SURFACE_PACKET,
            ActuatorKind::Compensator => COMPENSATOR_PACKET,
        }
    }
}

/// Servo setpoint packet, `{type, time_token, flag, 6 × setpoint}`.
///
/// The compensator only drives four servos; its last two slots are padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorPacket {
    pub kind: ActuatorKind,
    pub time_token: u32,
    pub flag: u8,
    pub setpoints: [u16; 6],
}

impl ActuatorPacket {
    pub const SIZE: usize = ACTUATOR_PACKET_SIZE;

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ACTUATOR_PACKET_SIZE);
        out.push(self.kind.type_code());
        out.extend_from_slice(&self.time_token.to_be_bytes());
        out.push(self.flag);
        put_u16s(&mut out, &self.setpoints);
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        let kind = match payload.first() {
            Some(&FLIGHT_SURFACE_PACKET) => ActuatorKind::FlightSurface,
            Some(&COMPENSATOR_PACKET) => ActuatorKind::Compensator,
            Some(other) => {
                return Err(LinkError::decode_error(
                    "actuator packet",
                    format!("unknown packet type {:#04x}", other),
                ));
            }
            None => return Err(LinkError::decode_error("actuator packet", "empty payload")),
        };
        let mut r = FieldReader::new(payload, ACTUATOR_PACKET_SIZE, "actuator packet")?;
        Ok(Self { kind, time_token: r.u32(), flag: r.u8(), setpoints: r.u16_array() })
    }
}

/// Commanded deltas as persisted in the flight record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandLogRecord {
    /// Capture time of the command intent
    pub intent_ts: u32,
    /// `dac, deac, dec, drc, dac_cmp, dec_cmp, drc_cmp` in degrees
    pub deltas: [f32; 7],
}

impl CommandLogRecord {
    pub const SIZE: usize = 1 + 4 + 7 * 4;

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.push(COMMAND_LOG_RECORD);
        out.extend_from_slice(&self.intent_ts.to_be_bytes());
        for delta in self.deltas {
            out.extend_from_slice(&delta.to_be_bytes());
        }
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.first() != Some(&COMMAND_LOG_RECORD) {
            return Err(LinkError::decode_error("command log record", "wrong record type"));
        }
        let mut r = FieldReader::new(payload, Self::SIZE, "command log record")?;
        let intent_ts = r.u32();
        let mut deltas = [0.0f32; 7];
        for delta in &mut deltas {
            *delta = r.f32();
        }
        Ok(Self { intent_ts, deltas })
    }
}

fn put_u16s(out: &mut Vec<u8>, values: &[u16]) {
    for v in values {
        out.extend_from_slice(&v.to_be_bytes());
    }
}

fn put_i16s(out: &mut Vec<u8>, values: &[i16]) {
    for v in values {
        out.extend_from_slice(&v.to_be_bytes());
    }
}

/// Sequential big-endian reader over a record whose length was checked up front.
///
/// The type byte is skipped on construction.
struct FieldReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8], expected: usize, context: &str) -> Result<Self> {
        if data.len() < expected {
            return Err(LinkError::decode_error(
                context,
                format!("need {} bytes, have {}", expected, data.len()),
            ));
        }
        Ok(Self { data: &data[..expected], offset: 1 })
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[self.offset..self.offset + N]);
        self.offset += N;
        bytes
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn u16(&mut self) -> u16 {
        u16::from_be_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_be_bytes(self.take())
    }

    fn f32(&mut self) -> f32 {
        f32::from_be_bytes(self.take())
    }

    fn u16_array<const N: usize>(&mut self) -> [u16; N] {
        std::array::from_fn(|_| self.u16())
    }

    fn i16_array<const N: usize>(&mut self) -> [i16; N] {
        std::array::from_fn(|_| i16::from_be_bytes(self.take()))
    }
}
