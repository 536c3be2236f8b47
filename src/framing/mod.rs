//! Radio-link framing.
//!
//! The radio carries byte-stuffed buffers: every record starts with a reserved
//! delimiter byte, reserved bytes inside a record are escaped, and each buffer
//! ends with the timestamp at which the whole batch was sent.
//!
//! - [`codec`] splits and builds those buffers
//! - [`records`] gives meaning to the payloads they carry

pub mod codec;
pub mod records;

pub use codec::{
    Batch, DELIMITER, ESCAPE, ESCAPE_MASK, Frame, encode_batch, pack, packs, unpack,
};
pub use records::{
    AcmRecord, ActuatorKind, ActuatorPacket, AirflowRecord, CmpRecord, CommandLogRecord, RigRecord,
    SensorRecord,
};
