//! Raw flight record.
//!
//! ## File Layout
//!
//! A flat sequence of records, each a 17-byte big-endian header followed by the
//! raw bytes:
//!
//! ```text
//! 0x7e | gen_ts u32 | sent_ts u32 | recv_ts u32 | port u16 | len u16 | bytes[len]
//! ```
//!
//! Inbound radio buffers are stored still framed, with the sender's port.
//! Outbound commands are stored as one unframed command-log record with port 0
//! and the intent, first-send and second-send timestamps.

mod reader;
mod writer;

pub use reader::{LogEntry, LogReader, ReplayStats, replay};
pub use writer::FrameRecorder;

use crate::{LinkError, Result};

/// First byte of every record header.
pub const RECORD_MARKER: u8 = 0x7E;

/// Port recorded for outbound command records.
pub const COMMAND_PORT: u16 = 0;

/// Header preceding each raw record in the flight log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub gen_ts: u32,
    pub sent_ts: u32,
    pub recv_ts: u32,
    pub port: u16,
    pub len: u16,
}

impl RecordHeader {
    pub const SIZE: usize = 1 + 3 * 4 + 2 * 2;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0] = RECORD_MARKER;
        out[1..5].copy_from_slice(&self.gen_ts.to_be_bytes());
        out[5..9].copy_from_slice(&self.sent_ts.to_be_bytes());
        out[9..13].copy_from_slice(&self.recv_ts.to_be_bytes());
        out[13..15].copy_from_slice(&self.port.to_be_bytes());
        out[15..17].copy_from_slice(&self.len.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(LinkError::decode_error(
                "flight record header",
                format!("need {} bytes, got {}", Self::SIZE, bytes.len()),
            ));
        }
        if bytes[0] != RECORD_MARKER {
            return Err(LinkError::decode_error(
                "flight record header",
                format!("bad marker 0x{:02x}", bytes[0]),
            ));
        }
        let u32_at = |i: usize| u32::from_be_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let u16_at = |i: usize| u16::from_be_bytes([bytes[i], bytes[i + 1]]);
        Ok(Self {
            gen_ts: u32_at(1),
            sent_ts: u32_at(5),
            recv_ts: u32_at(9),
            port: u16_at(13),
            len: u16_at(15),
        })
    }
}
