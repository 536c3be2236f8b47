//! Byte-stuffing codec for radio buffers.
//!
//! ## Wire Layout
//!
//! ```text
//! 0x9E | esc(ts_0 ‖ payload_0) | 0x9E | esc(ts_1 ‖ payload_1) | ... | esc(sent_ts)
//! ```
//!
//! Timestamps are big-endian `u32` microsecond counters. Inside a record, the two
//! reserved bytes are replaced by `0x9B, byte ^ 0x20`, so a literal delimiter only
//! ever appears at the start of a record. Bytes before the first delimiter are
//! pre-sync noise from the radio and are ignored.

use crate::{LinkError, Result};
use tracing::trace;

/// Marks the start of every record (0x80 + ASCII RS).
pub const DELIMITER: u8 = 0x9E;

/// Marks that the following byte was XORed with [`ESCAPE_MASK`] (0x80 + ASCII ESC).
pub const ESCAPE: u8 = 0x9B;

/// Mask applied to escaped bytes.
pub const ESCAPE_MASK: u8 = 0x20;

const TIMESTAMP_SIZE: usize = 4;

/// One timestamped record extracted from a radio buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Generation timestamp of the record, in microseconds
    pub timestamp: u32,

    /// Record bytes following the timestamp
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(timestamp: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self { timestamp, payload: payload.into() }
    }
}

/// All records of one radio buffer plus the time the buffer was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub frames: Vec<Frame>,
    pub sent_timestamp: u32,
}

/// Split a radio buffer into its timestamped records.
///
/// Returns `Ok(None)` when the buffer holds no delimiter at all, which is what a
/// noisy link produces between bursts. A record shorter than its timestamp, a
/// final record without room for the batch timestamp, or an escape byte with
/// nothing after it is a decode error; the caller drops the whole buffer.
pub fn unpack(buffer: &[u8]) -> Result<Option<Batch>> {
    let mut chunks = buffer.split(|&b| b == DELIMITER);
    // Everything before the first delimiter is noise.
    chunks.next();

    let mut records = Vec::new();
    for chunk in chunks {
        records.push(unescape(chunk)?);
    }

    let Some(last) = records.last_mut() else {
        return Ok(None);
    };

    if last.len() < TIMESTAMP_SIZE {
        return Err(LinkError::decode_error(
            "radio buffer",
            format!(
                "final record holds {} bytes, need {} for the batch timestamp",
                last.len(),
                TIMESTAMP_SIZE
            ),
        ));
    }
    let split_at = last.len() - TIMESTAMP_SIZE;
    let sent_timestamp = read_timestamp(&last[split_at..]);
    last.truncate(split_at);

    let mut frames = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        if record.len() < TIMESTAMP_SIZE {
            return Err(LinkError::decode_error(
                "radio buffer",
                format!("record {} holds {} bytes, shorter than its timestamp", index, record.len()),
            ));
        }
        let timestamp = read_timestamp(&record[..TIMESTAMP_SIZE]);
        frames.push(Frame { timestamp, payload: record[TIMESTAMP_SIZE..].to_vec() });
    }

    trace!("Unpacked {} records, sent_ts={}", frames.len(), sent_timestamp);

    Ok(Some(Batch { frames, sent_timestamp }))
}

/// Serialize one record: delimiter, then the escaped `timestamp ‖ payload`.
pub fn pack(payload: &[u8], timestamp: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 2 * (TIMESTAMP_SIZE + payload.len()));
    out.push(DELIMITER);
    for &byte in timestamp.to_be_bytes().iter().chain(payload) {
        push_escaped(&mut out, byte);
    }
    out
}

/// Concatenate already packed records and append the escaped batch timestamp.
///
/// Used both to finish a radio buffer and to build flight record headers out
/// of pre-framed pieces.
pub fn packs<P: AsRef<[u8]>>(timestamp: u32, packed: &[P]) -> Vec<u8> {
    let body_len: usize = packed.iter().map(|p| p.as_ref().len()).sum();
    let mut out = Vec::with_capacity(body_len + 2 * TIMESTAMP_SIZE);
    for piece in packed {
        out.extend_from_slice(piece.as_ref());
    }
    for byte in timestamp.to_be_bytes() {
        push_escaped(&mut out, byte);
    }
    out
}

/// Build a complete radio buffer from records and a send timestamp.
pub fn encode_batch(frames: &[Frame], sent_timestamp: u32) -> Vec<u8> {
    let packed: Vec<Vec<u8>> = frames.iter().map(|f| pack(&f.payload, f.timestamp)).collect();
    packs(sent_timestamp, &packed)
}

fn push_escaped(out: &mut Vec<u8>, byte: u8) {
    if byte == DELIMITER || byte == ESCAPE {
        out.push(ESCAPE);
        out.push(byte ^ ESCAPE_MASK);
    } else {
        out.push(byte);
    }
}

fn unescape(chunk: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(chunk.len());
    let mut bytes = chunk.iter();
    while let Some(&byte) = bytes.next() {
        if byte == ESCAPE {
            let Some(&escaped) = bytes.next() else {
                return Err(LinkError::decode_error(
                    "radio buffer",
                    "escape byte at end of record",
                ));
            };
            out.push(escaped ^ ESCAPE_MASK);
        } else {
            out.push(byte);
        }
    }
    Ok(out)
}

fn read_timestamp(bytes: &[u8]) -> u32 {
    let mut ts = [0u8; TIMESTAMP_SIZE];
    ts.copy_from_slice(&bytes[..TIMESTAMP_SIZE]);
    u32::from_be_bytes(ts)
}
