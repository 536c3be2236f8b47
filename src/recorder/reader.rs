use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{COMMAND_PORT, RecordHeader};
use crate::framing::{CommandLogRecord, SensorRecord, unpack};
use crate::telemetry::TelemetryState;
use crate::{LinkError, Result};

/// One header plus its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub header: RecordHeader,
    pub data: Vec<u8>,
}

impl LogEntry {
    pub fn is_command(&self) -> bool {
        self.header.port == COMMAND_PORT
    }

    /// Sensor records of an inbound radio buffer, in arrival order.
    pub fn sensor_records(&self) -> Result<Vec<SensorRecord>> {
        let Some(batch) = unpack(&self.data)? else {
            return Ok(Vec::new());
        };
        batch.frames.iter().map(|frame| SensorRecord::decode(&frame.payload)).collect()
    }

    pub fn command(&self) -> Result<CommandLogRecord> {
        CommandLogRecord::decode(&self.data)
    }
}

/// Sequential reader over a raw flight record held in memory.
pub struct LogReader {
    data: Vec<u8>,
    position: usize,
    path: PathBuf,
}

impl LogReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read(&path).map_err(|e| LinkError::file_error(path.clone(), e))?;
        debug!("Loaded flight record {} ({} bytes)", path.display(), data.len());
        Ok(Self { data, position: 0, path })
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Self { data: data.to_vec(), position: 0, path: PathBuf::from("<memory>") }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the next entry, `Ok(None)` at a clean end of file.
    pub fn read_next(&mut self) -> Result<Option<LogEntry>> {
        let rest = &self.data[self.position..];
        if rest.is_empty() {
            return Ok(None);
        }

        let header = RecordHeader::decode(rest)?;
        let end = RecordHeader::SIZE + usize::from(header.len);
        if rest.len() < end {
            return Err(LinkError::decode_error(
                "flight record",
                format!("truncated record at offset {}", self.position),
            ));
        }

        let data = rest[RecordHeader::SIZE..end].to_vec();
        self.position += end;
        Ok(Some(LogEntry { header, data }))
    }
}

impl Iterator for LogReader {
    type Item = Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                // A damaged record ends iteration; there is no resync marker.
                self.position = self.data.len();
                Some(Err(e))
            }
        }
    }
}

/// Counts from one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub sensor_records: usize,
    pub commands: usize,
    pub dropped: usize,
}

/// Feed every recorded sensor record through `state` again.
///
/// Garbled buffers are counted and skipped, as the live link does. Command
/// records are counted but not re-issued.
pub fn replay(reader: LogReader, state: &mut TelemetryState) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();
    for entry in reader {
        let entry = entry?;
        if entry.is_command() {
            stats.commands += 1;
            continue;
        }
        match entry.sensor_records() {
            Ok(records) => {
                for record in &records {
                    state.apply_record(record);
                }
                stats.sensor_records += records.len();
            }
            Err(e) => {
                warn!("Skipping recorded buffer: {}", e);
                stats.dropped += 1;
            }
        }
    }
    Ok(stats)
}
