use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info};

use super::RecordHeader;
use crate::{LinkError, Result};

/// Append-only writer for the raw flight record.
///
/// The busy flag is raised for the duration of each record write so a process
/// tailing the file can avoid reading half a record.
pub struct FrameRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
    busy: Arc<AtomicBool>,
    records: u64,
}

impl FrameRecorder {
    /// Open (or create) the record for appending.
    ///
    /// Failure is logged and returned; the caller must not start without it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path).map_err(|e| {
            error!("Cannot open flight record {}: {}", path.display(), e);
            LinkError::file_error(path.clone(), e)
        })?;

        info!("Start Recording to {}", path.display());
        Ok(Self { path, writer: BufWriter::new(file), busy: Arc::new(AtomicBool::new(false)), records: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shared handle on the busy flag.
    pub fn busy_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.busy)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Append one header plus raw bytes.
    pub fn write_record(
        &mut self,
        data: &[u8],
        gen_ts: u32,
        sent_ts: u32,
        recv_ts: u32,
        port: u16,
    ) -> Result<()> {
        let len = u16::try_from(data.len()).map_err(|_| {
            LinkError::file_error(
                self.path.clone(),
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("record of {} bytes exceeds the u16 length field", data.len()),
                ),
            )
        })?;
        let header = RecordHeader { gen_ts, sent_ts, recv_ts, port, len };

        self.busy.store(true, Ordering::Release);
        let result = self
            .writer
            .write_all(&header.encode())
            .and_then(|()| self.writer.write_all(data))
            .and_then(|()| self.writer.flush());
        self.busy.store(false, Ordering::Release);

        result.map_err(|e| LinkError::file_error(self.path.clone(), e))?;
        self.records += 1;
        Ok(())
    }

    /// Flush and close the record.
    pub fn close(mut self) -> Result<()> {
        self.writer.flush().map_err(|e| LinkError::file_error(self.path.clone(), e))?;
        info!("Stop Recording to {} ({} records)", self.path.display(), self.records);
        Ok(())
    }
}
