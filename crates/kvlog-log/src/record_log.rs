use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LogError, LogResult};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: u64 = 8;

/// Flush/sync strategy for appends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every append (safest, highest latency).
    EveryWrite,
    /// Flush to the OS after every append and rely on its page cache.
    #[default]
    OsDefault,
}

/// Configuration for a [`RecordLog`].
#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    pub sync_mode: SyncMode,
}

/// A record recovered from the log, with the offset it was written at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord<T> {
    pub offset: u64,
    pub value: T,
}

struct LogWriter {
    file: File,
    /// Offset the next record will be written at.
    offset: u64,
}

/// Append-only log of bincode records.
///
/// On-disk format, repeated:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized record)]
/// ```
///
/// Appends are serialized behind a mutex. Reads by offset use a separate
/// handle so they never wait on an in-flight append's fsync.
pub struct RecordLog<T> {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    reader: Mutex<File>,
    /// Held for the log's lifetime; released on drop.
    _lock: File,
    config: LogConfig,
    _record: PhantomData<fn() -> T>,
}

impl<T> RecordLog<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open (or create) the log at `path` and recover its records.
    ///
    /// A sidecar `<name>.lock` file is locked exclusively for the lifetime of
    /// the returned log; a second open of the same path fails with
    /// [`LogError::Locked`] until the first is dropped.
    ///
    /// Records failing the CRC check or deserialization are logged and
    /// skipped. Only a torn tail (a bad frame with no intact frame after it)
    /// is truncated; damage inside the file never removes the records that
    /// follow it.
    pub fn open(path: &Path, config: LogConfig) -> LogResult<(Self, Vec<LogRecord<T>>)> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock = acquire_lock(path)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let file_len = file.metadata()?.len();
        let (records, valid_end) = scan::<T>(&file)?;

        if valid_end < file_len {
            warn!(
                path = %path.display(),
                valid_end,
                file_len,
                "truncating torn log tail"
            );
            file.set_len(valid_end)?;
            file.sync_all()?;
        }

        debug!(path = %path.display(), recovered = records.len(), "log recovery complete");

        let reader = File::open(path)?;
        let log = Self {
            path: path.to_path_buf(),
            writer: Mutex::new(LogWriter {
                file,
                offset: valid_end,
            }),
            reader: Mutex::new(reader),
            _lock: lock,
            config,
            _record: PhantomData,
        };
        Ok((log, records))
    }

    /// Append a record. Returns the byte offset it was written at.
    pub fn append(&self, record: &T) -> LogResult<u64> {
        let payload =
            bincode::serialize(record).map_err(|e| LogError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| LogError::RecordTooLarge { size: payload.len() })?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut w = self.writer.lock().map_err(|_| LogError::Poisoned)?;
        let entry_offset = w.offset;

        if let Err(e) = write_frame(&mut w.file, &frame, self.config.sync_mode) {
            // Drop whatever part of the frame reached the file.
            if let Err(trunc) = w.file.set_len(entry_offset) {
                warn!(offset = entry_offset, error = %trunc, "failed to roll back partial append");
            }
            return Err(e.into());
        }

        w.offset += frame.len() as u64;

        debug!(offset = entry_offset, len = payload.len(), "log append");
        Ok(entry_offset)
    }

    /// Read the record written at `offset`.
    pub fn read_at(&self, offset: u64) -> LogResult<T> {
        let mut file = self.reader.lock().map_err(|_| LogError::Poisoned)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        let (length, expected) = parse_header(&header);

        let file_len = file.metadata()?.len();
        if length == 0 || offset + HEADER_SIZE + u64::from(length) > file_len {
            return Err(LogError::InvalidRecordLength { offset, length });
        }

        let mut payload = vec![0u8; length as usize];
        file.read_exact(&mut payload)?;

        let actual = crc32fast::hash(&payload);
        if actual != expected {
            return Err(LogError::CrcMismatch {
                offset,
                expected,
                actual,
            });
        }

        bincode::deserialize(&payload).map_err(|e| LogError::Serialization(e.to_string()))
    }

    /// Force buffered data to disk.
    pub fn sync(&self) -> LogResult<()> {
        let w = self.writer.lock().map_err(|_| LogError::Poisoned)?;
        w.file.sync_all()?;
        Ok(())
    }

    /// Offset the next record will be written at.
    pub fn offset(&self) -> LogResult<u64> {
        Ok(self.writer.lock().map_err(|_| LogError::Poisoned)?.offset)
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> std::fmt::Debug for RecordLog<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordLog")
            .field("path", &self.path)
            .field("sync_mode", &self.config.sync_mode)
            .finish()
    }
}

fn acquire_lock(path: &Path) -> LogResult<File> {
    let lock_path = path.with_extension("lock");
    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)?;
    lock_file.try_lock_exclusive().map_err(|_| LogError::Locked {
        path: path.to_path_buf(),
    })?;
    Ok(lock_file)
}

fn write_frame(file: &mut File, frame: &[u8], sync_mode: SyncMode) -> io::Result<()> {
    file.write_all(frame)?;
    file.flush()?;
    if sync_mode == SyncMode::EveryWrite {
        file.sync_data()?;
    }
    Ok(())
}

fn parse_header(header: &[u8; HEADER_SIZE as usize]) -> (u32, u32) {
    let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    (length, crc)
}

/// One frame position as seen during recovery.
enum Frame<'a> {
    /// Header fits, payload fits, CRC matches.
    Intact(&'a [u8]),
    /// Header fits and the payload lies inside the file, but the CRC fails.
    Corrupt { end: usize },
    /// No well-formed header here: zero length or a payload past EOF.
    Unframed,
}

fn frame_at(data: &[u8], offset: usize) -> Frame<'_> {
    let header_end = offset.saturating_add(HEADER_SIZE as usize);
    let Some(header) = data
        .get(offset..header_end)
        .and_then(|h| <&[u8; HEADER_SIZE as usize]>::try_from(h).ok())
    else {
        return Frame::Unframed;
    };
    let (length, expected_crc) = parse_header(header);
    let end = header_end.saturating_add(length as usize);
    if length == 0 || end > data.len() {
        return Frame::Unframed;
    }
    let payload = &data[header_end..end];
    if crc32fast::hash(payload) == expected_crc {
        Frame::Intact(payload)
    } else {
        Frame::Corrupt { end }
    }
}

/// First offset at or after `from` holding an intact frame.
fn resync(data: &[u8], from: usize) -> Option<usize> {
    (from..data.len()).find(|&p| matches!(frame_at(data, p), Frame::Intact(_)))
}

/// Read every intact record. Returns the records and the offset where the
/// next append belongs.
///
/// A bad frame followed by at least one intact frame is corruption inside the
/// file: it is skipped and everything after it is kept. A bad frame with no
/// intact frame after it is a torn tail, and the returned offset points at its
/// start so the caller can cut it off.
fn scan<T: DeserializeOwned>(file: &File) -> LogResult<(Vec<LogRecord<T>>, u64)> {
    let mut reader = file.try_clone()?;
    reader.seek(SeekFrom::Start(0))?;
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;

    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset < data.len() {
        match frame_at(&data, offset) {
            Frame::Intact(payload) => {
                let next = offset + HEADER_SIZE as usize + payload.len();
                match bincode::deserialize::<T>(payload) {
                    Ok(value) => records.push(LogRecord {
                        offset: offset as u64,
                        value,
                    }),
                    Err(e) => {
                        warn!(offset, error = %e, "failed to deserialize record; skipping");
                    }
                }
                offset = next;
            }
            Frame::Corrupt { end } => {
                // The length may itself be damaged, so prefer the next intact
                // frame over the declared end.
                let next = resync(&data, offset + 1).map_or(end, |p| p.min(end));
                warn!(offset, next, "CRC mismatch; skipping record");
                offset = next;
            }
            Frame::Unframed => match resync(&data, offset + 1) {
                Some(next) => {
                    warn!(offset, next, "invalid record header; skipping to next intact record");
                    offset = next;
                }
                None => {
                    warn!(offset, file_len = data.len(), "torn record at end of log");
                    break;
                }
            },
        }
    }

    Ok((records, offset as u64))
}
