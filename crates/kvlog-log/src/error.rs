use std::io;
use std::path::PathBuf;

/// Errors produced by the record log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// I/O error on the log file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// CRC integrity check failed for a record read by offset.
    #[error("CRC integrity check failed at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        offset: u64,
        expected: u32,
        actual: u32,
    },

    /// A record header points outside the file.
    #[error("invalid record length {length} at offset {offset}")]
    InvalidRecordLength { offset: u64, length: u32 },

    /// A record exceeds the maximum frame size.
    #[error("record of {size} bytes exceeds the frame limit")]
    RecordTooLarge { size: usize },

    /// Another handle holds the log file open.
    #[error("log file {} is locked by another handle", .path.display())]
    Locked { path: PathBuf },

    /// Internal lock was poisoned by a panicking writer.
    #[error("log lock poisoned")]
    Poisoned,
}

/// Convenience alias used throughout the log crate.
pub type LogResult<T> = std::result::Result<T, LogError>;
