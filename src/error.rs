//! Error types for mp4-meta-io

use std::io;
use std::path::PathBuf;

/// Result type for mp4-meta-io operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while scanning, editing or rewriting an MP4 file
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input could not be opened or output could not be created
    #[error("Cannot open {}: {source}", path.display())]
    StreamOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Required box structure is missing (typically no `moov` box)
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// Read or write failed while streaming boxes to the output
    #[error("Write failed at source offset {offset}: {source}")]
    PartialWrite {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// Invalid box contents
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Data size exceeds maximum allowed
    #[error("Data too large: {size} bytes (max: {max})")]
    DataTooLarge { size: u64, max: u64 },

    /// Shifted chunk offset no longer fits in a 32-bit `stco` entry
    #[error("Chunk offset {offset} overflows 32-bit stco entry")]
    OffsetOverflow { offset: u64 },

    /// File only contains movie fragments (moof/mdat pairs)
    #[error("Fragmented file without moov box cannot be defragmented")]
    FragmentedUnsupported,

    /// Input and output resolve to the same file
    #[error("Input and output refer to the same file: {}", .0.display())]
    SamePath(PathBuf),
}
