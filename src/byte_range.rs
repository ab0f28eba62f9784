//! Byte ranges and bounded streaming copies

use crate::error::{Error, Result};
use std::io::{Read, Seek, SeekFrom, Write};

/// A byte range in a file (offset and size)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Offset from start of file
    pub offset: u64,
    /// Size in bytes
    pub size: u64,
}

impl ByteRange {
    /// Create a new byte range
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Get the end offset of this range
    pub fn end_offset(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }

    /// Check if this range is immediately followed by another (contiguous)
    pub fn is_contiguous_with(&self, other: &ByteRange) -> bool {
        self.end_offset() == other.offset
    }
}

/// Chunk size for streaming large boxes (64KB)
pub const DEFAULT_CHUNK_SIZE: usize = 65536;

/// Maximum size of a `moov` box that will be loaded into memory (256 MB)
///
/// Media data is never loaded, only the movie box is. Real movie boxes are
/// a few kilobytes to a few megabytes; anything larger is treated as hostile.
pub const MAX_MOOV_SIZE: u64 = 256 * 1024 * 1024;

/// Copy `range` from `source` to `writer` through a buffer of at most `chunk_size` bytes
///
/// Any failure is reported as [`Error::PartialWrite`] carrying the source offset
/// at which the copy stopped.
pub(crate) fn copy_range<R: Read + Seek + ?Sized, W: Write + ?Sized>(
    source: &mut R,
    writer: &mut W,
    range: ByteRange,
    chunk_size: usize,
) -> Result<u64> {
    let partial = |offset: u64| move |source: std::io::Error| Error::PartialWrite { offset, source };

    source
        .seek(SeekFrom::Start(range.offset))
        .map_err(partial(range.offset))?;

    let chunk_size = chunk_size.max(1);
    let mut buffer = vec![0u8; (range.size.min(chunk_size as u64)) as usize];
    let mut remaining = range.size;

    while remaining > 0 {
        let to_read = remaining.min(buffer.len() as u64) as usize;
        let offset = range.end_offset() - remaining;
        source
            .read_exact(&mut buffer[..to_read])
            .map_err(partial(offset))?;
        writer
            .write_all(&buffer[..to_read])
            .map_err(partial(offset))?;
        remaining -= to_read as u64;
    }

    Ok(range.size)
}
