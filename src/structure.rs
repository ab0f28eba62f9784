//! Top-level box index of a parsed file

use crate::{
    bmff::{BoxHeader, BoxType},
    byte_range::ByteRange,
    error::Result,
};
use log::{debug, warn};
use std::io::{Read, Seek, SeekFrom};

/// One top-level box: its type and where it lives in the source stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxEntry {
    /// Box type
    pub box_type: BoxType,
    /// Offset of the first header byte
    pub offset: u64,
    /// Total size in bytes, header included
    pub size: u64,
}

impl BoxEntry {
    /// Byte range covered by this box
    pub fn range(&self) -> ByteRange {
        ByteRange::new(self.offset, self.size)
    }

    /// Offset one past the last byte of this box
    pub fn end_offset(&self) -> u64 {
        self.range().end_offset()
    }
}

/// Represents the discovered top-level layout of a file
///
/// Built by a single linear scan that reads only box headers, so it is cheap
/// even for multi-gigabyte files.
#[derive(Debug, Clone)]
pub struct Structure {
    /// Top-level boxes in ascending offset order
    pub entries: Vec<BoxEntry>,

    /// Total stream length
    pub total_size: u64,

    /// Quick lookup: index of the first `moov` entry (if any)
    moov_index: Option<usize>,
}

impl Structure {
    /// Scan the top level of `reader`
    ///
    /// Scanning stops at the end of the stream, at the first header that cannot
    /// be read, or at a declared size smaller than its own header. Whatever was
    /// collected up to that point is returned; the caller decides whether the
    /// layout is usable (see [`Structure::moov`]).
    ///
    /// The stream position is left wherever scanning stopped.
    pub fn scan<R: Read + Seek + ?Sized>(reader: &mut R) -> Result<Self> {
        let total_size = reader.seek(SeekFrom::End(0))?;

        let mut entries = Vec::new();
        let mut moov_index = None;
        let mut offset = 0u64;

        while offset < total_size {
            if reader.seek(SeekFrom::Start(offset)).is_err() {
                break;
            }
            let header = match BoxHeader::read(reader) {
                Ok(header) => header,
                Err(err) => {
                    debug!("Stopped scanning at offset {}: {}", offset, err);
                    break;
                }
            };

            let size = header.size.unwrap_or(total_size - offset);
            if size < header.header_len() {
                warn!(
                    "Box '{}' at offset {} declares size {} smaller than its header",
                    header.box_type, offset, size
                );
                break;
            }

            if header.box_type == BoxType::MoovBox && moov_index.is_none() {
                moov_index = Some(entries.len());
            }
            entries.push(BoxEntry {
                box_type: header.box_type,
                offset,
                size,
            });

            offset = match offset.checked_add(size) {
                Some(next) => next,
                None => break,
            };
        }

        let structure = Self {
            entries,
            total_size,
            moov_index,
        };

        if !structure.is_complete() {
            warn!(
                "Box layout covers {} of {} bytes",
                structure.covered_size(),
                total_size
            );
        }
        debug!("Found {} top-level boxes", structure.entries.len());

        Ok(structure)
    }

    /// The first `moov` entry, if present
    pub fn moov(&self) -> Option<&BoxEntry> {
        self.moov_index.map(|i| &self.entries[i])
    }

    /// Index of the first `moov` entry in [`Structure::entries`]
    pub fn moov_index(&self) -> Option<usize> {
        self.moov_index
    }

    /// First entry of the given type
    pub fn find(&self, box_type: BoxType) -> Option<&BoxEntry> {
        self.entries.iter().find(|e| e.box_type == box_type)
    }

    /// True when the file carries movie fragments (`moof`) and no `moov`
    pub fn is_fragmented(&self) -> bool {
        self.moov_index.is_none() && self.find(BoxType::MoofBox).is_some()
    }

    /// Bytes from offset 0 to the end of the last entry
    pub fn covered_size(&self) -> u64 {
        self.entries.last().map(|e| e.end_offset()).unwrap_or(0)
    }

    /// True when entries tile the stream exactly
    pub fn is_complete(&self) -> bool {
        self.covered_size() == self.total_size
            && self
                .entries
                .windows(2)
                .all(|w| w[0].range().is_contiguous_with(&w[1].range()))
    }
}
