//! File-level metadata rewriting
//!
//! An [`Asset`] scans the top-level layout of an MP4 stream once and can then
//! read tags, write an edited copy, or copy itself through unchanged.

use crate::{
    bmff::{apply_updates, read_tags, shift_chunk_offsets, BoxTree},
    byte_range::{copy_range, ByteRange, DEFAULT_CHUNK_SIZE},
    error::{Error, Result},
    structure::Structure,
    tags::Tags,
    Updates,
};
use log::{debug, error, info};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

/// Outcome of a successful metadata write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    /// Total bytes written to the output
    pub bytes_written: u64,
    /// Size of the source `moov` box
    pub moov_size_before: u64,
    /// Size of the rewritten `moov` box
    pub moov_size_after: u64,
    /// Chunk offset entries moved to follow the resized `moov`
    pub chunk_offsets_shifted: usize,
}

/// An MP4/M4A stream with its scanned box layout
///
/// # Example
///
/// ```no_run
/// use mp4_meta_io::{Asset, Updates};
///
/// # fn main() -> mp4_meta_io::Result<()> {
/// let mut asset = Asset::open("song.m4a")?;
/// println!("{:?}", asset.tags()?);
///
/// let updates = Updates::new().set_title("New title");
/// asset.write_to("tagged.m4a", &updates)?;
/// # Ok(())
/// # }
/// ```
pub struct Asset<R: Read + Seek> {
    reader: R,
    structure: Structure,
}

/// Edited file tree ready to be emitted
struct Prepared {
    tree: BoxTree,
    moov_size_before: u64,
    moov_size_after: u64,
    chunk_offsets_shifted: usize,
}

impl Asset<File> {
    /// Open an MP4 file from a path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::StreamOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_source(file)
    }
}

impl<R: Read + Seek> Asset<R> {
    /// Scan the box layout of any seekable source
    pub fn from_source(mut reader: R) -> Result<Self> {
        let structure = Structure::scan(&mut reader)?;
        Ok(Self { reader, structure })
    }

    /// The scanned top-level layout
    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// Consume the asset and return the source
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read title, artist, album, year and cover art
    pub fn tags(&mut self) -> Result<Tags> {
        let tree = BoxTree::parse(&mut self.reader, &self.structure)?;
        Ok(tree
            .moov()
            .map(|moov| read_tags(&tree, moov))
            .unwrap_or_default())
    }

    /// Write an edited copy of the stream to `writer`
    ///
    /// Every top-level box other than `moov` is copied byte for byte in
    /// bounded chunks; `moov` is re-serialized with the updates applied.
    pub fn write<W: Write>(&mut self, writer: &mut W, updates: &Updates) -> Result<WriteSummary> {
        let prepared = self.prepare(updates)?;
        self.emit(prepared, writer, updates.processing.effective_chunk_size())
    }

    /// Write an edited copy of the stream to a new file at `path`
    ///
    /// All parsing and editing happens before the file is created, so a
    /// malformed source never touches `path`. If streaming fails after the
    /// file was created, the partial output is removed.
    pub fn write_to<P: AsRef<Path>>(&mut self, path: P, updates: &Updates) -> Result<WriteSummary> {
        let path = path.as_ref();
        let prepared = self.prepare(updates)?;
        let chunk_size = updates.processing.effective_chunk_size();
        with_output_file(path, |writer| self.emit(prepared, writer, chunk_size))
    }

    /// Copy the stream unchanged if it already has a `moov` box
    ///
    /// Rebuilding a movie box from fragments is not supported.
    pub fn defragment_into<W: Write>(&mut self, writer: &mut W) -> Result<u64> {
        self.check_progressive()?;
        let total = ByteRange::new(0, self.structure.total_size);
        let copied = copy_range(&mut self.reader, writer, total, DEFAULT_CHUNK_SIZE)?;
        writer.flush()?;
        Ok(copied)
    }

    pub(crate) fn check_progressive(&self) -> Result<()> {
        if self.structure.moov().is_some() {
            Ok(())
        } else if self.structure.is_fragmented() {
            Err(Error::FragmentedUnsupported)
        } else {
            Err(Error::MalformedContainer("Missing moov box".to_string()))
        }
    }

    /// Parse and edit the file tree without writing anything
    fn prepare(&mut self, updates: &Updates) -> Result<Prepared> {
        let moov_entry = *self
            .structure
            .moov()
            .ok_or_else(|| Error::MalformedContainer("Missing moov box".to_string()))?;

        let mut tree = BoxTree::parse(&mut self.reader, &self.structure)?;
        let moov = tree
            .moov()
            .ok_or_else(|| Error::MalformedContainer("Missing moov box".to_string()))?;

        apply_updates(&mut tree, moov, updates)?;

        let moov_size_after = tree.size(moov);
        let delta = moov_size_after as i128 - moov_entry.size as i128;
        let delta = i64::try_from(delta)
            .map_err(|_| Error::InvalidFormat("moov size change out of range".to_string()))?;
        let chunk_offsets_shifted =
            shift_chunk_offsets(&mut tree, moov, moov_entry.end_offset(), delta)?;

        debug!(
            "moov resized from {} to {} bytes",
            moov_entry.size, moov_size_after
        );

        Ok(Prepared {
            tree,
            moov_size_before: moov_entry.size,
            moov_size_after,
            chunk_offsets_shifted,
        })
    }

    fn emit<W: Write>(&mut self, prepared: Prepared, writer: &mut W, chunk_size: usize) -> Result<WriteSummary> {
        let tree = &prepared.tree;
        let bytes_written = tree.write_box(tree.root(), &mut self.reader, writer, chunk_size)?;
        writer.flush()?;

        info!(
            "Wrote {} bytes (moov {} -> {})",
            bytes_written, prepared.moov_size_before, prepared.moov_size_after
        );

        Ok(WriteSummary {
            bytes_written,
            moov_size_before: prepared.moov_size_before,
            moov_size_after: prepared.moov_size_after,
            chunk_offsets_shifted: prepared.chunk_offsets_shifted,
        })
    }
}

/// Create `path`, run `f` against a buffered writer, and remove the file on failure
pub(crate) fn with_output_file<T>(
    path: &Path,
    f: impl FnOnce(&mut BufWriter<File>) -> Result<T>,
) -> Result<T> {
    let file = File::create(path).map_err(|source| Error::StreamOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    let result = f(&mut writer).and_then(|value| {
        writer.flush()?;
        Ok(value)
    });

    if let Err(err) = &result {
        error!("Write to {} failed: {}", path.display(), err);
        drop(writer);
        if let Err(remove_err) = fs::remove_file(path) {
            debug!("Could not remove partial output {}: {}", path.display(), remove_err);
        }
    }
    result
}
