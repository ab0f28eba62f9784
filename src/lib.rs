//! Streaming metadata editing for MP4/M4A files.
//!
//! This crate writes title, artist, album, year and cover art into the
//! `moov/udta/meta/ilst` item list of an ISO-BMFF file without re-encoding
//! or loading the media data into memory.
//!
//! # Design Principles
//!
//! - **Streaming**: Only the `moov` box is loaded; every other box is copied in bounded chunks
//! - **Two passes**: The source is scanned and edited before the output file is created
//! - **No surprises**: Untouched files serialize byte for byte; chunk offsets follow a resized `moov`
//!
//! # Quick Start
//!
//! ```no_run
//! // Set title and cover, clear the album, keep artist and year
//! let cover = std::fs::read("cover.jpg").unwrap();
//! let ok = mp4_meta_io::embed_metadata(
//!     "in.m4a",
//!     "out.m4a",
//!     Some(cover.as_slice()),
//!     Some("Title"),
//!     None,
//!     Some(""),
//!     None,
//! );
//! assert!(ok);
//! ```
//!
//! # Asset API
//!
//! For error details and reading tags back, use [`Asset`] with [`Updates`]:
//!
//! ```no_run
//! use mp4_meta_io::{Asset, Updates};
//!
//! # fn main() -> mp4_meta_io::Result<()> {
//! let mut asset = Asset::open("in.m4a")?;
//! if let Some(title) = asset.tags()?.title {
//!     println!("Current title: {}", title);
//! }
//!
//! let updates = Updates::new().set_artist("Artist").clear_year();
//! let summary = asset.write_to("out.m4a", &updates)?;
//! println!("moov grew by {} bytes", summary.moov_size_after - summary.moov_size_before);
//! # Ok(())
//! # }
//! ```

mod asset;
pub mod bmff;
mod byte_range;
mod error;
mod structure;
mod tags;
mod updates;

pub use asset::{Asset, WriteSummary};
pub use bmff::{BoxNode, BoxTree, BoxType, MetadataEditor, Payload};
pub use byte_range::{ByteRange, DEFAULT_CHUNK_SIZE, MAX_MOOV_SIZE};
pub use error::{Error, Result};
pub use structure::{BoxEntry, Structure};
pub use tags::{
    Artwork, ImageFormat, TagKind, Tags, DATA_TYPE_BMP, DATA_TYPE_GIF, DATA_TYPE_JPEG,
    DATA_TYPE_PNG, DATA_TYPE_UTF8,
};
pub use updates::{TagUpdate, Updates};

// Test utilities - only compiled for tests or when explicitly enabled
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use log::error;
use std::fs;
use std::path::Path;

/// Write tags into a copy of `input` at `output`
///
/// For each field, `None` keeps the existing tag, an empty value removes it
/// and anything else replaces it. Cover art format is detected from the
/// image signature.
///
/// Returns `false` on any failure; the reason is logged. No output file is
/// left behind on failure.
pub fn embed_metadata<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    artwork: Option<&[u8]>,
    title: Option<&str>,
    artist: Option<&str>,
    album: Option<&str>,
    year: Option<&str>,
) -> bool {
    let updates = Updates::from_fields(artwork, title, artist, album, year);
    match try_embed_metadata(input.as_ref(), output.as_ref(), &updates) {
        Ok(_) => true,
        Err(err) => {
            error!(
                "Failed to embed metadata into {}: {}",
                input.as_ref().display(),
                err
            );
            false
        }
    }
}

/// Write tags into a copy of `input` at `output`, reporting the error on failure
///
/// # Errors
/// - `StreamOpen`: input cannot be opened or output cannot be created
/// - `SamePath`: input and output are the same file
/// - `MalformedContainer`: no `moov` box (output is not created)
/// - `PartialWrite`: streaming failed after the output was created (output is removed)
pub fn try_embed_metadata<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    updates: &Updates,
) -> Result<WriteSummary> {
    let (input, output) = (input.as_ref(), output.as_ref());
    check_distinct(input, output)?;
    Asset::open(input)?.write_to(output, updates)
}

/// Copy a progressive file to `output` unchanged
///
/// Files that only contain movie fragments are rejected. Returns `false` on
/// any failure; the reason is logged.
pub fn defragment<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> bool {
    match try_defragment(input.as_ref(), output.as_ref()) {
        Ok(_) => true,
        Err(err) => {
            error!("Failed to defragment {}: {}", input.as_ref().display(), err);
            false
        }
    }
}

/// Copy a progressive file to `output` unchanged, returning the bytes copied
///
/// # Errors
/// - `FragmentedUnsupported`: the file has `moof` boxes and no `moov`
/// - `MalformedContainer`: the file has neither
///
/// In both cases no output file is created.
pub fn try_defragment<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<u64> {
    let (input, output) = (input.as_ref(), output.as_ref());
    check_distinct(input, output)?;
    let mut asset = Asset::open(input)?;
    asset.check_progressive()?;
    asset::with_output_file(output, |writer| asset.defragment_into(writer))
}

/// Reject an output path that resolves to the input file
fn check_distinct(input: &Path, output: &Path) -> Result<()> {
    let input = fs::canonicalize(input).map_err(|source| Error::StreamOpen {
        path: input.to_path_buf(),
        source,
    })?;
    match fs::canonicalize(output) {
        Ok(output) if output == input => Err(Error::SamePath(output)),
        _ => Ok(()),
    }
}
