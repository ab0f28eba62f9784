//! Tag updates and processing options for metadata writes

use crate::{byte_range::DEFAULT_CHUNK_SIZE, tags::TagKind};

/// Options controlling how data is streamed during writes
#[derive(Debug, Clone, Default)]
pub(crate) struct ProcessingOptions {
    /// Chunk size for copying untouched boxes (default: DEFAULT_CHUNK_SIZE = 64KB)
    pub(crate) chunk_size: Option<usize>,
}

impl ProcessingOptions {
    /// Get the effective chunk size (uses DEFAULT_CHUNK_SIZE if not set)
    pub(crate) fn effective_chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE).max(1)
    }
}

/// Update strategy for a single tag
///
/// By default, the existing tag is kept unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TagUpdate<T> {
    /// Keep the existing tag (default)
    #[default]
    Keep,
    /// Remove the existing tag
    Clear,
    /// Replace or add the tag
    Set(T),
}

impl<T> TagUpdate<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }
}

/// Updates to apply when writing a file
///
/// This struct uses a builder pattern where the default is to keep every tag
/// unchanged. Use the builder methods to explicitly specify changes.
///
/// # Example
///
/// ```
/// use mp4_meta_io::Updates;
///
/// // Set the title, remove the album, keep everything else
/// let updates = Updates::new()
///     .set_title("שיר")
///     .clear_album();
/// assert!(!updates.is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct Updates {
    pub(crate) title: TagUpdate<String>,
    pub(crate) artist: TagUpdate<String>,
    pub(crate) album: TagUpdate<String>,
    pub(crate) year: TagUpdate<String>,
    pub(crate) artwork: TagUpdate<Vec<u8>>,

    /// Processing options (chunk size)
    pub(crate) processing: ProcessingOptions,
}

impl Updates {
    /// Create a new `Updates` builder with every tag set to keep (no changes)
    pub fn new() -> Self {
        Self::default()
    }

    /// Map optional field values onto updates
    ///
    /// `None` keeps the existing tag, an empty value clears it and anything
    /// else sets it.
    pub fn from_fields(
        artwork: Option<&[u8]>,
        title: Option<&str>,
        artist: Option<&str>,
        album: Option<&str>,
        year: Option<&str>,
    ) -> Self {
        fn text(value: Option<&str>) -> TagUpdate<String> {
            match value {
                None => TagUpdate::Keep,
                Some("") => TagUpdate::Clear,
                Some(text) => TagUpdate::Set(text.to_string()),
            }
        }

        Self {
            title: text(title),
            artist: text(artist),
            album: text(album),
            year: text(year),
            artwork: match artwork {
                None => TagUpdate::Keep,
                Some([]) => TagUpdate::Clear,
                Some(data) => TagUpdate::Set(data.to_vec()),
            },
            processing: ProcessingOptions::default(),
        }
    }

    pub fn set_title(mut self, title: impl Into<String>) -> Self {
        self.title = TagUpdate::Set(title.into());
        self
    }

    pub fn clear_title(mut self) -> Self {
        self.title = TagUpdate::Clear;
        self
    }

    pub fn set_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = TagUpdate::Set(artist.into());
        self
    }

    pub fn clear_artist(mut self) -> Self {
        self.artist = TagUpdate::Clear;
        self
    }

    pub fn set_album(mut self, album: impl Into<String>) -> Self {
        self.album = TagUpdate::Set(album.into());
        self
    }

    pub fn clear_album(mut self) -> Self {
        self.album = TagUpdate::Clear;
        self
    }

    pub fn set_year(mut self, year: impl Into<String>) -> Self {
        self.year = TagUpdate::Set(year.into());
        self
    }

    pub fn clear_year(mut self) -> Self {
        self.year = TagUpdate::Clear;
        self
    }

    /// Set cover art; the image format is detected from the data
    pub fn set_artwork(mut self, artwork: Vec<u8>) -> Self {
        self.artwork = TagUpdate::Set(artwork);
        self
    }

    pub fn clear_artwork(mut self) -> Self {
        self.artwork = TagUpdate::Clear;
        self
    }

    /// Set the buffer size used to copy media boxes
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.processing.chunk_size = Some(chunk_size);
        self
    }

    /// Update for a text tag; `None` for [`TagKind::CoverArt`]
    pub fn text(&self, kind: TagKind) -> Option<&TagUpdate<String>> {
        match kind {
            TagKind::Title => Some(&self.title),
            TagKind::Artist => Some(&self.artist),
            TagKind::Album => Some(&self.album),
            TagKind::Year => Some(&self.year),
            TagKind::CoverArt => None,
        }
    }

    pub fn artwork(&self) -> &TagUpdate<Vec<u8>> {
        &self.artwork
    }

    /// True when every tag is kept
    pub fn is_empty(&self) -> bool {
        self.title.is_keep()
            && self.artist.is_keep()
            && self.album.is_keep()
            && self.year.is_keep()
            && self.artwork.is_keep()
    }

    /// True when at least one tag will be written (not just kept or cleared)
    pub(crate) fn has_values(&self) -> bool {
        TagKind::TEXT
            .iter()
            .filter_map(|&kind| self.text(kind))
            .any(|update| matches!(update, TagUpdate::Set(text) if !text.is_empty()))
            || matches!(&self.artwork, TagUpdate::Set(data) if !data.is_empty())
    }
}
