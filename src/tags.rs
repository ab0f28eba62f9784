//! iTunes-style tag kinds and cover art formats

use crate::bmff::BoxType;
use byteorder::{ByteOrder, LittleEndian};
use log::warn;

/// `data` box type indicator for UTF-8 text
pub const DATA_TYPE_UTF8: u32 = 1;
/// `data` box type indicator for GIF images
pub const DATA_TYPE_GIF: u32 = 12;
/// `data` box type indicator for JPEG images
pub const DATA_TYPE_JPEG: u32 = 13;
/// `data` box type indicator for PNG images
pub const DATA_TYPE_PNG: u32 = 14;
/// `data` box type indicator for BMP images
pub const DATA_TYPE_BMP: u32 = 27;

/// The tags this crate reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// `©nam`
    Title,
    /// `©ART`
    Artist,
    /// `©alb`
    Album,
    /// `©day`
    Year,
    /// `covr`
    CoverArt,
}

impl TagKind {
    /// Text tags in the order they are applied
    pub const TEXT: [TagKind; 4] = [TagKind::Title, TagKind::Artist, TagKind::Album, TagKind::Year];

    /// Box type of the tag item under `ilst`
    pub fn box_type(self) -> BoxType {
        match self {
            Self::Title => BoxType::NameTag,
            Self::Artist => BoxType::ArtistTag,
            Self::Album => BoxType::AlbumTag,
            Self::Year => BoxType::DayTag,
            Self::CoverArt => BoxType::CoverTag,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Year => "year",
            Self::CoverArt => "cover_art",
        }
    }
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Encoding of cover art image data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    /// Signature not recognised
    Unknown,
}

impl ImageFormat {
    /// Detect the format from the leading magic bytes
    pub fn detect(data: &[u8]) -> Self {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            Self::Png
        } else if data.starts_with(b"GIF8") {
            Self::Gif
        } else if data.starts_with(&[0xFF, 0xD8]) {
            Self::Jpeg
        } else if is_bmp(data) {
            Self::Bmp
        } else {
            Self::Unknown
        }
    }

    /// Type indicator written into the `data` box
    ///
    /// Unrecognised data is stored as JPEG, which is what players assume for
    /// untyped cover art.
    pub fn data_type(self) -> u32 {
        match self {
            Self::Png => DATA_TYPE_PNG,
            Self::Gif => DATA_TYPE_GIF,
            Self::Bmp => DATA_TYPE_BMP,
            Self::Jpeg => DATA_TYPE_JPEG,
            Self::Unknown => {
                warn!("Unrecognised cover art signature, storing as JPEG");
                DATA_TYPE_JPEG
            }
        }
    }

    /// Format named by a `data` box type indicator
    pub fn from_data_type(data_type: u32) -> Self {
        match data_type {
            DATA_TYPE_JPEG => Self::Jpeg,
            DATA_TYPE_PNG => Self::Png,
            DATA_TYPE_GIF => Self::Gif,
            DATA_TYPE_BMP => Self::Bmp,
            _ => Self::Unknown,
        }
    }
}

/// `BM` followed by a little-endian file size equal to the data length
fn is_bmp(data: &[u8]) -> bool {
    data.len() >= 14
        && data.starts_with(b"BM")
        && LittleEndian::read_u32(&data[2..6]) as usize == data.len()
}

/// Cover art read back from a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

/// Tag values present in a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    pub artwork: Option<Artwork>,
}

impl Tags {
    pub fn text(&self, kind: TagKind) -> Option<&str> {
        match kind {
            TagKind::Title => self.title.as_deref(),
            TagKind::Artist => self.artist.as_deref(),
            TagKind::Album => self.album.as_deref(),
            TagKind::Year => self.year.as_deref(),
            TagKind::CoverArt => None,
        }
    }

    pub(crate) fn text_mut(&mut self, kind: TagKind) -> Option<&mut Option<String>> {
        match kind {
            TagKind::Title => Some(&mut self.title),
            TagKind::Artist => Some(&mut self.artist),
            TagKind::Album => Some(&mut self.album),
            TagKind::Year => Some(&mut self.year),
            TagKind::CoverArt => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Tags::default()
    }
}
