//! Box type codes and box header encoding
//!
//! Reference: ISO/IEC 14496-12:2022 section 4.2

use crate::error::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub(crate) const HEADER_SIZE: u64 = 8; // 4 byte size + 4 byte type
pub(crate) const HEADER_SIZE_LARGE: u64 = 16; // 4 byte size + 4 byte type + 8 byte large size

/// Box type enum for the BMFF boxes this crate understands
macro_rules! boxtype {
    ($( $name:ident => $value:expr ),*) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum BoxType {
            $( $name, )*
            UnknownBox(u32),
        }

        impl From<u32> for BoxType {
            fn from(t: u32) -> BoxType {
                match t {
                    $( $value => BoxType::$name, )*
                    _ => BoxType::UnknownBox(t),
                }
            }
        }

        impl From<BoxType> for u32 {
            fn from(t: BoxType) -> u32 {
                match t {
                    $( BoxType::$name => $value, )*
                    BoxType::UnknownBox(t) => t,
                }
            }
        }
    }
}

boxtype! {
    Empty => 0x0000_0000,
    FtypBox => 0x66747970,
    FreeBox => 0x66726565,
    MdatBox => 0x6d646174,
    MoovBox => 0x6d6f6f76,
    MvhdBox => 0x6d766864,
    MvexBox => 0x6d766578,
    MoofBox => 0x6d6f6f66,
    MfraBox => 0x6d667261,
    TrakBox => 0x7472616b,
    TrefBox => 0x74726566,
    EdtsBox => 0x65647473,
    MdiaBox => 0x6d646961,
    MinfBox => 0x6d696e66,
    DinfBox => 0x64696e66,
    StblBox => 0x7374626c,
    StcoBox => 0x7374636F,
    Co64Box => 0x636F3634,
    UdtaBox => 0x75647461,
    MetaBox => 0x6D657461,
    HdlrBox => 0x68646c72,
    IlstBox => 0x696c7374,
    DataBox => 0x64617461,
    NameTag => 0xA96E616D,
    ArtistTag => 0xA9415254,
    AlbumTag => 0xA9616C62,
    DayTag => 0xA9646179,
    CoverTag => 0x636F7672
}

/// Handler type declared by the `hdlr` box of an iTunes-style metadata `meta` box
pub(crate) const HANDLER_TYPE_MDIR: u32 = 0x6D646972;

impl BoxType {
    /// Four character code as raw bytes
    pub fn to_bytes(self) -> [u8; 4] {
        u32::from(self).to_be_bytes()
    }

    /// Four character code as text
    ///
    /// Bytes are mapped as Latin-1, so `0xA9` renders as `©` the way iTunes
    /// documents its tag names.
    pub fn fourcc(self) -> String {
        self.to_bytes().iter().map(|&b| b as char).collect()
    }

    /// Whether children of this box are themselves boxes
    pub(crate) fn is_container(self) -> bool {
        matches!(
            self,
            BoxType::MoovBox
                | BoxType::TrakBox
                | BoxType::TrefBox
                | BoxType::EdtsBox
                | BoxType::MdiaBox
                | BoxType::MinfBox
                | BoxType::DinfBox
                | BoxType::StblBox
                | BoxType::MvexBox
                | BoxType::UdtaBox
                | BoxType::MetaBox
                | BoxType::IlstBox
        )
    }
}

impl std::fmt::Display for BoxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fourcc())
    }
}

/// Decoded box header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BoxHeader {
    pub box_type: BoxType,
    /// Total box size including the header; `None` when the size field was 0
    /// (box runs to the end of its enclosing space)
    pub size: Option<u64>,
    /// Header was written with a 64-bit size field
    pub large_size: bool,
}

impl BoxHeader {
    /// Read a header from a stream positioned at the start of a box
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let size = reader.read_u32::<BigEndian>()?;
        let box_type = BoxType::from(reader.read_u32::<BigEndian>()?);

        Ok(match size {
            1 => BoxHeader {
                box_type,
                size: Some(reader.read_u64::<BigEndian>()?),
                large_size: true,
            },
            0 => BoxHeader {
                box_type,
                size: None,
                large_size: false,
            },
            _ => BoxHeader {
                box_type,
                size: Some(size as u64),
                large_size: false,
            },
        })
    }

    /// Decode a header from the start of `data`
    ///
    /// Returns `None` when `data` is too short to hold the header.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = data;
        Self::read(&mut reader).ok()
    }

    /// Length of the encoded header in bytes
    pub fn header_len(&self) -> u64 {
        if self.large_size {
            HEADER_SIZE_LARGE
        } else {
            HEADER_SIZE
        }
    }

    /// Write a header for a box of `size` total bytes
    ///
    /// The 64-bit form is used when `large_size` is requested or when the size
    /// does not fit in 32 bits.
    pub fn write<W: Write + ?Sized>(
        writer: &mut W,
        box_type: BoxType,
        size: u64,
        large_size: bool,
    ) -> Result<u64> {
        if large_size || size > u32::MAX as u64 {
            writer.write_u32::<BigEndian>(1)?;
            writer.write_u32::<BigEndian>(box_type.into())?;
            writer.write_u64::<BigEndian>(size)?;
            Ok(HEADER_SIZE_LARGE)
        } else {
            writer.write_u32::<BigEndian>(size as u32)?;
            writer.write_u32::<BigEndian>(box_type.into())?;
            Ok(HEADER_SIZE)
        }
    }
}

/// Header length needed for a box with `content_len` bytes after the header
pub(crate) fn header_len_for(content_len: u64, large_size: bool) -> u64 {
    if large_size || content_len + HEADER_SIZE > u32::MAX as u64 {
        HEADER_SIZE_LARGE
    } else {
        HEADER_SIZE
    }
}

pub(crate) fn read_box_header_ext<R: Read + ?Sized>(reader: &mut R) -> Result<(u8, u32)> {
    let version = reader.read_u8()?;
    let flags = reader.read_u24::<BigEndian>()?;
    Ok((version, flags))
}

pub(crate) fn write_box_header_ext<W: Write + ?Sized>(w: &mut W, v: u8, f: u32) -> Result<u64> {
    w.write_u8(v)?;
    w.write_u24::<BigEndian>(f)?;
    Ok(4)
}
