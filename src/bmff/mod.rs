//! BMFF (ISO Base Media File Format) box model
//!
//! Supports MP4, M4A, M4B and MOV files.
//!
//! Reference: ISO/IEC 14496-12:2022

mod chunk_offsets;
mod header;
mod ilst;
mod tree;

pub use chunk_offsets::shift_chunk_offsets;
pub(crate) use header::BoxHeader;
pub use header::BoxType;
pub use ilst::{apply_updates, clear_tag, count_items, read_tags, MetadataEditor};
pub use tree::{BoxNode, BoxTree, Payload};

pub use atree::Token;
