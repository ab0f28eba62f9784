//! Chunk offset adjustment after the movie box changes size
//!
//! `stco` and `co64` hold absolute file offsets of media chunks. When `moov`
//! sits before the media data, growing or shrinking it moves every chunk by the
//! same amount.

use super::{
    header::BoxType,
    tree::{BoxTree, Payload},
};
use crate::error::{Error, Result};
use atree::Token;
use byteorder::{BigEndian, ByteOrder};
use log::debug;

/// Path from `moov` to each sample table
const STBL_PATH: [BoxType; 3] = [BoxType::MdiaBox, BoxType::MinfBox, BoxType::StblBox];

/// Shift chunk offsets at or after `threshold` by `delta` bytes
///
/// Applies to every `stco`/`co64` under `moov/trak/mdia/minf/stbl`. Returns the
/// number of entries changed.
pub fn shift_chunk_offsets(
    tree: &mut BoxTree,
    moov: Token,
    threshold: u64,
    delta: i64,
) -> Result<usize> {
    if delta == 0 {
        return Ok(0);
    }

    let mut tables = Vec::new();
    for trak in tree.children(moov) {
        if tree.node(trak).box_type != BoxType::TrakBox {
            continue;
        }
        let stbl = STBL_PATH
            .iter()
            .try_fold(trak, |parent, &box_type| tree.find_child(parent, box_type));
        if let Some(stbl) = stbl {
            tables.extend(tree.children(stbl).into_iter().filter(|&child| {
                matches!(
                    tree.node(child).box_type,
                    BoxType::StcoBox | BoxType::Co64Box
                )
            }));
        }
    }

    let mut shifted = 0;
    for table in tables {
        let Some(node) = tree.node_mut(table) else {
            continue;
        };
        let wide = node.box_type == BoxType::Co64Box;
        if let Payload::Data(data) = &mut node.payload {
            shifted += shift_table(data, wide, threshold, delta)?;
        }
    }

    debug!("Shifted {} chunk offsets by {}", shifted, delta);
    Ok(shifted)
}

/// Rewrite one `stco` (32-bit) or `co64` (64-bit) payload in place
///
/// Layout: version/flags (4), entry_count (4), entries.
fn shift_table(data: &mut [u8], wide: bool, threshold: u64, delta: i64) -> Result<usize> {
    if data.len() < 8 {
        return Err(Error::InvalidFormat("Chunk offset box too short".to_string()));
    }
    let entry_size = if wide { 8 } else { 4 };
    let count = BigEndian::read_u32(&data[4..8]) as usize;
    let entries = &mut data[8..];
    if count
        .checked_mul(entry_size)
        .map_or(true, |needed| needed > entries.len())
    {
        return Err(Error::InvalidFormat(format!(
            "Chunk offset box declares {} entries but holds {} bytes",
            count,
            entries.len()
        )));
    }

    let mut shifted = 0;
    for entry in entries.chunks_exact_mut(entry_size).take(count) {
        let offset = if wide {
            BigEndian::read_u64(entry)
        } else {
            BigEndian::read_u32(entry) as u64
        };
        if offset < threshold {
            continue;
        }

        let moved = offset
            .checked_add_signed(delta)
            .ok_or(Error::OffsetOverflow { offset })?;
        if wide {
            BigEndian::write_u64(entry, moved);
        } else {
            let moved = u32::try_from(moved).map_err(|_| Error::OffsetOverflow { offset: moved })?;
            BigEndian::write_u32(entry, moved);
        }
        shifted += 1;
    }

    Ok(shifted)
}
