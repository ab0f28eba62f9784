//! Test utilities for building synthetic MP4 files.
//!
//! Real media fixtures are large and carry licensing baggage, so tests build
//! the smallest files that exercise each code path instead:
//! - Raw boxes, full boxes and 64-bit size boxes
//! - Progressive M4A files with `moov` before or after `mdat`
//! - Fragmented files made of `moof`/`mdat` pairs
//!
//! # Usage
//!
//! ```
//! use mp4_meta_io::test_utils::*;
//!
//! let file = minimal_m4a(&pattern(1024));
//! assert_eq!(stco_offsets(&file).len(), 1);
//! ```

use crate::{bmff::BoxTree, structure::Structure, BoxType, Payload};
use std::io::Cursor;

/// Serialize a box with a 32-bit size field
pub fn make_box(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&((8 + payload.len()) as u32).to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(payload);
    out
}

/// Serialize a full box (version and flags precede the payload)
pub fn make_full_box(fourcc: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + payload.len());
    body.push(version);
    body.extend_from_slice(&flags.to_be_bytes()[1..]);
    body.extend_from_slice(payload);
    make_box(fourcc, &body)
}

/// Serialize a box using the 64-bit size form
pub fn make_large_box(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + payload.len());
    out.extend_from_slice(&1u32.to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(&((16 + payload.len()) as u64).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// `stco` box with the given chunk offsets
pub fn stco(offsets: &[u32]) -> Vec<u8> {
    let mut body = (offsets.len() as u32).to_be_bytes().to_vec();
    for offset in offsets {
        body.extend_from_slice(&offset.to_be_bytes());
    }
    make_full_box(b"stco", 0, 0, &body)
}

/// `co64` box with the given chunk offsets
pub fn co64(offsets: &[u64]) -> Vec<u8> {
    let mut body = (offsets.len() as u32).to_be_bytes().to_vec();
    for offset in offsets {
        body.extend_from_slice(&offset.to_be_bytes());
    }
    make_full_box(b"co64", 0, 0, &body)
}

/// Deterministic, non-repeating-looking payload bytes
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// M4A `ftyp` box
pub fn ftyp() -> Vec<u8> {
    make_box(b"ftyp", b"M4A \0\0\0\0M4A mp42isom")
}

/// Audio `moov` with one track whose single chunk starts at `chunk_offset`
pub fn audio_moov(chunk_offset: u32) -> Vec<u8> {
    let mut mvhd_body = vec![0u8; 96];
    mvhd_body[8..12].copy_from_slice(&44100u32.to_be_bytes()); // timescale
    let mvhd = make_full_box(b"mvhd", 0, 0, &mvhd_body);

    let hdlr = make_full_box(b"hdlr", 0, 0, b"\0\0\0\0soun\0\0\0\0\0\0\0\0\0\0\0\0\0");
    let stsd = make_full_box(b"stsd", 0, 0, &0u32.to_be_bytes());
    let mut stbl_body = stsd;
    stbl_body.extend(stco(&[chunk_offset]));
    let stbl = make_box(b"stbl", &stbl_body);
    let minf = make_box(b"minf", &stbl);
    let mut mdia_body = hdlr;
    mdia_body.extend(minf);
    let mdia = make_box(b"mdia", &mdia_body);
    let trak = make_box(b"trak", &mdia);

    let mut body = mvhd;
    body.extend(trak);
    make_box(b"moov", &body)
}

/// Progressive M4A: `ftyp`, `moov`, `mdat`; the chunk offset points at `payload`
pub fn minimal_m4a(payload: &[u8]) -> Vec<u8> {
    let ftyp = ftyp();
    let moov_len = audio_moov(0).len();
    let chunk_offset = (ftyp.len() + moov_len + 8) as u32;

    let mut out = ftyp;
    out.extend(audio_moov(chunk_offset));
    out.extend(make_box(b"mdat", payload));
    out
}

/// Progressive M4A with the movie box last: `ftyp`, `mdat`, `moov`
pub fn moov_last_m4a(payload: &[u8]) -> Vec<u8> {
    let ftyp = ftyp();
    let chunk_offset = (ftyp.len() + 8) as u32;

    let mut out = ftyp;
    out.extend(make_box(b"mdat", payload));
    out.extend(audio_moov(chunk_offset));
    out
}

/// Fragmented MP4 without a movie box: `ftyp` followed by two `moof`/`mdat` pairs
pub fn fragmented_mp4() -> Vec<u8> {
    let mut out = make_box(b"ftyp", b"iso6\0\0\0\0iso6dash");
    for sequence in 1u32..=2 {
        let mfhd = make_full_box(b"mfhd", 0, 0, &sequence.to_be_bytes());
        out.extend(make_box(b"moof", &mfhd));
        out.extend(make_box(b"mdat", &pattern(64)));
    }
    out
}

/// Chunk offsets of every `stco` table in a file, in track order
pub fn stco_offsets(file: &[u8]) -> Vec<u64> {
    let mut source = Cursor::new(file);
    let Ok(structure) = Structure::scan(&mut source) else {
        return Vec::new();
    };
    let Ok(tree) = BoxTree::parse(&mut source, &structure) else {
        return Vec::new();
    };
    let Some(moov) = tree.moov() else {
        return Vec::new();
    };

    let path = [
        BoxType::TrakBox,
        BoxType::MdiaBox,
        BoxType::MinfBox,
        BoxType::StblBox,
        BoxType::StcoBox,
    ];
    let mut offsets = Vec::new();
    if let Some(table) = path
        .iter()
        .try_fold(moov, |parent, &box_type| tree.find_child(parent, box_type))
    {
        if let Payload::Data(data) = &tree.node(table).payload {
            offsets.extend(
                data[8..]
                    .chunks_exact(4)
                    .map(|entry| u32::from_be_bytes([entry[0], entry[1], entry[2], entry[3]]) as u64),
            );
        }
    }
    offsets
}
