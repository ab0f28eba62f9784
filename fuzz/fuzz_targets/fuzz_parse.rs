#![no_main]

use libfuzzer_sys::fuzz_target;
use mp4_meta_io::{Asset, BoxTree};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Scanning and tree parsing should NEVER panic, only return errors
    if let Ok(mut asset) = Asset::from_source(Cursor::new(data)) {
        let _ = asset.structure().is_complete();
        let _ = asset.tags();
        let _ = asset.defragment_into(&mut Vec::new());
    }

    // Treat the input as a single serialized box as well
    if let Ok(tree) = BoxTree::from_box_bytes(data) {
        let _ = tree.size(tree.root());
        let _ = tree.to_bytes(tree.root());
    }
});
