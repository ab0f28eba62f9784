#![no_main]

use libfuzzer_sys::fuzz_target;
use mp4_meta_io::{Asset, Updates};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let Ok(mut asset) = Asset::from_source(Cursor::new(data)) else {
        return;
    };

    // Unchanged rewrite
    let _ = asset.write(&mut Vec::new(), &Updates::new());

    // Set every tag, using the input prefix as cover art
    let cover = data.iter().copied().take(64).collect::<Vec<u8>>();
    let updates = Updates::new()
        .set_title("fuzz")
        .set_artist("פאזר")
        .set_album("album")
        .set_year("1999")
        .set_artwork(cover)
        .with_chunk_size(7);
    let mut output = Vec::new();
    if asset.write(&mut output, &updates).is_ok() {
        // The output must scan and parse again
        if let Ok(mut rewritten) = Asset::from_source(Cursor::new(output)) {
            let _ = rewritten.tags();
        }
    }

    // Clear every tag
    let updates = Updates::new()
        .clear_title()
        .clear_artist()
        .clear_album()
        .clear_year()
        .clear_artwork();
    let _ = asset.write(&mut Vec::new(), &updates);
});
