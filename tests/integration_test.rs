// Integration tests for the file-path entry points

#[cfg(test)]
mod embed_tests {
    use mp4_meta_io::{
        embed_metadata, test_utils::*, try_embed_metadata, Asset, Error, ImageFormat, Updates,
    };
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn write_input(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, data).expect("write input");
        path
    }

    fn tags_at(path: &Path) -> mp4_meta_io::Tags {
        Asset::open(path)
            .expect("open output")
            .tags()
            .expect("read tags")
    }

    #[test]
    fn test_embed_all_fields() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "in.m4a", &minimal_m4a(&pattern(4096)));
        let output = dir.path().join("out.m4a");
        let cover = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

        assert!(embed_metadata(
            &input,
            &output,
            Some(&cover[..]),
            Some("Title"),
            Some("Artist"),
            Some("Album"),
            Some("2024"),
        ));

        let tags = tags_at(&output);
        assert_eq!(tags.title.as_deref(), Some("Title"));
        assert_eq!(tags.artist.as_deref(), Some("Artist"));
        assert_eq!(tags.album.as_deref(), Some("Album"));
        assert_eq!(tags.year.as_deref(), Some("2024"));
        let art = tags.artwork.expect("cover art");
        assert_eq!(art.format, ImageFormat::Jpeg);
        assert_eq!(art.data, cover);

        // Input is never modified
        assert_eq!(fs::read(&input).unwrap(), minimal_m4a(&pattern(4096)));
    }

    #[test]
    fn test_embed_hebrew_and_arabic_title() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "in.m4a", &minimal_m4a(&pattern(256)));
        let output = dir.path().join("out.m4a");
        let title = "שיר ערש";
        let artist = "فيروز";

        assert!(embed_metadata(&input, &output, None, Some(title), Some(artist), None, None));

        let tags = tags_at(&output);
        assert_eq!(tags.title.as_deref(), Some(title));
        assert_eq!(tags.artist.as_deref(), Some(artist));
    }

    #[test]
    fn test_absent_fields_keep_existing_tags() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "in.m4a", &minimal_m4a(&pattern(256)));
        let tagged = dir.path().join("tagged.m4a");
        let retagged = dir.path().join("retagged.m4a");

        assert!(embed_metadata(
            &input,
            &tagged,
            Some(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A][..]),
            Some("Old title"),
            Some("Artist"),
            Some("Album"),
            None,
        ));
        assert!(embed_metadata(
            &tagged,
            &retagged,
            None,
            Some("New title"),
            None,
            Some(""),
            None,
        ));

        let tags = tags_at(&retagged);
        assert_eq!(tags.title.as_deref(), Some("New title"));
        assert_eq!(tags.artist.as_deref(), Some("Artist"));
        assert_eq!(tags.album, None);
        assert_eq!(tags.year, None);
        assert_eq!(tags.artwork.map(|a| a.format), Some(ImageFormat::Png));
    }

    #[test]
    fn test_media_payload_survives_rewrite() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let payload = pattern(200_000);
        let input = write_input(&dir, "in.m4a", &minimal_m4a(&payload));
        let output = dir.path().join("out.m4a");

        let summary = try_embed_metadata(&input, &output, &Updates::new().set_title("T")).unwrap();

        let out = fs::read(&output).unwrap();
        assert_eq!(summary.bytes_written, out.len() as u64);
        assert_eq!(summary.chunk_offsets_shifted, 1);

        let start = stco_offsets(&out)[0] as usize;
        assert_eq!(&out[start..], &payload[..]);
    }

    #[test]
    fn test_missing_moov_creates_no_output() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let mut data = make_box(b"ftyp", b"M4A \0\0\0\0");
        data.extend(make_box(b"mdat", &pattern(128)));
        let input = write_input(&dir, "in.m4a", &data);
        let output = dir.path().join("out.m4a");

        assert!(!embed_metadata(&input, &output, None, Some("T"), None, None, None));
        assert!(!output.exists());

        let err = try_embed_metadata(&input, &output, &Updates::new().set_title("T")).unwrap_err();
        assert!(matches!(err, Error::MalformedContainer(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_truncated_input_removes_partial_output() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let mut data = minimal_m4a(&pattern(10_000));
        data.truncate(data.len() - 100);
        let input = write_input(&dir, "in.m4a", &data);
        let output = dir.path().join("out.m4a");

        let err = try_embed_metadata(&input, &output, &Updates::new().set_title("T")).unwrap_err();
        assert!(matches!(err, Error::PartialWrite { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_input() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.m4a");

        assert!(!embed_metadata(
            dir.path().join("missing.m4a"),
            &output,
            None,
            Some("T"),
            None,
            None,
            None
        ));
        assert!(!output.exists());
    }

    #[test]
    fn test_same_path_is_rejected() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let data = minimal_m4a(&pattern(512));
        let input = write_input(&dir, "in.m4a", &data);

        let err = try_embed_metadata(&input, &input, &Updates::new().set_title("T")).unwrap_err();
        assert!(matches!(err, Error::SamePath(_)));
        assert_eq!(fs::read(&input).unwrap(), data);
    }
}

#[cfg(test)]
mod defragment_tests {
    use mp4_meta_io::{defragment, test_utils::*, try_defragment, Error};
    use std::fs;

    #[test]
    fn test_progressive_file_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let data = moov_last_m4a(&pattern(9000));
        let input = dir.path().join("in.mp4");
        let output = dir.path().join("out.mp4");
        fs::write(&input, &data).unwrap();

        assert!(defragment(&input, &output));
        assert_eq!(fs::read(&output).unwrap(), data);
    }

    #[test]
    fn test_fragmented_file_creates_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        let output = dir.path().join("out.mp4");
        fs::write(&input, fragmented_mp4()).unwrap();

        assert!(!defragment(&input, &output));
        assert!(!output.exists());
        assert!(matches!(
            try_defragment(&input, &output),
            Err(Error::FragmentedUnsupported)
        ));
        assert!(!output.exists());
    }

    #[test]
    fn test_file_without_movie_boxes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        let output = dir.path().join("out.mp4");
        fs::write(&input, make_box(b"free", &[0; 16])).unwrap();

        assert!(matches!(
            try_defragment(&input, &output),
            Err(Error::MalformedContainer(_))
        ));
        assert!(!output.exists());
    }
}
