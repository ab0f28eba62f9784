//! iTunes-style metadata editing under `moov/udta/meta/ilst`

use super::{
    header::{BoxType, HANDLER_TYPE_MDIR},
    tree::{BoxNode, BoxTree, Payload},
};
use crate::{
    error::Result,
    tags::{Artwork, ImageFormat, TagKind, Tags, DATA_TYPE_UTF8},
    updates::{TagUpdate, Updates},
};
use atree::Token;
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use log::{debug, info};

/// Editor for the item list of one `moov` box
pub struct MetadataEditor<'a> {
    tree: &'a mut BoxTree,
    ilst: Token,
}

impl<'a> MetadataEditor<'a> {
    /// Locate or create `udta → meta → ilst` under `moov`
    ///
    /// The first match of each box is used. A new `meta` is a full box
    /// (version 0, flags 0) whose first child is an `mdir` handler.
    pub fn ensure_metadata_path(tree: &'a mut BoxTree, moov: Token) -> Result<Self> {
        let udta = match tree.find_child(moov, BoxType::UdtaBox) {
            Some(udta) => udta,
            None => {
                debug!("Created udta box");
                tree.add_child(moov, BoxNode::container(BoxType::UdtaBox))?
            }
        };

        let meta = match tree.find_child(udta, BoxType::MetaBox) {
            Some(meta) => meta,
            None => {
                let meta = tree.add_child(udta, BoxNode::full_container(BoxType::MetaBox, 0, 0))?;
                tree.add_child(meta, BoxNode::leaf(BoxType::HdlrBox, metadata_handler()?))?;
                debug!("Created meta box with hdlr");
                meta
            }
        };

        let ilst = match tree.find_child(meta, BoxType::IlstBox) {
            Some(ilst) => ilst,
            None => {
                debug!("Created ilst box");
                tree.add_child(meta, BoxNode::container(BoxType::IlstBox))?
            }
        };

        Ok(Self { tree, ilst })
    }

    /// Apply `updates` in order: title, artist, album, year, cover art
    pub fn apply(&mut self, updates: &Updates) -> Result<()> {
        for kind in TagKind::TEXT {
            match updates.text(kind) {
                Some(TagUpdate::Set(text)) => self.set_text(kind, text)?,
                Some(TagUpdate::Clear) => {
                    self.clear(kind);
                }
                _ => {}
            }
        }

        match updates.artwork() {
            TagUpdate::Set(data) => {
                self.set_cover_art(data)?;
            }
            TagUpdate::Clear => {
                self.clear(TagKind::CoverArt);
            }
            TagUpdate::Keep => {}
        }
        Ok(())
    }

    /// Replace a text tag with a UTF-8 `data` box
    ///
    /// Empty text leaves the tag untouched; use [`MetadataEditor::clear`] to
    /// remove it.
    pub fn set_text(&mut self, kind: TagKind, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.upsert(kind, DATA_TYPE_UTF8, text.as_bytes())?;
        info!("Set {}: {}", kind, text);
        Ok(())
    }

    /// Replace the cover art; returns the detected image format
    ///
    /// Empty data leaves the tag untouched.
    pub fn set_cover_art(&mut self, data: &[u8]) -> Result<Option<ImageFormat>> {
        if data.is_empty() {
            return Ok(None);
        }
        let format = ImageFormat::detect(data);
        self.upsert(TagKind::CoverArt, format.data_type(), data)?;
        info!("Set cover art: {:?}, {} bytes", format, data.len());
        Ok(Some(format))
    }

    /// Remove every item of a tag; returns whether any was present
    pub fn clear(&mut self, kind: TagKind) -> bool {
        let removed = self.tree.delete_children(self.ilst, kind.box_type());
        if removed > 0 {
            info!("Cleared {} ({} items)", kind, removed);
        }
        removed > 0
    }

    /// The `ilst` box being edited
    pub fn ilst(&self) -> Token {
        self.ilst
    }

    fn upsert(&mut self, kind: TagKind, data_type: u32, value: &[u8]) -> Result<Token> {
        let replaced = self.tree.delete_children(self.ilst, kind.box_type());
        if replaced > 1 {
            debug!("Dropped {} duplicate {} items", replaced - 1, kind);
        }

        let item = self
            .tree
            .add_child(self.ilst, BoxNode::container(kind.box_type()))?;
        self.tree
            .add_child(item, BoxNode::leaf(BoxType::DataBox, data_payload(data_type, value)?))?;
        Ok(item)
    }
}

/// Remove every item of a tag without creating the metadata path
///
/// Returns whether anything was removed.
pub fn clear_tag(tree: &mut BoxTree, moov: Token, kind: TagKind) -> bool {
    match find_ilst(tree, moov) {
        Some(ilst) => tree.delete_children(ilst, kind.box_type()) > 0,
        None => false,
    }
}

/// Apply `updates` to the `moov` box of `tree`
///
/// The metadata path is only created when a value is written; clearing
/// tags from a file without metadata changes nothing.
pub fn apply_updates(tree: &mut BoxTree, moov: Token, updates: &Updates) -> Result<()> {
    if updates.is_empty() {
        return Ok(());
    }

    if updates.has_values() {
        return MetadataEditor::ensure_metadata_path(tree, moov)?.apply(updates);
    }

    for kind in TagKind::TEXT {
        if matches!(updates.text(kind), Some(TagUpdate::Clear)) {
            clear_tag(tree, moov, kind);
        }
    }
    if matches!(updates.artwork(), TagUpdate::Clear) {
        clear_tag(tree, moov, TagKind::CoverArt);
    }
    Ok(())
}

/// Read the supported tags from the `moov` box of `tree`
pub fn read_tags(tree: &BoxTree, moov: Token) -> Tags {
    let mut tags = Tags::default();
    let Some(ilst) = find_ilst(tree, moov) else {
        return tags;
    };

    for kind in TagKind::TEXT {
        if let Some((_, value)) = tag_value(tree, ilst, kind) {
            if let Some(slot) = tags.text_mut(kind) {
                *slot = Some(String::from_utf8_lossy(value).into_owned());
            }
        }
    }

    if let Some((data_type, value)) = tag_value(tree, ilst, TagKind::CoverArt) {
        tags.artwork = Some(Artwork {
            format: ImageFormat::from_data_type(data_type),
            data: value.to_vec(),
        });
    }

    tags
}

/// Number of items of the given kind under `ilst`
pub fn count_items(tree: &BoxTree, moov: Token, kind: TagKind) -> usize {
    find_ilst(tree, moov).map_or(0, |ilst| {
        tree.children(ilst)
            .into_iter()
            .filter(|&item| tree.node(item).box_type == kind.box_type())
            .count()
    })
}

fn find_ilst(tree: &BoxTree, moov: Token) -> Option<Token> {
    let udta = tree.find_child(moov, BoxType::UdtaBox)?;
    let meta = tree.find_child(udta, BoxType::MetaBox)?;
    tree.find_child(meta, BoxType::IlstBox)
}

/// Type indicator and value of the first `data` box of a tag item
fn tag_value(tree: &BoxTree, ilst: Token, kind: TagKind) -> Option<(u32, &[u8])> {
    let item = tree.find_child(ilst, kind.box_type())?;
    let data = tree.find_child(item, BoxType::DataBox)?;
    match &tree.node(data).payload {
        Payload::Data(payload) if payload.len() >= 8 => {
            Some((BigEndian::read_u32(&payload[0..4]), &payload[8..]))
        }
        _ => None,
    }
}

/// `data` box payload: type indicator, locale, value
fn data_payload(data_type: u32, value: &[u8]) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(8 + value.len());
    payload.write_u32::<BigEndian>(data_type)?;
    payload.write_u32::<BigEndian>(0)?; // locale
    payload.extend_from_slice(value);
    Ok(payload)
}

/// `hdlr` payload declaring the `mdir` handler with an empty name
fn metadata_handler() -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(25);
    payload.write_u32::<BigEndian>(0)?; // version + flags
    payload.write_u32::<BigEndian>(0)?; // pre_defined
    payload.write_u32::<BigEndian>(HANDLER_TYPE_MDIR)?;
    payload.extend_from_slice(&[0u8; 12]); // reserved
    payload.push(0); // empty name
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_box, make_full_box};

    fn bare_moov() -> BoxTree {
        let mvhd = make_full_box(b"mvhd", 0, 0, &[0u8; 96]);
        BoxTree::from_box_bytes(&make_box(b"moov", &mvhd)).unwrap()
    }

    #[test]
    fn test_ensure_path_creates_handler_first() {
        let mut tree = bare_moov();
        let moov = tree.moov().unwrap();

        MetadataEditor::ensure_metadata_path(&mut tree, moov).unwrap();

        let udta = tree.find_child(moov, BoxType::UdtaBox).unwrap();
        let meta = tree.find_child(udta, BoxType::MetaBox).unwrap();
        let children = tree.children(meta);
        assert_eq!(children.len(), 2);
        assert_eq!(tree.node(children[0]).box_type, BoxType::HdlrBox);
        assert_eq!(tree.node(children[1]).box_type, BoxType::IlstBox);
        assert_eq!(tree.node(meta).version_flags, Some((0, 0)));

        let hdlr = tree.to_bytes(children[0]).unwrap();
        assert_eq!(hdlr.len(), 33);
        assert_eq!(&hdlr[16..20], b"mdir");
    }

    #[test]
    fn test_ensure_path_reuses_existing_boxes() {
        let mut tree = bare_moov();
        let moov = tree.moov().unwrap();

        let first = MetadataEditor::ensure_metadata_path(&mut tree, moov).unwrap().ilst();
        let second = MetadataEditor::ensure_metadata_path(&mut tree, moov).unwrap().ilst();

        assert_eq!(first, second);
        let udta = tree.find_child(moov, BoxType::UdtaBox).unwrap();
        assert_eq!(tree.children(moov).len(), 2);
        assert_eq!(tree.children(udta).len(), 1);
    }

    #[test]
    fn test_set_text_replaces_existing_tag() {
        let mut tree = bare_moov();
        let moov = tree.moov().unwrap();

        let mut editor = MetadataEditor::ensure_metadata_path(&mut tree, moov).unwrap();
        editor.set_text(TagKind::Title, "First").unwrap();
        editor.set_text(TagKind::Artist, "Someone").unwrap();
        editor.set_text(TagKind::Title, "Second").unwrap();

        assert_eq!(count_items(&tree, moov, TagKind::Title), 1);
        let tags = read_tags(&tree, moov);
        assert_eq!(tags.title.as_deref(), Some("Second"));
        assert_eq!(tags.artist.as_deref(), Some("Someone"));
    }

    #[test]
    fn test_data_box_layout() {
        let mut tree = bare_moov();
        let moov = tree.moov().unwrap();

        let mut editor = MetadataEditor::ensure_metadata_path(&mut tree, moov).unwrap();
        editor.set_text(TagKind::Year, "2024").unwrap();
        let ilst = editor.ilst();

        let item = tree.find_child(ilst, BoxType::DayTag).unwrap();
        let bytes = tree.to_bytes(item).unwrap();
        let mut expected = vec![0, 0, 0, 28, 0xA9, b'd', b'a', b'y'];
        expected.extend_from_slice(&[0, 0, 0, 20]);
        expected.extend_from_slice(b"data");
        expected.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0]);
        expected.extend_from_slice(b"2024");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_empty_text_is_noop() {
        let mut tree = bare_moov();
        let moov = tree.moov().unwrap();

        let mut editor = MetadataEditor::ensure_metadata_path(&mut tree, moov).unwrap();
        editor.set_text(TagKind::Album, "Album").unwrap();
        editor.set_text(TagKind::Album, "").unwrap();

        assert_eq!(read_tags(&tree, moov).album.as_deref(), Some("Album"));
    }

    #[test]
    fn test_cover_art_type_codes() {
        let mut tree = bare_moov();
        let moov = tree.moov().unwrap();
        let png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2];

        let mut editor = MetadataEditor::ensure_metadata_path(&mut tree, moov).unwrap();
        assert_eq!(editor.set_cover_art(&png).unwrap(), Some(ImageFormat::Png));
        assert_eq!(editor.set_cover_art(&[]).unwrap(), None);

        let art = read_tags(&tree, moov).artwork.unwrap();
        assert_eq!(art.format, ImageFormat::Png);
        assert_eq!(art.data, png);

        let mut editor = MetadataEditor::ensure_metadata_path(&mut tree, moov).unwrap();
        editor.set_cover_art(&[0xFF, 0xD8, 0xFF, 0xDB]).unwrap();
        assert_eq!(count_items(&tree, moov, TagKind::CoverArt), 1);
        assert_eq!(read_tags(&tree, moov).artwork.unwrap().format, ImageFormat::Jpeg);
    }

    #[test]
    fn test_apply_order_is_deterministic() {
        let mut tree = bare_moov();
        let moov = tree.moov().unwrap();
        let updates = Updates::new()
            .set_artwork(vec![0xFF, 0xD8, 0xFF])
            .set_year("1999")
            .set_album("Album")
            .set_artist("Artist")
            .set_title("Title");

        apply_updates(&mut tree, moov, &updates).unwrap();

        let ilst = find_ilst(&tree, moov).unwrap();
        let order: Vec<BoxType> = tree
            .children(ilst)
            .into_iter()
            .map(|item| tree.node(item).box_type)
            .collect();
        assert_eq!(
            order,
            vec![
                BoxType::NameTag,
                BoxType::ArtistTag,
                BoxType::AlbumTag,
                BoxType::DayTag,
                BoxType::CoverTag
            ]
        );
    }

    #[test]
    fn test_clear_only_does_not_create_path() {
        let mut tree = bare_moov();
        let moov = tree.moov().unwrap();
        let before = tree.to_bytes(moov).unwrap();

        apply_updates(&mut tree, moov, &Updates::new().clear_title().clear_artwork()).unwrap();

        assert_eq!(tree.to_bytes(moov).unwrap(), before);
    }

    fn text_item(fourcc: &[u8; 4], text: &str) -> Vec<u8> {
        let mut payload = vec![0, 0, 0, 1, 0, 0, 0, 0];
        payload.extend_from_slice(text.as_bytes());
        make_box(fourcc, &make_box(b"data", &payload))
    }

    fn moov_with_udta(udta_body: &[u8]) -> BoxTree {
        let mut body = make_full_box(b"mvhd", 0, 0, &[0u8; 96]);
        body.extend(make_box(b"udta", udta_body));
        BoxTree::from_box_bytes(&make_box(b"moov", &body)).unwrap()
    }

    fn duplicate_titles() -> BoxTree {
        let mut items = text_item(&[0xA9, b'n', b'a', b'm'], "A");
        items.extend(text_item(&[0xA9, b'A', b'R', b'T'], "Artist"));
        items.extend(text_item(&[0xA9, b'n', b'a', b'm'], "B"));
        let hdlr = make_full_box(b"hdlr", 0, 0, b"\0\0\0\0mdir\0\0\0\0\0\0\0\0\0\0\0\0\0");
        let mut meta_body = hdlr;
        meta_body.extend(make_box(b"ilst", &items));
        moov_with_udta(&make_full_box(b"meta", 0, 0, &meta_body))
    }

    #[test]
    fn test_set_text_replaces_duplicate_items() {
        let mut tree = duplicate_titles();
        let moov = tree.moov().unwrap();
        assert_eq!(count_items(&tree, moov, TagKind::Title), 2);

        apply_updates(&mut tree, moov, &Updates::new().set_title("New")).unwrap();

        assert_eq!(count_items(&tree, moov, TagKind::Title), 1);
        let tags = read_tags(&tree, moov);
        assert_eq!(tags.title.as_deref(), Some("New"));
        assert_eq!(tags.artist.as_deref(), Some("Artist"));
    }

    #[test]
    fn test_clear_removes_duplicate_items() {
        let mut tree = duplicate_titles();
        let moov = tree.moov().unwrap();

        apply_updates(&mut tree, moov, &Updates::new().clear_title()).unwrap();

        assert_eq!(count_items(&tree, moov, TagKind::Title), 0);
        assert_eq!(read_tags(&tree, moov).title, None);

        let mut tree = duplicate_titles();
        let moov = tree.moov().unwrap();
        assert!(clear_tag(&mut tree, moov, TagKind::Title));
        assert!(!clear_tag(&mut tree, moov, TagKind::Title));
    }

    #[test]
    fn test_udta_with_trailing_garbage_accepts_metadata() {
        let mut udta_body = make_box(b"free", &[0u8; 4]);
        udta_body.extend_from_slice(&[0xFF; 10]);
        let mut tree = moov_with_udta(&udta_body);
        let moov = tree.moov().unwrap();

        apply_updates(&mut tree, moov, &Updates::new().set_title("Title")).unwrap();

        assert_eq!(read_tags(&tree, moov).title.as_deref(), Some("Title"));
        let udta = tree.find_child(moov, BoxType::UdtaBox).unwrap();
        let bytes = tree.to_bytes(udta).unwrap();
        assert_eq!(&bytes[bytes.len() - 10..], &[0xFF; 10]);
        assert_eq!(count_items(&tree, moov, TagKind::Title), 1);
    }

    #[test]
    fn test_clear_removes_single_tag() {
        let mut tree = bare_moov();
        let moov = tree.moov().unwrap();
        apply_updates(
            &mut tree,
            moov,
            &Updates::new().set_title("T").set_artist("A"),
        )
        .unwrap();

        apply_updates(&mut tree, moov, &Updates::new().clear_artist()).unwrap();

        let tags = read_tags(&tree, moov);
        assert_eq!(tags.title.as_deref(), Some("T"));
        assert_eq!(tags.artist, None);
    }
}
