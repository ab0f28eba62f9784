//! Editable box tree
//!
//! The tree is rooted at a synthetic file node. The `moov` box is parsed into
//! container and leaf nodes; every other top-level box stays in the source
//! stream and is only referenced by its byte range.

use super::header::{
    header_len_for, read_box_header_ext, write_box_header_ext, BoxHeader, BoxType,
};
use crate::{
    byte_range::{copy_range, ByteRange, MAX_MOOV_SIZE},
    error::{Error, Result},
    structure::Structure,
};
use atree::{Arena, Token};
use log::debug;
use std::io::{Read, Seek, SeekFrom, Write};

/// Nesting below this depth is kept as opaque payload
const MAX_DEPTH: usize = 32;

/// Contents of a box node
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Child boxes follow the header; `trailer` holds bytes after the last
    /// child that do not form a box (e.g. QuickTime's 4 zero bytes in `udta`,
    /// or padding a tagger left behind)
    Children { trailer: Vec<u8> },
    /// Opaque payload
    Data(Vec<u8>),
    /// Entire box, header included, still in the source stream
    Source(ByteRange),
}

/// One box in the tree
#[derive(Debug, Clone, PartialEq)]
pub struct BoxNode {
    pub box_type: BoxType,
    /// Keep the 16-byte header form when re-serializing
    pub large_size: bool,
    /// Version and flags of a full-box container (ISO `meta`)
    pub version_flags: Option<(u8, u32)>,
    pub payload: Payload,
}

impl BoxNode {
    /// Empty container box
    pub fn container(box_type: BoxType) -> Self {
        Self {
            box_type,
            large_size: false,
            version_flags: None,
            payload: Payload::Children {
                trailer: Vec::new(),
            },
        }
    }

    /// Empty full-box container with the given version and flags
    pub fn full_container(box_type: BoxType, version: u8, flags: u32) -> Self {
        Self {
            version_flags: Some((version, flags)),
            ..Self::container(box_type)
        }
    }

    /// Leaf box with an opaque payload
    pub fn leaf(box_type: BoxType, data: Vec<u8>) -> Self {
        Self {
            box_type,
            large_size: false,
            version_flags: None,
            payload: Payload::Data(data),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.payload, Payload::Children { .. })
    }
}

/// Arena-backed box tree rooted at the file level
pub struct BoxTree {
    arena: Arena<BoxNode>,
    root: Token,
}

impl BoxTree {
    /// Create a tree with only the file root
    pub fn new() -> Self {
        let (arena, root) = Arena::with_data(BoxNode::container(BoxType::Empty));
        Self { arena, root }
    }

    /// Build the file-level tree from a scanned layout
    ///
    /// Only the first `moov` is read into memory; all other top-level boxes
    /// become [`Payload::Source`] references.
    pub fn parse<R: Read + Seek + ?Sized>(source: &mut R, structure: &Structure) -> Result<Self> {
        let mut tree = Self::new();
        let root = tree.root;

        for (index, entry) in structure.entries.iter().enumerate() {
            if Some(index) != structure.moov_index() {
                tree.append(
                    root,
                    BoxNode {
                        box_type: entry.box_type,
                        large_size: false,
                        version_flags: None,
                        payload: Payload::Source(entry.range()),
                    },
                );
                continue;
            }

            if entry.size > MAX_MOOV_SIZE {
                return Err(Error::DataTooLarge {
                    size: entry.size,
                    max: MAX_MOOV_SIZE,
                });
            }
            source.seek(SeekFrom::Start(entry.offset))?;
            let mut data = vec![0u8; entry.size as usize];
            source.read_exact(&mut data)?;
            tree.parse_box(root, &data, None, 0)?;
        }

        Ok(tree)
    }

    /// Parse a single serialized box (and its descendants) under the file root
    pub fn from_box_bytes(data: &[u8]) -> Result<Self> {
        let mut tree = Self::new();
        let root = tree.root;
        tree.parse_box(root, data, None, 0)?;
        Ok(tree)
    }

    /// The file root
    pub fn root(&self) -> Token {
        self.root
    }

    /// The first `moov` directly under the root
    pub fn moov(&self) -> Option<Token> {
        self.find_child(self.root, BoxType::MoovBox)
    }

    pub fn node(&self, token: Token) -> &BoxNode {
        &self.arena[token].data
    }

    pub fn node_mut(&mut self, token: Token) -> Option<&mut BoxNode> {
        self.arena.get_mut(token).map(|node| &mut node.data)
    }

    /// Immediate children in order
    pub fn children(&self, parent: Token) -> Vec<Token> {
        parent.children_tokens(&self.arena).collect()
    }

    /// First immediate child of the given type
    pub fn find_child(&self, parent: Token, box_type: BoxType) -> Option<Token> {
        parent
            .children_tokens(&self.arena)
            .find(|&child| self.arena[child].data.box_type == box_type)
    }

    /// Append `node` as the last child of `parent`
    pub fn add_child(&mut self, parent: Token, node: BoxNode) -> Result<Token> {
        if !self.node(parent).is_container() {
            return Err(Error::InvalidFormat(format!(
                "Cannot add '{}' to leaf box '{}'",
                node.box_type,
                self.node(parent).box_type
            )));
        }
        Ok(self.append(parent, node))
    }

    /// Remove the first immediate child of the given type and its descendants
    ///
    /// Returns false if no such child exists.
    pub fn delete_child(&mut self, parent: Token, box_type: BoxType) -> bool {
        match self.find_child(parent, box_type) {
            Some(child) => {
                self.arena.remove(child);
                true
            }
            None => false,
        }
    }

    /// Remove every immediate child of the given type; returns how many were removed
    pub fn delete_children(&mut self, parent: Token, box_type: BoxType) -> usize {
        let mut removed = 0;
        while self.delete_child(parent, box_type) {
            removed += 1;
        }
        removed
    }

    /// Current serialized size of a box, recomputed from its content
    pub fn size(&self, token: Token) -> u64 {
        let node = self.node(token);
        let content = match &node.payload {
            Payload::Source(range) => return range.size,
            Payload::Data(data) => data.len() as u64,
            Payload::Children { trailer } => {
                let children: u64 = token
                    .children_tokens(&self.arena)
                    .map(|child| self.size(child))
                    .sum();
                children + trailer.len() as u64
            }
        };
        let content = content + node.version_flags.map_or(0, |_| 4);

        if token == self.root {
            content
        } else {
            header_len_for(content, node.large_size) + content
        }
    }

    /// Serialize a box to `writer`
    ///
    /// Sizes are recomputed on the way down. [`Payload::Source`] boxes are
    /// streamed from `source` in chunks of at most `chunk_size` bytes. Writing
    /// the root emits every top-level box in order.
    pub fn write_box<R: Read + Seek + ?Sized, W: Write + ?Sized>(
        &self,
        token: Token,
        source: &mut R,
        writer: &mut W,
        chunk_size: usize,
    ) -> Result<u64> {
        let node = self.node(token);

        if let Payload::Source(range) = &node.payload {
            return copy_range(source, writer, *range, chunk_size);
        }

        let size = self.size(token);
        let mut written = 0;
        if token != self.root {
            written += BoxHeader::write(writer, node.box_type, size, node.large_size)?;
        }
        if let Some((version, flags)) = node.version_flags {
            written += write_box_header_ext(writer, version, flags)?;
        }

        match &node.payload {
            Payload::Data(data) => {
                writer.write_all(data)?;
                written += data.len() as u64;
            }
            Payload::Children { trailer } => {
                for child in token.children_tokens(&self.arena) {
                    written += self.write_box(child, source, writer, chunk_size)?;
                }
                writer.write_all(trailer)?;
                written += trailer.len() as u64;
            }
            Payload::Source(_) => {}
        }

        debug_assert_eq!(written, size);
        Ok(written)
    }

    /// Serialize an in-memory box (no source references) to a byte vector
    pub fn to_bytes(&self, token: Token) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.size(token) as usize);
        let mut no_source = std::io::Cursor::new(Vec::<u8>::new());
        self.write_box(token, &mut no_source, &mut out, crate::DEFAULT_CHUNK_SIZE)?;
        Ok(out)
    }

    fn append(&mut self, parent: Token, node: BoxNode) -> Token {
        parent.append(&mut self.arena, node)
    }

    /// Parse one box from the start of `data` and append it under `parent`
    ///
    /// `data` must span exactly the box. Container bytes that do not tile into
    /// children are kept as the trailer, and non-container boxes as opaque
    /// leaves, so their bytes survive unchanged.
    fn parse_box(
        &mut self,
        parent: Token,
        data: &[u8],
        parent_type: Option<BoxType>,
        depth: usize,
    ) -> Result<Token> {
        let header = BoxHeader::parse(data)
            .ok_or_else(|| Error::InvalidFormat("Truncated box header".to_string()))?;
        let header_len = header.header_len() as usize;
        let content = &data[header_len..];

        let container = depth < MAX_DEPTH
            && (header.box_type.is_container() || parent_type == Some(BoxType::IlstBox));

        if container {
            let (version_flags, body) = split_full_box(header.box_type, content)?;
            let (children, trailer_start) = split_children(body);
            if body.len() - trailer_start >= 8 {
                debug!(
                    "Keeping {} unparsed bytes at the end of '{}'",
                    body.len() - trailer_start,
                    header.box_type
                );
            }
            let token = self.append(
                parent,
                BoxNode {
                    box_type: header.box_type,
                    large_size: header.large_size,
                    version_flags,
                    payload: Payload::Children {
                        trailer: body[trailer_start..].to_vec(),
                    },
                },
            );
            for range in children {
                self.parse_box(token, &body[range], Some(header.box_type), depth + 1)?;
            }
            return Ok(token);
        }

        Ok(self.append(
            parent,
            BoxNode {
                box_type: header.box_type,
                large_size: header.large_size,
                version_flags: None,
                payload: Payload::Data(content.to_vec()),
            },
        ))
    }
}

impl Default for BoxTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Split the version/flags prefix off a full-box container
///
/// ISO `meta` is a full box, but QuickTime writes it as a plain container. The
/// QuickTime form is recognised by a box type (`hdlr`) where the version and
/// flags would be.
fn split_full_box(box_type: BoxType, content: &[u8]) -> Result<(Option<(u8, u32)>, &[u8])> {
    if box_type != BoxType::MetaBox {
        return Ok((None, content));
    }
    if content.len() >= 8 && &content[4..8] == b"hdlr" {
        return Ok((None, content));
    }
    if content.len() < 4 {
        return Ok((None, content));
    }
    let mut reader = content;
    let version_flags = read_box_header_ext(&mut reader)?;
    Ok((Some(version_flags), &content[4..]))
}

/// Locate child boxes inside a container body
///
/// Returns the byte range of each child and the offset where trailing bytes
/// begin. Splitting stops at the first header that does not fit the
/// remaining body; everything from there on is trailer.
fn split_children(body: &[u8]) -> (Vec<std::ops::Range<usize>>, usize) {
    let mut children = Vec::new();
    let mut pos = 0usize;

    while body.len() - pos >= 8 {
        let Some(header) = BoxHeader::parse(&body[pos..]) else {
            break;
        };
        let available = (body.len() - pos) as u64;
        let size = header.size.unwrap_or(available);
        if size < header.header_len() || size > available {
            break;
        }
        children.push(pos..pos + size as usize);
        pos += size as usize;
    }

    (children, pos)
}
