//! ISO-BMFF box primitives.
//!
//! Parsing is slice-based: every box records its absolute offset within the
//! buffer being parsed, so nothing needs back-pointers and `mdat` payload
//! ranges resolve directly against the input.

use crate::error::{Mp4Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// A parsed box referencing its payload within the input buffer.
#[derive(Debug, Clone, Copy)]
pub struct Mp4Box<'a> {
    /// Box type fourcc.
    pub box_type: [u8; 4],
    /// Absolute offset of the box start within the parsed buffer.
    pub offset: usize,
    /// Header size: 8, or 16 for the 64-bit large-size form.
    pub header_size: usize,
    /// Box payload (everything after the header).
    pub payload: &'a [u8],
}

impl<'a> Mp4Box<'a> {
    /// Total box size including the header.
    pub fn size(&self) -> usize {
        self.header_size + self.payload.len()
    }

    /// Iterate over child boxes in the payload.
    pub fn children(&self) -> BoxIter<'a> {
        BoxIter {
            data: self.payload,
            pos: 0,
            base: self.offset + self.header_size,
        }
    }

    /// Find the first direct child of the given type.
    pub fn child(&self, box_type: &[u8; 4]) -> Result<Mp4Box<'a>> {
        self.find_child(box_type)?.ok_or_else(|| {
            Mp4Error::MissingBox(fourcc_to_string(box_type))
        })
    }

    /// Find the first direct child of the given type, if present.
    pub fn find_child(&self, box_type: &[u8; 4]) -> Result<Option<Mp4Box<'a>>> {
        for child in self.children() {
            let child = child?;
            if &child.box_type == box_type {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// Interpret the payload as a full box, returning `(version, flags,
    /// remaining payload)`.
    pub fn full_box(&self) -> Result<(u8, u32, &'a [u8])> {
        if self.payload.len() < 4 {
            return Err(Mp4Error::Truncated {
                box_type: fourcc_to_string(&self.box_type),
                offset: self.offset,
            });
        }
        let version = self.payload[0];
        let flags = BigEndian::read_u32(&self.payload[..4]) & 0x00FF_FFFF;
        Ok((version, flags, &self.payload[4..]))
    }
}

/// Iterator over a run of sibling boxes.
pub struct BoxIter<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Iterator for BoxIter<'a> {
    type Item = Result<Mp4Box<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }

        let offset = self.base + self.pos;
        let remaining = &self.data[self.pos..];
        if remaining.len() < 8 {
            self.pos = self.data.len();
            return Some(Err(Mp4Error::Truncated {
                box_type: "?".into(),
                offset,
            }));
        }

        let size32 = BigEndian::read_u32(&remaining[..4]);
        let box_type = [remaining[4], remaining[5], remaining[6], remaining[7]];

        let (size, header_size) = if size32 == 1 {
            if remaining.len() < 16 {
                self.pos = self.data.len();
                return Some(Err(Mp4Error::Truncated {
                    box_type: fourcc_to_string(&box_type),
                    offset,
                }));
            }
            (BigEndian::read_u64(&remaining[8..16]), 16usize)
        } else if size32 == 0 {
            // Box extends to the end of the buffer.
            (remaining.len() as u64, 8usize)
        } else {
            (size32 as u64, 8usize)
        };

        if size < header_size as u64 || size > remaining.len() as u64 {
            self.pos = self.data.len();
            return Some(Err(Mp4Error::Truncated {
                box_type: fourcc_to_string(&box_type),
                offset,
            }));
        }

        let payload = &remaining[header_size..size as usize];
        self.pos += size as usize;

        Some(Ok(Mp4Box {
            box_type,
            offset,
            header_size,
            payload,
        }))
    }
}

/// Iterate over the top-level boxes of a buffer.
pub fn iter_boxes(data: &[u8]) -> BoxIter<'_> {
    BoxIter {
        data,
        pos: 0,
        base: 0,
    }
}

/// Find the first top-level box of the given type.
pub fn find_box<'a>(data: &'a [u8], box_type: &[u8; 4]) -> Result<Option<Mp4Box<'a>>> {
    for item in iter_boxes(data) {
        let item = item?;
        if &item.box_type == box_type {
            return Ok(Some(item));
        }
    }
    Ok(None)
}

/// Render a fourcc for error messages.
pub fn fourcc_to_string(fourcc: &[u8; 4]) -> String {
    fourcc.iter().map(|&b| b as char).collect()
}

/// Incremental box writer.
///
/// Boxes are opened with a size placeholder and patched on close, so nested
/// layouts are written in one pass.
#[derive(Debug, Default)]
pub struct BoxBuilder {
    buf: Vec<u8>,
    open: Vec<usize>,
}

impl BoxBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a box; its size is patched when [`Self::close`] is called.
    pub fn open(&mut self, box_type: &[u8; 4]) -> &mut Self {
        self.open.push(self.buf.len());
        self.buf.extend_from_slice(&[0, 0, 0, 0]);
        self.buf.extend_from_slice(box_type);
        self
    }

    /// Open a full box with version and 24-bit flags.
    pub fn open_full(&mut self, box_type: &[u8; 4], version: u8, flags: u32) -> &mut Self {
        self.open(box_type);
        self.u32((version as u32) << 24 | (flags & 0x00FF_FFFF));
        self
    }

    /// Close the most recently opened box.
    pub fn close(&mut self) -> &mut Self {
        let start = self.open.pop().expect("close without open");
        let size = (self.buf.len() - start) as u32;
        self.buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
        self
    }

    /// Append raw bytes.
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Append one byte.
    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    /// Append a big-endian u16.
    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append a big-endian u32.
    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append a big-endian i32.
    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append a big-endian u64.
    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Current length of the written output.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Mutable view of already-written bytes, for post-layout patching.
    pub fn patch(&mut self, start: usize) -> &mut [u8] {
        &mut self.buf[start..]
    }

    /// Check whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish writing, returning the bytes.
    ///
    /// Panics if a box is still open; that is a writer bug, not an input
    /// error.
    pub fn finish(self) -> Vec<u8> {
        assert!(self.open.is_empty(), "unclosed box in writer");
        self.buf
    }
}
