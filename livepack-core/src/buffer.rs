//! Segment output buffers.
//!
//! Packaging writes into caller-owned, append-only byte sinks.
//! [`SegmentBuffer`] collects a single run of bytes; [`FullSegmentBuffer`]
//! additionally records the boundary between the init segment and the media
//! body so callers can address each region separately.

/// Growable, append-only byte sink for packaged output.
#[derive(Debug, Clone, Default)]
pub struct SegmentBuffer {
    data: Vec<u8>,
}

impl SegmentBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes to the end of the buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    /// Get the collected bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the number of collected bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Check whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Discard all collected bytes.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Consume the buffer, returning the collected bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// Byte sink holding an init segment followed by media body bytes.
///
/// The buffer stores `(ftyp + moov) + (styp + sidx + moof + mdat)` as one
/// contiguous allocation and tracks how much of it belongs to the init
/// segment.
#[derive(Debug, Clone, Default)]
pub struct FullSegmentBuffer {
    buffer: Vec<u8>,
    init_segment_size: usize,
}

impl FullSegmentBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffer contents with an init segment.
    ///
    /// Any previously collected bytes are discarded.
    pub fn set_init_segment(&mut self, data: &[u8]) {
        self.buffer.clear();
        self.buffer.extend_from_slice(data);
        self.init_segment_size = data.len();
    }

    /// Append media body bytes after the init segment.
    pub fn append_data(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Get the init segment region.
    pub fn init_segment_data(&self) -> &[u8] {
        &self.buffer[..self.init_segment_size]
    }

    /// Get the media body region.
    pub fn segment_data(&self) -> &[u8] {
        &self.buffer[self.init_segment_size..]
    }

    /// Size of the init segment region in bytes.
    pub fn init_segment_size(&self) -> usize {
        self.init_segment_size
    }

    /// Size of the media body region in bytes.
    pub fn segment_size(&self) -> usize {
        self.buffer.len() - self.init_segment_size
    }

    /// Get the full buffer contents.
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// Total size in bytes.
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Discard all contents, including the init region.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.init_segment_size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_buffer_append() {
        let mut buf = SegmentBuffer::new();
        assert!(buf.is_empty());

        buf.append(&[1, 2, 3]);
        buf.append(&[4, 5]);

        assert_eq!(buf.size(), 5);
        assert_eq!(buf.data(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_full_segment_buffer_regions() {
        let mut buf = FullSegmentBuffer::new();
        buf.set_init_segment(&[0xAA; 8]);
        buf.append_data(&[0xBB; 4]);

        assert_eq!(buf.init_segment_size(), 8);
        assert_eq!(buf.segment_size(), 4);
        assert_eq!(buf.size(), 12);
        assert_eq!(buf.init_segment_data(), &[0xAA; 8]);
        assert_eq!(buf.segment_data(), &[0xBB; 4]);
    }

    #[test]
    fn test_full_segment_buffer_reset_on_set_init() {
        let mut buf = FullSegmentBuffer::new();
        buf.set_init_segment(&[1; 4]);
        buf.append_data(&[2; 4]);
        buf.set_init_segment(&[3; 2]);

        assert_eq!(buf.size(), 2);
        assert_eq!(buf.init_segment_size(), 2);
        assert_eq!(buf.segment_size(), 0);
    }

    #[test]
    fn test_body_only_buffer() {
        let mut buf = FullSegmentBuffer::new();
        buf.append_data(&[9; 3]);

        assert_eq!(buf.init_segment_size(), 0);
        assert_eq!(buf.segment_size(), 3);
        assert!(buf.init_segment_data().is_empty());
    }
}
