//! The fixed frame header shared by every event type (spec.md §3): `type`,
//! `fields_mask`, `timestamp`. Body layout is type-specific and handled in
//! `decoder`.

/// Header size in bytes: 1 (type) + 2 (mask, LE) + 8 (timestamp, LE).
///
/// The exact mmap/wire layout of the producer's header isn't visible in the
/// retained source (spec.md §9 Open Questions); this is the implementation
/// choice made for this crate, kept in one place so it's easy to revisit.
pub const HEADER_LEN: usize = 11;

#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub frame_type: u8,
    pub fields_mask: u16,
    pub timestamp: u64,
}

impl FrameHeader {
    /// Parses a header from the start of `buf`. `buf` must be at least
    /// `HEADER_LEN` bytes; callers check `remaining >= HEADER_LEN` first.
    pub fn parse(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= HEADER_LEN);
        let frame_type = buf[0];
        let fields_mask = u16::from_le_bytes([buf[1], buf[2]]);
        let timestamp = u64::from_le_bytes(buf[3..11].try_into().unwrap());
        Self {
            frame_type,
            fields_mask,
            timestamp,
        }
    }
}
