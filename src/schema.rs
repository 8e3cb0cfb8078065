//! The fixed event schema from spec.md §3: frame type tags, the optional
//! field ordinals (mask bit `i` ⇔ field `i`), and their wire encodings.

/// Frame type byte values.
pub const FRAME_TYPE_ACCESS: u8 = 1;
pub const FRAME_TYPE_DROPPED: u8 = 2;

/// Number of optional fields in an `ACCESS` frame (ords 0..=9).
pub const FIELD_COUNT: usize = 10;

pub const FIELD_ADDRESS: usize = 0;
pub const FIELD_METHOD: usize = 1;
pub const FIELD_VERSION: usize = 2;
pub const FIELD_STATUS: usize = 3;
pub const FIELD_RESPONSE_CONTENT_LENGTH: usize = 4;
pub const FIELD_RESPONSE_TIME: usize = 5;
pub const FIELD_VHOST: usize = 6;
pub const FIELD_URI: usize = 7;
pub const FIELD_REFERER: usize = 8;
pub const FIELD_USER_AGENT: usize = 9;

/// Fixed-width encoding length in bytes for ords 0-5 (address through
/// response_time). Ords 6-9 are length-prefixed strings and have no fixed
/// width.
pub const fn fixed_field_len(ord: usize) -> Option<usize> {
    match ord {
        FIELD_ADDRESS => Some(16),
        FIELD_METHOD | FIELD_VERSION => Some(1),
        FIELD_STATUS => Some(2),
        FIELD_RESPONSE_CONTENT_LENGTH | FIELD_RESPONSE_TIME => Some(4),
        _ => None,
    }
}

/// True for the four string fields (ords 6-9), which use a 2-byte
/// little-endian length prefix.
pub const fn is_string_field(ord: usize) -> bool {
    matches!(
        ord,
        FIELD_VHOST | FIELD_URI | FIELD_REFERER | FIELD_USER_AGENT
    )
}

/// Returns true if bit `ord` is set in the fields mask.
#[inline]
pub const fn mask_has(mask: u16, ord: usize) -> bool {
    (mask & (1u16 << ord)) != 0
}
