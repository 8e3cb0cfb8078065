//! The binary event decoder (spec.md §4.B): walks whole frames from the
//! start of a span, appending one row per `ACCESS` event to a `Block`,
//! reporting dropped-event counts, and stopping cleanly at the first
//! partial frame so the caller can retry once more bytes arrive.

use std::net::Ipv6Addr;

use crate::block::{self, AccessEvent, Block};
use crate::error::DecodeOutcome;
use crate::frame::{FrameHeader, HEADER_LEN};
use crate::invariants::debug_assert_consumed_within_span;
use crate::schema::{self, FIELD_COUNT};

/// Decodes as many whole frames as `span` holds, appending each `ACCESS`
/// event to `block` and invoking `on_dropped` for a `DROPPED` frame's
/// count. Returns `(consumed_bytes, outcome)`; `consumed_bytes` always
/// equals the length of whole frames actually appended/processed — never a
/// partial frame (spec §4.A: "partial-frame advance is forbidden").
pub fn decode_span(
    span: &[u8],
    block: &mut Block,
    mut on_dropped: impl FnMut(u64),
) -> (usize, DecodeOutcome) {
    let mut offset = 0usize;

    loop {
        let remaining = span.len() - offset;
        if remaining == 0 {
            return (offset, DecodeOutcome::Ok);
        }
        if remaining < HEADER_LEN {
            return (offset, DecodeOutcome::Truncated);
        }

        let header = FrameHeader::parse(&span[offset..]);
        let body = &span[offset + HEADER_LEN..];

        match header.frame_type {
            schema::FRAME_TYPE_ACCESS => match decode_access_body_masked(
                body,
                header.fields_mask,
                header.timestamp,
            ) {
                Some((body_len, event)) => {
                    block.push_event(event);
                    offset += HEADER_LEN + body_len;
                    debug_assert_consumed_within_span!(offset, span.len());
                }
                None => return (offset, DecodeOutcome::Truncated),
            },
            schema::FRAME_TYPE_DROPPED => {
                if body.len() < 8 {
                    return (offset, DecodeOutcome::Truncated);
                }
                let count = u64::from_le_bytes(body[0..8].try_into().unwrap());
                on_dropped(count);
                offset += HEADER_LEN + 8;
                // Spec §4.B / §9 Open Questions: the source returns
                // immediately after a DROPPED frame, discarding any bytes
                // still left in the span. Preserved here as-is.
                return (offset, DecodeOutcome::Ok);
            }
            other => return (offset, DecodeOutcome::Unknown { frame_type: other }),
        }
    }
}

/// Parses one `ACCESS` frame body given its `fields_mask`. Returns `None` if
/// any field runs off the end of `body` (truncated mid-event); the caller
/// then discards whatever partial state it built without touching `block`
/// (spec §4.B Atomicity — no partial row is ever handed to `Block`).
#[allow(clippy::too_many_lines)]
fn decode_access_body_masked(
    body: &[u8],
    mask: u16,
    timestamp: u64,
) -> Option<(usize, AccessEvent)> {
    let mut pos = 0usize;

    let mut address = block::zero_address();
    let mut method = block::zero_u8();
    let mut version = block::zero_u8();
    let mut status = block::zero_u16();
    let mut response_content_length = block::zero_u32();
    let mut response_time = block::zero_u32();
    let mut vhost = block::zero_string();
    let mut uri = block::zero_string();
    let mut referer = block::zero_string();
    let mut user_agent = block::zero_string();

    for ord in 0..FIELD_COUNT {
        if !schema::mask_has(mask, ord) {
            continue;
        }

        if schema::is_string_field(ord) {
            if body.len() - pos < 2 {
                return None;
            }
            let len = u16::from_le_bytes([body[pos], body[pos + 1]]) as usize;
            if body.len() - pos < 2 + len {
                return None;
            }
            let s = String::from_utf8_lossy(&body[pos + 2..pos + 2 + len]).into_owned();
            match ord {
                schema::FIELD_VHOST => vhost = s,
                schema::FIELD_URI => uri = s,
                schema::FIELD_REFERER => referer = s,
                schema::FIELD_USER_AGENT => user_agent = s,
                _ => unreachable!(),
            }
            pos += 2 + len;
        } else {
            let len = schema::fixed_field_len(ord).expect("non-string field has fixed width");
            if body.len() - pos < len {
                return None;
            }
            match ord {
                schema::FIELD_ADDRESS => {
                    let bytes: [u8; 16] = body[pos..pos + 16].try_into().unwrap();
                    address = Ipv6Addr::from(bytes);
                }
                schema::FIELD_METHOD => method = body[pos],
                schema::FIELD_VERSION => version = body[pos],
                schema::FIELD_STATUS => {
                    status = u16::from_le_bytes([body[pos], body[pos + 1]]);
                }
                schema::FIELD_RESPONSE_CONTENT_LENGTH => {
                    response_content_length =
                        u32::from_le_bytes(body[pos..pos + 4].try_into().unwrap());
                }
                schema::FIELD_RESPONSE_TIME => {
                    response_time = u32::from_le_bytes(body[pos..pos + 4].try_into().unwrap());
                }
                _ => unreachable!(),
            }
            pos += len;
        }
    }

    Some((
        pos,
        AccessEvent {
            timestamp,
            address,
            method,
            version,
            status,
            response_content_length,
            response_time,
            vhost,
            uri,
            referer,
            user_agent,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(frame_type: u8, mask: u16, ts: u64) -> Vec<u8> {
        let mut v = vec![frame_type];
        v.extend_from_slice(&mask.to_le_bytes());
        v.extend_from_slice(&ts.to_le_bytes());
        v
    }

    #[test]
    fn minimal_access_event() {
        let mut frame = header_bytes(schema::FRAME_TYPE_ACCESS, 0b0000_0000_0001, 1);
        frame.extend_from_slice(&[0xFE; 16]);

        let mut block = Block::new();
        let (consumed, outcome) = decode_span(&frame, &mut block, |_| panic!("no drops"));
        assert_eq!(outcome, DecodeOutcome::Ok);
        assert_eq!(consumed, frame.len());

        let rows = block.into_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, 1);
        assert_eq!(rows[0].address, Ipv6Addr::from([0xFE; 16]));
        assert_eq!(rows[0].method, 0);
        assert_eq!(rows[0].user_agent, "");
    }

    #[test]
    fn full_access_event_all_fields() {
        let mask = 0b11_1111_1111u16;
        let mut frame = header_bytes(schema::FRAME_TYPE_ACCESS, mask, 42);
        frame.extend_from_slice(&[0xAB; 16]); // address
        frame.push(1); // method
        frame.push(1); // version
        frame.extend_from_slice(&200u16.to_le_bytes()); // status
        frame.extend_from_slice(&1234u32.to_le_bytes()); // response_content_length
        frame.extend_from_slice(&99u32.to_le_bytes()); // response_time
        for s in ["h", "/", "", "x"] {
            frame.extend_from_slice(&(s.len() as u16).to_le_bytes());
            frame.extend_from_slice(s.as_bytes());
        }

        let mut block = Block::new();
        let (consumed, outcome) = decode_span(&frame, &mut block, |_| panic!("no drops"));
        assert_eq!(outcome, DecodeOutcome::Ok);
        assert_eq!(consumed, frame.len());

        let rows = block.into_rows();
        assert_eq!(rows[0].vhost, "h");
        assert_eq!(rows[0].uri, "/");
        assert_eq!(rows[0].referer, "");
        assert_eq!(rows[0].user_agent, "x");
        assert_eq!(rows[0].status, 200);
    }

    #[test]
    fn dropped_frame_reports_count_and_stops() {
        let mut frame = header_bytes(schema::FRAME_TYPE_DROPPED, 0, 0);
        frame.extend_from_slice(&42u64.to_le_bytes());
        // Trailing garbage that must NOT be consumed or parsed.
        frame.extend_from_slice(&[0xFF; 4]);

        let mut block = Block::new();
        let mut seen = None;
        let (consumed, outcome) = decode_span(&frame, &mut block, |n| seen = Some(n));
        assert_eq!(outcome, DecodeOutcome::Ok);
        assert_eq!(seen, Some(42));
        assert_eq!(consumed, frame.len() - 4);
        assert!(block.is_empty());
    }

    #[test]
    fn split_frame_truncated_then_completed() {
        let mut full = header_bytes(schema::FRAME_TYPE_ACCESS, 0b1, 7);
        full.extend_from_slice(&[0x11; 16]);

        let half = full[..full.len() - 8].to_vec();
        let mut block = Block::new();
        let (consumed, outcome) = decode_span(&half, &mut block, |_| panic!("no drops"));
        assert_eq!(outcome, DecodeOutcome::Truncated);
        assert_eq!(consumed, 0);
        assert!(block.is_empty());

        let (consumed2, outcome2) = decode_span(&full, &mut block, |_| panic!("no drops"));
        assert_eq!(outcome2, DecodeOutcome::Ok);
        assert_eq!(consumed2, full.len());
        assert_eq!(block.len(), 1);
    }

    #[test]
    fn unknown_type_reports_and_does_not_consume() {
        let frame = header_bytes(99, 0, 0);
        let mut block = Block::new();
        let (consumed, outcome) = decode_span(&frame, &mut block, |_| panic!("no drops"));
        assert_eq!(consumed, 0);
        assert_eq!(outcome, DecodeOutcome::Unknown { frame_type: 99 });
    }

    #[test]
    fn empty_string_field_is_valid() {
        let mut frame = header_bytes(schema::FRAME_TYPE_ACCESS, 1 << schema::FIELD_VHOST, 1);
        frame.extend_from_slice(&0u16.to_le_bytes());

        let mut block = Block::new();
        let (_, outcome) = decode_span(&frame, &mut block, |_| panic!("no drops"));
        assert_eq!(outcome, DecodeOutcome::Ok);
        assert_eq!(block.into_rows()[0].vhost, "");
    }
}
