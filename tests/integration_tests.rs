use std::sync::atomic::Ordering;

use accesslog_shipper::block::Block;
use accesslog_shipper::decoder::decode_span;
use accesslog_shipper::error::DecodeOutcome;
use accesslog_shipper::ring::RingReader;
use memmap2::MmapOptions;

/// Mirrors `ring.rs`'s private `RingHeader` layout so the test can act as the
/// producer side without reaching into the crate's internals.
#[repr(C)]
struct RingHeader {
    cpu_id: std::sync::atomic::AtomicU64,
    head: std::sync::atomic::AtomicU64,
    tail: std::sync::atomic::AtomicU64,
    size: std::sync::atomic::AtomicU64,
}

const HEADER_BYTES: usize = std::mem::size_of::<RingHeader>();

fn header_bytes(frame_type: u8, mask: u16, ts: u64) -> Vec<u8> {
    let mut v = vec![frame_type];
    v.extend_from_slice(&mask.to_le_bytes());
    v.extend_from_slice(&ts.to_le_bytes());
    v
}

fn minimal_access_frame(ts: u64, address_byte: u8) -> Vec<u8> {
    let mut frame = header_bytes(1, 0b1, ts);
    frame.extend_from_slice(&[address_byte; 16]);
    frame
}

/// End-to-end: a simulated producer writes whole frames into an anonymous
/// mmap region shaped like the real device, `RingReader` drains it, and
/// `decode_span` appends rows to a `Block` — the same pipeline
/// `worker::run_worker` drives, minus the database sink.
#[test]
fn ring_to_decoder_to_block_round_trip() {
    const CAPACITY: u64 = 256;
    let total = HEADER_BYTES as u64 + CAPACITY;
    let mut mmap = MmapOptions::new().len(total as usize).map_anon().unwrap();

    {
        let header = unsafe { &mut *(mmap.as_mut_ptr().cast::<RingHeader>()) };
        header.cpu_id = std::sync::atomic::AtomicU64::new(7);
        header.head = std::sync::atomic::AtomicU64::new(0);
        header.tail = std::sync::atomic::AtomicU64::new(0);
        header.size = std::sync::atomic::AtomicU64::new(CAPACITY);
    }

    let mut events = Vec::new();
    for i in 0..3u64 {
        events.extend(minimal_access_frame(i + 1, i as u8));
    }
    let event_len = events.len() as u64;
    mmap[HEADER_BYTES..HEADER_BYTES + events.len()].copy_from_slice(&events);
    {
        let header = unsafe { &*(mmap.as_ptr().cast::<RingHeader>()) };
        header.head.store(event_len, Ordering::Release);
    }

    let (mut reader, producer_cpu) = RingReader::new(mmap).unwrap();
    assert_eq!(producer_cpu, 7);

    let mut block = Block::new();
    let span = reader.next_span(|| false).unwrap().to_vec();
    let (consumed, outcome) = decode_span(&span, &mut block, |_| panic!("no drops expected"));
    assert_eq!(outcome, DecodeOutcome::Ok);
    assert_eq!(consumed as u64, event_len);
    reader.advance(consumed);

    let rows = block.into_rows();
    assert_eq!(rows.len(), 3);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.timestamp, i as u64 + 1);
        assert_eq!(row.address.octets(), [i as u8; 16]);
    }

    // The device closes with nothing further to read: `next_span` must
    // report `Closed` rather than hang.
    let err = reader.next_span(|| true).unwrap_err();
    assert!(matches!(
        err,
        accesslog_shipper::error::RingError::Closed { cpu: 7 }
    ));
}

/// A span split mid-frame across two `next_span` calls must not produce a
/// row until the frame completes, and the decoder must never advance past
/// the partial frame in the meantime.
#[test]
fn split_frame_across_two_spans_assembles_one_row() {
    let frame = minimal_access_frame(9, 0xAB);

    let mut block = Block::new();
    let (consumed1, outcome1) =
        decode_span(&frame[..frame.len() - 5], &mut block, |_| panic!("no drops"));
    assert_eq!(outcome1, DecodeOutcome::Truncated);
    assert_eq!(consumed1, 0);
    assert!(block.is_empty());

    let (consumed2, outcome2) = decode_span(&frame, &mut block, |_| panic!("no drops"));
    assert_eq!(outcome2, DecodeOutcome::Ok);
    assert_eq!(consumed2, frame.len());
    assert_eq!(block.len(), 1);
}
