//! The per-CPU shared-memory ring reader (spec.md §4.A). Maps one region of
//! the producer's character device and exposes a pull-based `next_span` /
//! `advance` pair. Ordering protocol follows the teacher crate's `Ring<T>`
//! exactly (acquire on the producer's counter, release on the consumer's),
//! the difference being that here the "producer" is an external kernel
//! module writing through the mmap, not another thread inside this
//! process — so there is no `reserve`/`commit` producer half, only the
//! consumer half.

use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::MmapMut;

use crate::backoff::Backoff;
use crate::error::RingError;
use crate::invariants::{debug_assert_monotonic, debug_assert_ring_bounded};

/// Layout of the fixed header at the start of each per-CPU region (spec §3,
/// with the Open Question on exact mmap layout resolved per SPEC_FULL.md
/// §3).
#[repr(C)]
struct RingHeader {
    cpu_id: AtomicU64,
    head: AtomicU64,
    tail: AtomicU64,
    size: AtomicU64,
}

const HEADER_BYTES: usize = std::mem::size_of::<RingHeader>();

/// Outcome of waiting for more data.
enum Wait {
    Ready,
    Closed,
}

/// A mapped per-CPU ring region. Owns the `MmapMut` for its lifetime; the
/// mapping is released when this value is dropped, which the supervisor
/// only allows after the owning worker thread has been joined (spec §9:
/// "the Ring Reader's destructor must not run while a worker thread is
/// still dereferencing its span").
pub struct RingReader {
    cpu: usize,
    mmap: MmapMut,
    cached_head: u64,
}

impl RingReader {
    /// Maps `region` (already `offset`/`len`-sliced to this CPU's region by
    /// the caller) and publishes `tail = 0` with a release fence, as spec
    /// §4.A construction requires. Returns the producer-assigned CPU id
    /// read back from the header.
    pub fn new(mmap: MmapMut) -> Result<(Self, usize), RingError> {
        assert!(mmap.len() > HEADER_BYTES, "ring region smaller than header");
        let reader = Self {
            cpu: 0,
            mmap,
            cached_head: 0,
        };
        let producer_cpu = reader.header().cpu_id.load(Ordering::Acquire) as usize;
        reader.header().tail.store(0, Ordering::Release);
        let mut reader = reader;
        reader.cpu = producer_cpu;
        Ok((reader, producer_cpu))
    }

    #[inline]
    fn header(&self) -> &RingHeader {
        // SAFETY: the region is at least HEADER_BYTES long (checked in
        // `new`) and the header is plain-old-data accessed only through
        // atomics, matching the producer's side of the protocol.
        unsafe { &*(self.mmap.as_ptr().cast::<RingHeader>()) }
    }

    #[inline]
    fn data(&self) -> &[u8] {
        &self.mmap[HEADER_BYTES..]
    }

    #[inline]
    fn capacity(&self) -> u64 {
        self.header().size.load(Ordering::Relaxed)
    }

    #[inline]
    fn mask(&self) -> u64 {
        self.capacity() - 1
    }

    /// Blocks (with adaptive backoff, never busy-spinning forever) until
    /// `head != tail` or the device reports closure, then returns a
    /// contiguous slice covering as much of `[tail, head)` as lies before
    /// the physical end of the buffer (spec §4.A steps 1-3).
    ///
    /// `is_device_closed` is polled only once the backoff's spin/yield
    /// tiers are exhausted, so it never adds overhead to the hot path.
    pub fn next_span(
        &mut self,
        mut is_device_closed: impl FnMut() -> bool,
    ) -> Result<&[u8], RingError> {
        let mut backoff = Backoff::new();
        loop {
            let head = self.header().head.load(Ordering::Acquire);
            let tail = self.header().tail.load(Ordering::Relaxed);
            debug_assert_monotonic!("head", self.cached_head, head);
            self.cached_head = head;

            let readable = head.wrapping_sub(tail);
            if readable == 0 {
                if backoff.is_exhausted() && is_device_closed() {
                    return Err(RingError::Closed { cpu: self.cpu });
                }
                backoff.snooze();
                continue;
            }

            let capacity = self.capacity();
            debug_assert_ring_bounded!(readable, capacity, self.cpu);
            if readable > capacity {
                return Err(RingError::Corrupt {
                    cpu: self.cpu,
                    readable,
                    capacity,
                });
            }

            let mask = self.mask();
            let offset = (tail & mask) as usize;
            let contiguous = readable.min(capacity - (tail & mask)) as usize;
            return Ok(&self.data()[offset..offset + contiguous]);
        }
    }

    /// Releases `n` consumed bytes back to the producer. `n` must be the
    /// exact length of whole frames decoded from the last `next_span`
    /// slice (spec §4.A: "partial-frame advance is forbidden").
    pub fn advance(&self, n: usize) {
        let tail = self.header().tail.load(Ordering::Relaxed);
        let new_tail = tail.wrapping_add(n as u64);
        debug_assert_monotonic!("tail", tail, new_tail);
        self.header().tail.store(new_tail, Ordering::Release);
    }

    pub fn cpu(&self) -> usize {
        self.cpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memmap2::MmapOptions;

    fn make_region(size: u64) -> MmapMut {
        let total = HEADER_BYTES as u64 + size;
        let mut mmap = MmapOptions::new().len(total as usize).map_anon().unwrap();
        let header = unsafe { &mut *(mmap.as_mut_ptr().cast::<RingHeader>()) };
        header.cpu_id = AtomicU64::new(3);
        header.head = AtomicU64::new(0);
        header.tail = AtomicU64::new(0);
        header.size = AtomicU64::new(size);
        mmap
    }

    #[test]
    fn reads_back_producer_cpu_id() {
        let mmap = make_region(64);
        let (reader, cpu) = RingReader::new(mmap).unwrap();
        assert_eq!(cpu, 3);
        assert_eq!(reader.cpu(), 3);
    }

    #[test]
    fn next_span_blocks_then_returns_written_bytes() {
        let mmap = make_region(64);
        let (mut reader, _) = RingReader::new(mmap).unwrap();

        // Simulate the producer writing 4 bytes and advancing head.
        {
            let header = reader.header();
            let data_ptr = reader.mmap.as_ptr() as *mut u8;
            unsafe {
                std::ptr::copy_nonoverlapping(
                    [1u8, 2, 3, 4].as_ptr(),
                    data_ptr.add(HEADER_BYTES),
                    4,
                );
            }
            header.head.store(4, Ordering::Release);
        }

        let span = reader.next_span(|| false).unwrap().to_vec();
        assert_eq!(span, vec![1, 2, 3, 4]);
        reader.advance(4);
        assert_eq!(reader.header().tail.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn overflow_is_reported_as_corrupt() {
        let mmap = make_region(64);
        let (mut reader, _) = RingReader::new(mmap).unwrap();
        reader.header().head.store(64 + 100, Ordering::Release);
        let err = reader.next_span(|| false).unwrap_err();
        assert!(matches!(err, RingError::Corrupt { .. }));
    }

    #[test]
    fn closed_device_is_reported_once_empty_and_backoff_exhausted() {
        let mmap = make_region(64);
        let (mut reader, _) = RingReader::new(mmap).unwrap();
        let err = reader.next_span(|| true).unwrap_err();
        assert!(matches!(err, RingError::Closed { .. }));
    }
}
