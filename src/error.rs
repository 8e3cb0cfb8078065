//! Error taxonomy for the shipper, split by the component that raises each
//! variant (spec §7). One `thiserror` enum per domain, following the
//! teacher's `ChannelError` pattern of small, precisely-named variants
//! instead of one catch-all error type.

use thiserror::Error;

/// Fatal conditions raised by the ring reader.
#[derive(Debug, Error)]
pub enum RingError {
    /// `head - tail` exceeds the ring's capacity: the producer has
    /// overwritten data the consumer never advanced past.
    #[error("ring corrupt on cpu {cpu}: readable {readable} exceeds capacity {capacity}")]
    Corrupt {
        cpu: usize,
        readable: u64,
        capacity: u64,
    },
    /// The device signalled EOF/hangup while waiting for more data.
    #[error("producer device closed (cpu {cpu})")]
    Closed { cpu: usize },
}

/// Outcome of decoding as much of a span as possible. Not all variants are
/// errors in the Rust sense — `Truncated` is an expected steady-state
/// result when a frame straddles a span boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The whole span (or all of it up to a `DROPPED` frame) was consumed.
    Ok,
    /// Ran out of bytes mid-frame; caller should wait for more and retry
    /// from the unconsumed remainder.
    Truncated,
    /// An unrecognized frame type byte was encountered; fatal to the worker.
    Unknown { frame_type: u8 },
}

/// Failures opening or committing to the analytics database sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database commit failed: {0}")]
    Commit(#[from] clickhouse::error::Error),
}

/// Fatal/recoverable conditions observed by the per-worker loop and the
/// supervisor that owns it.
#[derive(Debug, Error)]
pub enum ShipperError {
    /// The producer device does not exist yet. Recoverable: the supervisor
    /// retries on a fixed interval.
    #[error("producer device not present at {path}")]
    DeviceAbsent { path: String },
    /// Any I/O error other than `ENOENT` on the device is fatal.
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Pinning the worker thread to its assigned CPU failed. Fatal at
    /// worker start (spec §7: `Affinity-Failed`).
    #[error("failed to pin worker thread to cpu {cpu}: errno {errno}")]
    AffinityFailed { cpu: usize, errno: i32 },
    /// The ring reported corruption or the decoder saw an unknown frame
    /// type; the worker exits and the supervisor tears down the session.
    #[error("worker on cpu {cpu} failed: {reason}")]
    WorkerFailed { cpu: usize, reason: String },
}
