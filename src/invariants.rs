//! Debug assertion macros for the invariants documented in spec.md §8.
//!
//! `#[cfg(debug_assertions)]`-only, zero overhead in release builds, exactly
//! as in the teacher crate's own `invariants.rs`.

/// `head <= tail` always, and `tail - head <= capacity`.
macro_rules! debug_assert_ring_bounded {
    ($readable:expr, $capacity:expr, $cpu:expr) => {
        debug_assert!(
            $readable <= $capacity,
            "ring on cpu {} corrupt: readable {} exceeds capacity {}",
            $cpu,
            $readable,
            $capacity
        )
    };
}

/// `tail` only moves forward.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "{} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

/// After appending a field (or its zero value) every column must have the
/// same length as the timestamp column (spec §8 invariant 1).
macro_rules! debug_assert_columns_aligned {
    ($expected:expr, $actual:expr, $column:literal) => {
        debug_assert_eq!(
            $expected, $actual,
            "column {} length {} diverged from block length {}",
            $column, $actual, $expected
        )
    };
}

/// advance()/commit() must never consume more bytes than are available.
macro_rules! debug_assert_consumed_within_span {
    ($consumed:expr, $span_len:expr) => {
        debug_assert!(
            $consumed <= $span_len,
            "decoder consumed {} bytes but span was only {} long",
            $consumed,
            $span_len
        )
    };
}

pub(crate) use debug_assert_columns_aligned;
pub(crate) use debug_assert_consumed_within_span;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_ring_bounded;
