//! Ships access-log events from a per-CPU shared-memory ring (written by an
//! in-kernel HTTP accelerator) into a columnar analytics database.
//!
//! Four pieces, leaves first: [`ring`] drains a lock-free SPSC region
//! mapped from the producer's character device; [`decoder`] walks the
//! binary framing and appends rows to a [`block::Block`]; [`sink`] commits
//! a block to the database; [`worker`] and [`supervisor`] wire these
//! together into one pinned thread per CPU.

pub mod backoff;
pub mod block;
pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod frame;
pub(crate) mod invariants;
pub mod ring;
pub mod schema;
pub mod sink;
pub mod supervisor;
pub mod worker;
