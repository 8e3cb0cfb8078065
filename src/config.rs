//! Tunable configuration, following the teacher crate's `Config` +
//! named-preset pattern (`HIGH_THROUGHPUT_CONFIG`, `LOW_LATENCY_CONFIG`).

use std::time::Duration;

/// Default path of the producer's character device.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/tempesta_mmap_log";

/// Default analytics table name (spec §6).
pub const TABLE_NAME: &str = "access_log";

/// How long the supervisor waits between retries while the device is absent
/// (spec §6: "polls for it at 1 s intervals").
pub const DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shipper-wide configuration. Every field has a sensible default; the CLI
/// only needs to override `device_path` and `db_host` in the common case.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the producer's mmap-able character device.
    pub device_path: String,
    /// Analytics database host (`<host>[:port]`, passed straight to the
    /// client).
    pub db_host: String,
    /// Per-CPU ring region size in bytes, excluding the header. Must be a
    /// power of two (spec §3: "size: power-of-two capacity in bytes").
    pub ring_region_bytes: u64,
    /// Bounded retry count for a transient commit failure before the block
    /// is dropped (spec §7: `Transient-IO`).
    pub commit_retries: u32,
}

impl Config {
    /// Creates a configuration for the given device path and database host
    /// with the other fields at their defaults.
    ///
    /// # Panics
    ///
    /// Panics if `ring_region_bytes` in the returned default is somehow not
    /// a power of two — this can only happen if the constant below is
    /// edited incorrectly, so it's a debug assertion rather than returned
    /// error.
    pub fn new(device_path: impl Into<String>, db_host: impl Into<String>) -> Self {
        let cfg = Self {
            device_path: device_path.into(),
            db_host: db_host.into(),
            ring_region_bytes: Self::DEFAULT_RING_REGION_BYTES,
            commit_retries: Self::DEFAULT_COMMIT_RETRIES,
        };
        debug_assert!(cfg.ring_region_bytes.is_power_of_two());
        cfg
    }

    const DEFAULT_RING_REGION_BYTES: u64 = 1 << 22; // 4 MiB per CPU
    const DEFAULT_COMMIT_RETRIES: u32 = 3;

    #[inline]
    pub fn ring_mask(&self) -> u64 {
        self.ring_region_bytes - 1
    }
}
