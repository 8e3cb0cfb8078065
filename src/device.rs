//! Opens the producer's character device and maps one per-CPU region out of
//! it (spec.md §6). The device itself is opened once by the supervisor and
//! shared read-only across workers; each worker maps its own disjoint
//! region.

use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::Path;

use memmap2::{MmapMut, MmapOptions};

use crate::config::Config;
use crate::error::ShipperError;

/// The open device handle, owned by the supervisor for the lifetime of one
/// session. Workers only ever see a raw fd (for `poll`) and map their own
/// region from it.
pub struct Device {
    file: File,
    region_len: u64,
}

impl Device {
    /// Opens `path`. `ENOENT` is surfaced as `DeviceAbsent` (recoverable,
    /// the supervisor retries); every other I/O error is fatal.
    pub fn open(config: &Config) -> Result<Self, ShipperError> {
        let path = Path::new(&config.device_path);
        match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => Ok(Self {
                file,
                region_len: config.ring_region_bytes,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ShipperError::DeviceAbsent {
                    path: config.device_path.clone(),
                })
            }
            Err(e) => Err(ShipperError::Io(e)),
        }
    }

    /// Maps the region assigned to `cpu_index` (offset `cpu_index *
    /// region_len` from the start of the device's mmap space — see
    /// SPEC_FULL.md §3 for why this layout was chosen).
    pub fn map_region(&self, cpu_index: usize) -> std::io::Result<MmapMut> {
        let offset = cpu_index as u64 * self.region_len;
        // SAFETY: mapping a character device exposed by the producer
        // specifically for this purpose; the producer guarantees the
        // region stays valid for the lifetime of the open file.
        unsafe {
            MmapOptions::new()
                .offset(offset)
                .len(self.region_len as usize)
                .map_mut(&self.file)
        }
    }

    pub fn as_raw_fd(&self) -> i32 {
        self.file.as_raw_fd()
    }
}

/// Polls the device fd for `POLLHUP`/`POLLERR`/`POLLNVAL` with a zero
/// timeout — a cheap non-blocking check used only once a `RingReader`'s
/// backoff has exhausted its spin/yield tiers (spec §4.A: "the exact wait
/// primitive is implementation choice, but it must not busy-spin a core
/// indefinitely").
pub fn is_closed(fd: i32) -> bool {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLHUP | libc::POLLERR | libc::POLLNVAL,
        revents: 0,
    };
    // SAFETY: `pfd` is a single well-formed pollfd on the stack; `poll`
    // writes only to `revents`.
    let r = unsafe { libc::poll(&mut pfd, 1, 0) };
    r > 0 && (pfd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL)) != 0
}

/// Number of online CPUs, used by the supervisor to size its worker pool
/// (spec §4.D: "spawn one worker per online CPU").
pub fn online_cpu_count() -> usize {
    // SAFETY: sysconf with a valid name constant always returns either a
    // non-negative count or -1 on error; we fall back to 1 on error so a
    // misreported CPU count degrades to a single worker instead of panicking.
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n > 0 {
        n as usize
    } else {
        1
    }
}

/// Pins the calling thread's hard affinity to `cpu`. Fatal if it fails
/// (spec §7: `Affinity-Failed`).
pub fn pin_current_thread(cpu: usize) -> Result<(), ShipperError> {
    // SAFETY: `set` and `cpu_set` operate on a stack-local `cpu_set_t`;
    // `sched_setaffinity` with pid 0 targets the calling thread.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        let rc = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if rc != 0 {
            return Err(ShipperError::AffinityFailed {
                cpu,
                errno: *libc::__errno_location(),
            });
        }
    }
    Ok(())
}
