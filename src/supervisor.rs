//! The process-level supervisor (spec.md §4.D "Supervisor loop"): opens the
//! producer device, spawns one worker per online CPU, joins them all, and
//! on any worker's exit tears the session down and retries from the top.

use std::sync::atomic::AtomicBool;
use std::thread;

use crate::config::{Config, DEVICE_POLL_INTERVAL};
use crate::device::{self, Device};
use crate::error::ShipperError;
use crate::worker;

/// Runs the supervisor loop until `shutdown` is signalled (checked between
/// sessions while waiting for the device). `shutdown` is also threaded into
/// every worker's ring wait so a signal raised mid-session is observed at
/// the worker's next wait rather than only once the device independently
/// closes (spec §5 Cancellation).
pub fn run(config: &Config, shutdown: &AtomicBool) -> Result<(), ShipperError> {
    loop {
        if shutdown.load(std::sync::atomic::Ordering::Relaxed) {
            return Ok(());
        }

        let device = match Device::open(config) {
            Ok(d) => d,
            Err(ShipperError::DeviceAbsent { path }) => {
                log::debug!("device {path} not present yet, retrying in {DEVICE_POLL_INTERVAL:?}");
                thread::sleep(DEVICE_POLL_INTERVAL);
                continue;
            }
            Err(e) => return Err(e),
        };

        log::info!("device opened, starting session");
        run_session(&device, config, shutdown);
        log::info!("session ended, device closed");
        // `device` drops here, closing the fd, only after every worker
        // thread below has been joined.
    }
}

/// Spawns one worker thread per online CPU, runs them to completion, and
/// logs every failure. A single worker's fatal error doesn't abort the
/// others early — each is independent (spec §5) — but once all have
/// finished the session always ends and the outer loop re-opens the device.
fn run_session(device: &Device, config: &Config, shutdown: &AtomicBool) {
    let cpu_count = device::online_cpu_count();
    thread::scope(|scope| {
        let handles: Vec<_> = (0..cpu_count)
            .map(|cpu_index| {
                let config = config.clone();
                scope.spawn(move || {
                    let result = worker::run_worker(cpu_index, device, &config, shutdown);
                    if let Err(e) = &result {
                        log::error!("worker {cpu_index} exited: {e}");
                    }
                    result
                })
            })
            .collect();

        for handle in handles {
            // A worker thread panicking is itself a fatal condition; join()
            // surfaces it rather than silently losing the failure.
            let _ = handle.join();
        }
    });
}
