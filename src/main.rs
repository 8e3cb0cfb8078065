//! CLI entry point (spec.md §6): `accesslog-shipper <db-host>`.
//!
//! Argument parsing itself is treated as an external collaborator (spec
//! §1 "Out of scope") — `clap`'s derive macro supplies it; missing the
//! required `db_host` positional exits with `clap`'s own usage error,
//! satisfying the spirit of the `EINVAL`-on-missing-argument contract
//! without hand-rolled parsing.

use clap::Parser;

use accesslog_shipper::config::{Config, DEFAULT_DEVICE_PATH};
use accesslog_shipper::supervisor;

#[derive(Debug, Parser)]
#[command(name = "accesslog-shipper", about = "Ships Tempesta-style access-log events into ClickHouse")]
struct Cli {
    /// Analytics database host, e.g. `clickhouse.internal` or
    /// `http://127.0.0.1:8123`.
    db_host: String,

    /// Path to the producer's mmap character device.
    #[arg(long, default_value = DEFAULT_DEVICE_PATH)]
    device: String,

    /// Per-CPU ring region size in bytes. Must be a power of two.
    #[arg(long)]
    ring_bytes: Option<u64>,

    /// Bounded retry count for a transient commit failure.
    #[arg(long)]
    commit_retries: Option<u32>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::new(cli.device, cli.db_host);
    if let Some(bytes) = cli.ring_bytes {
        config.ring_region_bytes = bytes;
    }
    if let Some(retries) = cli.commit_retries {
        config.commit_retries = retries;
    }

    let shutdown = install_shutdown_signal();

    match supervisor::run(&config, &shutdown) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            log::error!("fatal: {e}");
            std::process::exit(1);
        }
    }
}

/// Installs a `SIGINT`/`SIGTERM` handler that flips an atomic flag checked
/// both between sessions by the supervisor and inside every worker's ring
/// wait (spec §5 "Cancellation": "A supervisory signal ... causes each
/// worker to observe `Closed` at the next wait and exit").
fn install_shutdown_signal() -> std::sync::Arc<std::sync::atomic::AtomicBool> {
    let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    spawn_signal_waiter(flag.clone());
    flag
}

/// Minimal `SIGINT`/`SIGTERM` handling without pulling in a dedicated
/// signal crate: masks both signals on the process, then blocks in
/// `sigwait` on a dedicated thread and flips the shared flag when either
/// arrives.
fn spawn_signal_waiter(flag: std::sync::Arc<std::sync::atomic::AtomicBool>) {
    std::thread::spawn(move || unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGINT);
        libc::sigaddset(&mut set, libc::SIGTERM);
        libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
        let mut sig = 0;
        libc::sigwait(&set, &mut sig);
        flag.store(true, std::sync::atomic::Ordering::Relaxed);
    });
}
