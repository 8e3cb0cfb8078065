//! The per-CPU worker (spec.md §4.D): owns one ring region, one decoder
//! pass, one block, one database connection; drives ring → decoder → block
//! → commit until the ring closes or a fatal condition is hit.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::block::Block;
use crate::config::Config;
use crate::decoder::decode_span;
use crate::device::{self, Device};
use crate::error::{DecodeOutcome, RingError, ShipperError};
use crate::ring::RingReader;
use crate::sink::Sink;

/// Runs one worker to completion. Returns `Ok(())` on clean shutdown
/// (device closed, remainder committed) or `Err` on a fatal condition —
/// the caller (supervisor) is the only place that observes this (spec §7
/// "The supervisor is the only place that observes worker failure"). A
/// transient commit failure is never fatal here (spec §7 Transient-IO,
/// Propagation): `Sink::commit` already retried a bounded number of times,
/// so on its error the block is logged and dropped and the loop continues.
pub fn run_worker(
    cpu_index: usize,
    device: &Device,
    config: &Config,
    shutdown: &AtomicBool,
) -> Result<(), ShipperError> {
    let sink = Sink::new(config);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(ShipperError::Io)?;

    let mmap = device.map_region(cpu_index).map_err(ShipperError::Io)?;
    let (mut reader, producer_cpu) =
        RingReader::new(mmap).map_err(|e| ShipperError::WorkerFailed {
            cpu: cpu_index,
            reason: e.to_string(),
        })?;

    device::pin_current_thread(producer_cpu)?;
    log::info!(
        "worker started: assigned index {cpu_index}, pinned to cpu {producer_cpu}"
    );

    let mut block = Block::new();
    let fd = device.as_raw_fd();

    loop {
        let span = match reader
            .next_span(|| device::is_closed(fd) || shutdown.load(Ordering::Relaxed))
        {
            Ok(span) => span,
            Err(RingError::Closed { cpu }) => {
                log::info!("cpu {cpu}: device closed, committing remainder and exiting");
                if let Err(e) = runtime.block_on(sink.commit(std::mem::take(&mut block))) {
                    log::error!("cpu {cpu}: final commit failed, dropping remainder: {e}");
                }
                return Ok(());
            }
            Err(RingError::Corrupt { cpu, readable, capacity }) => {
                return Err(ShipperError::WorkerFailed {
                    cpu: cpu_index,
                    reason: format!(
                        "ring corrupt on cpu {cpu}: readable {readable} > capacity {capacity}"
                    ),
                });
            }
        };

        let (consumed, outcome) = decode_span(span, &mut block, |count| {
            log::warn!("cpu {producer_cpu}: producer dropped {count} events");
        });
        reader.advance(consumed);

        match outcome {
            DecodeOutcome::Ok | DecodeOutcome::Truncated => {
                if !block.is_empty() {
                    let committed = std::mem::replace(&mut block, Block::new());
                    if let Err(e) = runtime.block_on(sink.commit(committed)) {
                        log::error!(
                            "cpu {producer_cpu}: commit exhausted retries, dropping block: {e}"
                        );
                    }
                }
            }
            DecodeOutcome::Unknown { frame_type } => {
                log::error!("cpu {producer_cpu}: unknown frame type {frame_type}, exiting worker");
                return Err(ShipperError::WorkerFailed {
                    cpu: cpu_index,
                    reason: format!("unknown frame type {frame_type}"),
                });
            }
        }
    }
}
