//! The analytics database sink (spec.md §4.C / §6). Wraps a `clickhouse`
//! client bound to one table, with the bounded-retry commit policy from
//! spec §7 (`Transient-IO`).

use crate::block::Block;
use crate::config::Config;
use crate::error::SinkError;

/// One worker's database connection, created once at worker start and
/// released at worker end (spec §5 "Database connections are per-worker").
pub struct Sink {
    client: clickhouse::Client,
    retries: u32,
}

impl Sink {
    pub fn new(config: &Config) -> Self {
        let url = if config.db_host.starts_with("http") {
            config.db_host.clone()
        } else {
            format!("http://{}:8123", config.db_host)
        };
        Self {
            client: clickhouse::Client::default().with_url(url),
            retries: config.commit_retries,
        }
    }

    /// Submits `block` as one table-append to `access_log` (spec §4.C
    /// `commit`). Retries a bounded number of times on transient failure;
    /// on exhaustion the block is dropped and the error logged — a sink
    /// failure never propagates into decoder or ring state (spec §7
    /// Propagation).
    pub async fn commit(&self, block: Block) -> Result<(), SinkError> {
        if block.is_empty() {
            return Ok(());
        }
        let rows = block.into_rows();

        let mut attempt = 0;
        loop {
            match self.try_commit(&rows).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    log::warn!(
                        "commit attempt {}/{} failed: {} — retrying",
                        attempt,
                        self.retries,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_commit(&self, rows: &[crate::block::AccessLogRow]) -> Result<(), SinkError> {
        let mut insert = self
            .client
            .insert::<crate::block::AccessLogRow>(crate::config::TABLE_NAME)?;
        for row in rows {
            insert.write(row).await?;
        }
        insert.end().await?;
        Ok(())
    }
}
