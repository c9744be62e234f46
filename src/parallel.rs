//! Cross-file/cross-chunk fan-out, built on `rayon`.
//!
//! Parallelism here is strictly across independent `Parser` instances, each
//! with exclusive ownership of its own reader and row pool — never within a
//! single parser's own token stream (see the concurrency model in the
//! crate's design notes). Instances may share one `WorkerPool` to bound
//! total concurrent I/O.

use rayon::prelude::*;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::parser::{Parser, DEFAULT_BLOCK_SIZE};
use crate::reader::{Source, WorkerPool};
use crate::row::Row;

/// Opens and fully drains one source into its rows, run as one unit of a
/// parallel fan-out.
pub fn drain<S: Source>(
    config: Config,
    source: S,
    worker_pool: Option<Arc<dyn WorkerPool>>,
) -> Result<Vec<Row>> {
    let mut parser = Parser::with_options(config, source, DEFAULT_BLOCK_SIZE, worker_pool)?;
    let mut rows = Vec::new();
    while let Some(row) = parser.read_row()? {
        rows.push(row.clone());
    }
    parser.close()?;
    Ok(rows)
}

/// Drains many independent sources concurrently, sharing one `Config` and
/// one optional `WorkerPool` across them. Each `open` closure is called
/// once, on whichever rayon worker thread picks up that unit of work, and
/// must produce a fresh, independently-owned `Source`.
///
/// Mirrors the reference two-phase-then-`into_par_iter` shape used
/// elsewhere in this crate's lineage for splitting work before fanning it
/// out, adapted here to whole files/chunks rather than row ranges within
/// one buffer.
pub fn drain_many<F, S>(
    opens: Vec<F>,
    config: &Config,
    worker_pool: Option<Arc<dyn WorkerPool>>,
) -> Vec<Result<Vec<Row>>>
where
    F: Fn() -> Result<S> + Sync,
    S: Source,
{
    opens
        .into_par_iter()
        .map(|open| {
            let source = open()?;
            drain(config.clone(), source, worker_pool.clone())
        })
        .collect()
}
