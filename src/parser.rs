//! Public entry point: wires `Config`, `BlockBuffer`, `RowAssembler`, and
//! `RowPool` into a single-threaded, one-reader-per-instance parser.

use std::sync::Arc;

use crate::assembler::{Assembled, RowAssembler};
use crate::buffer::BlockBuffer;
use crate::config::Config;
use crate::error::{ParseError, Result};
use crate::reader::{PooledReader, Source, WorkerPool};
use crate::row::{Row, RowPool};

/// Default block size handed to `BlockBuffer`; the buffer itself scales
/// this up internally (see `buffer::DEFAULT_BUFFER_SCALE`).
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// A streaming row parser over one reader.
///
/// Not `Send`/`Sync`: methods mutate shared internal state and must only be
/// called from one thread at a time (see the concurrency model in the
/// crate's design notes). Parallelism is achieved across `Parser`
/// instances, optionally sharing one [`WorkerPool`].
pub struct Parser<S> {
    buffer: BlockBuffer<S>,
    assembler: RowAssembler,
    pool: RowPool,
    columns: Vec<String>,
    last_row: Row,
}

impl<S: Source> Parser<S> {
    /// Builds a parser with the default block size and no worker pool.
    pub fn new(config: Config, source: S) -> Result<Self> {
        Self::with_options(config, source, DEFAULT_BLOCK_SIZE, None)
    }

    /// Builds a parser with an explicit block size and/or worker pool.
    pub fn with_options(
        config: Config,
        source: S,
        block_size: usize,
        worker_pool: Option<Arc<dyn WorkerPool>>,
    ) -> Result<Self> {
        config.validate()?;
        let reader = PooledReader::new(source, worker_pool);
        let buffer = BlockBuffer::new(reader, block_size.max(1));
        let assembler = RowAssembler::new(&config);
        Ok(Parser {
            buffer,
            assembler,
            pool: RowPool::new(),
            columns: Vec::new(),
            last_row: Row::default(),
        })
    }

    /// Advances to the next data row, transparently skipping a captured
    /// header and empty lines per `allow_empty_line`. Returns `Ok(None)` at
    /// end of stream.
    pub fn read_row(&mut self) -> Result<Option<&Row>> {
        loop {
            match self.assembler.assemble(&mut self.buffer, &self.pool)? {
                Assembled::Row(row) => {
                    self.last_row = row;
                    return Ok(Some(&self.last_row));
                }
                Assembled::Header(columns) => {
                    self.columns = columns;
                    continue;
                }
                Assembled::SkippedEmptyLine => continue,
                Assembled::Eof => return Ok(None),
            }
        }
    }

    /// `(bytes consumed, last emitted row id)`.
    pub fn pos(&self) -> (i64, i64) {
        (self.buffer.pos(), self.last_row.row_id)
    }

    /// Raw underlying reader cursor, ahead of `pos()` by the unconsumed
    /// buffered tail.
    pub fn scanned_pos(&mut self) -> Result<i64> {
        self.buffer.scanned_pos()
    }

    /// Seeks the reader to `pos`, drops the block buffer, and resets the
    /// row id counter to `row_id`. Fails with `SeekMismatch` if the
    /// underlying reader lands somewhere else.
    pub fn set_pos(&mut self, pos: i64, row_id: i64) -> Result<()> {
        let actual = self.buffer.seek_to(pos)?;
        if actual != pos {
            tracing::warn!(requested = pos, actual, "seek landed at an unexpected offset");
            return Err(ParseError::SeekMismatch {
                requested: pos,
                actual,
            });
        }
        self.assembler.reset_position(row_id);
        self.last_row.row_id = row_id;
        Ok(())
    }

    /// A copy of the most recently assembled row.
    pub fn last_row(&self) -> Row {
        self.last_row.clone()
    }

    /// Returns a row's field storage to the pool for reuse.
    pub fn recycle_row(&self, row: Row) {
        self.pool.put(row.fields);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Externally-supplied columns override any captured header.
    pub fn set_columns(&mut self, columns: Vec<String>) {
        self.columns = columns;
    }

    pub fn close(&mut self) -> Result<()> {
        self.buffer.close()
    }
}
