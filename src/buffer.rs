//! Fixed-capacity refill buffer sitting between the `PooledReader` and the
//! `Lexer`.

use crate::error::Result;
use crate::reader::{PooledReader, Source};

/// Scale applied to the caller-supplied block size to get the actual
/// refill-buffer capacity; matches the reference implementation's default.
pub const DEFAULT_BUFFER_SCALE: usize = 5;

const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Holds the unconsumed tail of the stream plus whatever was appended by the
/// most recent refill, and reports when the underlying reader is exhausted.
pub struct BlockBuffer<S> {
    reader: PooledReader<S>,
    data: Vec<u8>,
    cursor: usize,
    refill_scratch: Vec<u8>,
    read_scratch: Vec<u8>,
    is_last_chunk: bool,
    pos: i64,
}

impl<S: Source> BlockBuffer<S> {
    pub fn new(reader: PooledReader<S>, block_size: usize) -> Self {
        let capacity = block_size * DEFAULT_BUFFER_SCALE;
        BlockBuffer {
            reader,
            data: Vec::new(),
            cursor: 0,
            refill_scratch: Vec::new(),
            read_scratch: vec![0u8; capacity.max(1)],
            is_last_chunk: false,
            pos: 0,
        }
    }

    /// Bytes not yet consumed by the lexer.
    pub fn unconsumed(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    /// Advances past `n` bytes of the unconsumed window; `pos` tracks bytes
    /// consumed by the lexer, so it moves in lockstep with the cursor.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(self.cursor + n <= self.data.len());
        self.cursor += n;
        self.pos += n as i64;
    }

    pub fn is_last_chunk(&self) -> bool {
        self.is_last_chunk
    }

    pub fn pos(&self) -> i64 {
        self.pos
    }

    /// Reads one more block from the source, preserving the unconsumed tail.
    ///
    /// A BOM is stripped only when `pos == 0`, i.e. nothing has been
    /// logically consumed yet — true both on the very first call and after
    /// `reset_at` rewinds back to the start of the stream.
    pub fn refill(&mut self) -> Result<()> {
        // Stage the tail through a side buffer first: `data` and the read
        // target must never alias each other while we rebuild `data`.
        self.refill_scratch.clear();
        self.refill_scratch
            .extend_from_slice(&self.data[self.cursor..]);
        self.data.clear();
        self.data.append(&mut self.refill_scratch);
        self.cursor = 0;

        let outcome = self.reader.read_full(&mut self.read_scratch)?;
        let mut block = &self.read_scratch[..outcome.bytes_read];

        if self.pos == 0 {
            if block.starts_with(&BOM) {
                block = &block[BOM.len()..];
                self.pos += BOM.len() as i64;
                tracing::debug!(bom_stripped = true, "stripped leading UTF-8 BOM");
            }
        }

        self.data.extend_from_slice(block);
        self.is_last_chunk = outcome.is_eof;
        tracing::debug!(
            bytes_read = outcome.bytes_read,
            is_last_chunk = self.is_last_chunk,
            "refilled block buffer"
        );
        Ok(())
    }

    /// Seeks the underlying reader to an absolute offset and drops all
    /// buffered state, as if the buffer had just been constructed at that
    /// position. Returns the offset the reader actually landed at.
    pub fn seek_to(&mut self, offset: i64) -> Result<i64> {
        let actual = self
            .reader
            .seek(std::io::SeekFrom::Start(offset.max(0) as u64))?;
        self.data.clear();
        self.cursor = 0;
        self.is_last_chunk = false;
        self.pos = offset;
        Ok(actual as i64)
    }

    /// Raw reader cursor: `pos` plus whatever is still buffered but
    /// unconsumed.
    pub fn scanned_pos(&mut self) -> Result<i64> {
        let current = self.reader.seek(std::io::SeekFrom::Current(0))?;
        Ok(current as i64)
    }

    pub fn close(&mut self) -> Result<()> {
        self.reader.close()
    }
}
