//! The reader side of the pipeline: a `read + seek + close` source wrapped
//! in an optional concurrency throttle.

use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{ParseError, Result};

/// Anything the parser can read bytes from, seek within, and close.
///
/// Blanket-implemented for any `Read + Seek`; `close` defaults to a no-op
/// since most in-memory and file sources need nothing more than `Drop`.
pub trait Source: Read + Seek {
    fn close(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<T: Read + Seek> Source for T {}

/// The external concurrency throttle. `apply` borrows a slot, blocking if
/// the pool is saturated; `recycle` returns it. Implementations must be
/// safe to call from a single thread repeatedly (the parser never calls
/// these concurrently with itself, but a pool is shared across parsers).
pub trait WorkerPool: Send + Sync {
    fn apply(&self);
    fn recycle(&self);
}

/// A bounded counting semaphore satisfying the `WorkerPool` contract.
///
/// This is the one concrete pool shipped with the crate; callers needing a
/// different throttling policy (e.g. one driven by an async scheduler) can
/// supply their own `Arc<dyn WorkerPool>` instead.
pub struct SemaphorePool {
    in_use: Mutex<usize>,
    capacity: usize,
    available: Condvar,
}

impl SemaphorePool {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(SemaphorePool {
            in_use: Mutex::new(0),
            capacity: capacity.max(1),
            available: Condvar::new(),
        })
    }
}

impl WorkerPool for SemaphorePool {
    fn apply(&self) {
        let mut in_use = self.in_use.lock().unwrap();
        while *in_use >= self.capacity {
            in_use = self.available.wait(in_use).unwrap();
        }
        *in_use += 1;
    }

    fn recycle(&self) {
        let mut in_use = self.in_use.lock().unwrap();
        *in_use = in_use.saturating_sub(1);
        self.available.notify_one();
    }
}

/// RAII guard acquiring a pool slot on construction and releasing it on
/// drop, so every exit path of the guarded call (success, EOF, or error)
/// releases the slot exactly once.
struct PoolGuard<'a> {
    pool: Option<&'a Arc<dyn WorkerPool>>,
}

impl<'a> PoolGuard<'a> {
    fn acquire(pool: &'a Option<Arc<dyn WorkerPool>>) -> Self {
        if let Some(p) = pool {
            p.apply();
        }
        PoolGuard {
            pool: pool.as_ref(),
        }
    }
}

impl Drop for PoolGuard<'_> {
    fn drop(&mut self) {
        if let Some(p) = self.pool {
            p.recycle();
        }
    }
}

/// Outcome of a `read_full` call.
pub struct ReadOutcome {
    /// Bytes actually placed into the caller's buffer.
    pub bytes_read: usize,
    /// True if the buffer could not be completely filled (short read / EOF).
    pub is_eof: bool,
}

/// Wraps a `Source` so every physical I/O call first borrows a slot from an
/// optional `WorkerPool`. When no pool is configured, calls pass through
/// unmodified.
pub struct PooledReader<S> {
    source: S,
    pool: Option<Arc<dyn WorkerPool>>,
}

impl<S: Source> PooledReader<S> {
    pub fn new(source: S, pool: Option<Arc<dyn WorkerPool>>) -> Self {
        PooledReader { source, pool }
    }

    /// Fills `buf` completely unless the source runs out of bytes first.
    pub fn read_full(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        let _guard = PoolGuard::acquire(&self.pool);
        let mut total = 0;
        while total < buf.len() {
            match self.source.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ParseError::IoFailure(e)),
            }
        }
        Ok(ReadOutcome {
            bytes_read: total,
            is_eof: total < buf.len(),
        })
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let _guard = PoolGuard::acquire(&self.pool);
        self.source.seek(pos).map_err(ParseError::IoFailure)
    }

    pub fn close(&mut self) -> Result<()> {
        let _guard = PoolGuard::acquire(&self.pool);
        self.source.close().map_err(ParseError::IoFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn read_full_reports_eof_on_short_source() {
        let mut reader = PooledReader::new(Cursor::new(b"abc".to_vec()), None);
        let mut buf = [0u8; 8];
        let outcome = reader.read_full(&mut buf).unwrap();
        assert_eq!(outcome.bytes_read, 3);
        assert!(outcome.is_eof);
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn read_full_fills_buffer_when_enough_data() {
        let mut reader = PooledReader::new(Cursor::new(b"abcdefgh".to_vec()), None);
        let mut buf = [0u8; 4];
        let outcome = reader.read_full(&mut buf).unwrap();
        assert_eq!(outcome.bytes_read, 4);
        assert!(!outcome.is_eof);
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn seek_moves_the_underlying_cursor() {
        let mut reader = PooledReader::new(Cursor::new(b"abcdef".to_vec()), None);
        let pos = reader.seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(pos, 3);
        let mut buf = [0u8; 3];
        reader.read_full(&mut buf).unwrap();
        assert_eq!(&buf, b"def");
    }

    #[test]
    fn semaphore_pool_throttles_to_capacity() {
        let pool = SemaphorePool::new(1);
        pool.apply();
        let pool2 = Arc::clone(&pool);
        let barrier = Arc::new(Barrier::new(2));
        let barrier2 = Arc::clone(&barrier);
        let handle = thread::spawn(move || {
            barrier2.wait();
            pool2.apply();
            pool2.recycle();
        });
        barrier.wait();
        thread::sleep(std::time::Duration::from_millis(20));
        pool.recycle();
        handle.join().unwrap();
    }
}
