//! Streaming, block-buffered CSV / MySQL `LOAD DATA INFILE` parser.
//!
//! Accepts RFC 4180-style quoting and MySQL dump-file field/line handling
//! in a single configurable grammar, built to ingest gigabyte-scale dumps
//! with stable file-offset bookkeeping for restartable import jobs.
//!
//! ```no_run
//! use blockcsv::{Config, Parser};
//! use std::fs::File;
//!
//! # fn main() -> blockcsv::Result<()> {
//! let file = File::open("dump.csv")?;
//! let mut parser = Parser::new(Config::default(), file)?;
//! while let Some(row) = parser.read_row()? {
//!     for field in &row.fields {
//!         let _ = field.is_null;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "mimalloc")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod assembler;
mod buffer;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parallel;
pub mod parser;
pub mod reader;
pub mod row;

pub use config::Config;
pub use error::{ParseError, Result};
pub use parser::{Parser, DEFAULT_BLOCK_SIZE};
pub use reader::{SemaphorePool, Source, WorkerPool};
pub use row::{Field, Row};
