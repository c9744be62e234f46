//! Error types surfaced by the parser.

use thiserror::Error;

/// Everything that can go wrong while configuring or driving the parser.
///
/// `EOF` is deliberately not a variant here: `Parser::read_row` reports it as
/// `Ok(None)`, matching the source's treatment of EOF as a normal terminal
/// signal rather than a failure.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The underlying reader failed.
    #[error("i/o failure: {0}")]
    IoFailure(#[from] std::io::Error),

    /// Reached end of input while inside a quoted field.
    #[error("unterminated quote at byte offset {pos}")]
    UnterminatedQuote {
        /// Byte offset (post-BOM) where the unterminated quote began.
        pos: i64,
    },

    /// Bytes followed a closing delimiter that were not a separator,
    /// terminator, or EOF, and `unescaped_quote` was not enabled.
    #[error("unexpected byte after closing delimiter at byte offset {pos}")]
    UnexpectedAfterQuote {
        /// Byte offset (post-BOM) of the offending byte.
        pos: i64,
    },

    /// The configuration itself is unsatisfiable.
    #[error("invalid config: {reason}")]
    InvalidConfig {
        /// Human-readable explanation.
        reason: String,
    },

    /// `set_pos` requested an offset the reader did not actually seek to.
    #[error("seek mismatch: requested {requested}, reader landed at {actual}")]
    SeekMismatch {
        /// The offset that was requested.
        requested: i64,
        /// The offset the reader actually reports after seeking.
        actual: i64,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ParseError>;
