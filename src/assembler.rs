//! Drives the `Lexer` over a `BlockBuffer`, turning its token stream into
//! `Row`s: null recognition, trim-last-separator, empty-line policy, header
//! capture, row-id bookkeeping, and per-row length accounting.

use crate::buffer::BlockBuffer;
use crate::config::Config;
use crate::error::Result;
use crate::lexer::{Ending, FieldResult, Lexer, StartingBySkip};
use crate::reader::Source;
use crate::row::{Field, Row, RowPool};

/// Outcome of assembling one logical line.
pub enum Assembled {
    /// A data row, ready for the caller.
    Row(Row),
    /// The first row was captured as `columns` instead of being emitted.
    Header(Vec<String>),
    /// `allow_empty_line` is false and this line carried no content.
    SkippedEmptyLine,
    Eof,
}

pub struct RowAssembler {
    lexer: Lexer,
    null_tokens: Vec<Vec<u8>>,
    not_null: bool,
    quoted_null_is_text: bool,
    escape: Option<u8>,
    trim_last_sep: bool,
    allow_empty_line: bool,
    header: bool,
    header_captured: bool,
    next_row_id: i64,
    at_line_start: bool,
}

impl RowAssembler {
    pub fn new(config: &Config) -> Self {
        RowAssembler {
            lexer: Lexer::new(config),
            null_tokens: config.null_tokens_bytes(),
            not_null: config.not_null,
            quoted_null_is_text: config.quoted_null_is_text,
            escape: config.escape_char(),
            trim_last_sep: config.trim_last_sep,
            allow_empty_line: config.allow_empty_line,
            header: config.header,
            header_captured: false,
            next_row_id: 1,
            at_line_start: true,
        }
    }

    /// Resets line-start tracking after a `set_pos` call drops the buffer.
    pub fn reset_position(&mut self, row_id: i64) {
        self.next_row_id = row_id;
        self.at_line_start = true;
    }

    fn is_null(&self, field: &FieldResult) -> bool {
        if self.not_null {
            return false;
        }
        if field.quoted && self.quoted_null_is_text {
            return match self.escape {
                Some(esc) => self
                    .null_tokens
                    .iter()
                    .any(|t| t.contains(&esc) && t.as_slice() == field.raw.as_slice()),
                None => false,
            };
        }
        // Compared against the escape-consumed-but-unexpanded `raw` body, not
        // the fully unescaped `value`: an unquoted `\N` (escape char `\`)
        // must match a configured `\N` null token even though unescaping
        // that same field yields a bare `N`.
        self.null_tokens.iter().any(|t| t.as_slice() == field.raw.as_slice())
    }

    /// Assembles the next logical line into a row, skipping empty lines and
    /// capturing a header row as configured.
    pub fn assemble<S: Source>(
        &mut self,
        buf: &mut BlockBuffer<S>,
        pool: &RowPool,
    ) -> Result<Assembled> {
        self.lexer.consume_pending_terminator_tail(buf)?;
        if self.at_line_start {
            match self.lexer.skip_starting_by(buf)? {
                StartingBySkip::Eof => return Ok(Assembled::Eof),
                StartingBySkip::Found | StartingBySkip::NotConfigured => {}
            }
        }
        self.at_line_start = false;

        if self.lexer.at_eof(buf)? {
            return Ok(Assembled::Eof);
        }

        let mut slots = pool.get();
        let mut length: i64 = 0;
        let mut last_was_unquoted_empty = false;

        loop {
            let field = self.lexer.read_field(buf)?;
            // Raw (pre-unescape, post-doubled-delimiter) length, not the
            // unescaped value's: a lone escape byte collapses two source
            // bytes into one output byte, but `length` counts the former.
            length += field.raw.len() as i64;

            let is_null = self.is_null(&field);
            last_was_unquoted_empty = !field.quoted && field.value.is_empty() && !is_null;
            let slot = if is_null {
                Field::null(field.quoted)
            } else {
                Field::text(field.value, field.quoted)
            };

            let ended_by = field.ended_by;
            match ended_by {
                Ending::Separator => {
                    slots.push(slot);
                }
                Ending::Terminator | Ending::Eof => {
                    slots.push(slot);
                    self.at_line_start = true;
                    break;
                }
            }
        }

        if self.trim_last_sep && slots.len() >= 2 && last_was_unquoted_empty {
            let trimmed = slots.pop().unwrap();
            length -= trimmed.value.len() as i64;
        }

        // A lone *quoted* empty field (e.g. `""`) is a legitimate one-field
        // row and must not be mistaken for a blank line just because its
        // value happens to be empty too.
        let is_empty_line = slots.len() == 1
            && !slots[0].is_null
            && !slots[0].quoted
            && slots[0].value.is_empty();
        if is_empty_line && !self.allow_empty_line {
            pool.put(slots);
            return Ok(Assembled::SkippedEmptyLine);
        }

        if self.header && !self.header_captured {
            self.header_captured = true;
            let columns = slots
                .iter()
                .map(|f| String::from_utf8_lossy(&f.value).to_lowercase())
                .collect();
            pool.put(slots);
            return Ok(Assembled::Header(columns));
        }

        let row_id = self.next_row_id;
        self.next_row_id += 1;
        tracing::trace!(row_id, fields = slots.len(), length, "assembled row");

        Ok(Assembled::Row(Row {
            row_id,
            fields: slots,
            length,
        }))
    }
}
