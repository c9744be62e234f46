//! Byte-level tokenizer: the state machine described in the component
//! design as `FieldStart` / `Unquoted` / `Quoted` / `QuotedPostClose` /
//! `LineEnd`. Each call to [`Lexer::read_field`] walks those states for
//! exactly one field and returns what ended it.

use std::cell::Cell;

use crate::buffer::BlockBuffer;
use crate::config::Config;
use crate::error::{ParseError, Result};
use crate::reader::Source;

/// What ended the field just read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    Separator,
    Terminator,
    Eof,
}

/// One field plus the marker that closed it.
///
/// `value` is the final, post-unescape content exposed to callers. `raw` is
/// the field body after doubled-delimiter reduction but *before* escape
/// expansion — the assembler compares `raw` against `null_tokens` (an
/// escape-derived null like `\N` would otherwise vanish once unescaped) and
/// sums `raw` lengths into `Row::length`.
#[derive(Debug, Clone)]
pub struct FieldResult {
    pub value: Vec<u8>,
    pub raw: Vec<u8>,
    pub quoted: bool,
    pub ended_by: Ending,
}

/// Outcome of [`Lexer::skip_starting_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartingBySkip {
    /// `starting_by` is empty; nothing to do.
    NotConfigured,
    /// The prefix was found and discarded; a field may now be read.
    Found,
    /// The stream ran out before another matching line appeared.
    Eof,
}

enum PeekEnding {
    Terminator,
    Separator,
    Eof,
    /// Neither marker follows; caller decides what that means.
    Other,
}

fn unescape_byte(b: u8) -> u8 {
    match b {
        b'0' => 0x00,
        b'b' => 0x08,
        b'n' => 0x0A,
        b'r' => 0x0D,
        b't' => 0x09,
        b'Z' => 0x1A,
        other => other,
    }
}

/// Matches `pattern` as a prefix of `data`. A prefix that runs past the end
/// of `data` is a non-match unless more bytes might still arrive, in which
/// case the caller is expected to have refilled enough lookahead already;
/// at `is_last_chunk` a partial match can never complete and is literal.
fn match_prefix_len(data: &[u8], pattern: &[u8], is_last_chunk: bool) -> Option<usize> {
    if pattern.is_empty() {
        return None;
    }
    let n = pattern.len().min(data.len());
    if data[..n] != pattern[..n] {
        return None;
    }
    if n < pattern.len() {
        let _ = is_last_chunk;
        return None;
    }
    Some(pattern.len())
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// The configured byte-level grammar, independent of any particular
/// `BlockBuffer`/`Source` instance.
pub struct Lexer {
    separator: Vec<u8>,
    delimiter: Vec<u8>,
    doubled_delimiter: Vec<u8>,
    terminator: Vec<u8>,
    escape: Option<u8>,
    unescaped_quote: bool,
    starting_by: Vec<u8>,
    lookahead: usize,
    /// Set when the default (unconfigured) terminator rule just closed a
    /// row on a bare `\r`; the next scan checks for a leftover `\n` before
    /// doing anything else. See `consume_pending_terminator_tail`.
    pending_cr_lf_tail: Cell<bool>,
}

impl Lexer {
    pub fn new(config: &Config) -> Self {
        let separator = config.separator.as_bytes().to_vec();
        let delimiter = config.delimiter.as_bytes().to_vec();
        let terminator = config.terminator.as_bytes().to_vec();
        let escape = config.escape_char();
        let starting_by = config.starting_by.as_bytes().to_vec();

        let mut doubled_delimiter = delimiter.clone();
        doubled_delimiter.extend_from_slice(&delimiter);

        let mut lookahead = separator.len().max(1);
        if !delimiter.is_empty() {
            lookahead = lookahead.max(delimiter.len() * 2);
        }
        lookahead = lookahead.max(if terminator.is_empty() {
            2
        } else {
            terminator.len()
        });
        if escape.is_some() {
            lookahead = lookahead.max(2);
        }

        Lexer {
            separator,
            delimiter,
            doubled_delimiter,
            terminator,
            escape,
            unescaped_quote: config.unescaped_quote,
            starting_by,
            lookahead,
            pending_cr_lf_tail: Cell::new(false),
        }
    }

    fn ensure<S: Source>(&self, buf: &mut BlockBuffer<S>, n: usize) -> Result<()> {
        while buf.unconsumed().len() < n && !buf.is_last_chunk() {
            buf.refill()?;
        }
        Ok(())
    }

    /// Length of a terminator match at the start of `data`, under the
    /// *default* (unconfigured) rule only. A bare `\r` closes the row
    /// immediately rather than waiting to see whether a `\n` follows: that
    /// optional second byte is picked up by `consume_pending_terminator_tail`
    /// at the start of the next scan instead of being credited here. This
    /// mirrors how the reference dump-file parser's position counter lags
    /// by one byte behind a `\r\n` it has fully consumed.
    fn terminator_len(&self, data: &[u8], is_last_chunk: bool) -> Option<usize> {
        if !self.terminator.is_empty() {
            return match_prefix_len(data, &self.terminator, is_last_chunk);
        }
        match data.first()? {
            b'\n' => Some(1),
            b'\r' => Some(1),
            _ => None,
        }
    }

    fn peek_ending<S: Source>(&self, buf: &mut BlockBuffer<S>) -> Result<PeekEnding> {
        self.ensure(buf, self.lookahead)?;
        let data = buf.unconsumed();
        if data.is_empty() {
            return Ok(if buf.is_last_chunk() {
                PeekEnding::Eof
            } else {
                PeekEnding::Other
            });
        }
        if let Some(n) = self.terminator_len(data, buf.is_last_chunk()) {
            let is_bare_cr = self.terminator.is_empty() && n == 1 && data[0] == b'\r';
            buf.consume(n);
            if is_bare_cr {
                self.pending_cr_lf_tail.set(true);
            }
            return Ok(PeekEnding::Terminator);
        }
        if let Some(n) = match_prefix_len(data, &self.separator, buf.is_last_chunk()) {
            buf.consume(n);
            return Ok(PeekEnding::Separator);
        }
        Ok(PeekEnding::Other)
    }

    /// If the previous row was closed on a bare `\r` under the default
    /// terminator rule, swallows an immediately-following `\n` before
    /// anything else is scanned, crediting that byte to `pos` only now.
    /// Leaves the buffer untouched (besides clearing the pending flag) when
    /// no such byte follows, e.g. a lone-`\r`-terminated file.
    pub fn consume_pending_terminator_tail<S: Source>(
        &self,
        buf: &mut BlockBuffer<S>,
    ) -> Result<()> {
        if !self.pending_cr_lf_tail.replace(false) {
            return Ok(());
        }
        self.ensure(buf, 1)?;
        if buf.unconsumed().first() == Some(&b'\n') {
            buf.consume(1);
        }
        Ok(())
    }

    /// True when the stream is fully exhausted and no line at all remains
    /// at the current position (used by the assembler to distinguish a
    /// genuinely empty trailing line from end of input).
    pub fn at_eof<S: Source>(&self, buf: &mut BlockBuffer<S>) -> Result<bool> {
        self.ensure(buf, 1)?;
        Ok(buf.unconsumed().is_empty() && buf.is_last_chunk())
    }

    /// Reads exactly one field, consuming the separator/terminator that
    /// follows it (but not a second field's worth of bytes).
    pub fn read_field<S: Source>(&self, buf: &mut BlockBuffer<S>) -> Result<FieldResult> {
        self.ensure(buf, self.lookahead)?;
        let data = buf.unconsumed();
        let quoted = !self.delimiter.is_empty()
            && match_prefix_len(data, &self.delimiter, buf.is_last_chunk()).is_some();

        let mut value = Vec::new();
        let mut raw = Vec::new();
        let ended_by = if quoted {
            buf.consume(self.delimiter.len());
            self.scan_quoted(buf, &mut value, &mut raw)?
        } else {
            self.scan_unquoted(buf, &mut value, &mut raw)?
        };

        Ok(FieldResult {
            value,
            raw,
            quoted,
            ended_by,
        })
    }

    fn scan_unquoted<S: Source>(
        &self,
        buf: &mut BlockBuffer<S>,
        value: &mut Vec<u8>,
        raw: &mut Vec<u8>,
    ) -> Result<Ending> {
        loop {
            self.ensure(buf, self.lookahead)?;
            {
                let data = buf.unconsumed();
                if data.is_empty() && buf.is_last_chunk() {
                    return Ok(Ending::Eof);
                }
                if let Some(esc) = self.escape {
                    if !data.is_empty() && data[0] == esc {
                        if data.len() >= 2 {
                            value.push(unescape_byte(data[1]));
                            raw.push(esc);
                            raw.push(data[1]);
                            buf.consume(2);
                            continue;
                        } else if buf.is_last_chunk() {
                            value.push(esc);
                            raw.push(esc);
                            buf.consume(1);
                            continue;
                        }
                    }
                }
            }
            match self.peek_ending(buf)? {
                PeekEnding::Eof => return Ok(Ending::Eof),
                PeekEnding::Terminator => return Ok(Ending::Terminator),
                PeekEnding::Separator => return Ok(Ending::Separator),
                PeekEnding::Other => {
                    let data = buf.unconsumed();
                    value.push(data[0]);
                    raw.push(data[0]);
                    buf.consume(1);
                }
            }
        }
    }

    fn scan_quoted<S: Source>(
        &self,
        buf: &mut BlockBuffer<S>,
        value: &mut Vec<u8>,
        raw: &mut Vec<u8>,
    ) -> Result<Ending> {
        loop {
            self.ensure(buf, self.lookahead)?;
            let data = buf.unconsumed();
            if data.is_empty() {
                if buf.is_last_chunk() {
                    return Err(ParseError::UnterminatedQuote { pos: buf.pos() });
                }
                continue;
            }
            if let Some(esc) = self.escape {
                if data[0] == esc {
                    if data.len() >= 2 {
                        value.push(unescape_byte(data[1]));
                        raw.push(esc);
                        raw.push(data[1]);
                        buf.consume(2);
                        continue;
                    } else if buf.is_last_chunk() {
                        value.push(esc);
                        raw.push(esc);
                        buf.consume(1);
                        continue;
                    }
                }
            }
            if let Some(n) = match_prefix_len(data, &self.doubled_delimiter, buf.is_last_chunk()) {
                value.extend_from_slice(&self.delimiter);
                raw.extend_from_slice(&self.delimiter);
                buf.consume(n);
                continue;
            }
            if let Some(n) = match_prefix_len(data, &self.delimiter, buf.is_last_chunk()) {
                buf.consume(n);
                match self.peek_ending(buf)? {
                    PeekEnding::Terminator => return Ok(Ending::Terminator),
                    PeekEnding::Separator => return Ok(Ending::Separator),
                    PeekEnding::Eof => return Ok(Ending::Eof),
                    PeekEnding::Other => {
                        if self.unescaped_quote {
                            value.extend_from_slice(&self.delimiter);
                            raw.extend_from_slice(&self.delimiter);
                            continue;
                        }
                        return Err(ParseError::UnexpectedAfterQuote { pos: buf.pos() });
                    }
                }
            }
            value.push(data[0]);
            raw.push(data[0]);
            buf.consume(1);
        }
    }

    /// At a line start, discards bytes through the first occurrence of
    /// `starting_by`. A line with no occurrence is discarded wholesale and
    /// the next line is tried.
    pub fn skip_starting_by<S: Source>(&self, buf: &mut BlockBuffer<S>) -> Result<StartingBySkip> {
        if self.starting_by.is_empty() {
            return Ok(StartingBySkip::NotConfigured);
        }
        loop {
            loop {
                let data = buf.unconsumed();
                if find_subsequence(data, &self.starting_by).is_some() {
                    break;
                }
                if self.find_terminator(data, buf.is_last_chunk()).is_some() {
                    break;
                }
                if buf.is_last_chunk() {
                    break;
                }
                buf.refill()?;
            }

            let data = buf.unconsumed();
            if let Some(idx) = find_subsequence(data, &self.starting_by) {
                let terminator_before = self.find_terminator(&data[..idx], buf.is_last_chunk());
                if terminator_before.is_none() {
                    buf.consume(idx + self.starting_by.len());
                    return Ok(StartingBySkip::Found);
                }
            }

            match self.find_terminator(data, buf.is_last_chunk()) {
                Some((start, len)) => {
                    buf.consume(start + len);
                    if buf.unconsumed().is_empty() && buf.is_last_chunk() {
                        return Ok(StartingBySkip::Eof);
                    }
                }
                None => {
                    buf.consume(data.len());
                    return Ok(StartingBySkip::Eof);
                }
            }
        }
    }

    fn find_terminator(&self, data: &[u8], is_last_chunk: bool) -> Option<(usize, usize)> {
        for i in 0..data.len() {
            if let Some(n) = self.terminator_len(&data[i..], is_last_chunk) {
                return Some((i, n));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::PooledReader;
    use std::io::Cursor;

    fn lexer_for(cfg: &Config) -> Lexer {
        Lexer::new(cfg)
    }

    fn buffer_of(data: &[u8]) -> BlockBuffer<Cursor<Vec<u8>>> {
        BlockBuffer::new(PooledReader::new(Cursor::new(data.to_vec()), None), 4096)
    }

    #[test]
    fn unquoted_fields_split_on_separator_and_terminator() {
        let cfg = Config::default();
        let lex = lexer_for(&cfg);
        let mut buf = buffer_of(b"a,b,c\n");

        let f1 = lex.read_field(&mut buf).unwrap();
        assert_eq!(f1.value, b"a");
        assert_eq!(f1.ended_by, Ending::Separator);

        let f2 = lex.read_field(&mut buf).unwrap();
        assert_eq!(f2.value, b"b");
        assert_eq!(f2.ended_by, Ending::Separator);

        let f3 = lex.read_field(&mut buf).unwrap();
        assert_eq!(f3.value, b"c");
        assert_eq!(f3.ended_by, Ending::Terminator);
    }

    #[test]
    fn quoted_field_with_embedded_newline_and_doubled_quote() {
        let mut cfg = Config::default();
        cfg.delimiter = "\"".to_owned();
        let lex = lexer_for(&cfg);
        let mut buf = buffer_of(b"\"b\nb\"\"b\",x\n");

        let f1 = lex.read_field(&mut buf).unwrap();
        assert!(f1.quoted);
        assert_eq!(f1.value, b"b\nb\"b");
        assert_eq!(f1.ended_by, Ending::Separator);
    }

    #[test]
    fn escape_char_unescapes_known_bytes_and_is_literal_otherwise() {
        let mut cfg = Config::default();
        cfg.escaped_by = "\\".to_owned();
        let lex = lexer_for(&cfg);
        let mut buf = buffer_of(b"a\\nb\\?c\n");

        let f = lex.read_field(&mut buf).unwrap();
        assert_eq!(f.value, b"a\nb?c");
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let mut cfg = Config::default();
        cfg.delimiter = "\"".to_owned();
        let lex = lexer_for(&cfg);
        let mut buf = buffer_of(b"\"abc");

        let err = lex.read_field(&mut buf).unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedQuote { .. }));
    }

    #[test]
    fn unexpected_after_quote_without_unescaped_quote() {
        let mut cfg = Config::default();
        cfg.delimiter = "\"".to_owned();
        let lex = lexer_for(&cfg);
        let mut buf = buffer_of(b"\"ab\"c,d\n");

        let err = lex.read_field(&mut buf).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedAfterQuote { .. }));
    }

    #[test]
    fn unescaped_quote_mode_tolerates_stray_delimiter() {
        let mut cfg = Config::default();
        cfg.delimiter = "\"".to_owned();
        cfg.unescaped_quote = true;
        let lex = lexer_for(&cfg);
        let mut buf = buffer_of(b"\"a string containing a \" quote\",102.20\n");

        let f = lex.read_field(&mut buf).unwrap();
        assert_eq!(f.value, b"a string containing a \" quote");
        assert_eq!(f.ended_by, Ending::Separator);
    }

    #[test]
    fn default_terminator_defers_crlf_second_byte_to_the_next_scan() {
        let cfg = Config::default();
        let lex = lexer_for(&cfg);
        let mut buf = buffer_of(b"a,b\r\nc,d\r\n");

        let _ = lex.read_field(&mut buf).unwrap();
        let f = lex.read_field(&mut buf).unwrap();
        assert_eq!(f.ended_by, Ending::Terminator);
        // The closing `\r` is credited immediately; the paired `\n` is
        // still sitting unconsumed until the next scan asks for it.
        assert_eq!(buf.pos(), 4);

        lex.consume_pending_terminator_tail(&mut buf).unwrap();
        assert_eq!(buf.pos(), 5);

        let _ = lex.read_field(&mut buf).unwrap();
        let f2 = lex.read_field(&mut buf).unwrap();
        assert_eq!(f2.ended_by, Ending::Terminator);
        assert_eq!(buf.pos(), 9);
    }

    #[test]
    fn unescaped_quote_mode_tolerates_stray_multi_byte_delimiter() {
        // Same re-extension path as `unescaped_quote_mode_tolerates_stray_delimiter`,
        // but with a two-byte delimiter so a stray closing match can't be
        // confused with the one-byte case `match_prefix_len` usually sees.
        let mut cfg = Config::default();
        cfg.delimiter = "@@".to_owned();
        cfg.terminator = "\n".to_owned();
        cfg.unescaped_quote = true;
        let lex = lexer_for(&cfg);
        let mut buf = buffer_of(b"@@a @@ b@@,x\n");

        let f = lex.read_field(&mut buf).unwrap();
        assert!(f.quoted);
        assert_eq!(f.value, b"a @@ b");
        assert_eq!(f.ended_by, Ending::Separator);

        let f2 = lex.read_field(&mut buf).unwrap();
        assert_eq!(f2.value, b"x");
        assert_eq!(f2.ended_by, Ending::Terminator);
    }

    #[test]
    fn starting_by_discards_prefix_and_whole_unmatched_lines() {
        let mut cfg = Config::default();
        cfg.starting_by = "LOAD ".to_owned();
        let lex = lexer_for(&cfg);
        let mut buf = buffer_of(b"garbage line\nLOAD a,b\n");

        let skip = lex.skip_starting_by(&mut buf).unwrap();
        assert_eq!(skip, StartingBySkip::Found);
        let f = lex.read_field(&mut buf).unwrap();
        assert_eq!(f.value, b"a");
    }
}
