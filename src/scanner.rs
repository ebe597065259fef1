use std::mem;

use memchr::{memchr, memchr2, memchr3};

use crate::byte_record::{ByteRecord, Position};
use crate::error::{Error, ErrorKind, Result};

/// Scanner state at a quiescent point between two input bytes.
///
/// Every state is resumable: a chunk boundary may fall anywhere, including
/// between the two halves of a doubled quote or between an escape byte and
/// the byte it escapes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    /// At the start of a field, right after a separator or row boundary.
    StartOfField,
    InUnquotedField,
    InQuotedField,
    /// A quote was seen inside a quoted field; whether it closes the field
    /// or is the first half of a doubled quote depends on the next byte.
    QuotePending,
    /// An escape byte (distinct from the quote) was seen inside a quoted
    /// field; the next byte decides whether it escapes a quote.
    EscapePending,
    AfterClosingQuote,
    /// A `\r` was seen outside a quoted field. `Scanner::resume` holds the
    /// state to replay into when the next byte is not `newline`.
    AfterCr,
    /// Inside a comment line; bytes are discarded until `newline`.
    Comment,
}

/// The byte state machine that turns a UTF-8 view into fields and rows.
///
/// The scanner owns at most one in-flight row. Completed rows are handed to
/// the caller's closure the moment their terminator is consumed.
#[derive(Debug)]
pub(crate) struct Scanner {
    state: State,
    resume: State,
    /// The field currently being accumulated.
    field: Vec<u8>,
    /// Completed fields of the row currently being accumulated.
    row: ByteRecord,
    /// Bytes consumed since the last row boundary, delimiters included.
    row_bytes: u64,
    /// Position of the first byte of the current row.
    row_pos: Position,
    pos: Position,
    separator: u8,
    quote: u8,
    quoting: bool,
    escape: u8,
    newline: u8,
    comment: Option<u8>,
    max_row_bytes: u64,
}

impl Scanner {
    pub(crate) fn new(
        separator: u8,
        quote: Option<u8>,
        escape: Option<u8>,
        newline: u8,
        comment: Option<u8>,
        max_row_bytes: u64,
    ) -> Scanner {
        let quoting = quote.is_some();
        let quote = quote.unwrap_or(b'"');
        Scanner {
            state: State::StartOfField,
            resume: State::StartOfField,
            field: Vec::new(),
            row: ByteRecord::new(),
            row_bytes: 0,
            row_pos: Position::new(),
            pos: Position::new(),
            separator,
            quote,
            quoting,
            escape: escape.unwrap_or(quote),
            newline,
            comment,
            max_row_bytes,
        }
    }

    pub(crate) fn position(&self) -> &Position {
        &self.pos
    }

    /// Consume a chunk of the UTF-8 view, invoking `on_row` for every row
    /// completed within it.
    pub(crate) fn feed<F>(&mut self, input: &[u8], on_row: &mut F) -> Result<()>
    where
        F: FnMut(ByteRecord, &Position) -> Result<()>,
    {
        let mut i = 0;
        while i < input.len() {
            let b = input[i];
            match self.state {
                State::StartOfField => {
                    if self.quoting && b == self.quote {
                        self.consume(b)?;
                        i += 1;
                        self.state = State::InQuotedField;
                    } else if b == self.separator {
                        self.consume(b)?;
                        i += 1;
                        self.close_field();
                    } else if b == self.newline {
                        self.consume(b)?;
                        i += 1;
                        self.close_row(on_row)?;
                    } else if b == b'\r' {
                        self.consume(b)?;
                        i += 1;
                        self.resume = State::StartOfField;
                        self.state = State::AfterCr;
                    } else if self.comment == Some(b) && self.row.is_empty() {
                        // Comment lines only begin at row starts; their
                        // bytes do not count against the row budget.
                        self.skip(&input[i..i + 1]);
                        i += 1;
                        self.state = State::Comment;
                    } else {
                        self.consume(b)?;
                        i += 1;
                        self.field.push(b);
                        self.state = State::InUnquotedField;
                    }
                }
                State::InUnquotedField => {
                    if b == self.separator {
                        self.consume(b)?;
                        i += 1;
                        self.close_field();
                        self.state = State::StartOfField;
                    } else if b == self.newline {
                        self.consume(b)?;
                        i += 1;
                        self.close_row(on_row)?;
                        self.state = State::StartOfField;
                    } else if b == b'\r' {
                        self.consume(b)?;
                        i += 1;
                        self.resume = State::InUnquotedField;
                        self.state = State::AfterCr;
                    } else {
                        let stop =
                            memchr3(self.separator, self.newline, b'\r', &input[i..])
                                .unwrap_or(input.len() - i);
                        let run = &input[i..i + stop];
                        self.consume_run(run)?;
                        self.field.extend_from_slice(run);
                        i += stop;
                    }
                }
                State::InQuotedField => {
                    if b == self.quote {
                        self.consume(b)?;
                        i += 1;
                        self.state = State::QuotePending;
                    } else if b == self.escape {
                        self.consume(b)?;
                        i += 1;
                        self.state = State::EscapePending;
                    } else {
                        let stop = memchr2(self.quote, self.escape, &input[i..])
                            .unwrap_or(input.len() - i);
                        let run = &input[i..i + stop];
                        self.consume_run(run)?;
                        self.field.extend_from_slice(run);
                        i += stop;
                    }
                }
                State::QuotePending => {
                    if b == self.quote {
                        // A doubled quote is one literal quote.
                        self.consume(b)?;
                        i += 1;
                        self.field.push(self.quote);
                        self.state = State::InQuotedField;
                    } else {
                        // The quote closed the field; replay this byte.
                        self.state = State::AfterClosingQuote;
                    }
                }
                State::EscapePending => {
                    if b == self.quote {
                        self.consume(b)?;
                        i += 1;
                        self.field.push(self.quote);
                        self.state = State::InQuotedField;
                    } else {
                        // The escape byte was literal; replay this byte.
                        self.field.push(self.escape);
                        self.state = State::InQuotedField;
                    }
                }
                State::AfterClosingQuote => {
                    if b == self.quote {
                        // A quote straight after a closing quote reopens
                        // the field with a literal quote.
                        self.consume(b)?;
                        i += 1;
                        self.field.push(self.quote);
                        self.state = State::InQuotedField;
                    } else if b == self.separator {
                        self.consume(b)?;
                        i += 1;
                        self.close_field();
                        self.state = State::StartOfField;
                    } else if b == self.newline {
                        self.consume(b)?;
                        i += 1;
                        self.close_row(on_row)?;
                        self.state = State::StartOfField;
                    } else if b == b'\r' {
                        self.consume(b)?;
                        i += 1;
                        self.resume = State::AfterClosingQuote;
                        self.state = State::AfterCr;
                    } else {
                        // Junk between a closing quote and the next
                        // delimiter is kept as field data.
                        self.consume(b)?;
                        i += 1;
                        self.field.push(b);
                    }
                }
                State::AfterCr => {
                    if b == self.newline {
                        self.consume(b)?;
                        i += 1;
                        self.close_row(on_row)?;
                        self.state = State::StartOfField;
                    } else if b == self.separator {
                        self.consume(b)?;
                        i += 1;
                        self.close_field();
                        self.state = State::StartOfField;
                    } else {
                        // A bare `\r` is discarded; replay this byte in
                        // the state that preceded it.
                        self.state = self.resume;
                    }
                }
                State::Comment => {
                    match memchr(self.newline, &input[i..]) {
                        Some(stop) => {
                            self.skip(&input[i..i + stop + 1]);
                            i += stop + 1;
                            self.state = State::StartOfField;
                            self.row_bytes = 0;
                            self.row_pos = self.pos.clone();
                        }
                        None => {
                            self.skip(&input[i..]);
                            i = input.len();
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Signal the end of input.
    ///
    /// A trailing row without a newline is committed; ending inside a
    /// quoted field is an error.
    pub(crate) fn finish<F>(&mut self, on_row: &mut F) -> Result<()>
    where
        F: FnMut(ByteRecord, &Position) -> Result<()>,
    {
        match self.state {
            State::InQuotedField | State::EscapePending => {
                return Err(Error::new(ErrorKind::UnterminatedQuote {
                    pos: self.pos.clone(),
                }));
            }
            State::StartOfField => {
                if !self.row.is_empty() || !self.field.is_empty() {
                    self.close_row(on_row)?;
                }
            }
            State::InUnquotedField
            | State::QuotePending
            | State::AfterClosingQuote
            | State::AfterCr => {
                self.close_row(on_row)?;
            }
            State::Comment => {}
        }
        self.state = State::StartOfField;
        Ok(())
    }

    fn close_field(&mut self) {
        self.row.push_field(&self.field);
        self.field.clear();
    }

    fn close_row<F>(&mut self, on_row: &mut F) -> Result<()>
    where
        F: FnMut(ByteRecord, &Position) -> Result<()>,
    {
        self.close_field();
        let mut row = mem::take(&mut self.row);
        row.set_position(Some(self.row_pos.clone()));
        self.row_bytes = 0;
        self.row_pos = self.pos.clone();
        on_row(row, &self.pos)
    }

    /// Account for one consumed byte: row budget, stream offset, line
    /// counter.
    fn consume(&mut self, b: u8) -> Result<()> {
        self.row_bytes += 1;
        if self.row_bytes > self.max_row_bytes {
            return Err(Error::new(ErrorKind::RowTooLarge {
                pos: self.pos.clone(),
                max_row_bytes: self.max_row_bytes,
            }));
        }
        self.pos.set_byte(self.pos.byte() + 1);
        if b == b'\n' {
            self.pos.set_line(self.pos.line() + 1);
        }
        Ok(())
    }

    /// Account for a run of consumed bytes at once.
    fn consume_run(&mut self, run: &[u8]) -> Result<()> {
        let n = run.len() as u64;
        if self.row_bytes + n > self.max_row_bytes {
            let allowed = self.max_row_bytes - self.row_bytes;
            let mut pos = self.pos.clone();
            pos.set_byte(pos.byte() + allowed);
            return Err(Error::new(ErrorKind::RowTooLarge {
                pos,
                max_row_bytes: self.max_row_bytes,
            }));
        }
        self.row_bytes += n;
        self.pos.set_byte(self.pos.byte() + n);
        let newlines = run.iter().filter(|&&b| b == b'\n').count() as u64;
        if newlines > 0 {
            self.pos.set_line(self.pos.line() + newlines);
        }
        Ok(())
    }

    /// Advance over discarded bytes that never count against the row
    /// budget (comment lines).
    fn skip(&mut self, run: &[u8]) {
        self.pos.set_byte(self.pos.byte() + run.len() as u64);
        let newlines = run.iter().filter(|&&b| b == b'\n').count() as u64;
        if newlines > 0 {
            self.pos.set_line(self.pos.line() + newlines);
        }
    }
}
