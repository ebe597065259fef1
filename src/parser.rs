use crate::assembler::{Assembler, Headers};
use crate::byte_record::Position;
use crate::encoding::Transcoder;
use crate::error::{Error, ErrorKind, Result};
use crate::record::Record;
use crate::scanner::Scanner;

/// Builds a streaming CSV parser with various configuration knobs.
///
/// This builder can be used to tweak the field separator, quoting, header
/// policy and more. Once a `Parser` is built, its configuration cannot be
/// changed.
#[derive(Clone, Debug)]
pub struct ParserBuilder {
    separator: u8,
    quote: Option<u8>,
    escape: Option<u8>,
    newline: u8,
    headers: Headers,
    skip_lines: u64,
    comment: Option<u8>,
    max_row_bytes: u64,
    strict: bool,
    raw: bool,
}

impl Default for ParserBuilder {
    fn default() -> ParserBuilder {
        ParserBuilder {
            separator: b',',
            quote: Some(b'"'),
            escape: None,
            newline: b'\n',
            headers: Headers::FirstRow,
            skip_lines: 0,
            comment: None,
            max_row_bytes: u64::MAX,
            strict: false,
            raw: false,
        }
    }
}

impl ParserBuilder {
    /// Create a new builder for configuring CSV parsing.
    ///
    /// # Example
    ///
    /// ```
    /// use csv_stream::ParserBuilder;
    ///
    /// # fn example() -> Result<(), csv_stream::Error> {
    /// let mut parser = ParserBuilder::new().build()?;
    /// let mut records = parser.push(b"city,pop\nBoston,4628910\n")?;
    /// records.extend(parser.flush()?);
    /// assert_eq!(records.len(), 1);
    /// assert_eq!(records[0].get("city"), Some("Boston"));
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn new() -> ParserBuilder {
        ParserBuilder::default()
    }

    /// The field separator to use when parsing.
    ///
    /// The default is `b','`.
    ///
    /// # Example
    ///
    /// ```
    /// use csv_stream::ParserBuilder;
    ///
    /// # fn example() -> Result<(), csv_stream::Error> {
    /// let mut parser = ParserBuilder::new().separator(b';').build()?;
    /// let mut records = parser.push(b"city;pop\nBoston;4628910\n")?;
    /// records.extend(parser.flush()?);
    /// assert_eq!(records[0].get("pop"), Some("4628910"));
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn separator(&mut self, separator: u8) -> &mut ParserBuilder {
        self.separator = separator;
        self
    }

    /// The quote character to use when parsing.
    ///
    /// The default is `Some(b'"')`. Passing `None` disables quoting
    /// entirely: quote characters become ordinary field data.
    pub fn quote(&mut self, quote: Option<u8>) -> &mut ParserBuilder {
        self.quote = quote;
        self
    }

    /// The escape character recognised inside quoted fields.
    ///
    /// By default the escape character equals the quote character, which
    /// yields the classic doubled-quote escape (`""`). Setting a distinct
    /// byte such as `b'\\'` additionally recognises that byte before a
    /// quote.
    ///
    /// # Example
    ///
    /// ```
    /// use csv_stream::ParserBuilder;
    ///
    /// # fn example() -> Result<(), csv_stream::Error> {
    /// let mut parser = ParserBuilder::new().escape(Some(b'\\')).build()?;
    /// let mut records = parser.push(b"a\n\"x\\\"y\"\n")?;
    /// records.extend(parser.flush()?);
    /// assert_eq!(records[0].get("a"), Some("x\"y"));
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn escape(&mut self, escape: Option<u8>) -> &mut ParserBuilder {
        self.escape = escape;
        self
    }

    /// The row terminator to use when parsing.
    ///
    /// The default is `b'\n'`. A `\r` immediately preceding the terminator
    /// is silently discarded, so `\r\n` input needs no special
    /// configuration.
    pub fn newline(&mut self, newline: u8) -> &mut ParserBuilder {
        self.newline = newline;
        self
    }

    /// How the parser acquires its header list.
    ///
    /// The default, `Headers::FirstRow`, consumes the first row that
    /// survives `skip_lines` as the header row.
    ///
    /// # Example
    ///
    /// ```
    /// use csv_stream::{Headers, ParserBuilder};
    ///
    /// # fn example() -> Result<(), csv_stream::Error> {
    /// let mut parser = ParserBuilder::new()
    ///     .headers(Headers::Given(vec!["x".to_string(), "y".to_string()]))
    ///     .build()?;
    /// // The first row is data, not headers.
    /// let mut records = parser.push(b"1,2\n")?;
    /// records.extend(parser.flush()?);
    /// assert_eq!(records[0].get("x"), Some("1"));
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn headers(&mut self, headers: Headers) -> &mut ParserBuilder {
        self.headers = headers;
        self
    }

    /// The number of leading lines to discard before header detection.
    ///
    /// The default is `0`.
    pub fn skip_lines(&mut self, skip_lines: u64) -> &mut ParserBuilder {
        self.skip_lines = skip_lines;
        self
    }

    /// The comment character to use when parsing.
    ///
    /// If a row begins with the byte given here, the whole line is
    /// discarded. The byte is only special at the start of a row; anywhere
    /// else it is ordinary field data.
    ///
    /// This is disabled by default.
    ///
    /// # Example
    ///
    /// ```
    /// use csv_stream::ParserBuilder;
    ///
    /// # fn example() -> Result<(), csv_stream::Error> {
    /// let mut parser = ParserBuilder::new().comment(Some(b'#')).build()?;
    /// let mut records = parser.push(b"a,b\n#ignored\n1,2\n")?;
    /// records.extend(parser.flush()?);
    /// assert_eq!(records.len(), 1);
    /// assert_eq!(records[0].get("a"), Some("1"));
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn comment(&mut self, comment: Option<u8>) -> &mut ParserBuilder {
        self.comment = comment;
        self
    }

    /// The maximum size of a single row, in bytes.
    ///
    /// Every byte between two row boundaries counts: field data, quotes,
    /// separators and the terminating newline. Exceeding the cap fails
    /// with `ErrorKind::RowTooLarge` at the offending byte. Since the
    /// parser buffers at most one in-flight row, this also bounds its
    /// memory use.
    ///
    /// The default is `u64::MAX`, which is no limit in practice.
    pub fn max_row_bytes(&mut self, max_row_bytes: u64) -> &mut ParserBuilder {
        self.max_row_bytes = max_row_bytes;
        self
    }

    /// Whether every row must have exactly as many fields as there are
    /// headers.
    ///
    /// When disabled (the default), rows with fewer fields are padded with
    /// empty values and surplus fields are kept under synthetic `_k` keys.
    /// When enabled, a mismatched row fails with
    /// `ErrorKind::RowLengthMismatch`.
    pub fn strict(&mut self, yes: bool) -> &mut ParserBuilder {
        self.strict = yes;
        self
    }

    /// Whether to emit field values as raw bytes.
    ///
    /// When disabled (the default), field values are decoded as UTF-8 with
    /// invalid sequences replaced by U+FFFD, and a NUL byte in any field
    /// fails with `ErrorKind::InvalidData`. When enabled, field bytes pass
    /// through untouched and are reachable via `Record::get_bytes`.
    pub fn raw(&mut self, yes: bool) -> &mut ParserBuilder {
        self.raw = yes;
        self
    }

    /// Build a parser from this configuration.
    ///
    /// Configuration bytes must be ASCII (`<= 0x7F`); a non-ASCII byte
    /// could match in the middle of a multi-byte UTF-8 sequence. The
    /// separator, quote, escape, newline and comment bytes are not
    /// required to be distinct; overlaps are resolved by the fixed
    /// priority quote, escape, separator, newline, comment.
    pub fn build(&self) -> Result<Parser> {
        let named = [
            ("separator", Some(self.separator)),
            ("quote", self.quote),
            ("escape", self.escape),
            ("newline", Some(self.newline)),
            ("comment", self.comment),
        ];
        for &(name, byte) in named.iter() {
            if let Some(byte) = byte {
                if byte > 0x7F {
                    return Err(Error::new(ErrorKind::InvalidConfig(format!(
                        "{} must be an ASCII byte, got 0x{:02X}",
                        name, byte
                    ))));
                }
            }
        }
        if self.max_row_bytes == 0 {
            return Err(Error::new(ErrorKind::InvalidConfig(
                "max_row_bytes must be positive".to_string(),
            )));
        }
        Ok(self.parser())
    }

    /// Assemble a parser from already-validated configuration.
    fn parser(&self) -> Parser {
        Parser {
            transcoder: Transcoder::new(),
            scanner: Scanner::new(
                self.separator,
                self.quote,
                self.escape,
                self.newline,
                self.comment,
                self.max_row_bytes,
            ),
            assembler: Assembler::new(
                self.headers.clone(),
                self.skip_lines,
                self.strict,
                self.raw,
            ),
            scratch: Vec::new(),
            poisoned: None,
            flushed: false,
        }
    }
}

/// A streaming push parser for CSV data.
///
/// A parser is fed raw input with `push`, one arbitrary chunk at a time,
/// and terminated with `flush`. Both return the records completed so far.
/// Chunk boundaries are invisible: for a given configuration and input
/// byte sequence, the emitted records are identical no matter how the
/// input is split.
///
/// # Example
///
/// ```
/// use csv_stream::Parser;
///
/// # fn example() -> Result<(), csv_stream::Error> {
/// let mut parser = Parser::new();
/// let mut records = Vec::new();
/// // Chunk boundaries may fall anywhere, even inside a quoted field.
/// records.extend(parser.push(b"name,comment\nalice,\"likes")?);
/// records.extend(parser.push(b", commas\"\n")?);
/// records.extend(parser.flush()?);
///
/// assert_eq!(parser.headers(), Some(&["name".to_string(), "comment".to_string()][..]));
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].get("comment"), Some("likes, commas"));
/// # Ok(()) }
/// # example().unwrap();
/// ```
#[derive(Debug)]
pub struct Parser {
    transcoder: Transcoder,
    scanner: Scanner,
    assembler: Assembler,
    scratch: Vec<u8>,
    poisoned: Option<Error>,
    flushed: bool,
}

impl Default for Parser {
    fn default() -> Parser {
        Parser::new()
    }
}

impl Parser {
    /// Create a parser with the default configuration.
    ///
    /// To customize parsing, use a `ParserBuilder`.
    pub fn new() -> Parser {
        ParserBuilder::new().parser()
    }

    /// Feed one chunk of input and return the records it completed.
    ///
    /// Chunks may be split anywhere: inside a field, inside a quote pair,
    /// inside a multi-byte code point or inside a UTF-16 code unit. A
    /// record is returned as soon as its terminating newline has been
    /// consumed.
    ///
    /// If an error strikes after this call already assembled records, the
    /// records are returned and the error is reported by the next call;
    /// records emitted before an error always remain valid.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Record>> {
        self.check_open()?;
        let mut out = Vec::new();
        let Parser { transcoder, scanner, assembler, scratch, .. } = self;
        let view = transcoder.feed(chunk, scratch);
        let res = scanner
            .feed(view, &mut |row, pos| assembler.on_row(row, pos, &mut out));
        self.settle(out, res)
    }

    /// Signal the end of input and return the final records.
    ///
    /// A trailing row without a newline is committed as a complete row.
    /// Ending inside a quoted field fails with
    /// `ErrorKind::UnterminatedQuote`; a UTF-16 stream with a dangling
    /// byte fails with `ErrorKind::InvalidEncoding`. After `flush`, the
    /// parser rejects further input.
    pub fn flush(&mut self) -> Result<Vec<Record>> {
        self.check_open()?;
        self.flushed = true;
        let mut out = Vec::new();
        let Parser { transcoder, scanner, assembler, scratch, .. } = self;
        scratch.clear();
        let mut res = transcoder.finish(scratch, scanner.position());
        if res.is_ok() {
            res = scanner.feed(&scratch[..], &mut |row, pos| {
                assembler.on_row(row, pos, &mut out)
            });
        }
        if res.is_ok() {
            res = scanner.finish(&mut |row, pos| {
                assembler.on_row(row, pos, &mut out)
            });
        }
        self.settle(out, res)
    }

    /// Return the installed header list.
    ///
    /// Headers are observable no later than the first emitted record: as
    /// soon as the header row has been consumed when inferring, after the
    /// first data row for `Headers::None`, and immediately after
    /// construction for `Headers::Given`.
    pub fn headers(&self) -> Option<&[String]> {
        self.assembler.headers()
    }

    /// Return the current position of this parser in the input.
    pub fn position(&self) -> &Position {
        self.scanner.position()
    }

    fn check_open(&self) -> Result<()> {
        if let Some(ref err) = self.poisoned {
            return Err(err.clone());
        }
        if self.flushed {
            return Err(Error::new(ErrorKind::Closed));
        }
        Ok(())
    }

    /// Resolve a scan pass: hold back an error until delivered records are
    /// out of the way, and poison the parser for all later calls.
    fn settle(
        &mut self,
        out: Vec<Record>,
        res: Result<()>,
    ) -> Result<Vec<Record>> {
        match res {
            Ok(()) => Ok(out),
            Err(err) => {
                self.poisoned = Some(err.clone());
                if out.is_empty() {
                    Err(err)
                } else {
                    Ok(out)
                }
            }
        }
    }
}
