use std::error::Error as StdError;
use std::fmt;
use std::result;

use crate::byte_record::Position;

/// A type alias for `Result<T, csv_stream::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when parsing CSV data.
///
/// All parse errors are fatal. Once a parser has reported an error it is
/// poisoned: every subsequent call to `push` or `flush` fails with a clone
/// of the same error. Records returned before the error remain valid.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error(Box<ErrorKind>);

impl Error {
    /// A crate private constructor for `Error`.
    pub(crate) fn new(kind: ErrorKind) -> Error {
        Error(Box::new(kind))
    }

    /// Return the specific type of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Unwrap this error into its underlying type.
    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Return the position at which this error was detected, if available.
    ///
    /// Configuration and lifecycle errors have no position.
    pub fn position(&self) -> Option<&Position> {
        match *self.0 {
            ErrorKind::InvalidConfig(_) | ErrorKind::Closed => None,
            ErrorKind::RowLengthMismatch { ref pos, .. }
            | ErrorKind::RowTooLarge { ref pos, .. }
            | ErrorKind::InvalidEncoding { ref pos }
            | ErrorKind::InvalidData { ref pos, .. }
            | ErrorKind::UnterminatedQuote { ref pos } => Some(pos),
        }
    }
}

/// The specific type of an error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// A configuration was rejected at construction time.
    ///
    /// This occurs when a delimiter byte is not ASCII or when
    /// `max_row_bytes` is zero.
    InvalidConfig(String),
    /// This error occurs in strict mode when a row's field count differs
    /// from the header count.
    RowLengthMismatch {
        /// The position of the offending row.
        pos: Position,
        /// The number of headers, which every row must match.
        expected_len: u64,
        /// The number of fields in the offending row.
        len: u64,
    },
    /// This error occurs when the cumulative size of a single row exceeds
    /// the configured `max_row_bytes`, counting separators, quotes and the
    /// terminating newline.
    RowTooLarge {
        /// The position of the first byte over the limit.
        pos: Position,
        /// The configured limit.
        max_row_bytes: u64,
    },
    /// A UTF-16 input stream ended in the middle of a code unit.
    InvalidEncoding {
        /// The position at the end of input.
        pos: Position,
    },
    /// A decoded field contained data that cannot be surfaced as a string
    /// value, such as a NUL byte. Raw mode is exempt from this check.
    InvalidData {
        /// The position of the offending row.
        pos: Position,
        /// A description of the offending data.
        msg: String,
    },
    /// The input ended inside a quoted field.
    UnterminatedQuote {
        /// The position at the end of input.
        pos: Position,
    },
    /// A `push` or `flush` was attempted after `flush` already completed.
    Closed,
}

impl StdError for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self.0 {
            ErrorKind::InvalidConfig(ref msg) => {
                write!(f, "invalid CSV parser configuration: {}", msg)
            }
            ErrorKind::RowLengthMismatch { ref pos, expected_len, len } => {
                write!(
                    f,
                    "Row length does not match headers: record {} \
                     (line: {}, byte: {}): expected {} fields, got {}",
                    pos.record(),
                    pos.line(),
                    pos.byte(),
                    expected_len,
                    len
                )
            }
            ErrorKind::RowTooLarge { ref pos, max_row_bytes } => {
                write!(
                    f,
                    "Row exceeds the maximum size: record {} \
                     (line: {}, byte: {}): limit is {} bytes",
                    pos.record(),
                    pos.line(),
                    pos.byte(),
                    max_row_bytes
                )
            }
            ErrorKind::InvalidEncoding { ref pos } => {
                write!(
                    f,
                    "invalid encoding: UTF-16 input truncated mid code unit \
                     (byte: {})",
                    pos.byte()
                )
            }
            ErrorKind::InvalidData { ref pos, ref msg } => {
                write!(
                    f,
                    "Invalid CSV data: {} (line: {}, byte: {})",
                    msg,
                    pos.line(),
                    pos.byte()
                )
            }
            ErrorKind::UnterminatedQuote { ref pos } => {
                write!(
                    f,
                    "input ended inside a quoted field (line: {}, byte: {})",
                    pos.line(),
                    pos.byte()
                )
            }
            ErrorKind::Closed => {
                write!(f, "CSV parser used after flush")
            }
        }
    }
}
