/*!
This crate provides a streaming, push-based CSV parser that turns arbitrary
byte chunks into an ordered stream of records, where each record maps header
names to field values.

Unlike a pull parser wrapped around an `io::Read`, a [`Parser`] is fed by
the caller: bytes go in through [`Parser::push`], completed records come
back out, and [`Parser::flush`] terminates the stream. This fits event
loops, network protocols and host-stream adapters where the data arrives in
chunks of arbitrary size. Chunk boundaries are invisible: the parser
resumes mid-field, mid-quote, mid code point and mid UTF-16 code unit, and
for a given configuration and input the emitted records are identical no
matter how the input is split.

A CSV row is composed of one or more fields separated by a separator byte
(comma by default). A field may be quoted; a quoted field may contain
separators, newlines and doubled quotes:

```ignore
name,address,zip
John Doe,"123 Main St, Anytown","08123"
Jane,"likes ""quotes""",08124
```

# Example

```
use csv_stream::Parser;

# fn example() -> Result<(), csv_stream::Error> {
let mut parser = Parser::new();
let mut records = Vec::new();
records.extend(parser.push(b"name,zip\nJohn Doe,08123\n")?);
records.extend(parser.push(b"Jane,08124\n")?);
records.extend(parser.flush()?);

assert_eq!(records.len(), 2);
assert_eq!(records[0].get("name"), Some("John Doe"));
assert_eq!(records[1].get("zip"), Some("08124"));
# Ok(()) }
# example().unwrap();
```

# Headers

By default the first row becomes the header row. Headers may instead be
supplied up front, or disabled entirely, in which case columns are named
`_0`, `_1`, …:

```
use csv_stream::{Headers, ParserBuilder};

# fn example() -> Result<(), csv_stream::Error> {
let mut parser = ParserBuilder::new().headers(Headers::None).build()?;
let mut records = parser.push(b"1,2,3\n")?;
records.extend(parser.flush()?);
assert_eq!(records[0].get("_2"), Some("3"));
# Ok(()) }
# example().unwrap();
```

# Encodings

Input is sniffed for a byte-order mark. UTF-16 LE and UTF-16 BE streams
are transcoded to UTF-8 on the fly; a UTF-8 BOM is stripped; everything
else passes through untouched. Other encodings are the caller's
responsibility to transcode upstream.

# Errors

All parse errors are fatal and carry the position at which they were
detected. A parser that has reported an error is poisoned: every later
call fails with a clone of the same error, while records returned before
the error remain valid. See [`ErrorKind`] for the error taxonomy.
*/

#![deny(missing_docs)]

mod assembler;
mod byte_record;
mod encoding;
mod error;
mod parser;
mod record;
mod scanner;

pub use crate::assembler::Headers;
pub use crate::byte_record::{ByteRecord, ByteRecordIter, Position};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::parser::{Parser, ParserBuilder};
pub use crate::record::{Record, RecordIter};
