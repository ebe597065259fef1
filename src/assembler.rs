use std::str;
use std::sync::Arc;

use crate::byte_record::{ByteRecord, Position};
use crate::error::{Error, ErrorKind, Result};
use crate::record::Record;

/// How the parser acquires its header list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Headers {
    /// Take the first row that survives `skip_lines` as the header row.
    /// That row is consumed and never emitted as a record.
    ///
    /// This is the default.
    FirstRow,
    /// Use this list verbatim. No row is consumed; the first row is
    /// already data.
    Given(Vec<String>),
    /// There is no header row. Columns are named `_0`, `_1`, … after the
    /// width of the first data row.
    None,
}

impl Default for Headers {
    fn default() -> Headers {
        Headers::FirstRow
    }
}

/// Binds scanned rows to headers and enforces the row policies.
#[derive(Debug)]
pub(crate) struct Assembler {
    headers: Option<Arc<Vec<String>>>,
    /// Whether the next surviving row should be consumed as headers.
    infer: bool,
    skip_lines: u64,
    skipped: u64,
    strict: bool,
    raw: bool,
    /// The number of records emitted so far.
    records: u64,
}

impl Assembler {
    pub(crate) fn new(
        headers: Headers,
        skip_lines: u64,
        strict: bool,
        raw: bool,
    ) -> Assembler {
        let (installed, infer) = match headers {
            Headers::FirstRow => (None, true),
            Headers::Given(list) => (Some(Arc::new(list)), false),
            Headers::None => (None, false),
        };
        Assembler {
            headers: installed,
            infer,
            skip_lines,
            skipped: 0,
            strict,
            raw,
            records: 0,
        }
    }

    /// The installed header list, if headers have been observed yet.
    pub(crate) fn headers(&self) -> Option<&[String]> {
        self.headers.as_ref().map(|h| h.as_slice())
    }

    /// Process one scanned row, appending the resulting record to `out`
    /// unless the row was skipped or consumed as headers.
    pub(crate) fn on_row(
        &mut self,
        row: ByteRecord,
        pos: &Position,
        out: &mut Vec<Record>,
    ) -> Result<()> {
        if self.skipped < self.skip_lines {
            self.skipped += 1;
            return Ok(());
        }
        let row_pos = match row.position() {
            Some(p) => p.clone(),
            None => pos.clone(),
        };
        if self.headers.is_none() {
            if self.infer {
                let mut names = Vec::with_capacity(row.len());
                for (i, field) in row.iter().enumerate() {
                    if !self.raw {
                        nul_check(field, i, &row_pos)?;
                    }
                    names.push(String::from_utf8_lossy(field).into_owned());
                }
                self.headers = Some(Arc::new(names));
                return Ok(());
            }
            // No header row: synthesise names from this row's width and
            // fall through so the row is emitted as data.
            let names = (0..row.len()).map(|i| format!("_{}", i)).collect();
            self.headers = Some(Arc::new(names));
        }
        let headers = match self.headers {
            Some(ref h) => Arc::clone(h),
            None => unreachable!(),
        };

        if self.strict && row.len() != headers.len() {
            let mut p = row_pos;
            p.set_record(self.records);
            return Err(Error::new(ErrorKind::RowLengthMismatch {
                pos: p,
                expected_len: headers.len() as u64,
                len: row.len() as u64,
            }));
        }

        // Pad missing fields with empty values, then append surplus fields
        // under synthetic names.
        let width = headers.len().max(row.len());
        let mut fields =
            ByteRecord::with_capacity(row.as_slice().len(), width);
        let mut extra_keys = Vec::new();
        for i in 0..width {
            let field = row.get(i).unwrap_or(b"");
            if i >= headers.len() {
                extra_keys.push(format!("_{}", i));
            }
            if self.raw {
                fields.push_field(field);
            } else {
                nul_check(field, i, &row_pos)?;
                match str::from_utf8(field) {
                    Ok(_) => fields.push_field(field),
                    Err(_) => {
                        let decoded = String::from_utf8_lossy(field);
                        fields.push_field(decoded.as_bytes());
                    }
                }
            }
        }
        let mut p = row_pos;
        p.set_record(self.records);
        fields.set_position(Some(p));
        self.records += 1;
        out.push(Record::new(headers, extra_keys, fields));
        Ok(())
    }
}

fn nul_check(field: &[u8], i: usize, pos: &Position) -> Result<()> {
    if field.contains(&0) {
        return Err(Error::new(ErrorKind::InvalidData {
            pos: pos.clone(),
            msg: format!("nul byte in field {}", i),
        }));
    }
    Ok(())
}
