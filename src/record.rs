use std::fmt;
use std::str;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::byte_record::{ByteRecord, ByteRecordIter, Position};

/// A single record: one parsed row bound to the stream's header list.
///
/// The key sequence of a record is exactly the header list, in order. Rows
/// with fewer fields than headers are padded with empty fields; surplus
/// fields are kept under synthetic keys `_k`, where `k` is the 0-based
/// position of the extra field.
///
/// Unless the parser was configured with `raw`, every field is valid UTF-8
/// (invalid sequences were replaced with U+FFFD during assembly) and
/// contains no NUL byte, so `get` always succeeds for present keys. In raw
/// mode, use `get_bytes` and `iter` to reach field contents that may not be
/// valid UTF-8.
///
/// All records from one parser share a single reference-counted header
/// list, so cloning and passing records around is cheap.
#[derive(Clone, Eq, PartialEq)]
pub struct Record {
    headers: Arc<Vec<String>>,
    extra_keys: Vec<String>,
    fields: ByteRecord,
}

impl Record {
    /// A crate private constructor for `Record`.
    ///
    /// The caller guarantees `fields.len() == headers.len() +
    /// extra_keys.len()`.
    pub(crate) fn new(
        headers: Arc<Vec<String>>,
        extra_keys: Vec<String>,
        fields: ByteRecord,
    ) -> Record {
        Record { headers, extra_keys, fields }
    }

    /// The header list this record is bound to.
    ///
    /// Synthetic keys for surplus fields are not part of the header list;
    /// use `key` to enumerate every key of this particular record.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Return the key at index `i`.
    ///
    /// Keys at indices below the header count are header names; keys at or
    /// beyond it are the synthetic names of surplus fields.
    pub fn key(&self, i: usize) -> Option<&str> {
        if i < self.headers.len() {
            self.headers.get(i).map(String::as_str)
        } else {
            self.extra_keys.get(i - self.headers.len()).map(String::as_str)
        }
    }

    /// Return the value under the given key as a string slice.
    ///
    /// Returns `None` if the key does not exist, or (in raw mode only) if
    /// the value is not valid UTF-8. When headers contain duplicate names,
    /// the first match wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_bytes(key).and_then(|bytes| str::from_utf8(bytes).ok())
    }

    /// Return the value under the given key as raw bytes.
    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        self.index_of(key).and_then(|i| self.fields.get(i))
    }

    fn index_of(&self, key: &str) -> Option<usize> {
        if let Some(i) = self.headers.iter().position(|h| h == key) {
            return Some(i);
        }
        self.extra_keys
            .iter()
            .position(|k| k == key)
            .map(|i| i + self.headers.len())
    }

    /// Returns the number of fields in this record.
    ///
    /// This is never less than the header count.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if and only if this record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns an iterator over `(key, value)` pairs in key order.
    pub fn iter(&self) -> RecordIter {
        RecordIter { rec: self, fields: self.fields.iter(), i: 0 }
    }

    /// Return the position of the row this record was parsed from, if
    /// available.
    pub fn position(&self) -> Option<&Position> {
        self.fields.position()
    }

    /// Return a reference to the underlying row.
    pub fn as_byte_record(&self) -> &ByteRecord {
        &self.fields
    }

    /// Convert this record into its underlying row, discarding the keys.
    pub fn into_byte_record(self) -> ByteRecord {
        self.fields
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Record(")?;
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (k, String::from_utf8_lossy(v))))
            .finish()?;
        write!(f, ")")
    }
}

impl<'a> IntoIterator for &'a Record {
    type IntoIter = RecordIter<'a>;
    type Item = (&'a str, &'a [u8]);
    fn into_iter(self) -> RecordIter<'a> {
        self.iter()
    }
}

/// An iterator over the `(key, value)` pairs of a record.
pub struct RecordIter<'a> {
    rec: &'a Record,
    fields: ByteRecordIter<'a>,
    i: usize,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = (&'a str, &'a [u8]);

    fn next(&mut self) -> Option<(&'a str, &'a [u8])> {
        let value = self.fields.next()?;
        let key = self.rec.key(self.i)?;
        self.i += 1;
        Some((key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.fields.size_hint()
    }
}

impl<'a> ExactSizeIterator for RecordIter<'a> {}

impl Serialize for Record {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, &String::from_utf8_lossy(value))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Record;
    use crate::byte_record::ByteRecord;

    fn headers(names: &[&str]) -> Arc<Vec<String>> {
        Arc::new(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn get_by_name() {
        let rec = Record::new(
            headers(&["a", "b"]),
            vec![],
            ByteRecord::from(vec!["1", "2"]),
        );
        assert_eq!(rec.get("a"), Some("1"));
        assert_eq!(rec.get("b"), Some("2"));
        assert_eq!(rec.get("c"), None);
    }

    #[test]
    fn surplus_keys() {
        let rec = Record::new(
            headers(&["a"]),
            vec!["_1".to_string(), "_2".to_string()],
            ByteRecord::from(vec!["1", "2", "3"]),
        );
        assert_eq!(rec.len(), 3);
        assert_eq!(rec.key(0), Some("a"));
        assert_eq!(rec.key(1), Some("_1"));
        assert_eq!(rec.key(2), Some("_2"));
        assert_eq!(rec.get("_2"), Some("3"));
    }

    #[test]
    fn duplicate_header_first_wins() {
        let rec = Record::new(
            headers(&["a", "a"]),
            vec![],
            ByteRecord::from(vec!["first", "second"]),
        );
        assert_eq!(rec.get("a"), Some("first"));
    }

    #[test]
    fn iter_pairs() {
        let rec = Record::new(
            headers(&["x", "y"]),
            vec![],
            ByteRecord::from(vec!["1", "2"]),
        );
        let pairs: Vec<(&str, &[u8])> = rec.iter().collect();
        assert_eq!(pairs, vec![("x", &b"1"[..]), ("y", &b"2"[..])]);
    }

    #[test]
    fn serialize_as_map() {
        let rec = Record::new(
            headers(&["a", "b"]),
            vec![],
            ByteRecord::from(vec!["1", "two"]),
        );
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"a":"1","b":"two"}"#);
    }
}
