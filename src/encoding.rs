use std::fmt;

use encoding_rs::{Decoder, UTF_16BE, UTF_16LE};

use crate::byte_record::Position;
use crate::error::{Error, ErrorKind, Result};

/// Normalises an arbitrary input byte stream into a UTF-8 view.
///
/// The first bytes of the stream are sniffed for a byte-order mark:
/// `FF FE` selects UTF-16 LE, `FE FF` selects UTF-16 BE and `EF BB BF` is a
/// UTF-8 BOM that gets stripped. Anything else passes through as UTF-8. At
/// most three bytes are ever buffered while the decision is pending, so a
/// BOM split across chunks in any way is handled.
///
/// UTF-16 payload is decoded statefully: a chunk ending on an odd byte or
/// in the middle of a surrogate pair resumes correctly on the next chunk,
/// and unpaired surrogates are substituted with U+FFFD. The UTF-8 branch is
/// zero-copy; chunks are handed to the scanner untouched.
pub(crate) struct Transcoder {
    state: State,
}

enum State {
    /// The byte-order mark has not been decided yet; holds at most three
    /// bytes.
    Detect { held: [u8; 3], len: usize },
    /// UTF-8 passthrough, any BOM already stripped.
    Utf8,
    /// UTF-16 payload, decoded statefully.
    Utf16 {
        decoder: Decoder,
        /// Total payload bytes fed, BOM excluded. An odd total at the end
        /// of input means the stream was truncated mid code unit.
        payload: u64,
    },
}

/// What the sniffed prefix says about the stream.
enum Sniff {
    /// Not enough bytes to decide.
    Undecided,
    /// UTF-8; bytes of the held prefix from `data_from` onwards are data.
    Utf8 { data_from: usize },
    /// UTF-16 with the given endianness; the first two held bytes are the
    /// BOM, the rest is payload.
    Utf16 { big_endian: bool },
}

fn sniff(held: &[u8]) -> Sniff {
    match *held {
        [0xFF, 0xFE, ..] => Sniff::Utf16 { big_endian: false },
        [0xFE, 0xFF, ..] => Sniff::Utf16 { big_endian: true },
        [0xEF, 0xBB, 0xBF] => Sniff::Utf8 { data_from: 3 },
        [0xEF, 0xBB] => Sniff::Undecided,
        _ if held.len() >= 2 => Sniff::Utf8 { data_from: 0 },
        _ => Sniff::Undecided,
    }
}

impl Transcoder {
    pub(crate) fn new() -> Transcoder {
        Transcoder { state: State::Detect { held: [0; 3], len: 0 } }
    }

    /// Feed one chunk and return its UTF-8 view.
    ///
    /// The view borrows either from `chunk` (UTF-8 passthrough) or from
    /// `scratch`. `scratch` is cleared on every call; the view is only
    /// valid until the next call.
    pub(crate) fn feed<'a>(
        &mut self,
        chunk: &'a [u8],
        scratch: &'a mut Vec<u8>,
    ) -> &'a [u8] {
        if let State::Utf8 = self.state {
            return chunk;
        }
        scratch.clear();
        let mut input = chunk;
        loop {
            let (held, len) = match self.state {
                State::Detect { ref mut held, ref mut len } => (held, len),
                State::Utf8 => unreachable!(),
                State::Utf16 { .. } => break,
            };
            if *len < 3 && !input.is_empty() {
                held[*len] = input[0];
                *len += 1;
                input = &input[1..];
            }
            let (held, len) = (*held, *len);
            match sniff(&held[..len]) {
                Sniff::Undecided => {
                    if input.is_empty() {
                        // Hold the decision until the next chunk.
                        return &scratch[..];
                    }
                }
                Sniff::Utf8 { data_from } => {
                    self.state = State::Utf8;
                    scratch.extend_from_slice(&held[data_from..len]);
                    if scratch.is_empty() {
                        return input;
                    }
                    scratch.extend_from_slice(input);
                    return &scratch[..];
                }
                Sniff::Utf16 { big_endian } => {
                    let encoding = if big_endian { UTF_16BE } else { UTF_16LE };
                    self.state = State::Utf16 {
                        decoder: encoding.new_decoder_without_bom_handling(),
                        payload: 0,
                    };
                    // Any held byte beyond the two BOM bytes is payload.
                    let carry = [held[2]];
                    let carry = &carry[..len - 2];
                    self.decode_utf16(carry, scratch);
                    break;
                }
            }
        }
        self.decode_utf16(input, scratch);
        &scratch[..]
    }

    /// Signal the end of input, flushing any held or pending bytes.
    ///
    /// Returns `InvalidEncoding` if a UTF-16 stream ends in the middle of a
    /// code unit.
    pub(crate) fn finish(
        &mut self,
        scratch: &mut Vec<u8>,
        pos: &Position,
    ) -> Result<()> {
        match self.state {
            State::Utf8 => Ok(()),
            State::Detect { held, len } => {
                // The stream ended before a BOM decision was possible, so
                // the held bytes are UTF-8 data.
                scratch.extend_from_slice(&held[..len]);
                self.state = State::Utf8;
                Ok(())
            }
            State::Utf16 { ref mut decoder, payload } => {
                if payload % 2 == 1 {
                    return Err(Error::new(ErrorKind::InvalidEncoding {
                        pos: pos.clone(),
                    }));
                }
                // Flush a pending lead surrogate as U+FFFD.
                let needed =
                    decoder.max_utf8_buffer_length(0).unwrap_or(8).max(8);
                let start = scratch.len();
                scratch.resize(start + needed, 0);
                let (_, _, nout, _) =
                    decoder.decode_to_utf8(&[], &mut scratch[start..], true);
                scratch.truncate(start + nout);
                Ok(())
            }
        }
    }

    fn decode_utf16(&mut self, input: &[u8], out: &mut Vec<u8>) {
        let (decoder, payload) = match self.state {
            State::Utf16 { ref mut decoder, ref mut payload } => {
                (decoder, payload)
            }
            _ => unreachable!(),
        };
        *payload += input.len() as u64;
        if input.is_empty() {
            return;
        }
        let needed = decoder
            .max_utf8_buffer_length(input.len())
            .unwrap_or(input.len() * 3);
        let start = out.len();
        out.resize(start + needed, 0);
        let (_, nin, nout, _) =
            decoder.decode_to_utf8(input, &mut out[start..], false);
        debug_assert_eq!(nin, input.len());
        out.truncate(start + nout);
    }
}

impl fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = match self.state {
            State::Detect { len, .. } => {
                return write!(f, "Transcoder(detect, held: {})", len);
            }
            State::Utf8 => "utf-8",
            State::Utf16 { .. } => "utf-16",
        };
        write!(f, "Transcoder({})", state)
    }
}

#[cfg(test)]
mod tests {
    use super::Transcoder;
    use crate::byte_record::Position;
    use crate::error::ErrorKind;

    /// Push every chunk through a fresh transcoder and collect the full
    /// UTF-8 view.
    fn transcode(chunks: &[&[u8]]) -> Vec<u8> {
        let mut tr = Transcoder::new();
        let mut out = Vec::new();
        let mut scratch = Vec::new();
        for chunk in chunks {
            out.extend_from_slice(tr.feed(chunk, &mut scratch));
        }
        scratch.clear();
        tr.finish(&mut scratch, &Position::new()).unwrap();
        out.extend_from_slice(&scratch);
        out
    }

    fn utf16le(s: &str) -> Vec<u8> {
        let mut out = vec![0xFF, 0xFE];
        for unit in s.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out
    }

    fn utf16be(s: &str) -> Vec<u8> {
        let mut out = vec![0xFE, 0xFF];
        for unit in s.encode_utf16() {
            out.extend_from_slice(&unit.to_be_bytes());
        }
        out
    }

    #[test]
    fn utf8_passthrough() {
        assert_eq!(transcode(&[b"a,b\n1,2\n"]), b"a,b\n1,2\n");
    }

    #[test]
    fn utf8_passthrough_is_zero_copy() {
        let mut tr = Transcoder::new();
        let mut scratch = Vec::new();
        // First chunk classifies the stream, later chunks borrow directly.
        tr.feed(b"ab", &mut scratch);
        let chunk = b"cdef";
        let view = tr.feed(chunk, &mut scratch);
        assert_eq!(view.as_ptr(), chunk.as_ptr());
    }

    #[test]
    fn utf8_bom_stripped() {
        assert_eq!(transcode(&[b"\xEF\xBB\xBFa,b\n"]), b"a,b\n");
    }

    #[test]
    fn utf8_bom_split_two_one() {
        assert_eq!(transcode(&[b"\xEF\xBB", b"\xBFa,b\n"]), b"a,b\n");
    }

    #[test]
    fn utf8_bom_split_one_two() {
        assert_eq!(transcode(&[b"\xEF", b"\xBB\xBFa,b\n"]), b"a,b\n");
    }

    #[test]
    fn not_quite_a_bom_is_data() {
        assert_eq!(transcode(&[b"\xEF\xBBx"]), b"\xEF\xBBx");
        assert_eq!(transcode(&[b"\xEF\xBB"]), b"\xEF\xBB");
    }

    #[test]
    fn single_byte_stream() {
        assert_eq!(transcode(&[b"a"]), b"a");
        assert_eq!(transcode(&[]), b"");
    }

    #[test]
    fn utf16_le_simple() {
        assert_eq!(transcode(&[&utf16le("a,b\n1,2\n")]), b"a,b\n1,2\n");
    }

    #[test]
    fn utf16_be_simple() {
        assert_eq!(transcode(&[&utf16be("a,\u{2a4}\n")]), "a,\u{2a4}\n".as_bytes());
    }

    #[test]
    fn utf16_odd_split_resumes() {
        let bytes = utf16le("x,y\n");
        for cut in 1..bytes.len() {
            let got = transcode(&[&bytes[..cut], &bytes[cut..]]);
            assert_eq!(got, b"x,y\n", "cut at {}", cut);
        }
    }

    #[test]
    fn utf16_surrogate_pair_split() {
        let bytes = utf16le("a\u{1F600}b");
        for cut in 1..bytes.len() {
            let got = transcode(&[&bytes[..cut], &bytes[cut..]]);
            assert_eq!(got, "a\u{1F600}b".as_bytes(), "cut at {}", cut);
        }
    }

    #[test]
    fn utf16_truncated_errors_at_finish() {
        let mut bytes = utf16le("ab");
        bytes.pop();
        let mut tr = Transcoder::new();
        let mut scratch = Vec::new();
        tr.feed(&bytes, &mut scratch);
        scratch.clear();
        let err = tr.finish(&mut scratch, &Position::new()).unwrap_err();
        match err.kind() {
            ErrorKind::InvalidEncoding { .. } => {}
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn utf16_unpaired_surrogate_replaced() {
        // A lone lead surrogate followed by an ordinary character.
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend_from_slice(&0xD800u16.to_le_bytes());
        bytes.extend_from_slice(&(b'x' as u16).to_le_bytes());
        assert_eq!(transcode(&[&bytes]), "\u{FFFD}x".as_bytes());
    }
}
