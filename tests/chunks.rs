//! Chunk-boundary tests: however the input is split, the parsed output
//! must be byte-for-byte identical.

use proptest::prelude::*;

use csv_stream::{Headers, Parser, ParserBuilder};

/// Parse `chunks` and reduce the outcome to comparable form.
fn parse_chunked(
    chunks: &[&[u8]],
) -> (Option<Vec<String>>, Vec<Vec<(String, String)>>) {
    let mut parser = Parser::new();
    let mut records = Vec::new();
    for chunk in chunks {
        records.extend(parser.push(chunk).unwrap());
    }
    records.extend(parser.flush().unwrap());
    let headers = parser.headers().map(|h| h.to_vec());
    let records = records
        .iter()
        .map(|rec| {
            rec.iter()
                .map(|(k, v)| {
                    (k.to_string(), String::from_utf8_lossy(v).into_owned())
                })
                .collect()
        })
        .collect();
    (headers, records)
}

/// Quote a field the way a CSV writer would, only when necessary.
fn encode_field(field: &str) -> String {
    if field.contains(|c| c == ',' || c == '"' || c == '\n' || c == '\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn encode_csv(rows: &[Vec<String>]) -> Vec<u8> {
    let mut out = String::new();
    for row in rows {
        let encoded: Vec<String> =
            row.iter().map(|f| encode_field(f)).collect();
        out.push_str(&encoded.join(","));
        out.push('\n');
    }
    out.into_bytes()
}

/// Split `input` at the given sorted offsets.
fn split_at_offsets<'a>(input: &'a [u8], offsets: &[usize]) -> Vec<&'a [u8]> {
    let mut chunks = Vec::with_capacity(offsets.len() + 1);
    let mut start = 0;
    for &off in offsets {
        chunks.push(&input[start..off]);
        start = off;
    }
    chunks.push(&input[start..]);
    chunks
}

fn field_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9 ]{0,8}",
        Just("with, comma".to_string()),
        Just("with \"quotes\"".to_string()),
        Just("line\nbreak".to_string()),
        Just("cr\r\nhere".to_string()),
        Just(String::new()),
        Just("caf\u{e9} \u{2a4} \u{1F600}".to_string()),
    ]
}

fn rows_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    // One header row plus up to six data rows, all the same width.
    (1usize..5).prop_flat_map(|width| {
        prop::collection::vec(
            prop::collection::vec(field_strategy(), width),
            2..8,
        )
    })
}

proptest! {
    #[test]
    fn chunking_never_changes_the_output(
        rows in rows_strategy(),
        cuts in prop::collection::vec(0usize..4096, 0..6),
    ) {
        let input = encode_csv(&rows);
        let mut offsets: Vec<usize> =
            cuts.iter().map(|c| c % (input.len() + 1)).collect();
        offsets.sort_unstable();

        let one_shot = parse_chunked(&[&input[..]]);
        let chunks = split_at_offsets(&input, &offsets);
        let chunked = parse_chunked(&chunks);
        prop_assert_eq!(&one_shot, &chunked);

        // Write-then-parse round trip: the parsed records mirror the
        // source rows field for field.
        let (headers, records) = &one_shot;
        prop_assert_eq!(headers.as_ref(), Some(&rows[0]));
        prop_assert_eq!(records.len(), rows.len() - 1);
        for (rec, src) in records.iter().zip(rows[1..].iter()) {
            prop_assert_eq!(rec.len(), src.len());
            let fields = rows[0].iter().zip(src.iter());
            for ((key, value), (name, expected)) in rec.iter().zip(fields) {
                prop_assert_eq!(key, name);
                prop_assert_eq!(value, expected);
            }
        }
    }

    #[test]
    fn byte_at_a_time_equals_one_shot(rows in rows_strategy()) {
        let input = encode_csv(&rows);
        let one_shot = parse_chunked(&[&input[..]]);

        let mut parser = Parser::new();
        let mut records = Vec::new();
        for b in &input {
            records.extend(parser.push(std::slice::from_ref(b)).unwrap());
        }
        records.extend(parser.flush().unwrap());
        let headers = parser.headers().map(|h| h.to_vec());
        let records: Vec<Vec<(String, String)>> = records
            .iter()
            .map(|rec| {
                rec.iter()
                    .map(|(k, v)| {
                        (k.to_string(), String::from_utf8_lossy(v).into_owned())
                    })
                    .collect()
            })
            .collect();
        prop_assert_eq!(one_shot, (headers, records));
    }
}

#[test]
fn utf16_chunking_never_changes_the_output() {
    let text = "name,note\nalice,\"caf\u{e9}, \u{2a4}\"\nbob,\u{1F600}\n";
    for (bom, le) in &[([0xFFu8, 0xFE], true), ([0xFE, 0xFF], false)] {
        let mut input: Vec<u8> = bom.to_vec();
        for unit in text.encode_utf16() {
            let bytes =
                if *le { unit.to_le_bytes() } else { unit.to_be_bytes() };
            input.extend_from_slice(&bytes);
        }
        let one_shot = parse_chunked(&[&input[..]]);
        assert_eq!(one_shot.1.len(), 2);
        for cut in 0..=input.len() {
            let chunked = parse_chunked(&[&input[..cut], &input[cut..]]);
            assert_eq!(one_shot, chunked, "cut at {}", cut);
        }
    }
}

#[test]
fn headers_disabled_chunking() {
    let input = b"1,2,3\n4,5,6\n";
    let mut one_shot = ParserBuilder::new()
        .headers(Headers::None)
        .build()
        .unwrap();
    let mut expected = one_shot.push(input).unwrap();
    expected.extend(one_shot.flush().unwrap());

    for cut in 0..=input.len() {
        let mut parser = ParserBuilder::new()
            .headers(Headers::None)
            .build()
            .unwrap();
        let mut records = parser.push(&input[..cut]).unwrap();
        records.extend(parser.push(&input[cut..]).unwrap());
        records.extend(parser.flush().unwrap());
        assert_eq!(records.len(), expected.len());
        for (a, b) in records.iter().zip(expected.iter()) {
            assert_eq!(a.get("_0"), b.get("_0"));
            assert_eq!(a.get("_2"), b.get("_2"));
        }
    }
}
