//! # Batch Codec
//!
//! Turns one telemetry request body into a `TelemetryBatch`.
//!
//! Responsibilities:
//! - gzip-decompress the body when `Content-Encoding` carries the `gzip` token
//! - Rebuild a JSON array from line-delimited JSON (`\n` or `\r\n`)
//! - Reject the whole batch on any malformed line
//!
//! ## Usage Example
//!
//! ```
//! let body = b"{\"name\":\"a\"}\n{\"name\":\"b\"}";
//! let batch = batch_codec::decode::<&str>(body, &[]).unwrap();
//! assert_eq!(batch.len(), 2);
//! ```

mod error;

use std::io::Read;

use contracts::{Record, TelemetryBatch};
use flate2::read::GzDecoder;
use tracing::trace;

pub use error::{DecodeError, Result};

/// Decode a raw body into a batch
///
/// `content_encoding` holds every `Content-Encoding` header value of the
/// original request. An empty (or all-whitespace) payload decodes to an
/// empty batch.
///
/// # Errors
/// - gzip stream is corrupt
/// - payload is not UTF-8
/// - any line is not a single JSON object
pub fn decode<S: AsRef<str>>(raw: &[u8], content_encoding: &[S]) -> Result<TelemetryBatch> {
    if is_gzip(content_encoding) {
        let inflated = decompress_gzip(raw)?;
        trace!(
            compressed = raw.len(),
            inflated = inflated.len(),
            "gzip payload inflated"
        );
        parse_ndjson(&inflated)
    } else {
        parse_ndjson(raw)
    }
}

/// Whether the encoding list contains the `gzip` token
///
/// Values may be comma-separated lists; tokens are matched exactly,
/// ignoring ASCII case and surrounding whitespace.
pub fn is_gzip<S: AsRef<str>>(content_encoding: &[S]) -> bool {
    content_encoding
        .iter()
        .flat_map(|value| value.as_ref().split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("gzip"))
}

/// Decompress a complete gzip stream
pub fn decompress_gzip(raw: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(raw);
    let mut output = Vec::with_capacity(raw.len() * 4);
    decoder
        .read_to_end(&mut output)
        .map_err(DecodeError::Gzip)?;
    Ok(output)
}

/// Parse line-delimited JSON objects, preserving line order
pub fn parse_ndjson(payload: &[u8]) -> Result<TelemetryBatch> {
    let text = std::str::from_utf8(payload)?;
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return Ok(TelemetryBatch::default());
    }

    let array = to_json_array(&lines);
    let records: Vec<Record> = serde_json::from_str(&array)?;

    if records.len() != lines.len() {
        return Err(DecodeError::RecordCount {
            lines: lines.len(),
            records: records.len(),
        });
    }

    Ok(TelemetryBatch::new(records))
}

/// `[line1,line2,...]`
fn to_json_array(lines: &[&str]) -> String {
    let capacity = lines.iter().map(|l| l.len() + 1).sum::<usize>() + 2;
    let mut array = String::with_capacity(capacity);
    array.push('[');
    for (idx, line) in lines.iter().enumerate() {
        if idx > 0 {
            array.push(',');
        }
        array.push_str(line);
    }
    array.push(']');
    array
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const NO_ENCODING: &[&str] = &[];

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decode_preserves_line_order() {
        let body = b"{\"seq\":1}\n{\"seq\":2}\r\n{\"seq\":3}";
        let batch = decode(body, NO_ENCODING).unwrap();

        let seqs: Vec<_> = batch.iter().map(|r| r["seq"].as_i64().unwrap()).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_ignores_blank_and_trailing_lines() {
        let body = b"{\"a\":1}\n\n{\"a\":2}\n";
        let batch = decode(body, NO_ENCODING).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_decode_empty_payload_is_empty_batch() {
        assert!(decode(b"", NO_ENCODING).unwrap().is_empty());
        assert!(decode(b"  \r\n\n ", NO_ENCODING).unwrap().is_empty());
    }

    #[test]
    fn test_gzip_matches_plain() {
        let body = b"{\"name\":\"req\",\"data\":{\"baseData\":{\"id\":\"1\"}}}\n{\"name\":\"evt\"}";
        let plain = decode(body, NO_ENCODING).unwrap();
        let zipped = decode(&gzip(body), &["gzip"]).unwrap();
        assert_eq!(plain, zipped);
    }

    #[test]
    fn test_gzip_token_matching() {
        assert!(is_gzip(&["gzip"]));
        assert!(is_gzip(&["GZIP"]));
        assert!(is_gzip(&["identity, gzip"]));
        assert!(is_gzip(&["br", " Gzip "]));
        assert!(!is_gzip(&["x-gzip"]));
        assert!(!is_gzip(&["gzipped"]));
        assert!(!is_gzip(NO_ENCODING));
    }

    #[test]
    fn test_corrupt_gzip_is_error() {
        let result = decode(b"{\"a\":1}", &["gzip"]);
        assert!(matches!(result, Err(DecodeError::Gzip(_))));
    }

    #[test]
    fn test_malformed_line_rejects_batch() {
        let result = decode(b"{\"a\":1}\n{\"a\":", NO_ENCODING);
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_non_object_record_is_error() {
        let result = decode(b"{\"a\":1}\n42", NO_ENCODING);
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_two_records_on_one_line_is_error() {
        let result = decode(b"{\"a\":1},{\"a\":2}\n{\"a\":3}", NO_ENCODING);
        assert!(matches!(
            result,
            Err(DecodeError::RecordCount {
                lines: 2,
                records: 3
            })
        ));
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let result = decode(&[0xff, 0xfe], NO_ENCODING);
        assert!(matches!(result, Err(DecodeError::Utf8(_))));
    }
}
