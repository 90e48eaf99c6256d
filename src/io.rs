//! Record tokenizer and line reader.
//!
//! Deliberately dumb: no memory-mapping, no buffering tricks beyond
//! `BufReader`, no validation beyond "does this line parse". It carries
//! none of the sketch's invariants and exists only to turn a text file into
//! the two record shapes the pipeline trains on.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::config::KEY_LEN;
use crate::error::TrainError;

/// A softmax/multiclass training or test record: a 0-indexed label and a
/// bounded list of fixed-width feature keys.
#[derive(Clone, Debug)]
pub struct MulticlassRecord {
    pub label: usize,
    pub features: Vec<[u8; KEY_LEN]>,
}

/// A logistic/binary training or test record: a `{0.0, 1.0}` label and a
/// list of `(feature_id, value)` pairs.
#[derive(Clone, Debug)]
pub struct BinaryRecord {
    pub label: f32,
    pub features: Vec<(i32, f32)>,
}

/// Left-justify `token`'s bytes into a zero-padded `KEY_LEN`-byte key,
/// truncating tokens longer than `KEY_LEN`.
pub fn pad_key(token: &str) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    let bytes = token.as_bytes();
    let n = bytes.len().min(KEY_LEN);
    key[..n].copy_from_slice(&bytes[..n]);
    key
}

/// Parse one softmax-variant line: token 0 is the 1-indexed label, tokens
/// `1..=max_features` are feature keys. `line_no` is the source line number
/// (1-indexed), carried only for diagnostics. `k` bounds the label: the
/// decoded 0-indexed label must satisfy `0 <= label < k`.
pub fn parse_multiclass_line(
    line: &str,
    line_no: usize,
    max_features: usize,
    k: usize,
) -> Result<MulticlassRecord, TrainError> {
    let mut tokens = line.split_whitespace();
    let label_token = tokens
        .next()
        .ok_or_else(|| TrainError::MalformedRecord { line: line_no, reason: "empty line".into() })?;
    let label_one_indexed: usize = label_token.parse().map_err(|_| TrainError::MalformedRecord {
        line: line_no,
        reason: format!("label {label_token:?} is not an integer"),
    })?;
    if label_one_indexed == 0 {
        return Err(TrainError::MalformedRecord {
            line: line_no,
            reason: "label must be 1-indexed (>= 1)".into(),
        });
    }
    if label_one_indexed > k {
        return Err(TrainError::MalformedRecord {
            line: line_no,
            reason: format!("label {label_one_indexed} (1-indexed) exceeds configured k={k}"),
        });
    }
    let features: Vec<[u8; KEY_LEN]> = tokens.take(max_features).map(pad_key).collect();
    Ok(MulticlassRecord {
        label: label_one_indexed - 1,
        features,
    })
}

/// Parse one logistic-variant line: token 0 is `{-1, +1}`, remaining tokens
/// are `feature_id:feature_value`. `line_no` is the source line number
/// (1-indexed), carried only for diagnostics.
pub fn parse_binary_line(line: &str, line_no: usize) -> Result<BinaryRecord, TrainError> {
    let mut tokens = line.split_whitespace();
    let label_token = tokens
        .next()
        .ok_or_else(|| TrainError::MalformedRecord { line: line_no, reason: "empty line".into() })?;
    let raw_label: i32 = label_token.parse().map_err(|_| TrainError::MalformedRecord {
        line: line_no,
        reason: format!("label {label_token:?} is not an integer"),
    })?;
    if raw_label != -1 && raw_label != 1 {
        return Err(TrainError::MalformedRecord {
            line: line_no,
            reason: format!("label {raw_label} must be -1 or +1"),
        });
    }
    let label = ((raw_label + 1) / 2) as f32;

    let mut features = Vec::new();
    for tok in tokens {
        let (id_str, val_str) = tok.split_once(':').ok_or_else(|| TrainError::MalformedRecord {
            line: line_no,
            reason: format!("feature token {tok:?} is missing ':'"),
        })?;
        let id: i32 = id_str.parse().map_err(|_| TrainError::MalformedRecord {
            line: line_no,
            reason: format!("feature id {id_str:?} is not an integer"),
        })?;
        let value: f32 = val_str.parse().map_err(|_| TrainError::MalformedRecord {
            line: line_no,
            reason: format!("feature value {val_str:?} is not a float"),
        })?;
        features.push((id, value));
    }
    Ok(BinaryRecord { label, features })
}

/// Open `path` and return its lines, unbuffered beyond `BufReader`'s default.
pub fn lines(path: impl AsRef<Path>) -> Result<Lines<BufReader<File>>, TrainError> {
    let file = File::open(path)?;
    Ok(BufReader::new(file).lines())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_key_truncates_and_pads() {
        let short = pad_key("ab");
        assert_eq!(&short[..2], b"ab");
        assert!(short[2..].iter().all(|&b| b == 0));

        let long_token: String = "x".repeat(KEY_LEN + 5);
        let truncated = pad_key(&long_token);
        assert_eq!(truncated.len(), KEY_LEN);
    }

    #[test]
    fn parses_multiclass_line() {
        let rec = parse_multiclass_line("2 feat-a feat-b", 1, 10, 5).unwrap();
        assert_eq!(rec.label, 1);
        assert_eq!(rec.features.len(), 2);
    }

    #[test]
    fn rejects_zero_label() {
        let err = parse_multiclass_line("0 feat-a", 1, 10, 5).unwrap_err();
        assert!(matches!(err, TrainError::MalformedRecord { .. }));
    }

    #[test]
    fn rejects_label_at_or_beyond_k() {
        let err = parse_multiclass_line("4 feat-a", 1, 10, 3).unwrap_err();
        assert!(matches!(err, TrainError::MalformedRecord { .. }));
        // exactly k is fine (1-indexed k maps to 0-indexed k-1)
        let rec = parse_multiclass_line("3 feat-a", 1, 10, 3).unwrap();
        assert_eq!(rec.label, 2);
    }

    #[test]
    fn multiclass_caps_feature_count() {
        let line = "1 a b c d e";
        let rec = parse_multiclass_line(line, 1, 2, 5).unwrap();
        assert_eq!(rec.features.len(), 2);
    }

    #[test]
    fn parses_binary_line() {
        let rec = parse_binary_line("1 3:0.5 7:-1.2", 1).unwrap();
        assert_eq!(rec.label, 1.0);
        assert_eq!(rec.features, vec![(3, 0.5), (7, -1.2)]);
    }

    #[test]
    fn maps_negative_label_to_zero() {
        let rec = parse_binary_line("-1 1:1.0", 1).unwrap();
        assert_eq!(rec.label, 0.0);
    }

    #[test]
    fn rejects_bad_binary_label() {
        let err = parse_binary_line("2 1:1.0", 1).unwrap_err();
        assert!(matches!(err, TrainError::MalformedRecord { .. }));
    }

    #[test]
    fn rejects_feature_without_colon() {
        let err = parse_binary_line("1 nocolon", 1).unwrap_err();
        assert!(matches!(err, TrainError::MalformedRecord { .. }));
    }

    #[test]
    fn malformed_record_carries_real_line_number() {
        let err = parse_binary_line("bogus", 42).unwrap_err();
        match err {
            TrainError::MalformedRecord { line, .. } => assert_eq!(line, 42),
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }
}
