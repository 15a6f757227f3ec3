//! Wire encoding for stored log and snapshot values
//!
//! Backends persist values in an explicit, versioned, tagged form so wire
//! compatibility never depends on type registration order:
//!
//! ```text
//! [format_version: u8][tag: u8][len: u32 LE][payload bytes]
//! ```
//!
//! Unknown versions or tags, truncated buffers, and length mismatches all
//! decode to [`Error::Corrupt`]. A corrupt slot must never be mistaken
//! for a tombstone.

use crate::error::{Error, Result};
use crate::value::{ByteValue, LogValue, SnapshotValue};

/// Current encoding version. Bump when the layout changes.
pub const FORMAT_VERSION: u8 = 1;

const TAG_BYTES: u8 = 1;
const TAG_NOOP: u8 = 2;
const TAG_INITIAL: u8 = 3;

const HEADER_LEN: usize = 6;

fn encode(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.push(FORMAT_VERSION);
    buf.push(tag);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

fn decode(buf: &[u8]) -> Result<(u8, &[u8])> {
    if buf.len() < HEADER_LEN {
        return Err(Error::Corrupt(format!(
            "value truncated: {} bytes, need at least {}",
            buf.len(),
            HEADER_LEN
        )));
    }
    let version = buf[0];
    if version != FORMAT_VERSION {
        return Err(Error::Corrupt(format!(
            "unknown format version {}",
            version
        )));
    }
    let tag = buf[1];
    let len = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize;
    let payload = &buf[HEADER_LEN..];
    if payload.len() != len {
        return Err(Error::Corrupt(format!(
            "payload length mismatch: header says {}, found {}",
            len,
            payload.len()
        )));
    }
    Ok((tag, payload))
}

/// Encodes a log value for storage.
pub fn encode_log_value(value: &LogValue) -> Vec<u8> {
    match value {
        LogValue::Bytes(b) => encode(TAG_BYTES, b.bytes()),
        LogValue::NoOp => encode(TAG_NOOP, &[]),
    }
}

/// Decodes a stored log value.
///
/// # Errors
///
/// Returns [`Error::Corrupt`] if the buffer is not a valid encoding.
pub fn decode_log_value(buf: &[u8]) -> Result<LogValue> {
    match decode(buf)? {
        (TAG_BYTES, payload) => Ok(LogValue::Bytes(ByteValue::new(payload.to_vec()))),
        (TAG_NOOP, _) => Ok(LogValue::NoOp),
        (tag, _) => Err(Error::Corrupt(format!("unknown log value tag {}", tag))),
    }
}

/// Encodes a snapshot value for storage.
pub fn encode_snapshot_value(value: &SnapshotValue) -> Vec<u8> {
    match value {
        SnapshotValue::Bytes(b) => encode(TAG_BYTES, b.bytes()),
        SnapshotValue::Initial => encode(TAG_INITIAL, &[]),
    }
}

/// Decodes a stored snapshot value.
///
/// # Errors
///
/// Returns [`Error::Corrupt`] if the buffer is not a valid encoding.
pub fn decode_snapshot_value(buf: &[u8]) -> Result<SnapshotValue> {
    match decode(buf)? {
        (TAG_BYTES, payload) => Ok(SnapshotValue::Bytes(ByteValue::new(payload.to_vec()))),
        (TAG_INITIAL, _) => Ok(SnapshotValue::Initial),
        (tag, _) => Err(Error::Corrupt(format!("unknown snapshot tag {}", tag))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_value_round_trip() {
        let v = LogValue::Bytes(ByteValue::new(vec![1, 2, 3]));
        assert_eq!(decode_log_value(&encode_log_value(&v)).unwrap(), v);

        let noop = LogValue::NoOp;
        assert_eq!(decode_log_value(&encode_log_value(&noop)).unwrap(), noop);
    }

    #[test]
    fn test_snapshot_value_round_trip() {
        let v = SnapshotValue::Bytes(ByteValue::new(vec![4, 5]));
        assert_eq!(decode_snapshot_value(&encode_snapshot_value(&v)).unwrap(), v);
        assert_eq!(
            decode_snapshot_value(&encode_snapshot_value(&SnapshotValue::Initial)).unwrap(),
            SnapshotValue::Initial
        );
    }

    #[test]
    fn test_truncated_buffer_is_corrupt() {
        let err = decode_log_value(&[1, 1]).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_unknown_version_is_corrupt() {
        let mut buf = encode_log_value(&LogValue::NoOp);
        buf[0] = 99;
        assert!(matches!(decode_log_value(&buf), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_unknown_tag_is_corrupt() {
        let mut buf = encode_log_value(&LogValue::NoOp);
        buf[1] = 0xEE;
        assert!(matches!(decode_log_value(&buf), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_length_mismatch_is_corrupt() {
        let mut buf = encode_log_value(&LogValue::Bytes(ByteValue::new(vec![1, 2, 3])));
        buf.pop();
        assert!(matches!(decode_log_value(&buf), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_snapshot_tag_rejected_as_log_value() {
        // a snapshot Initial marker is not a valid log slot value
        let buf = encode_snapshot_value(&SnapshotValue::Initial);
        assert!(matches!(decode_log_value(&buf), Err(Error::Corrupt(_))));
    }
}
