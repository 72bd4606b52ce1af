//! Record framing
//!
//! Each record is stored as a self-delimited frame:
//! ```text
//! [4 bytes: payload len (BE)][len bytes: postcard payload][4 bytes: BLAKE3 prefix]
//! ```
//! The trailer is the first four bytes of the BLAKE3 hash of the payload, which
//! lets a reader tell a torn or overwritten tail from a valid record.

use crate::error::CodecError;
use crate::record::EventRecord;

/// Length prefix size
pub const FRAME_HEADER_LEN: usize = 4;

/// Checksum trailer size
pub const FRAME_TRAILER_LEN: usize = 4;

/// Default upper bound on a single payload
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// A decoded frame and the number of bytes it occupied
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutcome {
    pub record: EventRecord,
    pub consumed: usize,
}

/// Encode a record into a complete frame
pub fn encode(record: &EventRecord) -> Result<Vec<u8>, CodecError> {
    encode_with_limit(record, MAX_FRAME_LEN)
}

/// Encode a record, rejecting payloads a reader limited to `max_len` would refuse
pub fn encode_with_limit(record: &EventRecord, max_len: usize) -> Result<Vec<u8>, CodecError> {
    let payload = postcard::to_allocvec(record).map_err(|e| CodecError::Encode(e.to_string()))?;
    let max = max_len.min(MAX_FRAME_LEN);
    if payload.len() > max {
        return Err(CodecError::FrameTooLarge {
            len: payload.len(),
            max,
        });
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len() + FRAME_TRAILER_LEN);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&checksum(&payload));
    Ok(frame)
}

/// Decode exactly one frame
///
/// Fails with [`CodecError::TrailingBytes`] if `bytes` holds more than one frame.
pub fn decode(bytes: &[u8]) -> Result<EventRecord, CodecError> {
    let outcome = decode_frame(bytes, MAX_FRAME_LEN)?;
    if outcome.consumed != bytes.len() {
        return Err(CodecError::TrailingBytes(bytes.len() - outcome.consumed));
    }
    Ok(outcome.record)
}

/// Decode the first frame in `buf`, leaving any following bytes untouched
pub fn decode_frame(buf: &[u8], max_len: usize) -> Result<DecodeOutcome, CodecError> {
    if buf.len() < FRAME_HEADER_LEN {
        return Err(CodecError::Truncated {
            needed: FRAME_HEADER_LEN,
            available: buf.len(),
        });
    }

    let mut header = [0u8; FRAME_HEADER_LEN];
    header.copy_from_slice(&buf[..FRAME_HEADER_LEN]);
    let len = payload_len(header, max_len)?;

    let total = FRAME_HEADER_LEN + len + FRAME_TRAILER_LEN;
    if buf.len() < total {
        return Err(CodecError::Truncated {
            needed: total,
            available: buf.len(),
        });
    }

    let payload = &buf[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len];
    let mut trailer = [0u8; FRAME_TRAILER_LEN];
    trailer.copy_from_slice(&buf[FRAME_HEADER_LEN + len..total]);

    let record = decode_payload(payload, trailer)?;
    Ok(DecodeOutcome {
        record,
        consumed: total,
    })
}

/// Validate a length prefix and return the payload length it announces
pub fn payload_len(header: [u8; FRAME_HEADER_LEN], max_len: usize) -> Result<usize, CodecError> {
    let len = u32::from_be_bytes(header) as usize;
    if len == 0 {
        return Err(CodecError::EmptyFrame);
    }
    if len > max_len {
        return Err(CodecError::FrameTooLarge { len, max: max_len });
    }
    Ok(len)
}

/// Verify the trailer and deserialize a payload
pub fn decode_payload(
    payload: &[u8],
    trailer: [u8; FRAME_TRAILER_LEN],
) -> Result<EventRecord, CodecError> {
    if checksum(payload) != trailer {
        return Err(CodecError::ChecksumMismatch);
    }
    let (record, rest) = postcard::take_from_bytes::<EventRecord>(payload)?;
    if !rest.is_empty() {
        return Err(CodecError::Payload(format!(
            "{} unread bytes in payload",
            rest.len()
        )));
    }
    Ok(record)
}

/// First four bytes of the BLAKE3 hash of `payload`
pub fn checksum(payload: &[u8]) -> [u8; FRAME_TRAILER_LEN] {
    let hash = blake3::hash(payload);
    let mut out = [0u8; FRAME_TRAILER_LEN];
    out.copy_from_slice(&hash.as_bytes()[..FRAME_TRAILER_LEN]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DataType, RecordMetadata, TensorPayload};
    use bytes::Bytes;
    use rand::Rng;

    fn sample_record() -> EventRecord {
        EventRecord::debug_numeric_summary(
            "/job:localhost/replica:0/task:0/cpu:0",
            "layers/Matmul",
            0,
            42.0,
            2,
            (0..12).map(f64::from).chain([1.0, 1.0, 3.0]).collect(),
        )
    }

    fn random_record(rng: &mut impl Rng) -> EventRecord {
        let len = rng.random_range(0..256);
        let values: Vec<f64> = (0..len).map(|_| rng.random::<f64>() * 1e12 - 5e11).collect();
        let content: Vec<u8> = (0..rng.random_range(0..64)).map(|_| rng.random()).collect();
        EventRecord {
            step: rng.random(),
            wall_time: rng.random::<f64>() * 2e9,
            tag: format!("scope_{}/op", rng.random::<u16>()),
            node_name: format!("node:{}", rng.random::<u8>()),
            tensor: TensorPayload {
                dtype: DataType::Float32,
                shape: vec![len as u64],
                values,
            },
            metadata: RecordMetadata {
                device: "/gpu:1".into(),
                output_slot: rng.random_range(0..8),
                plugin_name: "custom".into(),
                plugin_content: Bytes::from(content),
            },
        }
    }

    #[test]
    fn test_round_trip() {
        let record = sample_record();
        let frame = encode(&record).unwrap();
        assert_eq!(decode(&frame).unwrap(), record);
    }

    #[test]
    fn test_round_trip_random_records() {
        let mut rng = rand::rng();
        for _ in 0..64 {
            let record = random_record(&mut rng);
            let frame = encode(&record).unwrap();
            let decoded = decode(&frame).unwrap();
            assert_eq!(decoded, record);
            // Bit-exact floats, not just approximately equal ones
            for (a, b) in decoded.tensor.values.iter().zip(&record.tensor.values) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }

    #[test]
    fn test_round_trip_extreme_floats() {
        let mut record = sample_record();
        record.wall_time = f64::MIN_POSITIVE;
        record.tensor.values = vec![
            f64::MAX,
            f64::MIN,
            -0.0,
            f64::INFINITY,
            f64::NEG_INFINITY,
            1e-310,
        ];
        let decoded = decode(&encode(&record).unwrap()).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.tensor.values[2].is_sign_negative());
    }

    #[test]
    fn test_every_truncation_is_incomplete() {
        let frame = encode(&sample_record()).unwrap();
        for cut in 0..frame.len() {
            let err = decode(&frame[..cut]).unwrap_err();
            assert!(err.is_incomplete(), "cut at {cut} gave {err:?}");
        }
    }

    #[test]
    fn test_corrupt_payload_detected() {
        let mut frame = encode(&sample_record()).unwrap();
        let mid = FRAME_HEADER_LEN + 5;
        frame[mid] ^= 0xFF;
        assert_eq!(decode(&frame).unwrap_err(), CodecError::ChecksumMismatch);
    }

    #[test]
    fn test_zero_length_frame_rejected() {
        let frame = [0u8; 8];
        assert_eq!(decode(&frame).unwrap_err(), CodecError::EmptyFrame);
    }

    #[test]
    fn test_oversized_length_rejected() {
        let header = (MAX_FRAME_LEN as u32 + 1).to_be_bytes();
        assert!(matches!(
            decode_frame(&header, MAX_FRAME_LEN).unwrap_err(),
            CodecError::FrameTooLarge { .. }
        ));
    }

    #[test]
    fn test_encode_respects_reader_limit() {
        let record = sample_record();
        let frame = encode(&record).unwrap();
        let payload_len = frame.len() - FRAME_HEADER_LEN - FRAME_TRAILER_LEN;

        assert_eq!(encode_with_limit(&record, payload_len).unwrap(), frame);
        assert_eq!(
            encode_with_limit(&record, payload_len - 1).unwrap_err(),
            CodecError::FrameTooLarge {
                len: payload_len,
                max: payload_len - 1,
            }
        );
    }

    #[test]
    fn test_decode_frame_leaves_following_bytes() {
        let a = sample_record();
        let mut b = sample_record();
        b.step = 7;

        let mut buf = encode(&a).unwrap();
        let first_len = buf.len();
        buf.extend(encode(&b).unwrap());

        let first = decode_frame(&buf, MAX_FRAME_LEN).unwrap();
        assert_eq!(first.consumed, first_len);
        assert_eq!(first.record, a);

        let second = decode_frame(&buf[first.consumed..], MAX_FRAME_LEN).unwrap();
        assert_eq!(second.record.step, 7);

        assert_eq!(decode(&buf).unwrap_err(), CodecError::TrailingBytes(buf.len() - first_len));
    }
}
