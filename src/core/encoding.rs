//! Binary framing for commit records
//!
//! Every commit is written as one frame:
//!
//! ```text
//! [payload length: u32 LE][checksum: u32 LE][bincode payload]
//! ```
//!
//! The checksum is the first four bytes of the payload's SHA-256. A frame
//! whose header or payload is cut short, or whose checksum does not match,
//! was never fully committed.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Size of a frame header in bytes
pub const FRAME_HEADER_SIZE: usize = 8;

pub fn checksum(payload: &[u8]) -> u32 {
    let digest = Sha256::digest(payload);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Encode a frame header into a byte buffer
pub fn encode_header(buffer: &mut [u8; FRAME_HEADER_SIZE], length: u32, checksum: u32) {
    buffer[0..4].copy_from_slice(&length.to_le_bytes());
    buffer[4..8].copy_from_slice(&checksum.to_le_bytes());
}

/// Decode a frame header into `(length, checksum)`
pub fn decode_header(buffer: &[u8; FRAME_HEADER_SIZE]) -> (u32, u32) {
    let length = u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
    let checksum = u32::from_le_bytes([buffer[4], buffer[5], buffer[6], buffer[7]]);
    (length, checksum)
}

/// Serialize `value` into a complete frame, header included.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let payload = bincode::serialize(value)?;
    let length = u32::try_from(payload.len()).map_err(|_| {
        Error::InvalidDocument(format!("commit of {} bytes exceeds frame limit", payload.len()))
    })?;

    let mut header = [0u8; FRAME_HEADER_SIZE];
    encode_header(&mut header, length, checksum(&payload));

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Check the payload against its header checksum. `None` means the frame is damaged.
pub fn verify_payload(payload: &[u8], expected: u32) -> Option<&[u8]> {
    (checksum(payload) == expected).then_some(payload)
}

pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let frame = encode_frame(&vec![1u32, 2, 3]).unwrap();
        let header: [u8; FRAME_HEADER_SIZE] = frame[..FRAME_HEADER_SIZE].try_into().unwrap();
        let (length, sum) = decode_header(&header);
        let payload = &frame[FRAME_HEADER_SIZE..];

        assert_eq!(length as usize, payload.len());
        assert!(verify_payload(payload, sum).is_some());
        let decoded: Vec<u32> = decode_payload(payload).unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
    }

    #[test]
    fn test_damaged_payload_fails_checksum() {
        let mut frame = encode_frame(&"hello".to_string()).unwrap();
        let header: [u8; FRAME_HEADER_SIZE] = frame[..FRAME_HEADER_SIZE].try_into().unwrap();
        let (_, sum) = decode_header(&header);
        let last = frame.len() - 1;
        frame[last] ^= 0xff;
        assert!(verify_payload(&frame[FRAME_HEADER_SIZE..], sum).is_none());
    }
}
