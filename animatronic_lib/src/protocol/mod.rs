//! # Wire protocol
//!
//! Every frame is exactly [`FRAME_LEN`] bytes:
//!
//! ```text
//! [seq: u16 LE][kind: u8][payload: 4 bytes][crc8: u8]
//! ```
//!
//! The checksum is CRC-8 (polynomial 0x07, init 0x00) over the first seven
//! bytes. Unused payload bytes are written as zero and ignored on decode.

pub mod codec;

pub use codec::*;

use crate::EncodeError;

pub const PAYLOAD_LEN: usize = 4;
pub const FRAME_LEN: usize = 2 + 1 + PAYLOAD_LEN + 1;

const KIND_OFFSET: usize = 2;
const PAYLOAD_OFFSET: usize = 3;
const CRC_OFFSET: usize = FRAME_LEN - 1;
const CRC8_POLY: u8 = 0x07;

pub fn crc8(bytes: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in bytes {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// One encoded, checksummed frame ready for transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Build a frame from raw parts. The kind byte is not checked here, so
    /// this is also how test tooling produces frames the actuator must reject.
    pub fn from_raw(seq: u16, kind: u8, payload: &[u8]) -> Result<Self, EncodeError> {
        if payload.len() > PAYLOAD_LEN {
            return Err(EncodeError::PayloadTooLarge {
                len: payload.len(),
                max: PAYLOAD_LEN,
            });
        }

        let mut bytes = [0u8; FRAME_LEN];
        bytes[..KIND_OFFSET].copy_from_slice(&seq.to_le_bytes());
        bytes[KIND_OFFSET] = kind;
        bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + payload.len()].copy_from_slice(payload);
        bytes[CRC_OFFSET] = crc8(&bytes[..CRC_OFFSET]);
        Ok(Self(bytes))
    }

    pub fn seq(&self) -> u16 {
        u16::from_le_bytes([self.0[0], self.0[1]])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; FRAME_LEN] {
        self.0
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_check_value() {
        // CRC-8/SMBUS check value
        assert_eq!(crc8(b"123456789"), 0xF4);
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn test_frame_layout() {
        let frame = Frame::from_raw(0x1234, 0x02, &[7]).unwrap();
        let bytes = frame.as_bytes();

        assert_eq!(bytes.len(), FRAME_LEN);
        assert_eq!(&bytes[..2], &[0x34, 0x12]);
        assert_eq!(bytes[2], 0x02);
        assert_eq!(&bytes[3..7], &[7, 0, 0, 0]);
        assert_eq!(bytes[7], crc8(&bytes[..7]));
        assert_eq!(frame.seq(), 0x1234);
    }

    #[test]
    fn test_payload_too_large() {
        let err = Frame::from_raw(1, 0x01, &[1, 2, 3, 4, 5]).unwrap_err();
        assert_eq!(err, EncodeError::PayloadTooLarge { len: 5, max: PAYLOAD_LEN });
    }
}
