use super::{crc8, Frame, CRC_OFFSET, FRAME_LEN, KIND_OFFSET, PAYLOAD_LEN, PAYLOAD_OFFSET};
use crate::{Command, CommandKind, DecodeError, EncodeError, Payload};

pub fn encode(command: &Command) -> Result<Frame, EncodeError> {
    let mut payload = [0u8; PAYLOAD_LEN];
    let len = match *command.payload() {
        Payload::MoveAxis { stick, x, y } => {
            payload[0] = stick;
            payload[1] = x as u8;
            payload[2] = y as u8;
            3
        }
        Payload::TriggerGesture { gesture } | Payload::CancelGesture { gesture } => {
            payload[0] = gesture;
            1
        }
        Payload::SetJaw { opening } => {
            payload[0] = opening;
            1
        }
        Payload::Heartbeat | Payload::EmergencyStop | Payload::Unlock => 0,
    };

    Frame::from_raw(command.seq(), command.kind().as_byte(), &payload[..len])
}

/// Decode one received frame. Length is checked first, then the checksum,
/// then the kind byte; nothing is returned from a frame that fails any check.
pub fn decode(bytes: &[u8]) -> Result<Command, DecodeError> {
    if bytes.len() < FRAME_LEN {
        return Err(DecodeError::Truncated {
            len: bytes.len(),
            expected: FRAME_LEN,
        });
    }
    if bytes.len() > FRAME_LEN {
        return Err(DecodeError::Oversized {
            len: bytes.len(),
            expected: FRAME_LEN,
        });
    }

    let computed = crc8(&bytes[..CRC_OFFSET]);
    let found = bytes[CRC_OFFSET];
    if computed != found {
        return Err(DecodeError::Corrupt { found, computed });
    }

    let seq = u16::from_le_bytes([bytes[0], bytes[1]]);
    let kind = CommandKind::try_from(bytes[KIND_OFFSET])?;
    let p = &bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN];

    let payload = match kind {
        CommandKind::MoveAxis => Payload::MoveAxis {
            stick: p[0],
            x: p[1] as i8,
            y: p[2] as i8,
        },
        CommandKind::TriggerGesture => Payload::TriggerGesture { gesture: p[0] },
        CommandKind::SetJaw => Payload::SetJaw { opening: p[0] },
        CommandKind::Heartbeat => Payload::Heartbeat,
        CommandKind::CancelGesture => Payload::CancelGesture { gesture: p[0] },
        CommandKind::EmergencyStop => Payload::EmergencyStop,
        CommandKind::Unlock => Payload::Unlock,
    };

    Ok(Command::new(seq, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_axis_signed_values_survive() {
        let cmd = Command::move_axis(10, 1, -100, 37);
        let frame = encode(&cmd).unwrap();

        assert_eq!(frame.as_bytes()[4], 0x9c); // -100 as two's complement
        assert_eq!(decode(frame.as_bytes()), Ok(cmd));
    }

    #[test]
    fn test_every_kind_decodes_back() {
        let commands = [
            Command::trigger_gesture(1, 2),
            Command::set_jaw(2, 100),
            Command::heartbeat(3),
            Command::new(4, Payload::CancelGesture { gesture: 2 }),
            Command::new(5, Payload::EmergencyStop),
            Command::new(u16::MAX, Payload::Unlock),
        ];
        for cmd in commands {
            let frame = encode(&cmd).unwrap();
            assert_eq!(decode(frame.as_bytes()), Ok(cmd), "{:?}", cmd);
        }
    }

    #[test]
    fn test_truncated_and_oversized() {
        let frame = encode(&Command::heartbeat(1)).unwrap();
        let bytes = frame.as_bytes();

        assert_eq!(
            decode(&bytes[..5]),
            Err(DecodeError::Truncated { len: 5, expected: FRAME_LEN })
        );
        assert!(matches!(decode(&[]), Err(DecodeError::Truncated { len: 0, .. })));

        let mut long = bytes.to_vec();
        long.push(0);
        assert_eq!(
            decode(&long),
            Err(DecodeError::Oversized { len: 9, expected: FRAME_LEN })
        );
    }

    #[test]
    fn test_corrupt_payload_detected() {
        let frame = encode(&Command::move_axis(9, 0, 20, 20)).unwrap();
        let mut bytes = frame.into_bytes();
        bytes[4] ^= 0x01;

        assert!(matches!(decode(&bytes), Err(DecodeError::Corrupt { .. })));
    }

    #[test]
    fn test_unknown_kind_with_valid_checksum() {
        let frame = Frame::from_raw(3, 0x7f, &[]).unwrap();
        assert_eq!(decode(frame.as_bytes()), Err(DecodeError::UnknownKind(0x7f)));
    }

    #[test]
    fn test_padding_ignored_on_decode() {
        let frame = Frame::from_raw(8, CommandKind::SetJaw.as_byte(), &[40, 0xaa, 0xbb]).unwrap();
        assert_eq!(decode(frame.as_bytes()), Ok(Command::set_jaw(8, 40)));
    }
}
