use crate::DecodeError;

/// Wire discriminant for each command kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandKind {
    MoveAxis = 0x01,
    TriggerGesture = 0x02,
    SetJaw = 0x03,
    Heartbeat = 0x04,
    CancelGesture = 0x05,
    EmergencyStop = 0x06,
    Unlock = 0x07,
}

impl CommandKind {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CommandKind {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x01 => Ok(Self::MoveAxis),
            0x02 => Ok(Self::TriggerGesture),
            0x03 => Ok(Self::SetJaw),
            0x04 => Ok(Self::Heartbeat),
            0x05 => Ok(Self::CancelGesture),
            0x06 => Ok(Self::EmergencyStop),
            0x07 => Ok(Self::Unlock),
            other => Err(DecodeError::UnknownKind(other)),
        }
    }
}

/// Kind-dependent command fields, carried exactly as they came off the wire.
/// Range checks happen in the dispatcher, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Joystick deflection for one stick, nominally in [-100, 100] per axis.
    MoveAxis { stick: u8, x: i8, y: i8 },
    TriggerGesture { gesture: u8 },
    /// Jaw opening in percent, 0 = closed.
    SetJaw { opening: u8 },
    Heartbeat,
    CancelGesture { gesture: u8 },
    EmergencyStop,
    Unlock,
}

impl Payload {
    pub fn kind(&self) -> CommandKind {
        match self {
            Payload::MoveAxis { .. } => CommandKind::MoveAxis,
            Payload::TriggerGesture { .. } => CommandKind::TriggerGesture,
            Payload::SetJaw { .. } => CommandKind::SetJaw,
            Payload::Heartbeat => CommandKind::Heartbeat,
            Payload::CancelGesture { .. } => CommandKind::CancelGesture,
            Payload::EmergencyStop => CommandKind::EmergencyStop,
            Payload::Unlock => CommandKind::Unlock,
        }
    }
}

/// A sequenced controller→skeleton instruction. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    seq: u16,
    payload: Payload,
}

impl Command {
    pub fn new(seq: u16, payload: Payload) -> Self {
        Self { seq, payload }
    }

    pub fn move_axis(seq: u16, stick: u8, x: i8, y: i8) -> Self {
        Self::new(seq, Payload::MoveAxis { stick, x, y })
    }

    pub fn trigger_gesture(seq: u16, gesture: u8) -> Self {
        Self::new(seq, Payload::TriggerGesture { gesture })
    }

    pub fn set_jaw(seq: u16, opening: u8) -> Self {
        Self::new(seq, Payload::SetJaw { opening })
    }

    pub fn heartbeat(seq: u16) -> Self {
        Self::new(seq, Payload::Heartbeat)
    }

    pub fn seq(&self) -> u16 {
        self.seq
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kind(&self) -> CommandKind {
        self.payload.kind()
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self.payload, Payload::Heartbeat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_byte_conversion() {
        for kind in [
            CommandKind::MoveAxis,
            CommandKind::TriggerGesture,
            CommandKind::SetJaw,
            CommandKind::Heartbeat,
            CommandKind::CancelGesture,
            CommandKind::EmergencyStop,
            CommandKind::Unlock,
        ] {
            assert_eq!(CommandKind::try_from(kind.as_byte()), Ok(kind));
        }

        assert_eq!(CommandKind::try_from(0x00), Err(DecodeError::UnknownKind(0x00)));
        assert_eq!(CommandKind::try_from(0x42), Err(DecodeError::UnknownKind(0x42)));
    }

    #[test]
    fn test_command_accessors() {
        let cmd = Command::move_axis(10, 0, 50, -20);
        assert_eq!(cmd.seq(), 10);
        assert_eq!(cmd.kind(), CommandKind::MoveAxis);
        assert!(!cmd.is_heartbeat());
        assert_eq!(*cmd.payload(), Payload::MoveAxis { stick: 0, x: 50, y: -20 });

        assert!(Command::heartbeat(3).is_heartbeat());
    }
}
