//! Error taxonomy for the link, dispatch and driver layers.
//!
//! None of these are fatal: the actuator tick loop drops the offending frame
//! or command, counts it, and carries on.

use thiserror::Error;

/// Frame-level decode failures. The frame is dropped whole.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Frame truncated: {len} bytes, expected {expected}")]
    Truncated { len: usize, expected: usize },

    #[error("Frame oversized: {len} bytes, expected {expected}")]
    Oversized { len: usize, expected: usize },

    #[error("Checksum mismatch: frame carries {found:#04x}, computed {computed:#04x}")]
    Corrupt { found: u8, computed: u8 },

    #[error("Unknown command kind {0:#04x}")]
    UnknownKind(u8),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Payload of {len} bytes exceeds the {max}-byte payload field")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Ordering rejection for duplicate or replayed frames.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceError {
    #[error("Stale sequence {seq} (last accepted {last})")]
    Stale { seq: u16, last: u16 },
}

/// Command-level rejections raised before anything reaches the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} value {value} out of range")]
    OutOfRange { field: &'static str, value: i32 },

    #[error("Unknown gesture id {0}")]
    UnknownGesture(u8),

    #[error("{0} is not configured on this skeleton")]
    NotConfigured(&'static str),
}

/// Policy rejections from the motion engine or the emergency-stop latch.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Priority {requested} is below priority {holding} currently holding the channels")]
    LowerPriority { requested: u8, holding: u8 },

    #[error("Emergency stop latched, waiting for unlock")]
    Latched,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Servo driver failure for a single channel write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("Channel {channel} not available ({available} channels on the driver)")]
    NoSuchChannel { channel: usize, available: usize },

    #[error("Bus write failed on channel {channel}: {reason}")]
    Bus { channel: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let msg = DecodeError::Corrupt { found: 0x12, computed: 0xab }.to_string();
        assert!(msg.contains("0x12") && msg.contains("0xab"), "{}", msg);

        let msg = DecodeError::Truncated { len: 3, expected: 8 }.to_string();
        assert_eq!(msg, "Frame truncated: 3 bytes, expected 8");

        let msg = DecodeError::UnknownKind(0x7f).to_string();
        assert_eq!(msg, "Unknown command kind 0x7f");
    }

    #[test]
    fn test_command_error_from_variants() {
        let err: CommandError = ValidationError::UnknownGesture(9).into();
        assert!(matches!(
            err,
            CommandError::Validation(ValidationError::UnknownGesture(9))
        ));
        assert_eq!(err.to_string(), "Unknown gesture id 9");

        let err: CommandError = DispatchError::Latched.into();
        assert!(matches!(err, CommandError::Dispatch(DispatchError::Latched)));
    }
}
