//! Link session: duplicate/replay rejection, liveness and receive buffering.

use crate::{Command, DecodeError, SequenceError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// First accepted frame of a new session
    Connected,
    /// No accepted frame within the disconnect timeout
    Lost,
}

/// Diagnostic counters, reported in telemetry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    pub accepted: u64,
    pub heartbeats: u64,
    pub truncated: u64,
    pub oversized: u64,
    pub corrupt: u64,
    pub unknown_kind: u64,
    pub stale: u64,
    pub queue_overflows: u64,
    pub disconnects: u64,
    /// Controller restarts detected from a heartbeat behind the last sequence
    pub restarts: u64,
}

impl LinkStats {
    pub fn record_decode_error(&mut self, error: &DecodeError) {
        match error {
            DecodeError::Truncated { .. } => self.truncated += 1,
            DecodeError::Oversized { .. } => self.oversized += 1,
            DecodeError::Corrupt { .. } => self.corrupt += 1,
            DecodeError::UnknownKind(_) => self.unknown_kind += 1,
        }
    }

    /// Frames that never reached the dispatcher.
    pub fn dropped(&self) -> u64 {
        self.truncated
            + self.oversized
            + self.corrupt
            + self.unknown_kind
            + self.stale
            + self.queue_overflows
    }
}

/// True when `seq` is strictly newer than `last` in 16-bit serial arithmetic.
pub fn is_newer(seq: u16, last: u16) -> bool {
    let distance = seq.wrapping_sub(last);
    distance != 0 && distance < 0x8000
}

pub struct LinkSession {
    state: LinkState,
    last_seq: Option<u16>,
    last_valid: Option<Instant>,
    timeout: Duration,
    stats: LinkStats,
}

impl LinkSession {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: LinkState::Disconnected,
            last_seq: None,
            last_valid: None,
            timeout,
            stats: LinkStats::default(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn last_seq(&self) -> Option<u16> {
        self.last_seq
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn record_decode_error(&mut self, error: &DecodeError) {
        self.stats.record_decode_error(error);
    }

    pub fn record_queue_overflow(&mut self) {
        self.stats.queue_overflows += 1;
    }

    /// Admit a decoded command into the session.
    ///
    /// Heartbeats skip the ordering check and leave the last sequence alone,
    /// except that a heartbeat older than the last sequence starts a new
    /// session. Any accepted frame refreshes liveness.
    pub fn accept(
        &mut self,
        command: &Command,
        now: Instant,
    ) -> Result<Option<LinkEvent>, SequenceError> {
        let mut event = None;
        if self.state == LinkState::Disconnected {
            // New session: the controller may have rebooted and restarted its counter
            self.state = LinkState::Connected;
            self.last_seq = None;
            event = Some(LinkEvent::Connected);
        }

        if command.is_heartbeat() {
            self.stats.heartbeats += 1;
            // Heartbeats repeat the controller's last issued sequence, so one
            // from behind means the controller restarted its counter
            if let Some(last) = self.last_seq {
                if command.seq() != last && !is_newer(command.seq(), last) {
                    self.last_seq = None;
                    self.stats.restarts += 1;
                    event = Some(LinkEvent::Connected);
                }
            }
        } else {
            if let Some(last) = self.last_seq {
                if !is_newer(command.seq(), last) {
                    self.stats.stale += 1;
                    return Err(SequenceError::Stale {
                        seq: command.seq(),
                        last,
                    });
                }
            }
            self.last_seq = Some(command.seq());
        }

        self.stats.accepted += 1;
        self.last_valid = Some(now);
        Ok(event)
    }

    /// Transition to Disconnected once the timeout has elapsed without an
    /// accepted frame. Reports `Lost` exactly once per session.
    pub fn check_liveness(&mut self, now: Instant) -> Option<LinkEvent> {
        if self.state != LinkState::Connected {
            return None;
        }
        let last = self.last_valid?;
        if now.saturating_duration_since(last) > self.timeout {
            self.state = LinkState::Disconnected;
            self.stats.disconnects += 1;
            return Some(LinkEvent::Lost);
        }
        None
    }
}

/// Bounded FIFO of raw frames received between ticks.
///
/// Frames are only consumed at tick boundaries. When full, the oldest frame
/// is dropped so the freshest operator input survives.
#[derive(Debug)]
pub struct FrameQueue {
    frames: VecDeque<Vec<u8>>,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns true when an older frame had to be dropped to make room.
    pub fn push(&mut self, bytes: &[u8]) -> bool {
        let overflowed = self.frames.len() >= self.capacity;
        if overflowed {
            self.frames.pop_front();
        }
        self.frames.push_back(bytes.to_vec());
        overflowed
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.frames.drain(..)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
