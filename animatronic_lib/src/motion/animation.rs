use crate::{ChannelState, GestureDefinition};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest keyframe hold the engine will honour, so a malformed gesture
/// cannot stall the tick in the keyframe loop.
const MIN_HOLD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnimationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnimationKind {
    Gesture { id: u8 },
    /// Joystick-driven, one per stick
    Continuous { stick: u8 },
    /// Single-channel override such as the jaw
    Direct { channel: usize },
    ReturnToIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    /// Not owned; the channel settles toward its resting angle
    Idle,
    Animating { animation: AnimationId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    Started { id: AnimationId, kind: AnimationKind },
    Completed { id: AnimationId, kind: AnimationKind },
    Preempted { id: AnimationId, kind: AnimationKind, by: AnimationId },
    Cancelled { id: AnimationId, kind: AnimationKind },
}

/// Progress through a gesture's keyframes.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub keyframe: usize,
    pub elapsed: Duration,
    pub loops_done: u32,
    /// Setpoints at the start of the current keyframe, parallel to the
    /// animation's channel list
    pub start: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Motion {
    Gesture { index: usize, cursor: Cursor },
    /// Fixed setpoints, rewritten in place by later commands
    Hold,
    ReturnToIdle {
        from: Vec<f64>,
        elapsed: Duration,
        duration: Duration,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAnimation {
    pub(crate) id: AnimationId,
    pub(crate) kind: AnimationKind,
    pub(crate) priority: u8,
    pub(crate) channels: Vec<usize>,
    pub(crate) setpoints: Vec<f64>,
    pub(crate) motion: Motion,
}

impl ActiveAnimation {
    pub fn id(&self) -> AnimationId {
        self.id
    }

    pub fn kind(&self) -> AnimationKind {
        self.kind
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn channels(&self) -> &[usize] {
        &self.channels
    }

    /// Commanded angle per owned channel, before velocity limiting.
    pub fn setpoints(&self) -> &[f64] {
        &self.setpoints
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        match &self.motion {
            Motion::Gesture { cursor, .. } => Some(cursor),
            _ => None,
        }
    }

    /// Move the animation forward by `elapsed`, updating its setpoints.
    /// Returns true once the animation has run to completion.
    pub(crate) fn advance(
        &mut self,
        elapsed: Duration,
        gestures: &[GestureDefinition],
        channels: &[ChannelState],
    ) -> bool {
        match &mut self.motion {
            Motion::Hold => false,
            Motion::ReturnToIdle {
                from,
                elapsed: done,
                duration,
            } => {
                *done += elapsed;
                let t = if duration.is_zero() {
                    1.0
                } else {
                    (done.as_secs_f64() / duration.as_secs_f64()).min(1.0)
                };
                for (i, &channel) in self.channels.iter().enumerate() {
                    let resting = channels[channel].resting_angle;
                    self.setpoints[i] = from[i] + (resting - from[i]) * t;
                }
                *done >= *duration
            }
            Motion::Gesture { index, cursor } => match gestures.get(*index) {
                Some(gesture) => {
                    step_gesture(gesture, cursor, &self.channels, &mut self.setpoints, elapsed)
                }
                None => true,
            },
        }
    }
}

fn step_gesture(
    gesture: &GestureDefinition,
    cursor: &mut Cursor,
    channels: &[usize],
    setpoints: &mut [f64],
    elapsed: Duration,
) -> bool {
    if gesture.keyframes.is_empty() {
        return true;
    }

    cursor.elapsed += elapsed;
    loop {
        let keyframe = &gesture.keyframes[cursor.keyframe];
        let hold = keyframe.hold().max(MIN_HOLD);

        if cursor.elapsed < hold {
            let t = cursor.elapsed.as_secs_f64() / hold.as_secs_f64();
            let blend = keyframe.interpolation.apply(t);
            for (i, &channel) in channels.iter().enumerate() {
                if let Some(goal) = keyframe.target_for(channel) {
                    setpoints[i] = cursor.start[i] + (goal - cursor.start[i]) * blend;
                }
            }
            return false;
        }

        // Keyframe boundary: land on the target, carry the surplus over
        for (i, &channel) in channels.iter().enumerate() {
            if let Some(goal) = keyframe.target_for(channel) {
                setpoints[i] = goal;
            }
        }
        cursor.elapsed -= hold;
        cursor.keyframe += 1;

        if cursor.keyframe == gesture.keyframes.len() {
            cursor.loops_done = cursor.loops_done.saturating_add(1);
            if !gesture.is_looping() && cursor.loops_done >= gesture.loops {
                return true;
            }
            cursor.keyframe = 0;
        }
        cursor.start.copy_from_slice(setpoints);
    }
}
