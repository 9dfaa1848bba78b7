use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a keyframe moves from its start angle to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Jump to the target at once (still velocity limited per channel)
    Step,
    #[default]
    Linear,
    /// Smoothstep: slow start and slow finish
    EaseInOut,
}

impl Interpolation {
    /// Map keyframe progress `t` in [0, 1] to blend factor in [0, 1].
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Interpolation::Step => 1.0,
            Interpolation::Linear => t,
            Interpolation::EaseInOut => t * t * (3.0 - 2.0 * t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTarget {
    pub channel: usize,
    pub angle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub targets: Vec<ChannelTarget>,
    pub hold_ms: u64,
    #[serde(default)]
    pub interpolation: Interpolation,
}

impl Keyframe {
    pub fn new(hold_ms: u64, interpolation: Interpolation, targets: &[(usize, f64)]) -> Self {
        Self {
            targets: targets
                .iter()
                .map(|&(channel, angle)| ChannelTarget { channel, angle })
                .collect(),
            hold_ms,
            interpolation,
        }
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn target_for(&self, channel: usize) -> Option<f64> {
        self.targets
            .iter()
            .find(|t| t.channel == channel)
            .map(|t| t.angle)
    }
}

/// A named, pre-authored multi-channel motion sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureDefinition {
    pub id: u8,
    pub name: String,
    pub priority: u8,
    /// Number of passes through the keyframes; 0 loops until cancelled
    #[serde(default = "default_loops")]
    pub loops: u32,
    pub keyframes: Vec<Keyframe>,
}

fn default_loops() -> u32 {
    1
}

impl GestureDefinition {
    /// Every channel touched by any keyframe, sorted and deduplicated.
    pub fn channels(&self) -> Vec<usize> {
        let mut channels: Vec<usize> = self
            .keyframes
            .iter()
            .flat_map(|k| k.targets.iter().map(|t| t.channel))
            .collect();
        channels.sort_unstable();
        channels.dedup();
        channels
    }

    pub fn is_looping(&self) -> bool {
        self.loops == 0
    }

    /// Duration of a single pass through the keyframes.
    pub fn pass_duration(&self) -> Duration {
        self.keyframes.iter().map(Keyframe::hold).sum()
    }
}
