use crate::{GestureDefinition, Interpolation, Keyframe};
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::time::Duration;

/// Priority reserved for the synthetic return-to-idle animation.
pub const RETURN_TO_IDLE_PRIORITY: u8 = u8::MAX;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub channel_count: usize,
    #[serde(default)]
    pub channel_names: Vec<String>,
    pub resting_angles: Vec<f64>,
    /// Degrees per second, one per channel
    pub velocity_limits: Vec<f64>,
    /// Optional `[min, max]` per channel, defaults to `[0, 180]`
    #[serde(default)]
    pub angle_limits: Vec<[f64; 2]>,
    pub disconnect_timeout_ms: u64,
    pub tick_hz: u32,
    #[serde(default = "default_return_to_idle_ms")]
    pub return_to_idle_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub latch_on_disconnect: bool,
    #[serde(default = "default_continuous_priority")]
    pub continuous_priority: u8,
    #[serde(default = "default_telemetry_every_ticks")]
    pub telemetry_every_ticks: u32,
    #[serde(default)]
    pub axes: Vec<AxisBinding>,
    #[serde(default)]
    pub jaw: Option<JawConfig>,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub gestures: Vec<GestureDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

/// Maps one joystick axis onto one channel: `resting + value * degrees_per_unit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisBinding {
    pub stick: u8,
    pub axis: Axis,
    pub channel: usize,
    pub degrees_per_unit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JawConfig {
    pub channel: usize,
    pub closed_angle: f64,
    pub open_angle: f64,
    #[serde(default = "default_jaw_priority")]
    pub priority: u8,
}

impl JawConfig {
    pub fn angle_for(&self, opening_percent: u8) -> f64 {
        let fraction = f64::from(opening_percent.min(100)) / 100.0;
        self.closed_angle + (self.open_angle - self.closed_angle) * fraction
    }
}

/// PCA9685 timing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub pwm_frequency_hz: f64,
    pub min_pulse_us: f64,
    pub max_pulse_us: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            pwm_frequency_hz: 50.0,
            min_pulse_us: 500.0,
            max_pulse_us: 2500.0,
        }
    }
}

fn default_name() -> String {
    "skeleton".to_string()
}

fn default_return_to_idle_ms() -> u64 {
    1000
}

fn default_queue_capacity() -> usize {
    32
}

fn default_continuous_priority() -> u8 {
    1
}

fn default_telemetry_every_ticks() -> u32 {
    25
}

fn default_jaw_priority() -> u8 {
    2
}

impl SkeletonConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SkeletonConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let count = self.channel_count;
        if count == 0 {
            return Err(eyre::eyre!("channel_count must be at least 1"));
        }
        if self.tick_hz == 0 {
            return Err(eyre::eyre!("tick_hz must be positive"));
        }
        if self.disconnect_timeout_ms == 0 || self.return_to_idle_ms == 0 {
            return Err(eyre::eyre!(
                "disconnect_timeout_ms and return_to_idle_ms must be positive"
            ));
        }
        if self.queue_capacity == 0 {
            return Err(eyre::eyre!("queue_capacity must be positive"));
        }

        for (field, len) in [
            ("resting_angles", self.resting_angles.len()),
            ("velocity_limits", self.velocity_limits.len()),
        ] {
            if len != count {
                return Err(eyre::eyre!(
                    "{} count ({}) doesn't match channel_count ({})",
                    field,
                    len,
                    count
                ));
            }
        }
        for (field, len) in [
            ("channel_names", self.channel_names.len()),
            ("angle_limits", self.angle_limits.len()),
        ] {
            if len != 0 && len != count {
                return Err(eyre::eyre!(
                    "{} count ({}) doesn't match channel_count ({})",
                    field,
                    len,
                    count
                ));
            }
        }

        for channel in 0..count {
            let (min, max) = self.angle_limits_for(channel);
            if !(min < max) {
                return Err(eyre::eyre!(
                    "Channel {} angle limits [{:.1}, {:.1}] are inverted",
                    channel,
                    min,
                    max
                ));
            }
            let resting = self.resting_angles[channel];
            if !(min..=max).contains(&resting) {
                return Err(eyre::eyre!(
                    "Channel {} resting angle {:.1} outside limits [{:.1}, {:.1}]",
                    channel,
                    resting,
                    min,
                    max
                ));
            }
            let limit = self.velocity_limits[channel];
            if !(limit.is_finite() && limit > 0.0) {
                return Err(eyre::eyre!(
                    "Channel {} velocity limit {} must be positive",
                    channel,
                    limit
                ));
            }
        }

        if self.continuous_priority == RETURN_TO_IDLE_PRIORITY {
            return Err(eyre::eyre!("continuous_priority 255 is reserved"));
        }

        let mut bound = HashSet::new();
        for binding in &self.axes {
            if binding.channel >= count {
                return Err(eyre::eyre!(
                    "Axis binding targets channel {} but only {} channels exist",
                    binding.channel,
                    count
                ));
            }
            if !bound.insert(binding.channel) {
                return Err(eyre::eyre!(
                    "Channel {} is bound to more than one joystick axis",
                    binding.channel
                ));
            }
            if !binding.degrees_per_unit.is_finite() {
                return Err(eyre::eyre!(
                    "Axis binding for channel {} has a non-finite scale",
                    binding.channel
                ));
            }
        }

        if let Some(jaw) = &self.jaw {
            if jaw.channel >= count {
                return Err(eyre::eyre!("Jaw channel {} out of range", jaw.channel));
            }
            if jaw.priority == RETURN_TO_IDLE_PRIORITY {
                return Err(eyre::eyre!("Jaw priority 255 is reserved"));
            }
            if !(jaw.closed_angle.is_finite() && jaw.open_angle.is_finite()) {
                return Err(eyre::eyre!(
                    "Jaw angles closed {} open {} must be finite",
                    jaw.closed_angle,
                    jaw.open_angle
                ));
            }
        }

        let mut ids = HashSet::new();
        for gesture in &self.gestures {
            if !ids.insert(gesture.id) {
                return Err(eyre::eyre!("Duplicate gesture id {}", gesture.id));
            }
            if gesture.priority == RETURN_TO_IDLE_PRIORITY {
                return Err(eyre::eyre!(
                    "Gesture '{}' uses reserved priority 255",
                    gesture.name
                ));
            }
            if gesture.keyframes.is_empty() {
                return Err(eyre::eyre!("Gesture '{}' has no keyframes", gesture.name));
            }
            for (index, keyframe) in gesture.keyframes.iter().enumerate() {
                if keyframe.hold_ms == 0 {
                    return Err(eyre::eyre!(
                        "Gesture '{}' keyframe {} has zero hold_ms",
                        gesture.name,
                        index
                    ));
                }
                for target in &keyframe.targets {
                    if target.channel >= count || !target.angle.is_finite() {
                        return Err(eyre::eyre!(
                            "Gesture '{}' keyframe {} has invalid target channel {} angle {}",
                            gesture.name,
                            index,
                            target.channel,
                            target.angle
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn angle_limits_for(&self, channel: usize) -> (f64, f64) {
        self.angle_limits
            .get(channel)
            .map(|[min, max]| (*min, *max))
            .unwrap_or((0.0, 180.0))
    }

    pub fn channel_name(&self, channel: usize) -> String {
        self.channel_names
            .get(channel)
            .cloned()
            .unwrap_or_else(|| format!("ch{}", channel))
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }

    pub fn return_to_idle(&self) -> Duration {
        Duration::from_millis(self.return_to_idle_ms)
    }

    pub fn gesture(&self, id: u8) -> Option<&GestureDefinition> {
        self.gestures.iter().find(|g| g.id == id)
    }

    pub fn gesture_by_name(&self, name: &str) -> Option<&GestureDefinition> {
        self.gestures.iter().find(|g| g.name == name)
    }
}

// Channel layout of the ten-servo skeleton
pub const EYE_H: usize = 0;
pub const EYE_V: usize = 1;
pub const EYE_BLINK: usize = 2;
pub const NECK_LR: usize = 3;
pub const NECK_UD: usize = 4;
pub const JAW: usize = 5;
pub const TORSO: usize = 6;
pub const WAVE1: usize = 7;
pub const WAVE2: usize = 8;
pub const WAVE3: usize = 9;

pub const BLINK_GESTURE: u8 = 1;
pub const WAVE_GESTURE: u8 = 2;
pub const JAW_EMERGENCY_CLOSE_GESTURE: u8 = 3;

impl Default for SkeletonConfig {
    fn default() -> Self {
        let names = [
            "eye_h", "eye_v", "eye_blink", "neck_lr", "neck_ud", "jaw", "torso", "wave1",
            "wave2", "wave3",
        ];

        Self {
            name: default_name(),
            channel_count: names.len(),
            channel_names: names.iter().map(|n| n.to_string()).collect(),
            resting_angles: vec![90.0; names.len()],
            velocity_limits: vec![
                240.0, 240.0, 720.0, 90.0, 90.0, 180.0, 60.0, 180.0, 180.0, 180.0,
            ],
            angle_limits: Vec::new(),
            disconnect_timeout_ms: 4000,
            tick_hz: 50,
            return_to_idle_ms: default_return_to_idle_ms(),
            queue_capacity: default_queue_capacity(),
            latch_on_disconnect: false,
            continuous_priority: default_continuous_priority(),
            telemetry_every_ticks: default_telemetry_every_ticks(),
            axes: vec![
                AxisBinding { stick: 0, axis: Axis::X, channel: EYE_H, degrees_per_unit: 0.9 },
                AxisBinding { stick: 0, axis: Axis::Y, channel: EYE_V, degrees_per_unit: 0.9 },
                AxisBinding { stick: 0, axis: Axis::X, channel: NECK_LR, degrees_per_unit: 0.9 },
                AxisBinding { stick: 0, axis: Axis::Y, channel: NECK_UD, degrees_per_unit: 0.9 },
                AxisBinding { stick: 1, axis: Axis::X, channel: TORSO, degrees_per_unit: 0.9 },
            ],
            jaw: Some(JawConfig {
                channel: JAW,
                closed_angle: 90.0,
                open_angle: 30.0,
                priority: default_jaw_priority(),
            }),
            driver: DriverConfig::default(),
            gestures: vec![
                GestureDefinition {
                    id: BLINK_GESTURE,
                    name: "blink".to_string(),
                    priority: 2,
                    loops: 1,
                    keyframes: vec![Keyframe::new(150, Interpolation::Step, &[(EYE_BLINK, 0.0)])],
                },
                GestureDefinition {
                    id: WAVE_GESTURE,
                    name: "wave".to_string(),
                    priority: 2,
                    loops: 0,
                    keyframes: vec![
                        Keyframe::new(
                            200,
                            Interpolation::Linear,
                            &[(WAVE1, 60.0), (WAVE2, 120.0), (WAVE3, 90.0)],
                        ),
                        Keyframe::new(
                            200,
                            Interpolation::Linear,
                            &[(WAVE1, 120.0), (WAVE2, 60.0), (WAVE3, 90.0)],
                        ),
                    ],
                },
                GestureDefinition {
                    id: JAW_EMERGENCY_CLOSE_GESTURE,
                    name: "jaw_emergency_close".to_string(),
                    priority: 3,
                    loops: 1,
                    keyframes: vec![Keyframe::new(300, Interpolation::Step, &[(JAW, 90.0)])],
                },
            ],
        }
    }
}
