//! Servo driver interface and PCA9685 timing.

use crate::{DriverConfig, HardwareError};
use serde::{Deserialize, Serialize};

/// PCA9685 internal oscillator frequency
pub const PCA9685_OSCILLATOR_HZ: f64 = 25_000_000.0;
/// 12-bit PWM counter resolution
pub const PCA9685_RESOLUTION: u16 = 4096;

/// Anything able to position N independent servo channels.
pub trait ServoDriver {
    fn set_channel_angle(&mut self, channel: usize, angle_degrees: f64)
        -> Result<(), HardwareError>;
}

/// Maps servo angles to pulse widths and PCA9685 duty counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Pca9685Timing {
    pub frequency_hz: f64,
    pub min_pulse_us: f64,
    pub max_pulse_us: f64,
}

impl Default for Pca9685Timing {
    fn default() -> Self {
        Self::from_config(&DriverConfig::default())
    }
}

impl Pca9685Timing {
    pub fn from_config(config: &DriverConfig) -> Self {
        Self {
            frequency_hz: config.pwm_frequency_hz,
            min_pulse_us: config.min_pulse_us,
            max_pulse_us: config.max_pulse_us,
        }
    }

    pub fn period_us(&self) -> f64 {
        1_000_000.0 / self.frequency_hz
    }

    /// Pulse width for `angle`, clamped to the servo's 0..=180 degree travel.
    pub fn pulse_width_us(&self, angle: f64) -> f64 {
        let angle = angle.clamp(0.0, 180.0);
        self.min_pulse_us + angle / 180.0 * (self.max_pulse_us - self.min_pulse_us)
    }

    /// OFF count for a channel whose ON count is zero.
    pub fn duty_ticks(&self, angle: f64) -> u16 {
        let ticks =
            self.pulse_width_us(angle) * f64::from(PCA9685_RESOLUTION) / self.period_us();
        (ticks.floor() as u16).min(PCA9685_RESOLUTION - 1)
    }

    /// PRE_SCALE register value for the configured frequency.
    pub fn prescale(&self) -> u8 {
        let value =
            (PCA9685_OSCILLATOR_HZ / (f64::from(PCA9685_RESOLUTION) * self.frequency_hz)).round()
                - 1.0;
        // Datasheet minimum is 3
        value.clamp(3.0, 255.0) as u8
    }
}

/// One tick's worth of servo output, published to the hardware bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServoFrame {
    pub angles: Vec<f64>,
    pub duty_ticks: Vec<u16>,
    pub prescale: u8,
    /// Timestamp in milliseconds since Unix epoch
    pub timestamp: i64,
}

/// Driver that keeps the latest angle and duty count per channel.
#[derive(Debug, Clone)]
pub struct FrameRecorder {
    timing: Pca9685Timing,
    angles: Vec<f64>,
    duty_ticks: Vec<u16>,
}

impl FrameRecorder {
    pub fn new(channel_count: usize, timing: Pca9685Timing) -> Self {
        let neutral = timing.duty_ticks(90.0);
        Self {
            timing,
            angles: vec![90.0; channel_count],
            duty_ticks: vec![neutral; channel_count],
        }
    }

    pub fn channel_count(&self) -> usize {
        self.angles.len()
    }

    pub fn timing(&self) -> &Pca9685Timing {
        &self.timing
    }

    pub fn frame(&self) -> ServoFrame {
        ServoFrame {
            angles: self.angles.clone(),
            duty_ticks: self.duty_ticks.clone(),
            prescale: self.timing.prescale(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl ServoDriver for FrameRecorder {
    fn set_channel_angle(&mut self, channel: usize, angle_degrees: f64) -> Result<(), HardwareError> {
        let available = self.angles.len();
        if channel >= available {
            return Err(HardwareError::NoSuchChannel { channel, available });
        }
        if !angle_degrees.is_finite() {
            return Err(HardwareError::Bus {
                channel,
                reason: format!("non-finite angle {}", angle_degrees),
            });
        }
        self.angles[channel] = angle_degrees;
        self.duty_ticks[channel] = self.timing.duty_ticks(angle_degrees);
        Ok(())
    }
}
