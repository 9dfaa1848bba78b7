use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const ADC_CENTER: i32 = 2048;
pub const ADC_DEADZONE: i32 = 50;
pub const ADC_MAX: u16 = 4095;

/// Map a 12-bit joystick ADC reading to an axis value in [-100, 100].
/// Readings within the deadzone around centre report 0.
pub fn axis_from_adc(raw: u16) -> i8 {
    let offset = i32::from(raw.min(ADC_MAX)) - ADC_CENTER;
    if offset.abs() < ADC_DEADZONE {
        return 0;
    }
    let span = if offset > 0 {
        i32::from(ADC_MAX) - ADC_CENTER
    } else {
        ADC_CENTER
    };
    (offset * 100 / span).clamp(-100, 100) as i8
}

/// Raw reading of one thumb stick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickReading {
    pub x: u16,
    pub y: u16,
    /// Button level, true while held down
    #[serde(default)]
    pub pressed: bool,
}

impl StickReading {
    pub fn centred() -> Self {
        Self {
            x: ADC_CENTER as u16,
            y: ADC_CENTER as u16,
            pressed: false,
        }
    }
}

/// One sample of both sticks, as produced by the ADC reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoystickSample {
    pub left: StickReading,
    pub right: StickReading,
}

impl Default for JoystickSample {
    fn default() -> Self {
        Self {
            left: StickReading::centred(),
            right: StickReading::centred(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    Pressed,
    Released,
}

/// Push button with contact-bounce suppression: a level change is accepted
/// only once the debounce window has passed since the previous accepted one.
#[derive(Debug, Clone)]
pub struct DebouncedButton {
    debounce: Duration,
    stable: bool,
    raw: bool,
    last_change: Option<Instant>,
}

impl DebouncedButton {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            stable: false,
            raw: false,
            last_change: None,
        }
    }

    pub fn update(&mut self, pressed: bool, now: Instant) -> Option<ButtonEdge> {
        self.raw = pressed;
        if pressed == self.stable {
            return None;
        }
        if let Some(last) = self.last_change {
            if now.saturating_duration_since(last) <= self.debounce {
                return None;
            }
        }

        self.stable = pressed;
        self.last_change = Some(now);
        Some(if pressed {
            ButtonEdge::Pressed
        } else {
            ButtonEdge::Released
        })
    }

    /// Debounced level
    pub fn is_pressed(&self) -> bool {
        self.stable
    }

    /// Last sampled level, possibly still bouncing
    pub fn raw(&self) -> bool {
        self.raw
    }
}

/// Detects N presses within a sliding window.
#[derive(Debug, Clone)]
pub struct UnlockCombo {
    clicks: usize,
    window: Duration,
    presses: Vec<Instant>,
}

impl UnlockCombo {
    pub fn new(clicks: usize, window: Duration) -> Self {
        Self {
            clicks: clicks.max(1),
            window,
            presses: Vec::new(),
        }
    }

    /// Record a press. Returns true, and starts over, once enough presses
    /// fall within the window.
    pub fn register(&mut self, now: Instant) -> bool {
        self.presses.push(now);
        let window = self.window;
        self.presses
            .retain(|&at| now.saturating_duration_since(at) < window);
        if self.presses.len() >= self.clicks {
            self.presses.clear();
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.presses.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn test_axis_mapping() {
        assert_eq!(axis_from_adc(2048), 0);
        assert_eq!(axis_from_adc(2048 + 49), 0);
        assert_eq!(axis_from_adc(2048 - 49), 0);
        assert_eq!(axis_from_adc(4095), 100);
        assert_eq!(axis_from_adc(0), -100);
        assert_eq!(axis_from_adc(u16::MAX), 100);
        assert_eq!(axis_from_adc(3071), 49);
        assert_eq!(axis_from_adc(1024), -50);
    }

    #[test]
    fn test_button_bounce_suppressed() {
        let base = Instant::now();
        let mut button = DebouncedButton::new(Duration::from_millis(40));

        assert_eq!(button.update(true, base), Some(ButtonEdge::Pressed));
        // Contact bounce inside the window
        assert_eq!(button.update(false, at(base, 5)), None);
        assert!(!button.raw());
        assert!(button.is_pressed());
        assert_eq!(button.update(true, at(base, 10)), None);

        assert_eq!(button.update(false, at(base, 100)), Some(ButtonEdge::Released));
        assert_eq!(button.update(false, at(base, 150)), None);
    }

    #[test]
    fn test_unlock_combo_window() {
        let base = Instant::now();
        let mut combo = UnlockCombo::new(3, Duration::from_millis(2000));

        assert!(!combo.register(base));
        assert!(!combo.register(at(base, 500)));
        assert!(combo.register(at(base, 1000)));

        // Too slow: first click has expired by the third
        assert!(!combo.register(at(base, 5000)));
        assert!(!combo.register(at(base, 6500)));
        assert!(!combo.register(at(base, 7100)));
        assert!(combo.register(at(base, 7200)));
    }
}
