use super::input::{axis_from_adc, ButtonEdge, DebouncedButton, JoystickSample, UnlockCombo};
use crate::{Command, Payload, BLINK_GESTURE, WAVE_GESTURE};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Hand-held controller tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub heartbeat_interval_ms: u64,
    pub debounce_ms: u64,
    pub blink_gesture: u8,
    pub wave_gesture: u8,
    pub short_press_min_ms: u64,
    pub short_press_max_ms: u64,
    pub unlock_clicks: usize,
    pub unlock_window_ms: u64,
    /// Jaw opening sent when wave mode switches on
    pub jaw_open_percent: u8,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 1500,
            debounce_ms: 40,
            blink_gesture: BLINK_GESTURE,
            wave_gesture: WAVE_GESTURE,
            short_press_min_ms: 50,
            short_press_max_ms: 1000,
            unlock_clicks: 3,
            unlock_window_ms: 2000,
            jaw_open_percent: 100,
        }
    }
}

impl RemoteConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("HEARTBEAT_INTERVAL_MS") {
            config.heartbeat_interval_ms = val.parse().unwrap_or(config.heartbeat_interval_ms);
        }
        if let Ok(val) = std::env::var("DEBOUNCE_MS") {
            config.debounce_ms = val.parse().unwrap_or(config.debounce_ms);
        }
        if let Ok(val) = std::env::var("BLINK_GESTURE") {
            config.blink_gesture = val.parse().unwrap_or(config.blink_gesture);
        }
        if let Ok(val) = std::env::var("WAVE_GESTURE") {
            config.wave_gesture = val.parse().unwrap_or(config.wave_gesture);
        }

        config
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// Assigns wrapping sequence numbers. Heartbeats repeat the last issued
/// number instead of consuming one.
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    next: u16,
    last: Option<u16>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an arbitrary sequence number.
    pub fn starting_at(seq: u16) -> Self {
        Self {
            next: seq,
            last: None,
        }
    }

    pub fn issue(&mut self, payload: Payload) -> Command {
        if matches!(payload, Payload::Heartbeat) {
            return self.heartbeat();
        }
        let seq = self.next;
        self.next = self.next.wrapping_add(1);
        self.last = Some(seq);
        Command::new(seq, payload)
    }

    pub fn heartbeat(&self) -> Command {
        Command::heartbeat(self.last.unwrap_or(0))
    }

    pub fn last_issued(&self) -> Option<u16> {
        self.last
    }
}

/// Turns joystick samples into commands.
///
/// Left stick drives eyes and neck, right stick X drives the torso. Left
/// button blinks; a short press of the right button toggles wave mode.
/// Holding both buttons sends an emergency stop and locks the controller
/// until the left button is clicked three times.
pub struct RemoteController {
    config: RemoteConfig,
    sequencer: Sequencer,
    left: DebouncedButton,
    right: DebouncedButton,
    combo: UnlockCombo,
    locked: bool,
    stop_held: bool,
    wave_active: bool,
    right_pressed_at: Option<Instant>,
    last_heartbeat: Option<Instant>,
}

impl RemoteController {
    pub fn new(config: RemoteConfig) -> Self {
        let debounce = Duration::from_millis(config.debounce_ms);
        Self {
            left: DebouncedButton::new(debounce),
            right: DebouncedButton::new(debounce),
            combo: UnlockCombo::new(
                config.unlock_clicks,
                Duration::from_millis(config.unlock_window_ms),
            ),
            sequencer: Sequencer::new(),
            locked: false,
            stop_held: false,
            wave_active: false,
            right_pressed_at: None,
            last_heartbeat: None,
            config,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn wave_active(&self) -> bool {
        self.wave_active
    }

    pub fn sample(&mut self, sample: &JoystickSample, now: Instant) -> Vec<Command> {
        let mut commands = Vec::new();
        let left_edge = self.left.update(sample.left.pressed, now);
        let right_edge = self.right.update(sample.right.pressed, now);

        if sample.left.pressed && sample.right.pressed {
            if !self.stop_held {
                warn!("Both buttons held, sending emergency stop");
                self.stop_held = true;
                commands.push(self.emergency_stop());
            }
            return commands;
        }
        self.stop_held = false;

        if self.locked {
            if left_edge == Some(ButtonEdge::Pressed) && self.combo.register(now) {
                info!("Unlock combo entered");
                self.locked = false;
                commands.push(self.sequencer.issue(Payload::Unlock));
            }
            return commands;
        }

        for (stick, reading) in [(0u8, sample.left), (1u8, sample.right)] {
            commands.push(self.sequencer.issue(Payload::MoveAxis {
                stick,
                x: axis_from_adc(reading.x),
                y: axis_from_adc(reading.y),
            }));
        }

        if left_edge == Some(ButtonEdge::Pressed) {
            commands.push(self.sequencer.issue(Payload::TriggerGesture {
                gesture: self.config.blink_gesture,
            }));
        }

        match right_edge {
            Some(ButtonEdge::Pressed) => self.right_pressed_at = Some(now),
            Some(ButtonEdge::Released) => {
                if let Some(pressed_at) = self.right_pressed_at.take() {
                    let held = now.saturating_duration_since(pressed_at);
                    if self.is_short_press(held) {
                        self.toggle_wave(&mut commands);
                    }
                }
            }
            None => {}
        }

        commands
    }

    /// Lock the controller and issue an emergency stop, e.g. on shutdown.
    pub fn emergency_stop(&mut self) -> Command {
        self.locked = true;
        self.wave_active = false;
        self.right_pressed_at = None;
        self.combo.reset();
        self.sequencer.issue(Payload::EmergencyStop)
    }

    /// Heartbeat when the interval has passed since the last one.
    pub fn poll(&mut self, now: Instant) -> Option<Command> {
        if let Some(last) = self.last_heartbeat {
            if now.saturating_duration_since(last) < self.config.heartbeat_interval() {
                return None;
            }
        }
        self.last_heartbeat = Some(now);
        Some(self.sequencer.heartbeat())
    }

    fn is_short_press(&self, held: Duration) -> bool {
        let min = Duration::from_millis(self.config.short_press_min_ms);
        let max = Duration::from_millis(self.config.short_press_max_ms);
        held >= min && held <= max
    }

    fn toggle_wave(&mut self, commands: &mut Vec<Command>) {
        self.wave_active = !self.wave_active;
        let gesture = self.config.wave_gesture;
        info!("Wave {}", if self.wave_active { "ON" } else { "OFF" });

        if self.wave_active {
            commands.push(self.sequencer.issue(Payload::TriggerGesture { gesture }));
            commands.push(self.sequencer.issue(Payload::SetJaw {
                opening: self.config.jaw_open_percent,
            }));
        } else {
            commands.push(self.sequencer.issue(Payload::CancelGesture { gesture }));
            commands.push(self.sequencer.issue(Payload::SetJaw { opening: 0 }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommandKind, StickReading};

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    fn sample(left: bool, right: bool) -> JoystickSample {
        JoystickSample {
            left: StickReading {
                pressed: left,
                ..StickReading::centred()
            },
            right: StickReading {
                pressed: right,
                ..StickReading::centred()
            },
        }
    }

    fn kinds(commands: &[Command]) -> Vec<CommandKind> {
        commands.iter().map(|c| c.kind()).collect()
    }

    #[test]
    fn test_sequencer_wraps_and_heartbeat_repeats() {
        let mut seq = Sequencer::starting_at(u16::MAX);
        assert_eq!(seq.heartbeat().seq(), 0);

        assert_eq!(seq.issue(Payload::Unlock).seq(), u16::MAX);
        assert_eq!(seq.issue(Payload::Heartbeat).seq(), u16::MAX);
        assert_eq!(seq.issue(Payload::Unlock).seq(), 0);
        assert_eq!(seq.last_issued(), Some(0));
    }

    #[test]
    fn test_sticks_sent_every_sample() {
        let mut remote = RemoteController::new(RemoteConfig::default());
        let mut input = JoystickSample::default();
        input.left.x = 4095;

        let commands = remote.sample(&input, Instant::now());
        assert_eq!(commands.len(), 2);
        assert_eq!(*commands[0].payload(), Payload::MoveAxis { stick: 0, x: 100, y: 0 });
        assert_eq!(*commands[1].payload(), Payload::MoveAxis { stick: 1, x: 0, y: 0 });
        assert_eq!(commands[1].seq(), commands[0].seq() + 1);
    }

    #[test]
    fn test_left_press_blinks() {
        let base = Instant::now();
        let mut remote = RemoteController::new(RemoteConfig::default());

        let commands = remote.sample(&sample(true, false), base);
        assert_eq!(
            *commands[2].payload(),
            Payload::TriggerGesture { gesture: BLINK_GESTURE }
        );
        // Holding does not repeat
        assert_eq!(remote.sample(&sample(true, false), at(base, 50)).len(), 2);
    }

    #[test]
    fn test_short_press_toggles_wave() {
        let base = Instant::now();
        let mut remote = RemoteController::new(RemoteConfig::default());

        remote.sample(&sample(false, true), base);
        let on = remote.sample(&sample(false, false), at(base, 200));
        assert_eq!(
            &kinds(&on)[2..],
            &[CommandKind::TriggerGesture, CommandKind::SetJaw]
        );
        assert_eq!(*on[3].payload(), Payload::SetJaw { opening: 100 });
        assert!(remote.wave_active());

        remote.sample(&sample(false, true), at(base, 400));
        let off = remote.sample(&sample(false, false), at(base, 600));
        assert_eq!(
            &kinds(&off)[2..],
            &[CommandKind::CancelGesture, CommandKind::SetJaw]
        );
        assert!(!remote.wave_active());

        // Long press is ignored
        remote.sample(&sample(false, true), at(base, 800));
        let long = remote.sample(&sample(false, false), at(base, 2500));
        assert_eq!(long.len(), 2);
        assert!(!remote.wave_active());
    }

    #[test]
    fn test_emergency_stop_locks_until_combo() {
        let base = Instant::now();
        let mut remote = RemoteController::new(RemoteConfig::default());

        let stop = remote.sample(&sample(true, true), base);
        assert_eq!(kinds(&stop), vec![CommandKind::EmergencyStop]);
        assert!(remote.sample(&sample(true, true), at(base, 50)).is_empty());
        assert!(remote.is_locked());

        // Sticks are ignored while locked
        assert!(remote.sample(&sample(false, false), at(base, 300)).is_empty());

        let mut pressed = Vec::new();
        for (i, t) in [400u64, 600, 800].iter().enumerate() {
            pressed.extend(remote.sample(&sample(true, false), at(base, *t)));
            assert_eq!(remote.is_locked(), i < 2);
            remote.sample(&sample(false, false), at(base, t + 100));
        }
        assert_eq!(kinds(&pressed), vec![CommandKind::Unlock]);
    }

    #[test]
    fn test_heartbeat_interval() {
        let base = Instant::now();
        let mut remote = RemoteController::new(RemoteConfig::default());

        assert!(remote.poll(base).is_some());
        assert!(remote.poll(at(base, 1000)).is_none());
        let heartbeat = remote.poll(at(base, 1500)).unwrap();
        assert!(heartbeat.is_heartbeat());
    }
}
