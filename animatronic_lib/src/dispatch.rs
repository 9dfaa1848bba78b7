//! Command validation and dispatch into the motion engine.

use crate::{
    Command, CommandError, DispatchError, JawConfig, MotionEngine, Payload, SkeletonConfig,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const AXIS_LIMIT: i8 = 100;
pub const JAW_OPENING_LIMIT: u8 = 100;

/// A validated command, ready for the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Continuous { stick: u8, x: i8, y: i8 },
    StartGesture { gesture: u8 },
    CancelGesture { gesture: u8 },
    Jaw { channel: usize, angle: f64, priority: u8 },
    /// Heartbeat: liveness only
    Refresh,
    EmergencyStop,
    Unlock,
}

impl Action {
    /// Actions refused while the emergency stop is latched.
    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            Action::Continuous { .. }
                | Action::StartGesture { .. }
                | Action::CancelGesture { .. }
                | Action::Jaw { .. }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub dispatched: u64,
    pub validation_rejects: u64,
    pub priority_rejects: u64,
    pub latched_rejects: u64,
    pub emergency_stops: u64,
    pub unlocks: u64,
}

/// Range checks against the skeleton's configuration.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    sticks: Vec<u8>,
    gestures: Vec<u8>,
    jaw: Option<JawConfig>,
}

impl CommandValidator {
    pub fn new(config: &SkeletonConfig) -> Self {
        let mut sticks: Vec<u8> = config.axes.iter().map(|b| b.stick).collect();
        sticks.sort_unstable();
        sticks.dedup();

        Self {
            sticks,
            gestures: config.gestures.iter().map(|g| g.id).collect(),
            jaw: config.jaw.clone(),
        }
    }

    pub fn validate(&self, command: &Command) -> Result<Action, ValidationError> {
        match *command.payload() {
            Payload::MoveAxis { stick, x, y } => {
                if !self.sticks.contains(&stick) {
                    return Err(ValidationError::OutOfRange {
                        field: "stick",
                        value: i32::from(stick),
                    });
                }
                Ok(Action::Continuous {
                    stick,
                    x: x.clamp(-AXIS_LIMIT, AXIS_LIMIT),
                    y: y.clamp(-AXIS_LIMIT, AXIS_LIMIT),
                })
            }
            Payload::TriggerGesture { gesture } => {
                self.check_gesture(gesture)?;
                Ok(Action::StartGesture { gesture })
            }
            Payload::CancelGesture { gesture } => {
                self.check_gesture(gesture)?;
                Ok(Action::CancelGesture { gesture })
            }
            Payload::SetJaw { opening } => {
                let jaw = self.jaw.as_ref().ok_or(ValidationError::NotConfigured("jaw"))?;
                if opening > JAW_OPENING_LIMIT {
                    return Err(ValidationError::OutOfRange {
                        field: "jaw_opening",
                        value: i32::from(opening),
                    });
                }
                Ok(Action::Jaw {
                    channel: jaw.channel,
                    angle: jaw.angle_for(opening),
                    priority: jaw.priority,
                })
            }
            Payload::Heartbeat => Ok(Action::Refresh),
            Payload::EmergencyStop => Ok(Action::EmergencyStop),
            Payload::Unlock => Ok(Action::Unlock),
        }
    }

    fn check_gesture(&self, gesture: u8) -> Result<(), ValidationError> {
        if self.gestures.contains(&gesture) {
            Ok(())
        } else {
            Err(ValidationError::UnknownGesture(gesture))
        }
    }
}

/// Validates commands, applies the emergency-stop latch and drives the engine.
pub struct Dispatcher {
    validator: CommandValidator,
    latched: bool,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(config: &SkeletonConfig) -> Self {
        Self {
            validator: CommandValidator::new(config),
            latched: false,
            stats: DispatchStats::default(),
        }
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn dispatch(
        &mut self,
        command: &Command,
        engine: &mut MotionEngine,
    ) -> Result<Action, CommandError> {
        let result = self.apply(command, engine);
        match &result {
            Ok(_) => self.stats.dispatched += 1,
            Err(CommandError::Validation(_)) => self.stats.validation_rejects += 1,
            Err(CommandError::Dispatch(DispatchError::LowerPriority { .. })) => {
                self.stats.priority_rejects += 1
            }
            Err(CommandError::Dispatch(DispatchError::Latched)) => {
                self.stats.latched_rejects += 1
            }
        }
        result
    }

    /// Latch the emergency stop and send every channel home. A stop while
    /// already latched is a no-op.
    pub fn latch(&mut self, engine: &mut MotionEngine) {
        if self.latched {
            return;
        }
        warn!("Emergency stop latched, returning to idle");
        self.latched = true;
        self.stats.emergency_stops += 1;
        engine.return_to_idle();
    }

    fn apply(&mut self, command: &Command, engine: &mut MotionEngine) -> Result<Action, CommandError> {
        let action = self.validator.validate(command)?;
        if self.latched && action.is_motion() {
            return Err(DispatchError::Latched.into());
        }

        match action {
            Action::Continuous { stick, x, y } => engine.set_continuous(stick, x, y)?,
            Action::StartGesture { gesture } => {
                engine.start_gesture(gesture)?;
            }
            Action::CancelGesture { gesture } => {
                engine.cancel_gesture(gesture);
            }
            Action::Jaw {
                channel,
                angle,
                priority,
            } => engine.set_direct(channel, angle, priority)?,
            Action::Refresh => {}
            Action::EmergencyStop => self.latch(engine),
            Action::Unlock => {
                if self.latched {
                    info!("Emergency stop released");
                    self.latched = false;
                    self.stats.unlocks += 1;
                }
            }
        }
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnimationKind, BLINK_GESTURE, JAW, WAVE_GESTURE};

    fn setup() -> (Dispatcher, MotionEngine) {
        let config = SkeletonConfig::default();
        (Dispatcher::new(&config), MotionEngine::new(&config))
    }

    #[test]
    fn test_axis_values_clamped() {
        let validator = CommandValidator::new(&SkeletonConfig::default());
        let action = validator.validate(&Command::move_axis(1, 0, 127, -128)).unwrap();
        assert_eq!(
            action,
            Action::Continuous {
                stick: 0,
                x: 100,
                y: -100
            }
        );
    }

    #[test]
    fn test_validation_rejections() {
        let validator = CommandValidator::new(&SkeletonConfig::default());

        assert_eq!(
            validator.validate(&Command::move_axis(1, 7, 0, 0)),
            Err(ValidationError::OutOfRange {
                field: "stick",
                value: 7
            })
        );
        assert_eq!(
            validator.validate(&Command::set_jaw(2, 101)),
            Err(ValidationError::OutOfRange {
                field: "jaw_opening",
                value: 101
            })
        );
        assert_eq!(
            validator.validate(&Command::trigger_gesture(3, 99)),
            Err(ValidationError::UnknownGesture(99))
        );
    }

    #[test]
    fn test_jaw_not_configured() {
        let mut config = SkeletonConfig::default();
        config.jaw = None;
        let validator = CommandValidator::new(&config);
        assert_eq!(
            validator.validate(&Command::set_jaw(1, 50)),
            Err(ValidationError::NotConfigured("jaw"))
        );
    }

    #[test]
    fn test_set_jaw_maps_opening() {
        let (mut dispatcher, mut engine) = setup();
        let action = dispatcher.dispatch(&Command::set_jaw(1, 100), &mut engine).unwrap();
        assert_eq!(
            action,
            Action::Jaw {
                channel: JAW,
                angle: 30.0,
                priority: 2
            }
        );
        assert!(engine.is_playing(AnimationKind::Direct { channel: JAW }));
    }

    #[test]
    fn test_emergency_stop_latches_until_unlock() {
        let (mut dispatcher, mut engine) = setup();
        dispatcher
            .dispatch(&Command::trigger_gesture(1, WAVE_GESTURE), &mut engine)
            .unwrap();

        dispatcher
            .dispatch(&Command::new(2, Payload::EmergencyStop), &mut engine)
            .unwrap();
        assert!(dispatcher.is_latched());
        assert!(engine.is_playing(AnimationKind::ReturnToIdle));
        assert!(!engine.is_playing(AnimationKind::Gesture { id: WAVE_GESTURE }));

        let err = dispatcher
            .dispatch(&Command::trigger_gesture(3, BLINK_GESTURE), &mut engine)
            .unwrap_err();
        assert_eq!(err, CommandError::Dispatch(DispatchError::Latched));
        assert!(dispatcher.dispatch(&Command::heartbeat(3), &mut engine).is_ok());

        // Second stop does not restart the glide home
        dispatcher
            .dispatch(&Command::new(4, Payload::EmergencyStop), &mut engine)
            .unwrap();
        assert_eq!(dispatcher.stats().emergency_stops, 1);

        dispatcher
            .dispatch(&Command::new(5, Payload::Unlock), &mut engine)
            .unwrap();
        assert!(!dispatcher.is_latched());
        assert_eq!(dispatcher.stats().latched_rejects, 1);
        assert_eq!(dispatcher.stats().unlocks, 1);
    }

    #[test]
    fn test_stats_track_rejections() {
        let (mut dispatcher, mut engine) = setup();
        dispatcher.dispatch(&Command::set_jaw(1, 200), &mut engine).unwrap_err();
        dispatcher
            .dispatch(&Command::trigger_gesture(2, 3), &mut engine)
            .unwrap();
        // Jaw emergency close (priority 3) holds the jaw
        dispatcher.dispatch(&Command::set_jaw(3, 10), &mut engine).unwrap_err();

        let stats = dispatcher.stats();
        assert_eq!(stats.validation_rejects, 1);
        assert_eq!(stats.priority_rejects, 1);
        assert_eq!(stats.dispatched, 1);
    }
}
