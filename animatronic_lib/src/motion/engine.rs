use super::animation::Motion;
use crate::{
    ActiveAnimation, AnimationId, AnimationKind, Axis, AxisBinding, ChannelPhase, CommandError,
    Cursor, DispatchError, EngineEvent, GestureDefinition, HardwareError, ServoDriver,
    SkeletonConfig, ValidationError, RETURN_TO_IDLE_PRIORITY,
};
use std::time::Duration;
use tracing::debug;

/// Largest time step a single `advance` will integrate. A stalled tick loop
/// resumes from where it was instead of skipping whole keyframes.
const MAX_CATCH_UP_TICKS: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    pub index: usize,
    pub angle: f64,
    pub target: f64,
    /// Degrees per second
    pub velocity_limit: f64,
    pub resting_angle: f64,
    pub min_angle: f64,
    pub max_angle: f64,
}

impl ChannelState {
    fn set_target(&mut self, angle: f64) {
        self.target = angle.clamp(self.min_angle, self.max_angle);
    }

    /// Move toward the target by at most `max_step` degrees, never past it.
    fn step(&mut self, max_step: f64) {
        let diff = self.target - self.angle;
        if diff.abs() <= max_step {
            self.angle = self.target;
        } else {
            self.angle += max_step.copysign(diff);
        }
    }

    pub fn is_settled(&self) -> bool {
        self.angle == self.target
    }
}

/// Owns every channel and every running animation. Mutated only from the
/// actuator tick loop.
pub struct MotionEngine {
    channels: Vec<ChannelState>,
    owners: Vec<Option<AnimationId>>,
    animations: Vec<ActiveAnimation>,
    gestures: Vec<GestureDefinition>,
    axes: Vec<AxisBinding>,
    continuous_priority: u8,
    tick_hz: f64,
    max_elapsed: Duration,
    return_to_idle: Duration,
    next_id: u64,
    events: Vec<EngineEvent>,
}

impl MotionEngine {
    pub fn new(config: &SkeletonConfig) -> Self {
        let count = config.channel_count;
        let channels: Vec<ChannelState> = (0..count)
            .map(|index| {
                let (min_angle, max_angle) = config.angle_limits_for(index);
                let resting_angle = config
                    .resting_angles
                    .get(index)
                    .copied()
                    .unwrap_or(90.0)
                    .clamp(min_angle, max_angle);
                ChannelState {
                    index,
                    angle: resting_angle,
                    target: resting_angle,
                    velocity_limit: config.velocity_limits.get(index).copied().unwrap_or(90.0),
                    resting_angle,
                    min_angle,
                    max_angle,
                }
            })
            .collect();

        Self {
            owners: vec![None; count],
            channels,
            animations: Vec::new(),
            gestures: config.gestures.clone(),
            axes: config
                .axes
                .iter()
                .filter(|binding| binding.channel < count)
                .cloned()
                .collect(),
            continuous_priority: config.continuous_priority,
            tick_hz: f64::from(config.tick_hz.max(1)),
            max_elapsed: config.tick_period() * MAX_CATCH_UP_TICKS,
            return_to_idle: config.return_to_idle(),
            next_id: 0,
            events: Vec::new(),
        }
    }

    pub fn channels(&self) -> &[ChannelState] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelState> {
        self.channels.get(index)
    }

    pub fn angles(&self) -> Vec<f64> {
        self.channels.iter().map(|c| c.angle).collect()
    }

    pub fn animations(&self) -> &[ActiveAnimation] {
        &self.animations
    }

    pub fn channel_phase(&self, index: usize) -> Option<ChannelPhase> {
        let owner = self.owners.get(index)?;
        Some(match owner {
            Some(animation) => ChannelPhase::Animating {
                animation: *animation,
            },
            None => ChannelPhase::Idle,
        })
    }

    /// The animation currently owning `channel`, if any.
    pub fn owner(&self, channel: usize) -> Option<&ActiveAnimation> {
        let id = (*self.owners.get(channel)?)?;
        self.animations.iter().find(|a| a.id == id)
    }

    pub fn is_playing(&self, kind: AnimationKind) -> bool {
        self.animations.iter().any(|a| a.kind == kind)
    }

    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Start gesture `gesture_id` over the channels its keyframes touch.
    pub fn start_gesture(&mut self, gesture_id: u8) -> Result<AnimationId, CommandError> {
        let index = self
            .gestures
            .iter()
            .position(|g| g.id == gesture_id)
            .ok_or(ValidationError::UnknownGesture(gesture_id))?;
        let gesture = &self.gestures[index];
        let priority = gesture.priority;
        let channels = self.filter_channels(gesture.channels());
        let start = self.current_targets(&channels);

        let motion = Motion::Gesture {
            index,
            cursor: Cursor {
                keyframe: 0,
                elapsed: Duration::ZERO,
                loops_done: 0,
                start: start.clone(),
            },
        };
        let id = self.start(
            AnimationKind::Gesture { id: gesture_id },
            priority,
            channels,
            start,
            motion,
        )?;
        Ok(id)
    }

    /// Stop a running gesture and release its channels to idle. Returns
    /// false when the gesture was not running.
    pub fn cancel_gesture(&mut self, gesture_id: u8) -> bool {
        let kind = AnimationKind::Gesture { id: gesture_id };
        let Some(id) = self.find(kind) else {
            return false;
        };
        if self.remove(id).is_some() {
            self.events.push(EngineEvent::Cancelled { id, kind });
        }
        true
    }

    /// Apply joystick deflection for `stick`. Centring the stick releases
    /// the channels bound to it.
    pub fn set_continuous(&mut self, stick: u8, x: i8, y: i8) -> Result<(), DispatchError> {
        let kind = AnimationKind::Continuous { stick };
        let bindings: Vec<&AxisBinding> = self.axes.iter().filter(|b| b.stick == stick).collect();
        let targets: Vec<(usize, f64)> = bindings
            .iter()
            .map(|b| {
                let value = match b.axis {
                    Axis::X => x,
                    Axis::Y => y,
                };
                let resting = self.channels[b.channel].resting_angle;
                (b.channel, resting + f64::from(value) * b.degrees_per_unit)
            })
            .collect();

        let existing = self.find(kind);
        if x == 0 && y == 0 {
            if let Some(id) = existing {
                if self.remove(id).is_some() {
                    self.events.push(EngineEvent::Completed { id, kind });
                }
            }
            return Ok(());
        }
        if targets.is_empty() {
            return Ok(());
        }

        if let Some(id) = existing {
            self.update_hold(id, &targets);
            return Ok(());
        }

        let (channels, setpoints): (Vec<usize>, Vec<f64>) = targets.into_iter().unzip();
        self.start(kind, self.continuous_priority, channels, setpoints, Motion::Hold)?;
        Ok(())
    }

    /// Hold a single channel at `angle`. The override stays in place until
    /// preempted or idled; later calls update it in place.
    pub fn set_direct(
        &mut self,
        channel: usize,
        angle: f64,
        priority: u8,
    ) -> Result<(), DispatchError> {
        if channel >= self.channels.len() {
            return Ok(());
        }
        let kind = AnimationKind::Direct { channel };
        if let Some(id) = self.find(kind) {
            self.update_hold(id, &[(channel, angle)]);
            return Ok(());
        }
        self.start(kind, priority, vec![channel], vec![angle], Motion::Hold)?;
        Ok(())
    }

    /// Preempt everything and glide every channel back to its resting angle.
    pub fn return_to_idle(&mut self) -> AnimationId {
        let id = self.allocate_id();
        let holders: Vec<AnimationId> = self.animations.iter().map(|a| a.id).collect();
        self.preempt(&holders, id);

        let channels: Vec<usize> = (0..self.channels.len()).collect();
        let from: Vec<f64> = self.channels.iter().map(|c| c.angle).collect();
        self.insert(ActiveAnimation {
            id,
            kind: AnimationKind::ReturnToIdle,
            priority: RETURN_TO_IDLE_PRIORITY,
            channels,
            setpoints: from.clone(),
            motion: Motion::ReturnToIdle {
                from,
                elapsed: Duration::ZERO,
                duration: self.return_to_idle,
            },
        });
        id
    }

    /// Advance every animation by `elapsed` and step each channel toward its
    /// target, limited to `velocity_limit / tick_hz` degrees.
    pub fn advance(&mut self, elapsed: Duration) {
        let elapsed = elapsed.min(self.max_elapsed);

        let mut finished = Vec::new();
        for animation in &mut self.animations {
            if animation.advance(elapsed, &self.gestures, &self.channels) {
                finished.push(animation.id);
            }
            for (&channel, &setpoint) in animation.channels.iter().zip(&animation.setpoints) {
                self.channels[channel].set_target(setpoint);
            }
        }

        for id in finished {
            if let Some(animation) = self.remove(id) {
                self.events.push(EngineEvent::Completed {
                    id,
                    kind: animation.kind,
                });
            }
        }

        for (channel, owner) in self.channels.iter_mut().zip(&self.owners) {
            if owner.is_none() {
                let resting = channel.resting_angle;
                channel.set_target(resting);
            }
            channel.step(channel.velocity_limit / self.tick_hz);
        }
    }

    /// Write every channel angle to the driver. A failing channel does not
    /// stop the remaining writes.
    pub fn write_outputs<D: ServoDriver + ?Sized>(&self, driver: &mut D) -> Vec<HardwareError> {
        self.channels
            .iter()
            .filter_map(|c| driver.set_channel_angle(c.index, c.angle).err())
            .collect()
    }

    fn start(
        &mut self,
        kind: AnimationKind,
        priority: u8,
        channels: Vec<usize>,
        setpoints: Vec<f64>,
        motion: Motion,
    ) -> Result<AnimationId, DispatchError> {
        let holders = self.holders(&channels);
        if let Some(holding) = holders.iter().filter_map(|id| self.priority_of(*id)).max() {
            if priority < holding {
                return Err(DispatchError::LowerPriority {
                    requested: priority,
                    holding,
                });
            }
        }

        let id = self.allocate_id();
        self.preempt(&holders, id);
        self.insert(ActiveAnimation {
            id,
            kind,
            priority,
            channels,
            setpoints,
            motion,
        });
        Ok(id)
    }

    fn insert(&mut self, animation: ActiveAnimation) {
        for &channel in &animation.channels {
            self.owners[channel] = Some(animation.id);
        }
        debug!(
            "Animation {:?} started at priority {} on channels {:?}",
            animation.kind, animation.priority, animation.channels
        );
        self.events.push(EngineEvent::Started {
            id: animation.id,
            kind: animation.kind,
        });
        self.animations.push(animation);
    }

    fn preempt(&mut self, holders: &[AnimationId], by: AnimationId) {
        for &id in holders {
            if let Some(animation) = self.remove(id) {
                self.events.push(EngineEvent::Preempted {
                    id,
                    kind: animation.kind,
                    by,
                });
            }
        }
    }

    fn remove(&mut self, id: AnimationId) -> Option<ActiveAnimation> {
        let position = self.animations.iter().position(|a| a.id == id)?;
        let animation = self.animations.remove(position);
        for &channel in &animation.channels {
            if self.owners[channel] == Some(id) {
                self.owners[channel] = None;
            }
        }
        Some(animation)
    }

    fn update_hold(&mut self, id: AnimationId, targets: &[(usize, f64)]) {
        if let Some(animation) = self.animations.iter_mut().find(|a| a.id == id) {
            for &(channel, angle) in targets {
                if let Some(i) = animation.channels.iter().position(|&c| c == channel) {
                    animation.setpoints[i] = angle;
                }
            }
        }
    }

    /// Distinct animations owning any of `channels`.
    fn holders(&self, channels: &[usize]) -> Vec<AnimationId> {
        let mut holders: Vec<AnimationId> = channels
            .iter()
            .filter_map(|&c| self.owners.get(c).copied().flatten())
            .collect();
        holders.sort_unstable();
        holders.dedup();
        holders
    }

    fn priority_of(&self, id: AnimationId) -> Option<u8> {
        self.animations
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.priority)
    }

    fn find(&self, kind: AnimationKind) -> Option<AnimationId> {
        self.animations.iter().find(|a| a.kind == kind).map(|a| a.id)
    }

    fn filter_channels(&self, mut channels: Vec<usize>) -> Vec<usize> {
        channels.retain(|&c| c < self.channels.len());
        channels
    }

    fn current_targets(&self, channels: &[usize]) -> Vec<f64> {
        channels.iter().map(|&c| self.channels[c].target).collect()
    }

    fn allocate_id(&mut self) -> AnimationId {
        self.next_id += 1;
        AnimationId(self.next_id)
    }
}
