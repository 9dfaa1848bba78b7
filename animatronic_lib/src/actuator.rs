//! The skeleton-side tick loop.
//!
//! Each tick runs, in order: drain buffered frames (decode, link check,
//! dispatch), check link liveness, advance the motion engine, write every
//! channel to the servo driver. Nothing here blocks and no error stops the
//! tick.

use crate::{
    decode, Action, ActuatorTelemetry, AnimationSummary, CommandError, Dispatcher, EngineEvent,
    FrameQueue, HardwareError, LinkEvent, LinkSession, MotionEngine, ServoDriver, SkeletonConfig,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What happened during one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Raw frames drained from the queue
    pub frames: usize,
    /// Frames dropped by decoding or the sequence check
    pub dropped: usize,
    pub applied: Vec<Action>,
    pub rejected: Vec<CommandError>,
    pub link_events: Vec<LinkEvent>,
    pub events: Vec<EngineEvent>,
    pub hardware_faults: Vec<HardwareError>,
}

pub struct Actuator<D: ServoDriver> {
    engine: MotionEngine,
    dispatcher: Dispatcher,
    link: LinkSession,
    queue: FrameQueue,
    driver: D,
    tick_period: Duration,
    latch_on_disconnect: bool,
    last_tick: Option<Instant>,
    ticks: u64,
    hardware_faults: u64,
}

impl<D: ServoDriver> Actuator<D> {
    pub fn new(config: &SkeletonConfig, driver: D) -> Self {
        Self {
            engine: MotionEngine::new(config),
            dispatcher: Dispatcher::new(config),
            link: LinkSession::new(config.disconnect_timeout()),
            queue: FrameQueue::new(config.queue_capacity),
            driver,
            tick_period: config.tick_period(),
            latch_on_disconnect: config.latch_on_disconnect,
            last_tick: None,
            ticks: 0,
            hardware_faults: 0,
        }
    }

    /// Buffer a received frame until the next tick.
    pub fn receive(&mut self, bytes: &[u8]) {
        if self.queue.push(bytes) {
            self.link.record_queue_overflow();
            debug!("Receive queue full, dropped oldest frame");
        }
    }

    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        let frames: Vec<Vec<u8>> = self.queue.drain().collect();
        for bytes in frames {
            report.frames += 1;
            self.handle_frame(&bytes, now, &mut report);
        }

        if let Some(LinkEvent::Lost) = self.link.check_liveness(now) {
            warn!("Link lost, returning all channels to rest");
            report.link_events.push(LinkEvent::Lost);
            if self.latch_on_disconnect {
                self.dispatcher.latch(&mut self.engine);
            } else {
                self.engine.return_to_idle();
            }
        }

        let elapsed = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(self.tick_period);
        self.last_tick = Some(now);
        self.engine.advance(elapsed);

        report.events = self.engine.take_events();
        for event in &report.events {
            match event {
                EngineEvent::Preempted { kind, by, .. } => {
                    debug!("{:?} preempted by animation {:?}", kind, by)
                }
                EngineEvent::Completed { kind, .. } => debug!("{:?} completed", kind),
                EngineEvent::Cancelled { kind, .. } => debug!("{:?} cancelled", kind),
                EngineEvent::Started { .. } => {}
            }
        }

        report.hardware_faults = self.engine.write_outputs(&mut self.driver);
        for fault in &report.hardware_faults {
            warn!("Servo write failed: {}", fault);
        }
        self.hardware_faults += report.hardware_faults.len() as u64;
        self.ticks += 1;

        report
    }

    fn handle_frame(&mut self, bytes: &[u8], now: Instant, report: &mut TickReport) {
        let command = match decode(bytes) {
            Ok(command) => command,
            Err(e) => {
                debug!("Dropping frame: {}", e);
                self.link.record_decode_error(&e);
                report.dropped += 1;
                return;
            }
        };

        match self.link.accept(&command, now) {
            Ok(Some(event)) => {
                info!("Link connected at sequence {}", command.seq());
                report.link_events.push(event);
            }
            Ok(None) => {}
            Err(e) => {
                debug!("Dropping frame: {}", e);
                report.dropped += 1;
                return;
            }
        }

        match self.dispatcher.dispatch(&command, &mut self.engine) {
            Ok(action) => {
                if matches!(action, Action::EmergencyStop | Action::Unlock) {
                    info!("Applied {:?} (seq {})", action, command.seq());
                }
                report.applied.push(action);
            }
            Err(CommandError::Validation(e)) => {
                warn!("Rejected {:?} (seq {}): {}", command.kind(), command.seq(), e);
                report.rejected.push(e.into());
            }
            Err(e) => {
                debug!("Rejected {:?} (seq {}): {}", command.kind(), command.seq(), e);
                report.rejected.push(e);
            }
        }
    }

    pub fn telemetry(&self, session_id: &str) -> ActuatorTelemetry {
        ActuatorTelemetry {
            session_id: session_id.to_string(),
            link_state: self.link.state(),
            last_sequence: self.link.last_seq(),
            emergency_stop: self.dispatcher.is_latched(),
            link: self.link.stats().clone(),
            dispatch: self.dispatcher.stats().clone(),
            hardware_faults: self.hardware_faults,
            ticks: self.ticks,
            channel_angles: self.engine.angles(),
            active_animations: self
                .engine
                .animations()
                .iter()
                .map(|a| AnimationSummary {
                    animation: a.kind(),
                    priority: a.priority(),
                    channels: a.channels().to_vec(),
                })
                .collect(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn engine(&self) -> &MotionEngine {
        &self.engine
    }

    pub fn link(&self) -> &LinkSession {
        &self.link
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn is_latched(&self) -> bool {
        self.dispatcher.is_latched()
    }

    pub fn pending_frames(&self) -> usize {
        self.queue.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode, Command, FrameRecorder, LinkState, Pca9685Timing, NECK_LR};

    fn actuator(config: &SkeletonConfig) -> Actuator<FrameRecorder> {
        let recorder = FrameRecorder::new(config.channel_count, Pca9685Timing::default());
        Actuator::new(config, recorder)
    }

    fn send(actuator: &mut Actuator<FrameRecorder>, command: Command) {
        let frame = encode(&command).unwrap();
        actuator.receive(frame.as_bytes());
    }

    #[test]
    fn test_frames_wait_for_tick() {
        let mut actuator = actuator(&SkeletonConfig::default());
        send(&mut actuator, Command::move_axis(10, 0, 50, 0));
        assert_eq!(actuator.pending_frames(), 1);
        assert_eq!(actuator.link().state(), LinkState::Disconnected);

        let report = actuator.tick(Instant::now());
        assert_eq!(report.frames, 1);
        assert_eq!(report.link_events, vec![LinkEvent::Connected]);
        assert_eq!(report.applied.len(), 1);
        assert_eq!(actuator.pending_frames(), 0);
        assert!(actuator.driver().frame().angles[NECK_LR] > 90.0);
    }

    #[test]
    fn test_queue_overflow_counted() {
        let mut config = SkeletonConfig::default();
        config.queue_capacity = 2;
        let mut actuator = actuator(&config);

        for seq in 1..=3 {
            send(&mut actuator, Command::heartbeat(seq));
        }
        let report = actuator.tick(Instant::now());
        assert_eq!(report.frames, 2);
        assert_eq!(actuator.link().stats().queue_overflows, 1);
    }

    #[test]
    fn test_garbage_dropped_and_counted() {
        let mut actuator = actuator(&SkeletonConfig::default());
        actuator.receive(&[1, 2, 3]);
        actuator.receive(&[0; 8]);

        let report = actuator.tick(Instant::now());
        assert_eq!(report.dropped, 2);
        assert_eq!(actuator.link().stats().truncated, 1);
        // All-zero frame has a valid CRC but kind 0
        assert_eq!(actuator.link().stats().unknown_kind, 1);
        assert_eq!(actuator.link().state(), LinkState::Disconnected);
    }

    #[test]
    fn test_latch_on_disconnect() {
        let mut config = SkeletonConfig::default();
        config.latch_on_disconnect = true;
        config.disconnect_timeout_ms = 100;
        let mut actuator = actuator(&config);

        let start = Instant::now();
        send(&mut actuator, Command::heartbeat(0));
        actuator.tick(start);
        assert!(!actuator.is_latched());

        let report = actuator.tick(start + Duration::from_millis(120));
        assert_eq!(report.link_events, vec![LinkEvent::Lost]);
        assert!(actuator.is_latched());
    }

    #[test]
    fn test_telemetry_snapshot() {
        let mut actuator = actuator(&SkeletonConfig::default());
        send(&mut actuator, Command::move_axis(7, 1, 20, 0));
        actuator.tick(Instant::now());

        let telemetry = actuator.telemetry("boot-1");
        assert_eq!(telemetry.session_id, "boot-1");
        assert_eq!(telemetry.link_state, LinkState::Connected);
        assert_eq!(telemetry.last_sequence, Some(7));
        assert_eq!(telemetry.ticks, 1);
        assert_eq!(telemetry.channel_angles.len(), 10);
        assert_eq!(telemetry.active_animations.len(), 1);

        let json = serde_json::to_string(&telemetry).unwrap();
        assert!(json.contains("\"type\":\"continuous\""), "{}", json);
    }
}
