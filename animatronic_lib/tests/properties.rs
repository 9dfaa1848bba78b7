//! Property tests for the link and the velocity limiter.

use animatronic_lib::{
    decode, encode, Actuator, Command, DecodeError, FrameRecorder, GestureDefinition,
    Interpolation, Keyframe, Payload, Pca9685Timing, SkeletonConfig, BLINK_GESTURE, WAVE_GESTURE,
};
use proptest::prelude::*;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(20);

fn actuator(config: &SkeletonConfig) -> Actuator<FrameRecorder> {
    let recorder = FrameRecorder::new(config.channel_count, Pca9685Timing::default());
    Actuator::new(config, recorder)
}

/// Any payload that passes validation against the default skeleton.
fn valid_payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        (0u8..2, -100i8..=100, -100i8..=100)
            .prop_map(|(stick, x, y)| Payload::MoveAxis { stick, x, y }),
        prop_oneof![Just(BLINK_GESTURE), Just(WAVE_GESTURE)]
            .prop_map(|gesture| Payload::TriggerGesture { gesture }),
        Just(Payload::CancelGesture {
            gesture: WAVE_GESTURE
        }),
        (0u8..=100).prop_map(|opening| Payload::SetJaw { opening }),
        Just(Payload::Heartbeat),
    ]
}

proptest! {
    /// Strictly increasing sequence numbers (wrapping) are always accepted
    #[test]
    fn increasing_sequences_always_accepted(
        start in any::<u16>(),
        steps in prop::collection::vec((1u16..500, valid_payload()), 1..60),
    ) {
        let mut actuator = actuator(&SkeletonConfig::default());
        let base = Instant::now();
        let mut seq = start;

        for (i, (step, payload)) in steps.iter().enumerate() {
            seq = seq.wrapping_add(*step);
            actuator.receive(encode(&Command::new(seq, *payload)).unwrap().as_bytes());
            let report = actuator.tick(base + TICK * i as u32);
            prop_assert_eq!(report.dropped, 0);
        }

        let stats = actuator.link().stats();
        prop_assert_eq!(stats.accepted, steps.len() as u64);
        prop_assert_eq!(stats.stale, 0);
    }

    /// Any single corrupted byte is caught by the checksum and changes nothing
    #[test]
    fn corrupted_frames_rejected_without_effect(
        payload in valid_payload(),
        seq in any::<u16>(),
        index in 0usize..8,
        mask in 1u8..=255,
    ) {
        let mut bytes = encode(&Command::new(seq, payload)).unwrap().into_bytes();
        bytes[index] ^= mask;
        prop_assert!(
            matches!(decode(&bytes), Err(DecodeError::Corrupt { .. })),
            "corrupted frame was not rejected as Corrupt"
        );

        let mut actuator = actuator(&SkeletonConfig::default());
        let base = Instant::now();
        actuator.tick(base);
        let before = actuator.engine().channels().to_vec();

        actuator.receive(&bytes);
        let report = actuator.tick(base + TICK);
        prop_assert_eq!(report.dropped, 1);
        prop_assert_eq!(actuator.link().stats().corrupt, 1);
        prop_assert_eq!(actuator.engine().channels(), before.as_slice());
        prop_assert!(actuator.engine().animations().is_empty());
    }

    /// No channel moves more than velocity_limit / tick_hz per tick, whatever
    /// the keyframe or joystick asks for
    #[test]
    fn per_tick_motion_is_velocity_limited(
        targets in prop::collection::vec(0.0f64..180.0, 1..6),
        hold_ms in 20u64..400,
        stick_x in -100i8..=100,
        late_ms in prop::collection::vec(0u64..500, 60),
    ) {
        let mut config = SkeletonConfig::default();
        config.velocity_limits = vec![90.0; config.channel_count];
        config.gestures.push(GestureDefinition {
            id: 9,
            name: "jumps".to_string(),
            priority: 2,
            loops: 0,
            keyframes: targets
                .iter()
                .map(|&angle| Keyframe::new(hold_ms, Interpolation::Step, &[(2, angle), (7, 180.0 - angle)]))
                .collect(),
        });
        let mut actuator = actuator(&config);
        let base = Instant::now();

        actuator.receive(encode(&Command::trigger_gesture(1, 9)).unwrap().as_bytes());
        actuator.receive(encode(&Command::move_axis(2, 1, stick_x, 0)).unwrap().as_bytes());

        let mut now = base;
        let mut previous = actuator.engine().angles();
        for late in late_ms {
            // Irregular tick spacing must not widen the step
            now += TICK + Duration::from_millis(late);
            actuator.tick(now);
            let angles = actuator.engine().angles();
            for (a, b) in previous.iter().zip(&angles) {
                prop_assert!((a - b).abs() <= 1.8 + 1e-9, "moved {} -> {}", a, b);
            }
            previous = angles;
        }
    }
}
