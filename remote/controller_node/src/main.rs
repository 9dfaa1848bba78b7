use animatronic_lib::{
    encode, init_tracing, ActuatorTelemetry, Command, JoystickSample, LinkState, RemoteConfig,
    RemoteController,
};
use dora_node_api::arrow::array::Array;
use dora_node_api::{arrow::array::BinaryArray, dora_core::config::DataId, DoraNode, Event};
use std::error::Error;
use std::time::Instant;
use tracing::{debug, info, warn};

struct ControllerNode {
    remote: RemoteController,
    frames_sent: u64,
    last_link_state: Option<LinkState>,
    last_emergency_stop: bool,
}

impl ControllerNode {
    fn new(config: RemoteConfig) -> Self {
        Self {
            remote: RemoteController::new(config),
            frames_sent: 0,
            last_link_state: None,
            last_emergency_stop: false,
        }
    }

    fn update_telemetry(&mut self, telemetry: &ActuatorTelemetry) {
        if self.last_link_state != Some(telemetry.link_state) {
            info!("Skeleton reports link {:?}", telemetry.link_state);
            self.last_link_state = Some(telemetry.link_state);
        }
        if telemetry.emergency_stop != self.last_emergency_stop {
            if telemetry.emergency_stop {
                warn!("Skeleton emergency stop latched");
            } else {
                info!("Skeleton emergency stop released");
            }
            self.last_emergency_stop = telemetry.emergency_stop;
        }
        debug!(
            "Skeleton telemetry: last seq {:?}, {} dropped frames, {} active animations",
            telemetry.last_sequence,
            telemetry.link.dropped(),
            telemetry.active_animations.len()
        );
    }
}

fn send_commands(
    node: &mut DoraNode,
    output_id: &DataId,
    commands: &[Command],
    frames_sent: &mut u64,
) {
    for command in commands {
        let frame = match encode(command) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode {:?}: {}", command.kind(), e);
                continue;
            }
        };

        let arrow_data = BinaryArray::from_vec(vec![frame.as_bytes()]);
        if let Err(e) = node.send_output(output_id.clone(), Default::default(), arrow_data) {
            warn!("Failed to send frame {}: {}", command.seq(), e);
        } else {
            *frames_sent += 1;
            debug!("Sent {:?} seq {}", command.kind(), command.seq());
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let _guard = init_tracing();

    info!("Starting controller node");

    let (mut node, mut events) = DoraNode::init_from_env()?;
    let output_id = DataId::from("frame".to_owned());

    let config = RemoteConfig::from_env();
    info!("Controller configuration:");
    info!("  Heartbeat interval: {} ms", config.heartbeat_interval_ms);
    info!("  Debounce: {} ms", config.debounce_ms);
    info!(
        "  Gestures: blink={} wave={}",
        config.blink_gesture, config.wave_gesture
    );
    info!("Controls:");
    info!("  - Both buttons = Emergency stop");
    info!("  - Left triple-click = Unlock");
    info!("  - Left button = Eye blink");
    info!("  - Right button = Toggle wave/jaw");
    info!("  - Left stick = Eyes and neck, right stick X = Torso");

    let mut controller = ControllerNode::new(config);

    while let Some(event) = events.recv() {
        match event {
            Event::Input {
                id,
                metadata: _,
                data,
            } => match id.as_str() {
                "joystick" => {
                    if let Some(array) = data.as_any().downcast_ref::<BinaryArray>() {
                        if array.len() > 0 {
                            match serde_json::from_slice::<JoystickSample>(array.value(0)) {
                                Ok(sample) => {
                                    let commands =
                                        controller.remote.sample(&sample, Instant::now());
                                    send_commands(
                                        &mut node,
                                        &output_id,
                                        &commands,
                                        &mut controller.frames_sent,
                                    );
                                }
                                Err(e) => {
                                    warn!("Failed to parse joystick sample: {}", e);
                                }
                            }
                        }
                    }
                }

                "tick" => {
                    if let Some(heartbeat) = controller.remote.poll(Instant::now()) {
                        send_commands(
                            &mut node,
                            &output_id,
                            &[heartbeat],
                            &mut controller.frames_sent,
                        );
                    }
                }

                "telemetry" => {
                    if let Some(array) = data.as_any().downcast_ref::<BinaryArray>() {
                        if array.len() > 0 {
                            match serde_json::from_slice::<ActuatorTelemetry>(array.value(0)) {
                                Ok(telemetry) => controller.update_telemetry(&telemetry),
                                Err(e) => warn!("Failed to deserialize telemetry: {}", e),
                            }
                        }
                    }
                }

                other => {
                    debug!("Unknown input id: {}", other);
                }
            },

            Event::Stop(_) => {
                info!("Stop event received, sending final emergency stop");
                let stop = controller.remote.emergency_stop();
                send_commands(&mut node, &output_id, &[stop], &mut controller.frames_sent);
                info!("{} frames sent", controller.frames_sent);
                break;
            }

            _ => {}
        }
    }

    info!("Controller node shutting down");
    Ok(())
}
