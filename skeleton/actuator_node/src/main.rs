use animatronic_lib::{
    init_tracing, Actuator, FrameRecorder, LinkEvent, Pca9685Timing, SkeletonConfig, TickReport,
};
use dora_node_api::arrow::array::Array;
use dora_node_api::{arrow::array::BinaryArray, dora_core::config::DataId, DoraNode, Event};
use eyre::Result;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, info, warn};

fn load_config() -> Result<SkeletonConfig> {
    let config_path =
        std::env::var("SKELETON_CONFIG").unwrap_or_else(|_| "config/skeleton.toml".to_string());

    let config = SkeletonConfig::load_from_file(&config_path)
        .map_err(|e| eyre::eyre!("Failed to load skeleton config from {}: {}", config_path, e))?;
    config
        .validate()
        .map_err(|e| eyre::eyre!("Invalid skeleton config {}: {}", config_path, e))?;

    Ok(config)
}

fn log_report(report: &TickReport) {
    for event in &report.link_events {
        match event {
            LinkEvent::Connected => info!("Controller link established"),
            LinkEvent::Lost => warn!("Controller link lost"),
        }
    }
    if report.frames > 0 {
        debug!(
            "Tick: {} frames, {} dropped, {} applied, {} rejected",
            report.frames,
            report.dropped,
            report.applied.len(),
            report.rejected.len()
        );
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let _guard = init_tracing();

    info!("Starting actuator node");

    let (mut node, mut events) = DoraNode::init_from_env()?;
    let servo_output = DataId::from("servo_frame".to_owned());
    let telemetry_output = DataId::from("telemetry".to_owned());

    let config = load_config()?;
    info!(
        "Loaded skeleton '{}': {} channels at {} Hz",
        config.name, config.channel_count, config.tick_hz
    );
    for channel in 0..config.channel_count {
        let (min, max) = config.angle_limits_for(channel);
        debug!(
            "  {}: rest {:.1}°, limits [{:.1}°, {:.1}°], {:.0}°/s",
            config.channel_name(channel),
            config.resting_angles[channel],
            min,
            max,
            config.velocity_limits[channel]
        );
    }
    info!(
        "Disconnect timeout {} ms, {} gestures configured",
        config.disconnect_timeout_ms,
        config.gestures.len()
    );

    let recorder = FrameRecorder::new(
        config.channel_count,
        Pca9685Timing::from_config(&config.driver),
    );
    let mut actuator = Actuator::new(&config, recorder);
    let session_id = uuid::Uuid::new_v4().to_string();
    let telemetry_every = u64::from(config.telemetry_every_ticks.max(1));

    info!("Actuator session {} ready", session_id);

    while let Some(event) = events.recv() {
        match event {
            Event::Input {
                id,
                metadata: _,
                data,
            } => match id.as_str() {
                "frame" => {
                    if let Some(array) = data.as_any().downcast_ref::<BinaryArray>() {
                        for i in 0..array.len() {
                            if array.is_valid(i) {
                                actuator.receive(array.value(i));
                            }
                        }
                    } else {
                        warn!("Frame input is not a binary array");
                    }
                }

                "tick" => {
                    let report = actuator.tick(Instant::now());
                    log_report(&report);

                    let frame = actuator.driver().frame();
                    let serialized = serde_json::to_vec(&frame)?;
                    let arrow_data = BinaryArray::from_vec(vec![serialized.as_slice()]);
                    if let Err(e) =
                        node.send_output(servo_output.clone(), Default::default(), arrow_data)
                    {
                        warn!("Failed to send servo frame: {}", e);
                    }

                    if actuator.ticks() % telemetry_every == 0 {
                        let telemetry = actuator.telemetry(&session_id);
                        let serialized = serde_json::to_vec(&telemetry)?;
                        let arrow_data = BinaryArray::from_vec(vec![serialized.as_slice()]);
                        if let Err(e) = node.send_output(
                            telemetry_output.clone(),
                            Default::default(),
                            arrow_data,
                        ) {
                            warn!("Failed to send telemetry: {}", e);
                        }
                    }
                }

                other => {
                    debug!("Unknown input id: {}", other);
                }
            },

            Event::Stop(_) => {
                let telemetry = actuator.telemetry(&session_id);
                info!("Stop event received after {} ticks", telemetry.ticks);
                info!(
                    "  Frames accepted: {}, dropped: {}",
                    telemetry.link.accepted,
                    telemetry.link.dropped()
                );
                info!(
                    "  Commands dispatched: {}, rejected: {}",
                    telemetry.dispatch.dispatched,
                    telemetry.dispatch.validation_rejects
                        + telemetry.dispatch.priority_rejects
                        + telemetry.dispatch.latched_rejects
                );
                info!("  Hardware faults: {}", telemetry.hardware_faults);
                break;
            }

            _ => {}
        }
    }

    info!("Actuator node shutting down");
    Ok(())
}
