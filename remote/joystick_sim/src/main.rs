use animatronic_lib::{init_tracing, JoystickSample, StickReading, ADC_CENTER};
use dora_node_api::{arrow::array::BinaryArray, dora_core::config::DataId, DoraNode, Event};
use std::error::Error;
use tracing::{debug, info, warn};

/// One scripted step: hold `sample` for `ticks` ticks.
struct Step {
    label: &'static str,
    ticks: u32,
    sample: JoystickSample,
}

fn stick(x: u16, y: u16, pressed: bool) -> StickReading {
    StickReading { x, y, pressed }
}

fn sample(left: StickReading, right: StickReading) -> JoystickSample {
    JoystickSample { left, right }
}

fn script() -> Vec<Step> {
    let centre = ADC_CENTER as u16;
    let rest = stick(centre, centre, false);

    vec![
        Step { label: "centre", ticks: 20, sample: sample(rest, rest) },
        Step { label: "look right", ticks: 30, sample: sample(stick(3600, centre, false), rest) },
        Step { label: "look up-left", ticks: 30, sample: sample(stick(600, 3400, false), rest) },
        Step { label: "centre", ticks: 20, sample: sample(rest, rest) },
        Step { label: "blink", ticks: 3, sample: sample(stick(centre, centre, true), rest) },
        Step { label: "release", ticks: 20, sample: sample(rest, rest) },
        Step { label: "torso left", ticks: 40, sample: sample(rest, stick(500, centre, false)) },
        Step { label: "wave on", ticks: 4, sample: sample(rest, stick(centre, centre, true)) },
        Step { label: "waving", ticks: 100, sample: sample(rest, rest) },
        Step { label: "wave off", ticks: 4, sample: sample(rest, stick(centre, centre, true)) },
        Step { label: "settle", ticks: 40, sample: sample(rest, rest) },
    ]
}

fn main() -> Result<(), Box<dyn Error>> {
    let _guard = init_tracing();

    info!("Starting joystick simulator");

    let (mut node, mut events) = DoraNode::init_from_env()?;
    let output_id = DataId::from("joystick".to_owned());

    let steps = script();
    let mut step_index = 0;
    let mut step_ticks = 0;
    let mut samples_sent = 0u64;

    info!("Script has {} steps, looping", steps.len());

    while let Some(event) = events.recv() {
        match event {
            Event::Input { id, .. } => {
                if id.as_str() != "tick" {
                    debug!("Unknown input id: {}", id.as_str());
                    continue;
                }

                let step = &steps[step_index];
                if step_ticks == 0 {
                    info!("Script step: {}", step.label);
                }

                let serialized = serde_json::to_vec(&step.sample)?;
                let arrow_data = BinaryArray::from_vec(vec![serialized.as_slice()]);
                if let Err(e) = node.send_output(output_id.clone(), Default::default(), arrow_data)
                {
                    warn!("Failed to send joystick sample: {}", e);
                } else {
                    samples_sent += 1;
                }

                step_ticks += 1;
                if step_ticks >= step.ticks {
                    step_ticks = 0;
                    step_index = (step_index + 1) % steps.len();
                }
            }
            Event::Stop(_) => {
                info!("Stop event received, {} samples sent", samples_sent);
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
