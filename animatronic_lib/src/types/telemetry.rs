use crate::{AnimationKind, DispatchStats, LinkState, LinkStats};
use serde::{Deserialize, Serialize};

/// Periodic status report published by the skeleton back to the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorTelemetry {
    /// Random id generated at boot, changes when the actuator restarts
    pub session_id: String,
    pub link_state: LinkState,
    pub last_sequence: Option<u16>,
    pub emergency_stop: bool,
    pub link: LinkStats,
    pub dispatch: DispatchStats,
    pub hardware_faults: u64,
    pub ticks: u64,
    pub channel_angles: Vec<f64>,
    pub active_animations: Vec<AnimationSummary>,
    /// Timestamp in milliseconds since Unix epoch
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationSummary {
    pub animation: AnimationKind,
    pub priority: u8,
    pub channels: Vec<usize>,
}
