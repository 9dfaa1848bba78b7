//! # Animatronic Library
//!
//! Shared types and logic for the animatronic skeleton. The hand-held
//! controller and the skeleton talk over a fixed 8-byte frame protocol; the
//! skeleton side runs a single cooperative tick loop that decodes frames,
//! validates commands and advances the motion-sequencing engine.
//! This library is used by all nodes in the dora-rs dataflow.

pub mod actuator;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod link;
pub mod motion;
pub mod protocol;
pub mod servo;
pub mod types;
pub mod utils;

// Re-export everything for convenience
pub use actuator::*;
pub use controller::*;
pub use dispatch::*;
pub use error::*;
pub use link::*;
pub use motion::*;
pub use protocol::*;
pub use servo::*;
pub use types::*;
pub use utils::*;
