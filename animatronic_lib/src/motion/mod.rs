//! Motion-sequencing engine: channel arena, animation arbitration and the
//! per-tick velocity-limited update.

pub mod animation;
pub mod engine;

pub use animation::*;
pub use engine::*;
