pub mod command;
pub mod config;
pub mod gesture;
pub mod telemetry;

pub use command::*;
pub use config::*;
pub use gesture::*;
pub use telemetry::*;
