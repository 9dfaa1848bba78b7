//! Hand-held controller logic: ADC mapping, button handling and command
//! sequencing. Runs on the remote side of the link.

pub mod input;
pub mod remote;

pub use input::*;
pub use remote::*;
