// Draw wheel - prize draw selection and spin animation engine

pub mod core;
pub mod host;

pub use crate::core::{DrawSession, DrawSettings, ParticipantTable, Prize, SessionEvent};
pub use crate::host::{Config, DrawCommand, DrawRunner, RunnerEvent};
