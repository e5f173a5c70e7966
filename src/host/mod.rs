//! Host module - config file, logging, hotkeys and the runner thread

pub mod config;
pub mod hotkey;
pub mod logging;
pub mod runner;

pub use config::{Config, ConfigError};
pub use hotkey::{Hotkey, KeyAction, KeyBindings};
pub use logging::init_logging;
pub use runner::{DrawCommand, DrawRunner, DrawSnapshot, RunnerEvent};
