// Core business logic module

pub mod config;
pub mod fan_control;

// Re-export commonly used items
pub use config::{Config, ConfigProvider, FileConfigProvider, StaticConfigProvider};
pub use fan_control::{ControllerRuntime, PollLoop, RuntimeStore};
