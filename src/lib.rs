// spinfan library - public API

// Re-export error types
pub mod error;
pub use error::{FanError, Result};

// Module declarations
pub mod commands;
pub mod core;
pub mod logging;
pub mod server;

// Re-export commonly used types
pub use core::config::Config;
pub use logging::{init_logging, LogBuffer};
