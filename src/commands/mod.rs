// Command handlers module
pub mod check;
pub mod config;
pub mod curve;
pub mod run;
pub mod version;

use std::path::PathBuf;

use anyhow::Result;
use clap::ArgMatches;

use crate::core::Config;

// Re-exports for cleaner imports
pub use check::execute as check;
pub use curve::execute as curve;
pub use run::execute as run;
pub use version::execute as version;

/// `--config` if given, else the default location.
pub fn config_path(matches: &ArgMatches) -> Result<PathBuf> {
    match matches.get_one::<String>("config") {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(Config::default_path()?),
    }
}
