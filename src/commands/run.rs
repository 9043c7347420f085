use anyhow::Result;
use clap::ArgMatches;

use super::config_path;
use crate::core::fan_control::{ControllerRuntime, RuntimeOptions};
use crate::logging::LogBuffer;

pub fn execute(matches: &ArgMatches, logs: LogBuffer) -> Result<()> {
    let options = RuntimeOptions {
        config_path: config_path(matches)?,
        bind: matches.get_one::<String>("bind").cloned(),
        serve_status: !matches.get_flag("no-server"),
    };

    log::info!("spinfan {} starting", env!("CARGO_PKG_VERSION"));
    let runtime = ControllerRuntime::start(options, logs)?;

    let result = runtime.wait_for_shutdown_signal();
    runtime.shutdown();
    result
}
