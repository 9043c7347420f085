use anyhow::Result;
use clap::{Arg, ArgAction, Command};

use spinfan::commands;

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Path to config.json (defaults to $SPINFAN_CONFIG or the user config dir)")
}

fn main() -> Result<()> {
    let matches = Command::new("spinfan")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Drive-temperature driven fan controller")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Run the controller until interrupted")
                .arg(config_arg())
                .arg(
                    Arg::new("bind")
                        .short('b')
                        .long("bind")
                        .value_name("ADDR")
                        .help("Status API address (overrides status.bind)")
                )
                .arg(
                    Arg::new("no-server")
                        .long("no-server")
                        .help("Do not start the status API")
                        .action(ArgAction::SetTrue)
                )
        )
        .subcommand(
            Command::new("check")
                .about("Read drive state once and show the resulting decision")
                .arg(config_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the result as JSON")
                        .action(ArgAction::SetTrue)
                )
        )
        .subcommand(
            Command::new("curve")
                .about("Evaluate the configured fan curve")
                .arg(config_arg())
                .arg(
                    Arg::new("temp")
                        .short('t')
                        .long("temp")
                        .value_name("CELSIUS")
                        .help("Print the duty for a single temperature")
                        .value_parser(clap::value_parser!(f64))
                )
        )
        .subcommand(
            Command::new("config")
                .about("Inspect or create the config file (use 'spinfan config --help' for subcommands)")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("show")
                        .about("Print the effective configuration")
                        .arg(config_arg())
                )
                .subcommand(
                    Command::new("init")
                        .about("Write the default configuration")
                        .arg(config_arg())
                        .arg(
                            Arg::new("force")
                                .long("force")
                                .help("Overwrite an existing file")
                                .action(ArgAction::SetTrue)
                        )
                )
        )
        .subcommand(
            Command::new("version")
                .about("Shows version information")
        )
        .get_matches();

    let logs = spinfan::init_logging();

    match matches.subcommand() {
        Some(("run", sub_matches)) => commands::run(sub_matches, logs)?,
        Some(("check", sub_matches)) => commands::check(sub_matches)?,
        Some(("curve", sub_matches)) => commands::curve(sub_matches)?,
        Some(("config", sub_matches)) => commands::config::handle_config(sub_matches)?,
        Some(("version", _)) => commands::version()?,
        _ => {
            println!("Use 'spinfan --help' for more information.");
        }
    }

    Ok(())
}
