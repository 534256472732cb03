use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

pub const CMD_SERVER: &str = "server";
pub const ARG_PORT: &str = "port";
pub const ARG_TRUSTED_DEVICE: &str = "trusted-device";
pub const ARG_TRUSTED_DEVICES_FILE: &str = "trusted-devices-file";

#[derive(Debug)]
pub struct Options {
    pub port: u16,
    pub trusted_devices: Vec<String>,
    pub trusted_devices_file: Option<PathBuf>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            port: matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(3001),
            trusted_devices: matches
                .get_many::<String>(ARG_TRUSTED_DEVICE)
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            trusted_devices_file: matches
                .get_one::<String>(ARG_TRUSTED_DEVICES_FILE)
                .map(PathBuf::from),
        }
    }
}

#[must_use]
pub fn subcommand() -> Command {
    Command::new(CMD_SERVER)
        .about("Serve the email submission API")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("3001")
                .env("DEVICEGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_TRUSTED_DEVICE)
                .long("trusted-device")
                .help("Device identifier to trust, may be repeated or comma separated")
                .env("DEVICEGATE_TRUSTED_DEVICES")
                .action(ArgAction::Append)
                .value_delimiter(','),
        )
        .arg(
            Arg::new(ARG_TRUSTED_DEVICES_FILE)
                .long("trusted-devices-file")
                .help("File with one trusted device identifier per line, reloaded on SIGHUP")
                .env("DEVICEGATE_TRUSTED_DEVICES_FILE"),
        )
}
