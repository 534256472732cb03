use clap::{Arg, ArgMatches, Command};

pub const CMD_TOKEN: &str = "token";
pub const ARG_DEVICE_ID: &str = "device-id";
pub const ARG_TTL_SECONDS: &str = "ttl-seconds";

// Browser clients mint tokens valid for 30 minutes.
pub const DEFAULT_TTL_SECONDS: u64 = 1800;

#[derive(Debug)]
pub struct Options {
    pub device_id: Option<String>,
    pub ttl_seconds: u64,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            device_id: matches.get_one::<String>(ARG_DEVICE_ID).cloned(),
            ttl_seconds: matches
                .get_one::<u64>(ARG_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_TTL_SECONDS),
        }
    }
}

#[must_use]
pub fn subcommand() -> Command {
    Command::new(CMD_TOKEN)
        .about("Print a device token for manual testing")
        .arg(
            Arg::new(ARG_DEVICE_ID)
                .long("device-id")
                .help("Device identifier to put in the token")
                .env("DEVICEGATE_DEVICE_ID")
                .required(true),
        )
        .arg(
            Arg::new(ARG_TTL_SECONDS)
                .long("ttl-seconds")
                .help("Seconds until the token expires")
                .env("DEVICEGATE_TOKEN_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(u64)),
        )
}
