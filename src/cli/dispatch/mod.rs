//! Maps parsed CLI arguments to the action to run.

use crate::cli::actions::{server, token, Action};
use crate::cli::commands::{
    server::{Options as ServerOptions, CMD_SERVER},
    token::{Options as TokenOptions, CMD_TOKEN},
};
use crate::registry::seed;
use anyhow::{anyhow, bail, Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((CMD_SERVER, sub_m)) => server_action(sub_m),
        Some((CMD_TOKEN, sub_m)) => token_action(sub_m),
        Some((name, _)) => Err(anyhow!("unknown subcommand: {name}")),
        None => Err(anyhow!("missing subcommand")),
    }
}

fn server_action(matches: &clap::ArgMatches) -> Result<Action> {
    let opts = ServerOptions::parse(matches);

    let trusted_devices =
        seed::collect_seed(&opts.trusted_devices, opts.trusted_devices_file.as_deref())
            .context("Could not load trusted devices")?;

    if trusted_devices.is_empty() {
        bail!(
            "no trusted devices configured: use --trusted-device or --trusted-devices-file"
        );
    }

    Ok(Action::Server(server::Args {
        port: opts.port,
        trusted_devices,
        trusted_devices_file: opts.trusted_devices_file,
    }))
}

fn token_action(matches: &clap::ArgMatches) -> Result<Action> {
    let opts = TokenOptions::parse(matches);

    let device_id = opts
        .device_id
        .filter(|id| !id.trim().is_empty())
        .context("missing required argument: --device-id")?;

    Ok(Action::Token(token::Args {
        device_id: device_id.into(),
        ttl_seconds: opts.ttl_seconds,
    }))
}
