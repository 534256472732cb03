pub mod logging;
pub mod server;
pub mod token;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    ColorChoice, Command,
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("devicegate")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(server::subcommand())
        .subcommand(token::subcommand());

    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::{
        logging::ARG_VERBOSITY,
        server::{ARG_PORT, ARG_TRUSTED_DEVICE, ARG_TRUSTED_DEVICES_FILE, CMD_SERVER},
        token::{ARG_DEVICE_ID, ARG_TTL_SECONDS, CMD_TOKEN},
    };

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "devicegate");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some(env!("CARGO_PKG_DESCRIPTION").to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_subcommand_required() {
        let result = new().try_get_matches_from(vec!["devicegate"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_server_args() {
        temp_env::with_vars(
            [
                ("DEVICEGATE_PORT", None::<&str>),
                ("DEVICEGATE_TRUSTED_DEVICES", None),
                ("DEVICEGATE_TRUSTED_DEVICES_FILE", None),
            ],
            || {
                let matches = new().get_matches_from(vec![
                    "devicegate",
                    "server",
                    "--port",
                    "8080",
                    "--trusted-device",
                    "my-laptop-123",
                    "--trusted-device",
                    "dev-A,dev-B",
                    "--trusted-devices-file",
                    "/etc/devicegate/trusted.txt",
                ]);

                let server = matches.subcommand_matches(CMD_SERVER);
                assert!(server.is_some());
                if let Some(server) = server {
                    assert_eq!(server.get_one::<u16>(ARG_PORT).copied(), Some(8080));
                    assert_eq!(
                        server
                            .get_many::<String>(ARG_TRUSTED_DEVICE)
                            .map(|values| values.cloned().collect::<Vec<_>>()),
                        Some(vec![
                            "my-laptop-123".to_string(),
                            "dev-A".to_string(),
                            "dev-B".to_string()
                        ])
                    );
                    assert_eq!(
                        server.get_one::<String>(ARG_TRUSTED_DEVICES_FILE).cloned(),
                        Some("/etc/devicegate/trusted.txt".to_string())
                    );
                }
            },
        );
    }

    #[test]
    fn test_check_server_defaults() {
        temp_env::with_vars([("DEVICEGATE_PORT", None::<&str>)], || {
            let matches = new().get_matches_from(vec!["devicegate", "server"]);
            assert_eq!(
                matches
                    .subcommand_matches(CMD_SERVER)
                    .and_then(|m| m.get_one::<u16>(ARG_PORT).copied()),
                Some(3001)
            );
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("DEVICEGATE_PORT", Some("443")),
                ("DEVICEGATE_TRUSTED_DEVICES", Some("dev-A,dev-B")),
                ("DEVICEGATE_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["devicegate", "server"]);
                assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(2));

                let server = matches.subcommand_matches(CMD_SERVER);
                assert_eq!(
                    server.and_then(|m| m.get_one::<u16>(ARG_PORT).copied()),
                    Some(443)
                );
                assert_eq!(
                    server
                        .and_then(|m| m.get_many::<String>(ARG_TRUSTED_DEVICE))
                        .map(|values| values.cloned().collect::<Vec<_>>()),
                    Some(vec!["dev-A".to_string(), "dev-B".to_string()])
                );
            },
        );
    }

    #[test]
    fn test_check_token_args() {
        temp_env::with_vars([("DEVICEGATE_TOKEN_TTL_SECONDS", None::<&str>)], || {
            let matches =
                new().get_matches_from(vec!["devicegate", "token", "--device-id", "dev-A"]);
            let token = matches.subcommand_matches(CMD_TOKEN);
            assert_eq!(
                token.and_then(|m| m.get_one::<String>(ARG_DEVICE_ID).cloned()),
                Some("dev-A".to_string())
            );
            assert_eq!(
                token.and_then(|m| m.get_one::<u64>(ARG_TTL_SECONDS).copied()),
                Some(1800)
            );
        });
    }

    #[test]
    fn test_token_requires_device_id() {
        temp_env::with_vars([("DEVICEGATE_DEVICE_ID", None::<&str>)], || {
            let result = new().try_get_matches_from(vec!["devicegate", "token"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_check_log_level_verbosity() {
        // loop cover all possible value_parse
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("DEVICEGATE_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["devicegate".to_string(), "server".to_string()];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    let v = format!("-{}", "v".repeat(index));
                    args.push(v);
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>(ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }
}
