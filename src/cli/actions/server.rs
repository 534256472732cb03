use crate::{api, registry::DeviceId};
use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub trusted_devices: Vec<DeviceId>,
    pub trusted_devices_file: Option<PathBuf>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    api::serve(args.port, args.trusted_devices, args.trusted_devices_file).await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("trusted_devices", args.trusted_devices.len().to_string()),
        (
            "trusted_devices_file",
            args.trusted_devices_file
                .as_ref()
                .map_or_else(|| "none".to_string(), |p| p.display().to_string()),
        ),
    ];
    info!("{}", startup_message("Startup configuration", &entries));
}

fn startup_message(title: &str, entries: &[(&str, String)]) -> String {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "devicegate {} - {}\n\n{title}:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        message.push_str(&format!("\n  {key}:{padding} {value}"));
    }
    message
}

fn short_commit(hash: &str) -> String {
    hash.trim().chars().take(7).collect()
}
