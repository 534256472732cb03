use crate::{
    api::handlers::submit_email::DeviceTokenBody,
    gate::{Clock, SystemClock},
    registry::DeviceId,
};
use anyhow::Result;

#[derive(Debug)]
pub struct Args {
    pub device_id: DeviceId,
    pub ttl_seconds: u64,
}

/// Print a device token as the browser client would send it.
/// # Errors
/// Returns an error if the token cannot be serialized.
pub fn execute(args: &Args) -> Result<()> {
    let token = mint(args, &SystemClock);
    println!("{}", serde_json::to_string_pretty(&token)?);
    Ok(())
}

fn mint(args: &Args, clock: &dyn Clock) -> DeviceTokenBody {
    let ttl_millis = i64::try_from(args.ttl_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
    DeviceTokenBody {
        device_id: args.device_id.to_string(),
        expires: clock.now_epoch_millis().saturating_add(ttl_millis),
    }
}
