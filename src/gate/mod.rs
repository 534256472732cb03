//! Authorization gate for email submissions.
//!
//! A submission is allowed only when it names an email address and carries a
//! device token for a trusted device that has not yet expired. The checks run
//! in a fixed order and the first one that fails decides the denial reason:
//!
//! 1. email present and non-empty, else [`Denial::MissingEmail`]
//! 2. device token present and well formed, else [`Denial::MissingToken`]
//! 3. device trusted by the registry, else [`Denial::UntrustedDevice`]
//! 4. `now <= expires`, else [`Denial::TokenExpired`]
//!
//! The device token is an unsigned claim made by the client after its local
//! biometric prompt succeeded. The gate cannot tell a genuine claim from a
//! forged one; it only checks membership and expiry.

pub mod clock;

use crate::registry::{DeviceId, TrustedDeviceRegistry};
use thiserror::Error;
use tracing::{debug, instrument};

pub use self::clock::{Clock, FixedClock, SystemClock};

/// Client claim that `device_id` passed a local biometric check, valid until
/// `expires_at_epoch_millis` (inclusive).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceToken {
    pub device_id: DeviceId,
    pub expires_at_epoch_millis: i64,
}

impl DeviceToken {
    pub fn new(device_id: impl Into<DeviceId>, expires_at_epoch_millis: i64) -> Self {
        Self {
            device_id: device_id.into(),
            expires_at_epoch_millis,
        }
    }
}

/// One attempt to perform the gated action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub email: Option<String>,
    pub device_token: Option<DeviceToken>,
}

/// Why a submission was refused. `Display` is the message returned to the client.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Denial {
    #[error("Email is required")]
    MissingEmail,
    #[error("Missing device token")]
    MissingToken,
    #[error("Unrecognized deviceId {0}")]
    UntrustedDevice(DeviceId),
    #[error("Device token expired")]
    TokenExpired,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allowed { email: String },
    Denied(Denial),
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

impl From<Denial> for Decision {
    fn from(denial: Denial) -> Self {
        Self::Denied(denial)
    }
}

/// Evaluate `request` against `registry` as of `now_epoch_millis`.
///
/// Pure: the registry is only read and `now` is never re-read, so the same
/// inputs always produce the same decision.
#[must_use]
#[instrument(level = "debug", name = "gate.evaluate", skip_all)]
pub fn evaluate(
    request: &SubmissionRequest,
    registry: &TrustedDeviceRegistry,
    now_epoch_millis: i64,
) -> Decision {
    match check(request, registry, now_epoch_millis) {
        Ok(email) => Decision::Allowed {
            email: email.to_string(),
        },
        Err(denial) => denial.into(),
    }
}

fn check<'a>(
    request: &'a SubmissionRequest,
    registry: &TrustedDeviceRegistry,
    now: i64,
) -> Result<&'a str, Denial> {
    debug!(step = 1, "checking email is provided");
    let email = request
        .email
        .as_deref()
        .filter(|email| !email.is_empty())
        .ok_or(Denial::MissingEmail)?;

    debug!(step = 2, "checking device token is provided");
    let token = request.device_token.as_ref().ok_or(Denial::MissingToken)?;

    debug!(step = 3, device_id = %token.device_id, "checking device is trusted");
    if !registry.contains(&token.device_id) {
        return Err(Denial::UntrustedDevice(token.device_id.clone()));
    }

    debug!(
        step = 4,
        now,
        expires = token.expires_at_epoch_millis,
        "checking device token is fresh"
    );
    if now > token.expires_at_epoch_millis {
        return Err(Denial::TokenExpired);
    }

    debug!(step = 5, device_id = %token.device_id, "all checks passed");
    Ok(email)
}
