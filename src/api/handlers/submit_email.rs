//! `POST /api/submit-email`
//!
//! Decodes the JSON body into a [`SubmissionRequest`], reads the clock once and
//! hands both to the gate. The decision is translated to a plain-text response.
//!
//! Decoding never rejects: whatever does not fit the expected shape is treated
//! as absent and left for the gate to deny.

use crate::{
    gate::{self, Clock, Decision, Denial, DeviceToken, SubmissionRequest},
    registry::TrustedDeviceRegistry,
};
use axum::{body::Bytes, extract::Extension, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

pub const SUBMITTED: &str = "Email submitted successfully";

#[derive(ToSchema, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct SubmitEmailBody {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub email: Option<Value>,
    #[serde(default, rename = "deviceToken")]
    #[schema(value_type = Option<DeviceTokenBody>)]
    pub device_token: Option<Value>,
}

/// Device token as minted by the browser client.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceTokenBody {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    /// Unix epoch in milliseconds
    pub expires: i64,
}

#[derive(Deserialize)]
struct WireToken {
    #[serde(rename = "deviceId")]
    device_id: String,
    expires: Number,
}

impl SubmitEmailBody {
    /// Anything but a JSON object decodes as an empty body.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
            Ok(other) => {
                debug!("body is JSON but not an object: {}", json_kind(&other));
                Self::default()
            }
            Err(e) => {
                debug!("body is not JSON: {}", e);
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn into_request(self) -> SubmissionRequest {
        SubmissionRequest {
            email: self.email.and_then(|email| match email {
                Value::String(email) => Some(email),
                _ => None,
            }),
            device_token: self.device_token.and_then(device_token),
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `None` unless the value is an object with a string `deviceId` and a numeric `expires`.
fn device_token(value: Value) -> Option<DeviceToken> {
    // serde fills structs from arrays by position, so the shape is checked first
    if !value.is_object() {
        return None;
    }
    let wire: WireToken = serde_json::from_value(value).ok()?;
    let expires = expires_millis(&wire.expires)?;
    Some(DeviceToken::new(wire.device_id, expires))
}

// Flooring keeps `now > expires` unchanged for an integer `now`.
#[allow(clippy::cast_possible_truncation)]
fn expires_millis(number: &Number) -> Option<i64> {
    number.as_i64().or_else(|| {
        if number.is_u64() {
            return Some(i64::MAX);
        }
        number
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| f.floor() as i64)
    })
}

#[must_use]
pub fn status_for(denial: &Denial) -> StatusCode {
    match denial {
        Denial::MissingEmail => StatusCode::BAD_REQUEST,
        Denial::MissingToken | Denial::UntrustedDevice(_) | Denial::TokenExpired => {
            StatusCode::FORBIDDEN
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/submit-email",
    request_body = SubmitEmailBody,
    responses (
        (status = 200, description = "Email submitted successfully", body = String, content_type = "text/plain"),
        (status = 400, description = "Email is required", body = String, content_type = "text/plain"),
        (status = 403, description = "Missing device token, unrecognized deviceId or expired token", body = String, content_type = "text/plain"),
    ),
    tag = "submit"
)]
#[instrument(skip_all)]
pub async fn submit_email(
    registry: Extension<Arc<TrustedDeviceRegistry>>,
    clock: Extension<Arc<dyn Clock>>,
    body: Bytes,
) -> impl IntoResponse {
    let request = SubmitEmailBody::from_slice(&body).into_request();
    let now = clock.now_epoch_millis();

    match gate::evaluate(&request, &registry, now) {
        Decision::Allowed { email } => {
            info!(%email, "email submitted");
            (StatusCode::OK, SUBMITTED.to_string())
        }
        Decision::Denied(denial) => {
            warn!(reason = %denial, "rejected submission");
            (status_for(&denial), denial.to_string())
        }
    }
}
