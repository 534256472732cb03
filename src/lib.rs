//! # devicegate
//!
//! `devicegate` guards an email-submission endpoint behind a device check. A
//! browser client runs the platform biometric prompt locally and, when it
//! succeeds, sends a short-lived device token (`deviceId` + `expires`) along
//! with the email address. The server accepts the submission only when the
//! device is in its trusted registry and the token has not expired.
//!
//! ## Trust model
//!
//! The device token is **unsigned**. The server cannot verify that the
//! biometric prompt actually ran; it only checks that the claimed device is
//! pre-approved and that the claim is still fresh. Unknown devices are never
//! added to the registry on first use.
//!
//! ## Layout
//!
//! - [`registry`]: the trusted-device set, seeded from CLI/env or a file.
//! - [`gate`]: the ordered guard chain that turns a request into a decision.
//! - [`api`]: the `axum` router and server around the gate.
//! - [`cli`]: argument parsing, telemetry and the actions run by the binary.

pub mod api;
pub mod cli;
pub mod gate;
pub mod registry;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
