#![allow(clippy::needless_for_each)]

use crate::{
    gate::{Clock, SystemClock},
    registry::{seed, DeviceId, TrustedDeviceRegistry},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Request},
    routing::{get, post},
    Extension, Router,
};
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, error, info, Span};
use ulid::Ulid;
use utoipa::OpenApi;

pub mod handlers;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::health::health, handlers::submit_email::submit_email),
    components(
        schemas(
            handlers::health::Health,
            handlers::submit_email::SubmitEmailBody,
            handlers::submit_email::DeviceTokenBody
        )
    ),
    tags(
        (name = "submit", description = "Trusted-device email submission"),
        (name = "health", description = "Service health"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the application router around a registry and a clock.
pub fn router(registry: Arc<TrustedDeviceRegistry>, clock: Arc<dyn Clock>) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST])
        // the browser client is served from another origin
        .allow_origin(Any);

    Router::new()
        .route("/api/submit-email", post(handlers::submit_email))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(clock)),
        )
        .route(
            "/health",
            get(handlers::health).options(handlers::health),
        )
        .layer(Extension(registry))
}

/// Serve the API until SIGINT/SIGTERM.
///
/// When `seed_file` is set, SIGHUP re-reads it and swaps the trusted set.
///
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(
    port: u16,
    trusted_devices: Vec<DeviceId>,
    seed_file: Option<PathBuf>,
) -> Result<()> {
    let registry = Arc::new(TrustedDeviceRegistry::from_ids(trusted_devices));
    info!("Trusting {} device(s)", registry.len());

    if let Some(path) = seed_file {
        spawn_reload_on_hangup(Arc::clone(&registry), path);
    }

    let app = router(registry, Arc::new(SystemClock));

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Re-read `path` into `registry`. An unreadable or empty file leaves the
/// registry untouched.
///
/// # Errors
/// Returns an error if the file cannot be read or lists no devices.
pub fn reload_seed_file(registry: &TrustedDeviceRegistry, path: &std::path::Path) -> Result<()> {
    let ids = seed::load_seed_file(path)?;
    anyhow::ensure!(
        !ids.is_empty(),
        "{} lists no trusted devices, keeping the current set",
        path.display()
    );

    let summary = registry.replace(ids);
    info!(
        added = summary.added,
        removed = summary.removed,
        total = summary.total,
        "Reloaded trusted devices from {}",
        path.display()
    );
    Ok(())
}

#[cfg(unix)]
fn spawn_reload_on_hangup(registry: Arc<TrustedDeviceRegistry>, path: PathBuf) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                error!("Failed to install SIGHUP handler: {}", e);
                return;
            }
        };

        while hangup.recv().await.is_some() {
            if let Err(e) = reload_seed_file(&registry, &path) {
                error!("Trusted devices reload failed: {:#}", e);
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_registry: Arc<TrustedDeviceRegistry>, path: PathBuf) {
    tracing::warn!(
        "Reloading {} on SIGHUP is only supported on unix",
        path.display()
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

// Root span of a request, keyed by the id set or propagated above.
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}
