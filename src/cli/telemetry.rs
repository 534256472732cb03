//! Console logging plus an optional OTLP span exporter.
//!
//! Console output follows `-v`/`DEVICEGATE_LOG_LEVEL`, with `RUST_LOG` taking
//! precedence. Setting `OTEL_EXPORTER_OTLP_ENDPOINT` adds a gRPC exporter with
//! its own filter: every span this crate opens (`http-request`, the handler
//! span and `gate.evaluate` with its step events) is exported at `DEBUG`, even
//! when the console only shows errors.

use anyhow::{anyhow, Result};
use base64ct::{Base64, Encoding};
use once_cell::sync::OnceCell;
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
use std::{env::var, time::Duration};
use tonic::{
    metadata::{Ascii, Binary, MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{debug, Level};
use tracing_subscriber::{filter::Targets, fmt, prelude::*, EnvFilter, Registry};
use ulid::Ulid;

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Collector the spans are shipped to.
#[derive(Debug)]
struct Collector {
    endpoint: String,
    tls_domain: Option<String>,
    metadata: MetadataMap,
}

impl Collector {
    /// `endpoint` without a scheme is taken as `https`.
    fn new(endpoint: &str, headers: &str) -> Result<Self> {
        let endpoint = endpoint.trim().trim_end_matches('/');
        let endpoint = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("https://{endpoint}")
        };

        let tls_domain = endpoint
            .strip_prefix("https://")
            .and_then(|rest| rest.split(['/', ':']).next())
            .filter(|host| !host.is_empty())
            .map(str::to_string);

        Ok(Self {
            endpoint,
            tls_domain,
            metadata: metadata(headers)?,
        })
    }
}

/// Parse `OTEL_EXPORTER_OTLP_HEADERS` (`key=value,key=value`) into gRPC
/// metadata. Values of `-bin` keys are base64.
fn metadata(headers: &str) -> Result<MetadataMap> {
    let mut meta = MetadataMap::new();

    for pair in headers.split(',').filter(|pair| !pair.trim().is_empty()) {
        let Some((name, value)) = pair.split_once('=') else {
            debug!("ignoring OTLP header without a value: {}", pair.trim());
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();

        if name.ends_with("-bin") {
            let bytes = Base64::decode_vec(value)
                .map_err(|e| anyhow!("OTLP header {name}: value is not base64: {e}"))?;
            let key = MetadataKey::<Binary>::from_bytes(name.as_bytes())
                .map_err(|e| anyhow!("OTLP header {name}: {e}"))?;
            meta.insert_bin(key, MetadataValue::from_bytes(&bytes));
        } else {
            let key = MetadataKey::<Ascii>::from_bytes(name.as_bytes())
                .map_err(|e| anyhow!("OTLP header {name}: {e}"))?;
            let value: MetadataValue<Ascii> = value
                .parse()
                .map_err(|e| anyhow!("OTLP header {name}: {e}"))?;
            meta.insert(key, value);
        }
    }

    Ok(meta)
}

fn resource() -> Resource {
    let instance_id = var("OTEL_SERVICE_INSTANCE_ID").unwrap_or_else(|_| Ulid::new().to_string());

    Resource::builder_empty()
        .with_attributes([
            KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            KeyValue::new("service.instance.id", instance_id),
            KeyValue::new("vcs.revision", crate::GIT_COMMIT_HASH),
        ])
        .build()
}

/// Spans and events of this crate down to `DEBUG`, nothing from dependencies.
fn export_filter() -> Targets {
    Targets::new().with_target(env!("CARGO_CRATE_NAME"), Level::DEBUG)
}

fn install_provider(collector: Collector) -> Result<SdkTracerProvider> {
    let mut exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(collector.endpoint)
        .with_compression(Compression::Gzip)
        .with_timeout(Duration::from_secs(3))
        .with_metadata(collector.metadata);

    if let Some(domain) = collector.tls_domain {
        exporter = exporter.with_tls_config(
            ClientTlsConfig::new()
                .domain_name(domain)
                .with_native_roots(),
        );
    }

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter.build()?)
        .with_resource(resource())
        .build();

    let _ = TRACER_PROVIDER.set(provider.clone());
    global::set_tracer_provider(provider.clone());

    Ok(provider)
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the OTLP settings are invalid or a subscriber is already set
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let console_filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.unwrap_or(Level::ERROR).into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?);

    let console = fmt::layer()
        .with_target(false)
        .pretty()
        .with_filter(console_filter);

    let export = match var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) => {
            let headers = var("OTEL_EXPORTER_OTLP_HEADERS").unwrap_or_default();
            let tracer =
                install_provider(Collector::new(&endpoint, &headers)?)?.tracer(env!("CARGO_PKG_NAME"));
            Some(
                tracing_opentelemetry::layer()
                    .with_tracer(tracer)
                    .with_filter(export_filter()),
            )
        }
        Err(_) => None,
    };

    tracing::subscriber::set_global_default(Registry::default().with(console).with(export))?;

    Ok(())
}

/// Flush pending spans (noop without an exporter)
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("flushing spans");
        if let Err(e) = provider.shutdown() {
            debug!("tracer provider shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_defaults_to_tls() -> Result<()> {
        let collector = Collector::new("otel.example.com:4317/", "")?;
        assert_eq!(collector.endpoint, "https://otel.example.com:4317");
        assert_eq!(collector.tls_domain.as_deref(), Some("otel.example.com"));
        assert!(collector.metadata.is_empty());
        Ok(())
    }

    #[test]
    fn plain_http_has_no_tls() -> Result<()> {
        let collector = Collector::new("http://localhost:4317", "")?;
        assert_eq!(collector.endpoint, "http://localhost:4317");
        assert_eq!(collector.tls_domain, None);
        Ok(())
    }

    #[test]
    fn headers_become_metadata() -> Result<()> {
        // "binary data"
        let meta = metadata("Authorization=Bearer abc, x-trace-bin = YmluYXJ5IGRhdGE=, junk,,")?;
        assert_eq!(meta.len(), 2);
        assert_eq!(
            meta.get("authorization").and_then(|v| v.to_str().ok()),
            Some("Bearer abc")
        );
        assert!(meta.get_bin("x-trace-bin").is_some());
        Ok(())
    }

    #[test]
    fn header_value_may_contain_equals() -> Result<()> {
        let meta = metadata("api-key=a=b")?;
        assert_eq!(meta.get("api-key").and_then(|v| v.to_str().ok()), Some("a=b"));
        Ok(())
    }

    #[test]
    fn bad_base64_is_an_error() {
        let result = metadata("x-trace-bin=not-valid-base64!!!");
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("not base64"));
        }
    }

    #[test]
    fn exporter_sees_crate_debug_spans_only() {
        let filter = export_filter();
        assert!(filter.would_enable("devicegate::gate", &Level::DEBUG));
        assert!(filter.would_enable("devicegate::api", &Level::DEBUG));
        assert!(!filter.would_enable("devicegate::gate", &Level::TRACE));
        assert!(!filter.would_enable("hyper::proto", &Level::DEBUG));
        assert!(!filter.would_enable("tower_http::trace", &Level::DEBUG));
    }

    #[test]
    fn shutdown_without_exporter_is_noop() {
        shutdown_tracer();
    }
}
