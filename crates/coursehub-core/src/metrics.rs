//! `OpenTelemetry` metrics for coursehub.
//!
//! This module is only compiled when the `metrics` Cargo feature is enabled.
//! [`init_metrics`] wires the OTLP exporter for traces and metrics; the
//! `record_*` helpers bump the session and enrollment counters through the
//! global meter, so they are cheap no-ops until a provider is installed.

use std::sync::OnceLock;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;

const METER_NAME: &str = "coursehub";

/// Errors that can occur during metrics / tracing pipeline initialisation.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to build an OTLP exporter.
    #[error("failed to build OTLP exporter: {0}")]
    ExporterBuild(#[from] opentelemetry_otlp::ExporterBuildError),

    /// Failed during `OTel` SDK shutdown or flush.
    #[error("OpenTelemetry SDK error: {0}")]
    Sdk(#[from] opentelemetry_sdk::error::OTelSdkError),
}

/// Keeps the `OpenTelemetry` providers alive; call [`MetricsGuard::shutdown`]
/// before exiting to flush.
pub struct MetricsGuard {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl MetricsGuard {
    /// Gracefully shut down both providers, flushing any buffered telemetry.
    pub fn shutdown(self) -> Result<(), MetricsError> {
        self.tracer_provider.shutdown()?;
        self.meter_provider.shutdown()?;
        Ok(())
    }
}

/// Initialise the OTLP pipeline for traces and metrics.
///
/// * `endpoint` -- OTLP receiver URL, e.g. `"http://localhost:4317"` (gRPC).
pub fn init_metrics(endpoint: &str) -> Result<MetricsGuard, MetricsError> {
    let trace_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(trace_exporter)
        .build();

    global::set_tracer_provider(tracer_provider.clone());

    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let meter_provider = SdkMeterProvider::builder()
        .with_periodic_exporter(metric_exporter)
        .build();

    global::set_meter_provider(meter_provider.clone());

    Ok(MetricsGuard {
        tracer_provider,
        meter_provider,
    })
}

struct Counters {
    logins: Counter<u64>,
    revocations: Counter<u64>,
    certificates: Counter<u64>,
}

fn counters() -> &'static Counters {
    static COUNTERS: OnceLock<Counters> = OnceLock::new();
    COUNTERS.get_or_init(|| {
        let meter = global::meter(METER_NAME);
        Counters {
            logins: meter
                .u64_counter("coursehub.session.logins")
                .with_description("Login attempts by outcome")
                .build(),
            revocations: meter
                .u64_counter("coursehub.session.revocations")
                .with_description("Tokens added to the revocation list")
                .build(),
            certificates: meter
                .u64_counter("coursehub.enrollment.certificates_issued")
                .with_description("Completion certificates created")
                .build(),
        }
    })
}

/// Count a login attempt; `outcome` is `"success"` or `"rejected"`.
pub fn record_login(outcome: &'static str) {
    counters().logins.add(1, &[KeyValue::new("outcome", outcome)]);
}

pub fn record_revocation() {
    counters().revocations.add(1, &[]);
}

pub fn record_certificate_issued() {
    counters().certificates.add(1, &[]);
}
