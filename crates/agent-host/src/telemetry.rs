//! OTLP metrics pipeline.
//!
//! A single [`SdkMeterProvider`] is installed as the global meter provider,
//! tagged with the service identity and pushing to an OTLP/gRPC collector on a
//! fixed interval. Export failures are reported by the SDK's own logging and
//! never reach the caller.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use opentelemetry::global;
use opentelemetry::metrics::Counter;
use opentelemetry::metrics::Histogram;
use opentelemetry::metrics::Meter;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::MetricExporter;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::PeriodicReader;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use utils::version;

use crate::error::TelemetryError;

pub const DEFAULT_SERVICE_NAME: &str = "filecoin-agent";
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";
pub const DEFAULT_EXPORT_INTERVAL: Duration = Duration::from_secs(10);

const METER_NAME: &str = "agent-host";

pub const BACKUP_REQUESTS: &str = "agent.backup.requests";
pub const BACKUP_PAYLOAD_SIZE: &str = "agent.backup.payload_size";
pub const BACKUP_DURATION: &str = "agent.backup.duration";
pub const RESTORE_REQUESTS: &str = "agent.restore.requests";

static INITIALIZED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub endpoint: String,
    pub export_interval: Duration,
    pub enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            export_interval: DEFAULT_EXPORT_INTERVAL,
            enabled: true,
        }
    }
}

/// Resource attached to every exported metric.
pub fn resource(service_name: &str) -> Resource {
    Resource::builder_empty()
        .with_service_name(service_name.to_string())
        .with_attribute(KeyValue::new("service.version", version::VERSION.clone()))
        .build()
}

/// Handle to the process-wide metrics pipeline.
pub struct Telemetry {
    provider: Option<SdkMeterProvider>,
    metrics: AgentMetrics,
}

impl Telemetry {
    /// Installs the global meter provider.
    ///
    /// Must be called from within a tokio runtime, which drives the gRPC
    /// client. Fails if a provider was already installed by this process.
    pub fn init(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        Self::install(config, &INITIALIZED)
    }

    /// `installed` is only set once the provider is registered, so a failed
    /// attempt can be retried.
    fn install(config: &TelemetryConfig, installed: &AtomicBool) -> Result<Self, TelemetryError> {
        if !config.enabled {
            tracing::info!("telemetry disabled, metrics are not exported");
            return Ok(Self::disabled());
        }

        if installed.load(Ordering::SeqCst) {
            return Err(TelemetryError::AlreadyInitialized);
        }

        let exporter = MetricExporter::builder()
            .with_tonic()
            .with_endpoint(config.endpoint.clone())
            .build()
            .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

        let reader = PeriodicReader::builder(exporter)
            .with_interval(config.export_interval)
            .build();

        let provider = SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(resource(&config.service_name))
            .build();
        if installed.swap(true, Ordering::SeqCst) {
            return Err(TelemetryError::AlreadyInitialized);
        }
        global::set_meter_provider(provider.clone());

        tracing::info!(
            service_name = %config.service_name,
            endpoint = %config.endpoint,
            interval_secs = config.export_interval.as_secs(),
            "metrics exporter configured"
        );

        let metrics = AgentMetrics::new(&provider.meter(METER_NAME));
        Ok(Self {
            provider: Some(provider),
            metrics,
        })
    }

    /// Pipeline that records against the no-op global meter.
    pub fn disabled() -> Self {
        Self {
            provider: None,
            metrics: AgentMetrics::new(&global::meter(METER_NAME)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn metrics(&self) -> &AgentMetrics {
        &self.metrics
    }

    /// Flushes pending metrics and stops the exporter.
    pub fn shutdown(self) {
        let Some(provider) = self.provider else {
            return;
        };
        if let Err(err) = provider.shutdown() {
            tracing::warn!("failed to shut down meter provider: {err}");
        }
    }
}

/// Instruments recorded around agent calls.
#[derive(Clone)]
pub struct AgentMetrics {
    backup_requests: Counter<u64>,
    backup_payload_size: Histogram<u64>,
    backup_duration: Histogram<f64>,
    restore_requests: Counter<u64>,
}

impl AgentMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            backup_requests: meter
                .u64_counter(BACKUP_REQUESTS)
                .with_description("Backup calls issued to the agent")
                .build(),
            backup_payload_size: meter
                .u64_histogram(BACKUP_PAYLOAD_SIZE)
                .with_description("Size of backup payloads")
                .with_unit("By")
                .build(),
            backup_duration: meter
                .f64_histogram(BACKUP_DURATION)
                .with_description("Time spent inside backup calls")
                .with_unit("s")
                .build(),
            restore_requests: meter
                .u64_counter(RESTORE_REQUESTS)
                .with_description("Restore calls issued to the agent")
                .build(),
        }
    }

    pub fn record_backup(&self, payload_size: usize, elapsed: Duration, success: bool) {
        let attributes = outcome(success);
        self.backup_requests.add(1, &attributes);
        self.backup_payload_size
            .record(payload_size as u64, &attributes);
        self.backup_duration
            .record(elapsed.as_secs_f64(), &attributes);
    }

    pub fn record_restore(&self, success: bool) {
        self.restore_requests.add(1, &outcome(success));
    }
}

fn outcome(success: bool) -> [KeyValue; 1] {
    [KeyValue::new(
        "outcome",
        if success { "success" } else { "failure" },
    )]
}
