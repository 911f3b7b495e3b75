//! Prometheus metrics for observability and monitoring.
//!
//! Covers the three places where something interesting happens:
//! - Guest token issuance, revocation and validation
//! - Channel authorization decisions
//! - Event queueing, discarding and publication
//!
//! # Example
//!
//! ```rust,no_run
//! use stayline_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // The binary serves `server.render()` at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address it should be scraped on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to expose metrics on (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address metrics should be served on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe all metrics and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// A second call in the same process (common in tests) logs a warning and
    /// leaves the existing recorder in place.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "stayline_tokens_issued_total",
        "Guest access tokens issued"
    );
    describe_counter!(
        "stayline_tokens_revoked_total",
        "Guest access tokens revoked, by reason"
    );
    describe_counter!(
        "stayline_token_validations_total",
        "Guest token validations, by outcome"
    );
    describe_counter!(
        "stayline_channel_auth_total",
        "Channel authorization decisions, by outcome"
    );
    describe_counter!(
        "stayline_events_queued_total",
        "Envelopes queued in an outbox"
    );
    describe_counter!(
        "stayline_events_discarded_total",
        "Queued envelopes dropped by rollback or failed commit"
    );
    describe_counter!(
        "stayline_events_published_total",
        "Envelopes accepted by the broker"
    );
    describe_counter!(
        "stayline_events_publish_failed_total",
        "Envelopes the broker rejected or did not accept in time"
    );
    describe_counter!(
        "stayline_follow_ups_total",
        "Post-commit follow-up actions, by outcome"
    );
    describe_histogram!(
        "stayline_publish_duration_seconds",
        "Time taken by a single broker publish"
    );
    describe_counter!(
        "stayline_unit_of_work_total",
        "Database units of work, by outcome"
    );
    describe_counter!(
        "stayline_relay_deliveries_total",
        "Deliveries read by the realtime relay, by outcome"
    );
    describe_gauge!(
        "stayline_realtime_connections",
        "Open realtime websocket connections"
    );
}

/// Token lifecycle metrics recorder.
pub struct TokenMetrics;

impl TokenMetrics {
    /// Record a token issued.
    pub fn record_issued() {
        counter!("stayline_tokens_issued_total").increment(1);
    }

    /// Record a token revoked for `reason`.
    pub fn record_revoked(reason: &'static str) {
        counter!("stayline_tokens_revoked_total", "reason" => reason).increment(1);
    }

    /// Record a validation with its internal `outcome` (`valid`, `expired`, ...).
    pub fn record_validation(outcome: &'static str) {
        counter!("stayline_token_validations_total", "outcome" => outcome).increment(1);
    }
}

/// Channel authorization metrics recorder.
pub struct ChannelAuthMetrics;

impl ChannelAuthMetrics {
    /// Record an authorization decision (`staff_granted`, `guest_denied`, ...).
    pub fn record(outcome: &'static str) {
        counter!("stayline_channel_auth_total", "outcome" => outcome).increment(1);
    }
}

/// Emission metrics recorder.
pub struct EmissionMetrics;

impl EmissionMetrics {
    /// Record envelopes queued.
    pub fn record_queued(count: usize) {
        counter!("stayline_events_queued_total").increment(count as u64);
    }

    /// Record envelopes discarded without publication.
    pub fn record_discarded(count: usize) {
        counter!("stayline_events_discarded_total").increment(count as u64);
    }

    /// Record a successful publish.
    pub fn record_published(duration: Duration) {
        counter!("stayline_events_published_total").increment(1);
        histogram!("stayline_publish_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a failed or timed-out publish.
    pub fn record_publish_failed() {
        counter!("stayline_events_publish_failed_total").increment(1);
    }

    /// Record a post-commit follow-up with its `outcome` (`ok`, `failed`).
    pub fn record_follow_up(outcome: &'static str) {
        counter!("stayline_follow_ups_total", "outcome" => outcome).increment(1);
    }
}

/// Realtime relay metrics recorder.
pub struct RelayMetrics;

impl RelayMetrics {
    /// Record one delivery read from the bus (`forwarded`, `duplicate`, `undecodable`).
    pub fn record_delivery(outcome: &'static str) {
        counter!("stayline_relay_deliveries_total", "outcome" => outcome).increment(1);
    }

    /// A websocket connection opened.
    pub fn connection_opened() {
        gauge!("stayline_realtime_connections").increment(1.0);
    }

    /// A websocket connection closed.
    pub fn connection_closed() {
        gauge!("stayline_realtime_connections").decrement(1.0);
    }
}
