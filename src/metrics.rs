//! Prometheus metrics collection for forumd.
//!
//! Collectors live in process-wide `OnceLock`s and are registered by [`init`].
//! Recording before `init` is a no-op, so library code and unit tests never
//! need a registry.
//!
//! - `forum_connected_users` - users with a live connection (gauge)
//! - `forum_connections_total` - upgraded connections
//! - `forum_auth_failures_total{kind}` - refused handshakes
//! - `forum_messages_routed_total` - chat messages persisted and handed to the hub
//! - `forum_messages_dropped_total{reason}` - frames or messages not delivered
//! - `forum_presence_events_total{online}` - presence transitions
//! - `forum_presence_fanout` - recipients per presence event (histogram)
//! - `forum_protocol_errors_total{kind}` - ignored inbound frames
//! - `forum_transport_errors_total{kind}` - connections ended by a read or write failure

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Connections that completed the WebSocket upgrade.
pub static CONNECTIONS_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Handshakes refused by the session verifier, by error kind.
pub static AUTH_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

/// Chat messages persisted and routed.
pub static MESSAGES_ROUTED: OnceLock<IntCounter> = OnceLock::new();

/// Frames or messages that were not delivered, by reason.
pub static MESSAGES_DROPPED: OnceLock<IntCounterVec> = OnceLock::new();

/// Presence transitions, labelled `online="true"|"false"`.
pub static PRESENCE_EVENTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Ignored inbound frames, by protocol error kind.
pub static PROTOCOL_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Connections ended by a transport failure, by kind.
pub static TRANSPORT_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges and histograms
// ========================================================================

/// Users with a registered connection.
pub static CONNECTED_USERS: OnceLock<IntGauge> = OnceLock::new();

/// Recipients per presence event.
pub static PRESENCE_FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call once at startup, before the gateway accepts connections.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    if CONNECTED_USERS.get().is_some() {
        return;
    }

    register!(CONNECTIONS_TOTAL, IntCounter::new("forum_connections_total", "Upgraded WebSocket connections"));
    register!(AUTH_FAILURES, IntCounterVec::new(Opts::new("forum_auth_failures_total", "Refused handshakes by kind"), &["kind"]));
    register!(MESSAGES_ROUTED, IntCounter::new("forum_messages_routed_total", "Chat messages persisted and routed"));
    register!(MESSAGES_DROPPED, IntCounterVec::new(Opts::new("forum_messages_dropped_total", "Undelivered frames by reason"), &["reason"]));
    register!(PRESENCE_EVENTS, IntCounterVec::new(Opts::new("forum_presence_events_total", "Presence transitions"), &["online"]));
    register!(PROTOCOL_ERRORS, IntCounterVec::new(Opts::new("forum_protocol_errors_total", "Ignored inbound frames by kind"), &["kind"]));
    register!(TRANSPORT_ERRORS, IntCounterVec::new(Opts::new("forum_transport_errors_total", "Connections ended by a transport failure"), &["kind"]));
    register!(CONNECTED_USERS, IntGauge::new("forum_connected_users", "Users with a live connection"));
    register!(PRESENCE_FANOUT, Histogram::with_opts(
        HistogramOpts::new("forum_presence_fanout", "Recipients per presence event")
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Recording helpers
// ============================================================================

#[inline]
pub fn record_connection() {
    if let Some(c) = CONNECTIONS_TOTAL.get() {
        c.inc();
    }
}

#[inline]
pub fn record_auth_failure(kind: &str) {
    if let Some(c) = AUTH_FAILURES.get() {
        c.with_label_values(&[kind]).inc();
    }
}

#[inline]
pub fn record_routed() {
    if let Some(c) = MESSAGES_ROUTED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_dropped(reason: &str) {
    if let Some(c) = MESSAGES_DROPPED.get() {
        c.with_label_values(&[reason]).inc();
    }
}

#[inline]
pub fn record_presence(online: bool) {
    if let Some(c) = PRESENCE_EVENTS.get() {
        c.with_label_values(&[if online { "true" } else { "false" }]).inc();
    }
}

/// Record how many connections a presence event reached.
#[inline]
pub fn record_presence_fanout(recipients: usize) {
    if let Some(h) = PRESENCE_FANOUT.get() {
        h.observe(recipients as f64);
    }
}

#[inline]
pub fn record_protocol_error(kind: &str) {
    if let Some(c) = PROTOCOL_ERRORS.get() {
        c.with_label_values(&[kind]).inc();
    }
}

#[inline]
pub fn record_transport_error(kind: &str) {
    if let Some(c) = TRANSPORT_ERRORS.get() {
        c.with_label_values(&[kind]).inc();
    }
}

#[inline]
pub fn set_connected_users(count: usize) {
    if let Some(g) = CONNECTED_USERS.get() {
        g.set(count as i64);
    }
}
