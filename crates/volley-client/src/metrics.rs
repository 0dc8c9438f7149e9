//! Prometheus view of the load counters, served over HTTP while a run is active.

use crate::engine::counters::{Counters, Snapshot};
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct LoadMetrics {
    registry: Registry,
    counters: Arc<Counters>,
    requests_sent: IntCounter,
    responses_received: IntCounter,
    send_failures: IntCounter,
    response_timeouts: IntCounter,
    response_errors: IntCounter,
    connect_failures: IntCounter,
    active_connections: IntGauge,
    // Last snapshot pushed into the registry; counters only move forward.
    exported: Mutex<Snapshot>,
}

impl LoadMetrics {
    pub fn new(counters: Arc<Counters>) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_sent =
            IntCounter::new("volley_requests_sent_total", "Requests written to the target")?;
        let responses_received = IntCounter::new(
            "volley_responses_received_total",
            "Responses received before their deadline",
        )?;
        let send_failures =
            IntCounter::new("volley_send_failures_total", "Requests that could not be written")?;
        let response_timeouts = IntCounter::new(
            "volley_response_timeouts_total",
            "Requests whose response deadline expired",
        )?;
        let response_errors = IntCounter::new(
            "volley_response_errors_total",
            "Response reads that failed or were cancelled",
        )?;
        let connect_failures =
            IntCounter::new("volley_connect_failures_total", "Failed connect attempts")?;
        let active_connections = IntGauge::new(
            "volley_active_connections",
            "Number of currently established connections",
        )?;

        registry.register(Box::new(requests_sent.clone()))?;
        registry.register(Box::new(responses_received.clone()))?;
        registry.register(Box::new(send_failures.clone()))?;
        registry.register(Box::new(response_timeouts.clone()))?;
        registry.register(Box::new(response_errors.clone()))?;
        registry.register(Box::new(connect_failures.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;

        Ok(Self {
            registry,
            counters,
            requests_sent,
            responses_received,
            send_failures,
            response_timeouts,
            response_errors,
            connect_failures,
            active_connections,
            exported: Mutex::new(Snapshot::default()),
        })
    }

    fn update_metrics(&self) {
        let now = self.counters.snapshot();
        let mut last = self.exported.lock().unwrap_or_else(|e| e.into_inner());

        self.requests_sent.inc_by(now.sent.saturating_sub(last.sent));
        self.responses_received
            .inc_by(now.received.saturating_sub(last.received));
        self.send_failures
            .inc_by(now.send_failures.saturating_sub(last.send_failures));
        self.response_timeouts
            .inc_by(now.timeouts.saturating_sub(last.timeouts));
        self.response_errors
            .inc_by(now.read_errors.saturating_sub(last.read_errors));
        self.connect_failures
            .inc_by(now.connect_failures.saturating_sub(last.connect_failures));
        self.active_connections.set(now.active_links as i64);

        *last = now;
    }

    pub fn render(&self) -> String {
        self.update_metrics();

        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();

        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            return format!("# Error encoding metrics: {}", e);
        }

        String::from_utf8(buffer).unwrap_or_else(|_| "# Error: Invalid UTF8".to_string())
    }
}

async fn metrics_handler(
    req: Request<Body>,
    metrics: Arc<LoadMetrics>,
) -> Result<Response<Body>, Infallible> {
    match req.uri().path() {
        "/health" => Ok(Response::new(Body::from("OK"))),
        "/metrics" => Ok(Response::new(Body::from(metrics.render()))),
        _ => {
            let mut not_found = Response::new(Body::from("Not Found"));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            Ok(not_found)
        }
    }
}

/// Serves `/metrics` and `/health` until `shutdown` is cancelled.
pub async fn run_metrics_server(metrics: Arc<LoadMetrics>, port: u16, shutdown: CancellationToken) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let make_svc = make_service_fn(move |_conn| {
        let metrics = Arc::clone(&metrics);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                metrics_handler(req, Arc::clone(&metrics))
            }))
        }
    });

    let server = match Server::try_bind(&addr) {
        Ok(builder) => builder.serve(make_svc),
        Err(e) => {
            error!(port = port, error = %e, "Metrics server failed to bind");
            return;
        }
    };

    info!(port = port, "Metrics server online");

    let stopped = async move { shutdown.cancelled().await };
    if let Err(e) = server.with_graceful_shutdown(stopped).await {
        error!(error = %e, "Metrics server failed");
    }
}
