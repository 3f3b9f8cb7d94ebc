// ===============================
// src/metrics.rs
// ===============================
use std::convert::Infallible;
use std::net::SocketAddr;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use tracing::{error, info};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Backend API --------
pub static API_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "api_requests_total",
            "backend API calls (labels: endpoint, outcome)",
        ),
        &["endpoint", "outcome"],
    )
    .unwrap()
});

// Latency per endpoint (milliseconds)
pub static API_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("api_latency_ms", "Backend API latency (ms)").buckets(vec![
            5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
        ]),
        &["endpoint"],
    )
    .unwrap()
});

// -------- Console --------
pub static NOTICES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("notifications_total", "notifications raised (label: kind)"),
        &["kind"],
    )
    .unwrap()
});

pub static DASHBOARD_REFRESHES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dashboard_refreshes_total",
        "background dashboard refresh rounds",
    )
    .unwrap()
});

// ---- Config visibility ----
pub static CONFIG_ROLE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_role", "page role of this console (label: role)"),
        &["role"],
    )
    .unwrap()
});

pub fn init() {
    for m in [
        REGISTRY.register(Box::new(API_REQUESTS.clone())),
        REGISTRY.register(Box::new(API_LATENCY.clone())),
        REGISTRY.register(Box::new(NOTICES.clone())),
        REGISTRY.register(Box::new(DASHBOARD_REFRESHES.clone())),
        REGISTRY.register(Box::new(CONFIG_ROLE.clone())),
    ] {
        if let Err(e) = m {
            tracing::debug!(?e, "metric already registered");
        }
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

async fn handle(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let rsp = match req.uri().path() {
        "/" | "/metrics" => Response::builder()
            .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
            .body(Body::from(encode_metrics())),
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("not found\n")),
    };
    Ok(rsp.unwrap_or_else(|_| Response::new(Body::empty())))
}

pub async fn serve_metrics(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let make_svc = make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(handle)) });

    let server = match Server::try_bind(&addr) {
        Ok(b) => b.serve(make_svc),
        Err(e) => {
            error!(?e, %addr, "metrics bind failed");
            return;
        }
    };
    info!(%addr, "metrics listening on / and /metrics");
    if let Err(e) = server.await {
        error!(?e, "metrics server stopped");
    }
}
