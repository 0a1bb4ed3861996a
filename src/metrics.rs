// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Signal pipeline --------
pub static MESSAGES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("messages_total", "raw messages received").unwrap());

pub static SIGNALS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("signals_rejected_total", "messages not actionable (label: missing field)"),
        &["missing"],
    )
    .unwrap()
});

pub static EXTRACT_DEFAULTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("extract_defaulted_total", "extractions that fell back to a default"),
        &["field"],
    )
    .unwrap()
});

pub static PLANS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("plans_total", "order plans built").unwrap());

pub static PLANS_BLOCKED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("plans_blocked_total", "order plans blocked before submission"),
        &["reason"],
    )
    .unwrap()
});

// -------- Venue --------
pub static LEGS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("venue_legs_total", "order legs by kind/status/venue"),
        &["kind", "status", "venue"],
    )
    .unwrap()
});

pub static AVAILABLE_BALANCE: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new("available_balance", "last available quote balance reported by venue").unwrap()
});

pub static LAST_BASE_SIZE: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("last_plan_base_size", "base size of the last plan").unwrap());

// ---- Config visibility ----
pub static CONFIG_SOURCE_MODE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_source_mode", "signal source (label: mode)"),
        &["mode"],
    )
    .unwrap()
});

pub static CONFIG_VENUE_MODE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_venue_mode", "venue mode (label: mode)"),
        &["mode"],
    )
    .unwrap()
});

pub static CONFIG_DEFAULT_LEVERAGE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("config_default_leverage", "fallback leverage").unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(MESSAGES.clone())),
        REGISTRY.register(Box::new(SIGNALS_REJECTED.clone())),
        REGISTRY.register(Box::new(EXTRACT_DEFAULTED.clone())),
        REGISTRY.register(Box::new(PLANS.clone())),
        REGISTRY.register(Box::new(PLANS_BLOCKED.clone())),
        REGISTRY.register(Box::new(LEGS.clone())),
        REGISTRY.register(Box::new(AVAILABLE_BALANCE.clone())),
        REGISTRY.register(Box::new(LAST_BASE_SIZE.clone())),
        // Config visibility
        REGISTRY.register(Box::new(CONFIG_SOURCE_MODE.clone())),
        REGISTRY.register(Box::new(CONFIG_VENUE_MODE.clone())),
        REGISTRY.register(Box::new(CONFIG_DEFAULT_LEVERAGE.clone())),
    ] {
        if let Err(e) = m {
            tracing::debug!(?e, "metric already registered");
        }
    }
}

fn encode_metrics() -> Vec<u8> {
    let mut buf = Vec::new();
    let families = REGISTRY.gather();
    if TextEncoder::new().encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// One request per connection, no header parsing
fn handle_client(mut stream: TcpStream) {
    let mut req = [0u8; 1024];
    let _ = stream.read(&mut req);

    let body = encode_metrics();
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

/// Exporter on a plain OS thread; bind failure only disables metrics.
pub fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(?e, %addr, "metrics bind failed, exporter disabled");
                return;
            }
        };
        tracing::info!(%addr, "metrics listening");
        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => tracing::warn!(?e, "metrics accept error"),
            }
        }
    });
}
