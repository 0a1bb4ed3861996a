// ===============================
// src/gateway_lbank.rs
// ===============================
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{sleep, Duration},
};
use url::Url;

use crate::domain::{Event, ExecReport, ExecStatus, Leg, OrderKind, Submission};
use crate::gateway::{report, trade_record};
use crate::lbank::{
    encode_params, is_accepted, parse_available_usdt, signed_params, timestamp_ms, BALANCE_PATH,
    ORDER_PATH, POSITIONS_PATH,
};

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bad url: {0}")]
    Url(#[from] url::ParseError),
    #[error("missing config: {0}")]
    Missing(&'static str),
}

/// LBank futures REST client (form POST, HMAC-SHA256 signed).
pub struct LbankClient {
    http: reqwest::Client,
    base: Url,
    api_key: String,
    api_secret: String,
}

impl LbankClient {
    pub fn new(
        rest_base: &str,
        api_key: Option<String>,
        api_secret: Option<String>,
    ) -> Result<Self, VenueError> {
        let api_key = api_key.ok_or(VenueError::Missing("LBANK_API_KEY"))?;
        let api_secret = api_secret.ok_or(VenueError::Missing("LBANK_API_SECRET"))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self { http, base: Url::parse(rest_base)?, api_key, api_secret })
    }

    async fn request(&self, path: &str, params: Vec<(String, String)>) -> Result<Value, VenueError> {
        let url = self.base.join(path)?;
        let body = encode_params(&signed_params(params, &self.api_key, &self.api_secret, timestamp_ms()));
        let rsp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        Ok(rsp.json::<Value>().await?)
    }

    /// USDT/USD available balance; 0 on any failure.
    pub async fn available_usdt(&self) -> f64 {
        match self.request(BALANCE_PATH, Vec::new()).await {
            Ok(v) => parse_available_usdt(&v).unwrap_or_else(|| {
                tracing::warn!(resp = %v, "balance: no usdt asset in response");
                0.0
            }),
            Err(e) => {
                tracing::error!(?e, "balance query failed");
                0.0
            }
        }
    }

    pub async fn open_positions(&self) -> Result<Value, VenueError> {
        self.request(POSITIONS_PATH, Vec::new()).await
    }

    pub async fn place(&self, symbol: &str, leg: &Leg, leverage: u32) -> Result<Value, VenueError> {
        self.request(ORDER_PATH, leg_params(symbol, leg, leverage)).await
    }
}

fn kv(k: &str, v: impl ToString) -> (String, String) {
    (k.to_string(), v.to_string())
}

/// Order form fields, unsigned. Field order follows the venue examples.
pub fn leg_params(symbol: &str, leg: &Leg, leverage: u32) -> Vec<(String, String)> {
    match leg.kind {
        OrderKind::Market => vec![
            kv("symbol", symbol),
            kv("type", "market"),
            kv("side", leg.side.as_str()),
            kv("size", leg.size),
            kv("open_type", "isolated"),
            kv("leverage", leverage),
            kv("position_id", 0),
        ],
        OrderKind::TakeProfit | OrderKind::StopLoss => {
            let ty = if leg.kind == OrderKind::TakeProfit { "take_profit" } else { "stop" };
            vec![
                kv("symbol", symbol),
                kv("side", leg.side.as_str()),
                kv("size", leg.size),
                kv("type", ty),
                kv("stop_price", leg.trigger_px.unwrap_or_default()),
                kv("leverage", leverage),
                kv("open_type", "isolated"),
            ]
        }
    }
}

/// Submit legs in order. Parent rejected -> child legs skipped. No retry.
pub async fn run_venue_lbank(
    client: Arc<LbankClient>,
    mut rx: mpsc::Receiver<Submission>,
    exec_tx: mpsc::Sender<ExecReport>,
    rec_tx: mpsc::Sender<Event>,
    venue: String,
) {
    while let Some(sub) = rx.recv().await {
        let mut parent_ok = true;
        for leg in &sub.legs {
            if !parent_ok {
                let er = report(&sub, leg, ExecStatus::Skipped("parent rejected".into()), None, &venue);
                let _ = exec_tx.send(er).await;
                continue;
            }

            let (status, raw) = match client.place(&sub.plan.symbol, leg, sub.plan.leverage).await {
                Ok(v) if is_accepted(&v) => (ExecStatus::Ack, Some(v)),
                Ok(v) => (ExecStatus::Rejected(v.to_string()), Some(v)),
                Err(e) => {
                    tracing::error!(?e, cl_id = %leg.cl_id, "order send err");
                    (ExecStatus::Rejected(e.to_string()), None)
                }
            };

            if leg.kind == OrderKind::Market {
                parent_ok = status == ExecStatus::Ack;
                if rec_tx.send(Event::Trade(trade_record(&sub, raw.clone()))).await.is_err() {
                    tracing::warn!(cl_id = %sub.cl_id, "trade log closed, trade record dropped");
                }
            }
            let _ = exec_tx.send(report(&sub, leg, status, raw, &venue)).await;

            // pacing kecil agar tidak kena rate limit
            sleep(Duration::from_millis(50)).await;
        }
    }
}
