// ===============================
// src/gateway.rs (mock venue + account front)
// ===============================
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::{sync::mpsc, time::{sleep, Duration}};
use tracing::warn;

use crate::domain::{Event, ExecReport, ExecStatus, Leg, OrderKind, Submission, TradeRecord};
use crate::gateway_lbank::LbankClient;
use crate::metrics::{AVAILABLE_BALANCE, LEGS};

/// Where the desk asks for available balance.
#[derive(Clone)]
pub enum Account {
    Mock { balance: f64 },
    LBank(Arc<LbankClient>),
}

impl Account {
    /// Never fails: any venue error reads as 0.
    pub async fn available_balance(&self) -> f64 {
        let bal = match self {
            Account::Mock { balance } => *balance,
            Account::LBank(client) => client.available_usdt().await,
        };
        AVAILABLE_BALANCE.set(bal);
        bal
    }
}

pub(crate) fn now_ns() -> i128 {
    Utc::now().timestamp_nanos_opt().unwrap_or(0) as i128
}

pub(crate) fn report(sub: &Submission, leg: &Leg, status: ExecStatus, raw: Option<Value>, venue: &str) -> ExecReport {
    let label = match &status {
        ExecStatus::Ack => "ack",
        ExecStatus::Skipped(_) => "skipped",
        ExecStatus::Rejected(_) => "rejected",
    };
    LEGS.with_label_values(&[leg.kind.as_str(), label, venue]).inc();
    ExecReport {
        cl_id: leg.cl_id.clone(),
        symbol: sub.plan.symbol.clone(),
        kind: leg.kind,
        status,
        venue: venue.to_string(),
        raw,
        ts_ns: now_ns(),
    }
}

pub(crate) fn trade_record(sub: &Submission, result: Option<Value>) -> TradeRecord {
    let p = &sub.plan;
    TradeRecord {
        symbol: p.symbol.clone(),
        side: p.side,
        entry: p.entry,
        sl: p.stop_loss,
        tps: p.take_profits.clone(),
        size: p.base_size,
        lev: p.leverage,
        result,
    }
}

/// Mock venue: ACK setiap leg setelah `ack_ms`.
pub async fn run_venue(
    mut rx: mpsc::Receiver<Submission>,
    exec_tx: mpsc::Sender<ExecReport>,
    rec_tx: mpsc::Sender<Event>,
    venue: String,
    ack_ms: u64,
) {
    while let Some(sub) = rx.recv().await {
        for leg in &sub.legs {
            sleep(Duration::from_millis(ack_ms)).await;
            let raw = json!({ "result": true, "order_id": leg.cl_id, "size": leg.size });
            if leg.kind == OrderKind::Market {
                if rec_tx.send(Event::Trade(trade_record(&sub, Some(raw.clone())))).await.is_err() {
                    warn!(cl_id = %sub.cl_id, "trade log closed, trade record dropped");
                }
            }
            let _ = exec_tx.send(report(&sub, leg, ExecStatus::Ack, Some(raw), &venue)).await;
        }
    }
}
