// ===============================
// src/risk.rs
// ===============================
//
// Signal desk: teks -> SignalSpec -> saldo -> OrderPlan -> cek -> Submission.
// Pesan yang tidak actionable hanya dicatat (info), tidak ada order.
//
use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SizingCfg;
use crate::domain::{Event, Leg, OrderKind, OrderPlan, SignalSpec, Submission};
use crate::gateway::Account;
use crate::metrics::{EXTRACT_DEFAULTED, LAST_BASE_SIZE, MESSAGES, PLANS, PLANS_BLOCKED, SIGNALS_REJECTED};
use crate::parser::{SignalError, SignalParser};
use crate::planner::OrderPlanner;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RiskError {
    #[error("zero position size")]
    ZeroSize,
}

pub fn new_cl_id() -> String {
    let now: i128 = Utc::now().timestamp_nanos_opt().unwrap_or(0) as i128;
    format!("CL-{}-{}", now, rand::thread_rng().gen::<u32>())
}

/// Pre-submission check -> jika lolos, konversi OrderPlan menjadi Submission.
/// Zero-size plan diblok, zero-size child leg dibuang, kecuali `submit_zero_size`.
pub fn check(plan: OrderPlan, cl_id: String, submit_zero_size: bool) -> Result<Submission, RiskError> {
    if plan.base_size <= 0.0 && !submit_zero_size {
        return Err(RiskError::ZeroSize);
    }

    let mut legs = vec![Leg {
        cl_id: format!("{cl_id}-M"),
        kind: OrderKind::Market,
        side: plan.side,
        size: plan.base_size,
        trigger_px: None,
    }];
    let mut tp_no = 0;
    for child in &plan.child_orders {
        let suffix = match child.kind {
            OrderKind::TakeProfit => {
                tp_no += 1;
                format!("TP{tp_no}")
            }
            OrderKind::StopLoss => "SL".to_string(),
            OrderKind::Market => "M".to_string(),
        };
        if child.size <= 0.0 && !submit_zero_size {
            PLANS_BLOCKED.with_label_values(&["zero_size_leg"]).inc();
            continue;
        }
        legs.push(Leg {
            cl_id: format!("{cl_id}-{suffix}"),
            kind: child.kind,
            side: child.side,
            size: child.size,
            trigger_px: Some(child.trigger_px),
        });
    }
    Ok(Submission { cl_id, plan, legs })
}

fn note_defaults(spec: &SignalSpec) {
    if spec.symbol.is_defaulted() {
        warn!(symbol = %spec.symbol.value(), "no pair in message, using default symbol");
        EXTRACT_DEFAULTED.with_label_values(&["symbol"]).inc();
    }
    if spec.direction.is_defaulted() {
        warn!("no LONG/SHORT keyword, defaulting to short");
        EXTRACT_DEFAULTED.with_label_values(&["side"]).inc();
    }
    if spec.leverage.is_defaulted() {
        warn!(lev = *spec.leverage.value(), "no usable leverage in message, using default");
        EXTRACT_DEFAULTED.with_label_values(&["leverage"]).inc();
    }
}

pub struct Desk {
    parser: SignalParser,
    planner: OrderPlanner,
    account: Account,
    submit_zero_size: bool,
}

impl Desk {
    pub fn new(sizing: &SizingCfg, account: Account, submit_zero_size: bool) -> Self {
        Self {
            parser: SignalParser::new(sizing),
            planner: OrderPlanner::new(sizing),
            account,
            submit_zero_size,
        }
    }

    /// One message end to end. `None` means nothing is to be submitted.
    pub async fn handle(&self, text: &str, rec_tx: &mpsc::Sender<Event>) -> Option<Submission> {
        MESSAGES.inc();
        let spec = match self.parser.parse(text) {
            Ok(s) => s,
            Err(e) => {
                let SignalError::NotActionable { missing } = &e;
                for m in missing {
                    SIGNALS_REJECTED.with_label_values(&[*m]).inc();
                }
                info!(reason = %e, "message ignored");
                if rec_tx.send(Event::Note(e.to_string())).await.is_err() {
                    debug!("trade log closed, note dropped");
                }
                return None;
            }
        };
        note_defaults(&spec);

        let cl_id = new_cl_id();
        let avail = self.account.available_balance().await;
        let plan = self.planner.plan(&spec, avail);
        PLANS.inc();
        LAST_BASE_SIZE.set(plan.base_size);
        info!(
            %cl_id,
            symbol = %plan.symbol,
            side = plan.side.as_str(),
            lev = plan.leverage,
            avail,
            size = plan.base_size,
            tps = ?plan.take_profits,
            sl = plan.stop_loss,
            "order plan"
        );

        match check(plan, cl_id, self.submit_zero_size) {
            Ok(sub) => Some(sub),
            Err(e) => {
                warn!(?e, avail, "plan blocked");
                PLANS_BLOCKED.with_label_values(&["zero_size"]).inc();
                if rec_tx.send(Event::Note(format!("plan blocked: {e}"))).await.is_err() {
                    debug!("trade log closed, note dropped");
                }
                None
            }
        }
    }
}

/// Task desk: menerima teks sinyal, mengirim Submission yang valid ke gateway.
pub async fn run(
    mut msg_rx: mpsc::Receiver<String>,
    sub_tx: mpsc::Sender<Submission>,
    rec_tx: mpsc::Sender<Event>,
    desk: Desk,
) {
    while let Some(text) = msg_rx.recv().await {
        if let Some(sub) = desk.handle(&text, &rec_tx).await {
            if let Err(e) = sub_tx.send(sub).await {
                warn!(?e, "venue channel closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;

    const MSG: &str = "#ETH/USDT LONG\nlev 10x\nEnter price: 100\nTP1: 110\nTP2: 120\nStop Loss: 90";

    fn desk(balance: f64, submit_zero_size: bool) -> Desk {
        Desk::new(&SizingCfg::default(), Account::Mock { balance }, submit_zero_size)
    }

    #[tokio::test]
    async fn test_desk_builds_submission() {
        let (rec_tx, _rec_rx) = mpsc::channel(8);
        let sub = desk(1000.0, false).handle(MSG, &rec_tx).await.unwrap();
        assert_eq!(sub.plan.symbol, "eth_usdt");
        assert!((sub.plan.base_size - 30.0).abs() < 1e-9);

        let kinds: Vec<OrderKind> = sub.legs.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![OrderKind::Market, OrderKind::TakeProfit, OrderKind::TakeProfit, OrderKind::StopLoss]
        );
        assert_eq!(sub.legs[0].side, Side::Buy);
        assert!(sub.legs[1..].iter().all(|l| l.side == Side::Sell));
        assert!((sub.legs[1].size - 15.0).abs() < 1e-9);
        assert!(sub.legs[0].cl_id.ends_with("-M"));
        assert!(sub.legs[2].cl_id.ends_with("-TP2"));
        assert!(sub.legs[3].cl_id.ends_with("-SL"));
    }

    #[tokio::test]
    async fn test_zero_tp_level_gives_size_to_remaining_tp() {
        let (rec_tx, _rec_rx) = mpsc::channel(8);
        let msg = "#ETH/USDT LONG\nlev 10x\nEnter price: 100\nTP1: 0\nTP2: 120\nStop Loss: 90";
        let sub = desk(1000.0, false).handle(msg, &rec_tx).await.unwrap();

        let kinds: Vec<OrderKind> = sub.legs.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![OrderKind::Market, OrderKind::TakeProfit, OrderKind::StopLoss]);
        assert_eq!(sub.legs[1].trigger_px, Some(120.0));
        assert!((sub.legs[1].size - 30.0).abs() < 1e-9);
        assert!(sub.legs.iter().all(|l| l.trigger_px.map_or(true, |px| px > 0.0)));
    }

    #[tokio::test]
    async fn test_not_actionable_is_noted_not_submitted() {
        let (rec_tx, mut rec_rx) = mpsc::channel(8);
        let out = desk(1000.0, false)
            .handle("ETH/USDT LONG\nEnter price: 100\nStop Loss: 90", &rec_tx)
            .await;
        assert!(out.is_none());
        match rec_rx.try_recv() {
            Ok(Event::Note(n)) => assert!(n.contains("take_profit")),
            other => panic!("expected note, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_balance_blocked_by_default() {
        let (rec_tx, _rec_rx) = mpsc::channel(8);
        assert!(desk(0.0, false).handle(MSG, &rec_tx).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_balance_forwarded_when_allowed() {
        let (rec_tx, _rec_rx) = mpsc::channel(8);
        let sub = desk(0.0, true).handle(MSG, &rec_tx).await.unwrap();
        assert_eq!(sub.plan.base_size, 0.0);
        assert_eq!(sub.legs.len(), 4);
    }

    #[test]
    fn test_zero_size_child_leg_dropped() {
        use crate::domain::ChildOrder;
        let plan = OrderPlan {
            symbol: "sol_usdt".into(),
            side: Side::Sell,
            leverage: 12,
            entry: 100.0,
            stop_loss: 110.0,
            take_profits: vec![90.0, 80.0],
            base_size: 3.0,
            child_orders: vec![
                ChildOrder { kind: OrderKind::TakeProfit, trigger_px: 90.0, size: 0.0, side: Side::Buy },
                ChildOrder { kind: OrderKind::TakeProfit, trigger_px: 80.0, size: 3.0, side: Side::Buy },
                ChildOrder { kind: OrderKind::StopLoss, trigger_px: 110.0, size: 3.0, side: Side::Buy },
            ],
        };
        let sub = check(plan, "CL-9".into(), false).unwrap();
        let ids: Vec<&str> = sub.legs.iter().map(|l| l.cl_id.as_str()).collect();
        assert_eq!(ids, vec!["CL-9-M", "CL-9-TP2", "CL-9-SL"]);
    }

    #[tokio::test]
    async fn test_run_forwards_only_actionable() {
        let (msg_tx, msg_rx) = mpsc::channel(4);
        let (sub_tx, mut sub_rx) = mpsc::channel(4);
        let (rec_tx, _rec_rx) = mpsc::channel(8);
        let h = tokio::spawn(run(msg_rx, sub_tx, rec_tx, desk(1000.0, false)));

        msg_tx.send("nothing here".to_string()).await.unwrap();
        msg_tx.send(MSG.to_string()).await.unwrap();
        drop(msg_tx);
        h.await.unwrap();

        let first = sub_rx.recv().await.unwrap();
        assert_eq!(first.plan.symbol, "eth_usdt");
        assert!(sub_rx.recv().await.is_none());
    }
}
