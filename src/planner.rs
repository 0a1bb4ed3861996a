// ===============================
// src/planner.rs
// ===============================
//
// SignalSpec + available balance -> OrderPlan.
//
// - notional  = max(0, 30% * balance * leverage)
// - base_size = notional / entry, 6 desimal (0 kalau entry <= 0)
// - TP: bobot allocation diambil sebanyak TP yang ada, lalu dinormalisasi ulang
// - SL: selalu full base_size, diletakkan paling akhir
//
// Planner murni (tanpa I/O); eksekusi ada di gateway.
//

use crate::config::{AllocationProfile, SizingCfg};
use crate::domain::{ChildOrder, OrderKind, OrderPlan, SignalSpec};

/// Fraction of available balance committed per signal.
pub const RISK_FRACTION: f64 = 0.30;
pub const SIZE_DECIMALS: i32 = 6;

fn round_to(v: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (v * f).round() / f
}

/// Position size in base-asset units.
pub fn base_size(available_balance: f64, leverage: u32, entry: f64) -> f64 {
    let notional = (RISK_FRACTION * available_balance * leverage as f64).max(0.0);
    if entry > 0.0 {
        round_to(notional / entry, SIZE_DECIMALS)
    } else {
        0.0
    }
}

/// Split `base` over the first `k` profile slots, re-normalized over those slots.
pub fn split_sizes(base: f64, profile: &AllocationProfile, k: usize) -> Vec<f64> {
    let slots = &profile.weights()[..k.min(3)];
    let sum: f64 = slots.iter().sum();
    let sum = if sum > 0.0 { sum } else { 1.0 };
    slots.iter().map(|w| (base * w / sum).max(0.0)).collect()
}

#[derive(Debug, Clone)]
pub struct OrderPlanner {
    allocation: AllocationProfile,
}

impl OrderPlanner {
    pub fn new(cfg: &SizingCfg) -> Self {
        Self { allocation: cfg.allocation }
    }

    pub fn plan(&self, spec: &SignalSpec, available_balance: f64) -> OrderPlan {
        let leverage = *spec.leverage.value();
        let side = spec.direction.value().entry_side();
        let close_side = side.opposite();
        let size = base_size(available_balance, leverage, spec.entry);

        let tp_sizes = split_sizes(size, &self.allocation, spec.take_profits.len());
        let mut child_orders: Vec<ChildOrder> = spec
            .take_profits
            .iter()
            .zip(tp_sizes)
            .map(|(&px, sz)| ChildOrder { kind: OrderKind::TakeProfit, trigger_px: px, size: sz, side: close_side })
            .collect();

        // SL menutup seluruh posisi, tidak dikurangi oleh TP
        child_orders.push(ChildOrder {
            kind: OrderKind::StopLoss,
            trigger_px: spec.stop_loss,
            size,
            side: close_side,
        });

        let plan = OrderPlan {
            symbol: spec.symbol.value().clone(),
            side,
            leverage,
            entry: spec.entry,
            stop_loss: spec.stop_loss,
            take_profits: spec.take_profits.clone(),
            base_size: size,
            child_orders,
        };
        debug_assert!(plan.take_profit_total() <= plan.base_size + 1e-9);
        plan
    }
}

impl OrderPlan {
    pub fn take_profit_total(&self) -> f64 {
        self.child_orders
            .iter()
            .filter(|c| c.kind == OrderKind::TakeProfit)
            .map(|c| c.size)
            .sum()
    }
}
