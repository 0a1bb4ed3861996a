// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Serialize};

/// Order side as the venue sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side { Buy, Sell }
impl Side {
    pub fn opposite(&self) -> Side { match self { Side::Buy => Side::Sell, Side::Sell => Side::Buy } }
    pub fn as_str(&self) -> &'static str { match self { Side::Buy => "buy", Side::Sell => "sell" } }
}

/// Position direction claimed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction { Long, Short }
impl Direction {
    /// Side of the order that opens the position.
    pub fn entry_side(&self) -> Side { match self { Direction::Long => Side::Buy, Direction::Short => Side::Sell } }
}

/// Result of a field extraction that never fails: either the text said so,
/// or the fallback value was used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "lowercase")]
pub enum Extracted<T> {
    Matched(T),
    Defaulted(T),
}

impl<T> Extracted<T> {
    pub fn value(&self) -> &T {
        match self {
            Extracted::Matched(v) | Extracted::Defaulted(v) => v,
        }
    }
    pub fn is_defaulted(&self) -> bool { matches!(self, Extracted::Defaulted(_)) }
}

/// Fully triangulated signal: entry, stop-loss and at least one take-profit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSpec {
    pub symbol: Extracted<String>,
    pub direction: Extracted<Direction>,
    pub leverage: Extracted<u32>,
    pub entry: f64,
    pub stop_loss: f64,
    /// TP1..TP3 in label order, only the ones present (1..=3 entries).
    pub take_profits: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind { Market, TakeProfit, StopLoss }
impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "market",
            OrderKind::TakeProfit => "take_profit",
            OrderKind::StopLoss => "stop_loss",
        }
    }
}

/// Closing order attached to a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildOrder { pub kind: OrderKind, pub trigger_px: f64, pub size: f64, pub side: Side }

/// Sized order plan: parent market order + closing children (TPs first, SL last).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlan {
    pub symbol: String,
    pub side: Side,
    pub leverage: u32,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profits: Vec<f64>,
    pub base_size: f64,
    pub child_orders: Vec<ChildOrder>,
}

/// One leg sent to a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub cl_id: String,
    pub kind: OrderKind,
    pub side: Side,
    pub size: f64,
    pub trigger_px: Option<f64>,
}

/// All legs of one plan, submitted in order (parent first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission { pub cl_id: String, pub plan: OrderPlan, pub legs: Vec<Leg> }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecReport {
    pub cl_id: String,
    pub symbol: String,
    pub kind: OrderKind,
    pub status: ExecStatus,
    pub venue: String,
    pub raw: Option<serde_json::Value>,
    pub ts_ns: i128,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecStatus { Ack, Skipped(String), Rejected(String) }

/// Trade log line, written once per submitted plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: Side,
    pub entry: f64,
    pub sl: f64,
    pub tps: Vec<f64>,
    pub size: f64,
    pub lev: u32,
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event { Trade(TradeRecord), Exec(ExecReport), Note(String) }
