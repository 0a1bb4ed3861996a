// ===============================
// src/positions.rs (open-position poller)
// ===============================
//
// Hanya observasi: tidak ada rekonsiliasi posisi vs plan.
//
use std::sync::Arc;

use serde_json::Value;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

use crate::gateway_lbank::LbankClient;

/// Number of entries in the positions payload (`data` array or top-level array).
pub fn position_count(v: &Value) -> usize {
    v.get("data")
        .and_then(Value::as_array)
        .or_else(|| v.as_array())
        .map(|a| a.len())
        .unwrap_or(0)
}

pub async fn run(client: Arc<LbankClient>, every: Duration) {
    let mut tick = interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tick.tick().await;
        match client.open_positions().await {
            Ok(v) => info!(count = position_count(&v), positions = %v, "open positions"),
            Err(e) => warn!(?e, "positions query failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_position_count() {
        assert_eq!(position_count(&json!({"data": [{"symbol": "btc_usdt"}, {"symbol": "eth_usdt"}]})), 2);
        assert_eq!(position_count(&json!([{"symbol": "btc_usdt"}])), 1);
        assert_eq!(position_count(&json!({"error_code": 1})), 0);
    }
}
