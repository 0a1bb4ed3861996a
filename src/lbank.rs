// ===============================
// src/lbank.rs
// ===============================
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

pub const ORDER_PATH: &str = "/v2/futures/order";
pub const BALANCE_PATH: &str = "/v2/futures/balance";
pub const POSITIONS_PATH: &str = "/v2/futures/positions";

pub fn timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// url-encoded form body, field order preserved
pub fn encode_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn sign_query(secret: &str, query: &str) -> String {
    // HMAC-SHA256 menerima key dengan panjang berapa pun
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC key");
    mac.update(query.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Append `api_key`, `timestamp` and `sign` (over everything before it).
pub fn signed_params(
    mut params: Vec<(String, String)>,
    api_key: &str,
    secret: &str,
    ts_ms: u64,
) -> Vec<(String, String)> {
    params.push(("api_key".to_string(), api_key.to_string()));
    params.push(("timestamp".to_string(), ts_ms.to_string()));
    let sig = sign_query(secret, &encode_params(&params));
    params.push(("sign".to_string(), sig));
    params
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Nilai "kosong" ala JSON: null, false, 0, "", [] dan {}.
fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|x| x != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// ---- Balance response ----
// Bentuk yang diharapkan: {"assets":[{"asset":"USDT","available":"123.45"}]}
// atau {"data":[{"currency":"usdt","availableBalance":12.3}]}
pub fn parse_available_usdt(v: &Value) -> Option<f64> {
    let assets = v
        .get("assets")
        .filter(|a| is_truthy(a))
        .or_else(|| v.get("data"))?
        .as_array()?;
    for a in assets {
        let sym = a
            .get("asset")
            .or_else(|| a.get("currency"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_ascii_uppercase();
        if sym != "USDT" && sym != "USD" {
            continue;
        }
        let avail = ["available", "availableBalance", "free"]
            .iter()
            .find_map(|k| a.get(*k).filter(|x| !x.is_null()));
        if let Some(x) = avail {
            return as_f64(x);
        }
    }
    None
}

/// `result` absent counts as accepted; any empty value (false, null, 0, "", [], {}) as rejected.
pub fn is_accepted(v: &Value) -> bool {
    v.get("result").map_or(true, is_truthy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_signed_params_layout() {
        let params = vec![p("symbol", "btc_usdt"), p("type", "market"), p("side", "buy"), p("size", "0.5")];
        let out = signed_params(params, "key", "secret", 1_700_000_000_000);
        let keys: Vec<&str> = out.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["symbol", "type", "side", "size", "api_key", "timestamp", "sign"]);
        assert_eq!(
            encode_params(&out[..6]),
            "symbol=btc_usdt&type=market&side=buy&size=0.5&api_key=key&timestamp=1700000000000"
        );
        assert_eq!(out[6].1, "f69dc6b28d7534aa7f874a183a77ce932b1c75ab31c439704339fa9e2d926ed2");
    }

    #[test]
    fn test_balance_assets_string() {
        let v = json!({"assets":[{"asset":"BTC","available":"1"},{"asset":"usdt","available":"123.45"}]});
        assert_eq!(parse_available_usdt(&v), Some(123.45));
    }

    #[test]
    fn test_balance_data_number_alt_keys() {
        let v = json!({"data":[{"currency":"USD","availableBalance":50.5}]});
        assert_eq!(parse_available_usdt(&v), Some(50.5));
        let v = json!({"data":[{"currency":"USDT","free":"7"}]});
        assert_eq!(parse_available_usdt(&v), Some(7.0));
    }

    #[test]
    fn test_balance_unrecognized() {
        assert_eq!(parse_available_usdt(&json!({"error_code": 10001})), None);
        assert_eq!(parse_available_usdt(&json!([1, 2])), None);
        assert_eq!(parse_available_usdt(&json!({"assets":[{"asset":"USDT"}]})), None);
    }

    #[test]
    fn test_result_flag() {
        assert!(is_accepted(&json!({"order_id": 1})));
        assert!(is_accepted(&json!({"result": true})));
        assert!(!is_accepted(&json!({"result": false, "error_code": 10002})));
        assert!(!is_accepted(&json!({"result": null})));
        assert!(!is_accepted(&json!({"result": []})));
        assert!(!is_accepted(&json!({"result": {}})));
        assert!(!is_accepted(&json!({"result": 0})));
        assert!(is_accepted(&json!({"result": {"order_id": "1"}})));
    }

    #[test]
    fn test_empty_assets_falls_back_to_data() {
        let v = json!({"assets": [], "data": [{"currency": "USDT", "available": "42"}]});
        assert_eq!(parse_available_usdt(&v), Some(42.0));
        let v = json!({"assets": {}, "data": [{"currency": "USDT", "available": 8}]});
        assert_eq!(parse_available_usdt(&v), Some(8.0));
    }
}
