// ===============================
// src/parser.rs
// ===============================
//
// Signal text -> SignalSpec.
//
// Urutan ekstraksi:
// - symbol   : pola BASE[/-_ ]QUOTE, lalu label `symbol:`/`symbol=`, lalu default sol_usdt
// - side     : ada "LONG" -> long, selain itu short
// - leverage : 4 pola (leverage / lev / 20x / x20), nilai harus 1..=125
// - harga    : label Enter price / TP1 / TP2 / TP3 / Stop Loss, titik dua biasa atau `：`
//              TP / SL bernilai 0 dianggap tidak ada
//
// Angka hanya digit ASCII (0-9); digit Unicode lain tidak dikenali.
//
// Semua pencarian case-insensitive. Tidak ada state: parse() boleh dipanggil
// paralel dari banyak task.
//

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::config::{SizingCfg, MAX_LEVERAGE};
use crate::domain::{Direction, Extracted, SignalSpec};

pub const DEFAULT_SYMBOL: &str = "sol_usdt";

static PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([A-Za-z]{2,10})\s*[/\-_ ]?\s*(USDT|USD|USDC)\b").unwrap()
});
static SYMBOL_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)symbol\s*[:=]\s*([A-Za-z0-9/_\-]+)").unwrap());

// first match wins, in this order
static LEVERAGE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)leverage\s*[:=]?\s*([0-9]+)\s*x?",
        r"(?i)lev\s*[:=]?\s*([0-9]+)\s*x?",
        r"(?i)([0-9]+)\s*x\b",
        r"(?i)\bx\s*([0-9]+)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

fn label_re(label: &str) -> Regex {
    Regex::new(&format!(r"(?i){}\s*[:：]\s*([0-9.]+)", label)).unwrap()
}

static ENTRY_RE: Lazy<Regex> = Lazy::new(|| label_re("Enter price"));
static STOP_LOSS_RE: Lazy<Regex> = Lazy::new(|| label_re("Stop Loss"));
static TP_RES: Lazy<[Regex; 3]> = Lazy::new(|| [label_re("TP1"), label_re("TP2"), label_re("TP3")]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    #[error("signal not actionable: missing {}", .missing.join(", "))]
    NotActionable { missing: Vec<&'static str> },
}

fn match_pair(text: &str) -> Option<String> {
    let caps = PAIR_RE.captures(text)?;
    Some(format!(
        "{}_{}",
        caps[1].to_ascii_lowercase(),
        caps[2].to_ascii_lowercase()
    ))
}

/// Normalized `base_quote` symbol. Never fails: falls back to `sol_usdt`.
pub fn extract_symbol(text: &str) -> Extracted<String> {
    if let Some(sym) = match_pair(text) {
        return Extracted::Matched(sym);
    }
    // label "symbol: SOLUSDT" -> jalankan ulang pola pair pada token label saja
    if let Some(caps) = SYMBOL_LABEL_RE.captures(text) {
        if let Some(sym) = match_pair(&caps[1]) {
            return Extracted::Matched(sym);
        }
    }
    Extracted::Defaulted(DEFAULT_SYMBOL.to_string())
}

/// `LONG` anywhere (any case) means long; everything else is short.
/// Only `Matched` when a direction keyword is actually present.
pub fn extract_direction(text: &str) -> Extracted<Direction> {
    let up = text.to_uppercase();
    if up.contains("LONG") {
        Extracted::Matched(Direction::Long)
    } else if up.contains("SHORT") {
        Extracted::Matched(Direction::Short)
    } else {
        Extracted::Defaulted(Direction::Short)
    }
}

/// Leverage in [1, 125]. A pattern whose number is out of range (or does not
/// fit an integer) is skipped and the next pattern is tried.
pub fn extract_leverage(text: &str, default_lev: u32) -> Extracted<u32> {
    for re in LEVERAGE_RES.iter() {
        let Some(caps) = re.captures(text) else { continue };
        if let Ok(v) = caps[1].parse::<u32>() {
            if (1..=MAX_LEVERAGE).contains(&v) {
                return Extracted::Matched(v);
            }
        }
    }
    Extracted::Defaulted(default_lev)
}

/// First `<label>: <number>` occurrence. An unparseable number counts as absent.
fn extract_level(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Like `extract_level`, but a zero price is no level at all.
fn extract_trigger(re: &Regex, text: &str) -> Option<f64> {
    extract_level(re, text).filter(|v| *v > 0.0)
}

#[derive(Debug, Clone)]
pub struct SignalParser {
    default_leverage: u32,
}

impl SignalParser {
    pub fn new(cfg: &SizingCfg) -> Self {
        Self { default_leverage: cfg.default_leverage }
    }

    /// Map one message to a fully triangulated `SignalSpec`, or reject it.
    pub fn parse(&self, text: &str) -> Result<SignalSpec, SignalError> {
        let entry = extract_level(&ENTRY_RE, text);
        let stop_loss = extract_trigger(&STOP_LOSS_RE, text);
        let take_profits: Vec<f64> = TP_RES
            .iter()
            .filter_map(|re| extract_trigger(re, text))
            .collect();

        let (entry, stop_loss) = match (entry, stop_loss) {
            (Some(e), Some(sl)) if !take_profits.is_empty() => (e, sl),
            _ => {
                let mut missing = Vec::new();
                if entry.is_none() { missing.push("entry"); }
                if stop_loss.is_none() { missing.push("stop_loss"); }
                if take_profits.is_empty() { missing.push("take_profit"); }
                return Err(SignalError::NotActionable { missing });
            }
        };

        Ok(SignalSpec {
            symbol: extract_symbol(text),
            direction: extract_direction(text),
            leverage: extract_leverage(text, self.default_leverage),
            entry,
            stop_loss,
            take_profits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "🚀 BTC/USDT LONG\nLeverage: 20x\nEnter price: 64000.5\nTP1: 65000\nTP2: 66000\nTP3: 67000\nStop Loss: 62000";

    fn parser() -> SignalParser {
        SignalParser::new(&SizingCfg::default())
    }

    #[test]
    fn test_symbol_styles() {
        assert_eq!(extract_symbol("BTC/USDT long"), Extracted::Matched("btc_usdt".into()));
        assert_eq!(extract_symbol("eth-usdc"), Extracted::Matched("eth_usdc".into()));
        assert_eq!(extract_symbol("pair sol_usdt"), Extracted::Matched("sol_usdt".into()));
        assert_eq!(extract_symbol("Coin: XRPUSDT now"), Extracted::Matched("xrp_usdt".into()));
        assert_eq!(extract_symbol("DOGE USD"), Extracted::Matched("doge_usd".into()));
    }

    #[test]
    fn test_symbol_label_fallback() {
        assert_eq!(extract_symbol("symbol=ARBUSDT"), Extracted::Matched("arb_usdt".into()));
    }

    #[test]
    fn test_symbol_defaults_without_pair() {
        let s = extract_symbol("Enter price: 10\nTP1: 11\nStop Loss: 9");
        assert_eq!(s, Extracted::Defaulted(DEFAULT_SYMBOL.to_string()));
        assert!(s.is_defaulted());
    }

    #[test]
    fn test_direction_keyword() {
        assert_eq!(extract_direction("go Long now"), Extracted::Matched(Direction::Long));
        assert_eq!(extract_direction("LONG"), Extracted::Matched(Direction::Long));
        assert_eq!(extract_direction("Short it"), Extracted::Matched(Direction::Short));
        assert_eq!(extract_direction("buy the dip"), Extracted::Defaulted(Direction::Short));
    }

    #[test]
    fn test_leverage_patterns() {
        assert_eq!(extract_leverage("leverage: 12", 5), Extracted::Matched(12));
        assert_eq!(extract_leverage("lev 15x", 5), Extracted::Matched(15));
        assert_eq!(extract_leverage("use 20x", 5), Extracted::Matched(20));
        assert_eq!(extract_leverage("cross x25", 5), Extracted::Matched(25));
        assert_eq!(extract_leverage("LEVERAGE=30X", 5), Extracted::Matched(30));
    }

    #[test]
    fn test_leverage_out_of_range_falls_back() {
        assert_eq!(extract_leverage("leverage: 999", 12), Extracted::Defaulted(12));
        assert_eq!(extract_leverage("leverage: 0", 12), Extracted::Defaulted(12));
        assert_eq!(extract_leverage("no hint here", 7), Extracted::Defaulted(7));
        assert_eq!(extract_leverage("leverage: 99999999999999999999", 12), Extracted::Defaulted(12));
    }

    #[test]
    fn test_full_signal() {
        let spec = parser().parse(FULL).unwrap();
        assert_eq!(spec.symbol.value(), "btc_usdt");
        assert_eq!(*spec.direction.value(), Direction::Long);
        assert_eq!(spec.leverage, Extracted::Matched(20));
        assert_eq!(spec.entry, 64000.5);
        assert_eq!(spec.stop_loss, 62000.0);
        assert_eq!(spec.take_profits, vec![65000.0, 66000.0, 67000.0]);
    }

    #[test]
    fn test_fullwidth_colon_and_case() {
        let msg = "eth/usdt short\nenter PRICE： 3000\ntp1：2900\nstop loss： 3100";
        let spec = parser().parse(msg).unwrap();
        assert_eq!(spec.entry, 3000.0);
        assert_eq!(spec.take_profits, vec![2900.0]);
        assert_eq!(spec.stop_loss, 3100.0);
        assert_eq!(spec.leverage, Extracted::Defaulted(12));
    }

    #[test]
    fn test_gap_in_take_profits() {
        let msg = "Enter price: 100\nTP1: 110\nTP3: 130\nStop Loss: 90";
        let spec = parser().parse(msg).unwrap();
        assert_eq!(spec.take_profits, vec![110.0, 130.0]);
    }

    #[test]
    fn test_zero_take_profit_dropped() {
        let msg = "Enter price: 100\nTP1: 0\nTP2: 120\nStop Loss: 90";
        let spec = parser().parse(msg).unwrap();
        assert_eq!(spec.take_profits, vec![120.0]);

        let err = parser().parse("Enter price: 100\nTP1: 0\nStop Loss: 90").unwrap_err();
        assert_eq!(err, SignalError::NotActionable { missing: vec!["take_profit"] });
    }

    #[test]
    fn test_zero_stop_loss_not_actionable() {
        let err = parser().parse("Enter price: 100\nTP1: 110\nStop Loss: 0").unwrap_err();
        assert_eq!(err, SignalError::NotActionable { missing: vec!["stop_loss"] });
        let err = parser().parse("Enter price: 100\nTP1: 110\nStop Loss: 0.000").unwrap_err();
        assert_eq!(err, SignalError::NotActionable { missing: vec!["stop_loss"] });
    }

    #[test]
    fn test_only_ascii_digits() {
        // angka Persia: ۶۴۰۰۰ / ۲۰
        assert_eq!(extract_leverage("Leverage: ۲۰", 12), Extracted::Defaulted(12));
        let err = parser().parse("Enter price: ۶۴۰۰۰\nTP1: 65000\nStop Loss: 63000").unwrap_err();
        assert_eq!(err, SignalError::NotActionable { missing: vec!["entry"] });
    }

    #[test]
    fn test_no_take_profit_not_actionable() {
        let msg = "BTC/USDT LONG\nEnter price: 100\nStop Loss: 90";
        let err = parser().parse(msg).unwrap_err();
        assert_eq!(err, SignalError::NotActionable { missing: vec!["take_profit"] });
    }

    #[test]
    fn test_missing_everything_lists_fields() {
        let err = parser().parse("hello").unwrap_err();
        assert_eq!(
            err,
            SignalError::NotActionable { missing: vec!["entry", "stop_loss", "take_profit"] }
        );
        assert_eq!(err.to_string(), "signal not actionable: missing entry, stop_loss, take_profit");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let p = parser();
        assert_eq!(p.parse(FULL).unwrap(), p.parse(FULL).unwrap());
    }

    #[test]
    fn test_custom_default_leverage() {
        let cfg = SizingCfg { default_leverage: 3, ..Default::default() };
        let spec = SignalParser::new(&cfg)
            .parse("Enter price: 1\nTP1: 2\nStop Loss: 0.5")
            .unwrap();
        assert_eq!(spec.leverage, Extracted::Defaulted(3));
    }
}
