// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : signal_futures_bot — channel signal to futures order engine in Rust
Module  : <module_name>.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Listens to free-form trading signals (mock/stdin/Telegram), extracts
          symbol, side, leverage, entry, stop-loss and TP ladder, sizes the
          position from available balance, submits market + TP/SL legs
          (mock/LBank futures), exposes Prometheus metrics, and records JSONL
          trade log.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use std::env;
use dotenvy::dotenv;
use serde::Serialize;

pub const DEFAULT_SPLIT: [f64; 3] = [0.4, 0.4, 0.2];
pub const DEFAULT_LEVERAGE: u32 = 12;
pub const MAX_LEVERAGE: u32 = 125;

/// Sumber pesan sinyal
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceMode {
    Mock,
    Stdin,
    Telegram,
}

impl SourceMode {
    pub fn from_env(key: &str, default_mode: SourceMode) -> SourceMode {
        match env::var(key).unwrap_or_default().to_ascii_lowercase().as_str() {
            "mock"     => SourceMode::Mock,
            "stdin"    => SourceMode::Stdin,
            "telegram" => SourceMode::Telegram,
            _ => default_mode,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Mock     => "mock",
            SourceMode::Stdin    => "stdin",
            SourceMode::Telegram => "telegram",
        }
    }
}

/// Venue tujuan order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VenueMode {
    Mock,
    LBank,
}

impl VenueMode {
    pub fn from_env(key: &str, default_mode: VenueMode) -> VenueMode {
        match env::var(key).unwrap_or_default().to_ascii_lowercase().as_str() {
            "mock"  => VenueMode::Mock,
            "lbank" => VenueMode::LBank,
            _ => default_mode,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VenueMode::Mock  => "mock",
            VenueMode::LBank => "lbank",
        }
    }
}

/// Fractional split of the position across TP1..TP3. Always sums to 1.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AllocationProfile {
    weights: [f64; 3],
}

impl AllocationProfile {
    /// Normalizes raw weights (percent or fractions). Negative or non-finite
    /// weights count as 0; a non-positive total collapses to 0.4/0.4/0.2.
    pub fn from_weights(raw: [f64; 3]) -> Self {
        let clean = raw.map(|w| if w.is_finite() && w > 0.0 { w } else { 0.0 });
        let total: f64 = clean.iter().sum();
        if total <= 0.0 {
            return Self::default();
        }
        Self { weights: clean.map(|w| w / total) }
    }

    /// Parse "40,40,20" / "40/40/20". Malformed or missing tokens read as 0.
    pub fn parse(s: &str) -> Self {
        let mut raw = [0.0; 3];
        for (slot, tok) in raw.iter_mut().zip(s.split(&[',', '/'][..])) {
            *slot = tok.trim().parse::<f64>().unwrap_or(0.0);
        }
        Self::from_weights(raw)
    }

    pub fn weights(&self) -> &[f64; 3] {
        &self.weights
    }
}

impl Default for AllocationProfile {
    fn default() -> Self {
        Self { weights: DEFAULT_SPLIT }
    }
}

/// Immutable sizing/extraction settings, built once at startup.
#[derive(Clone, Debug, Serialize)]
pub struct SizingCfg {
    pub allocation: AllocationProfile,
    pub default_leverage: u32,
}

impl Default for SizingCfg {
    fn default() -> Self {
        Self { allocation: AllocationProfile::default(), default_leverage: DEFAULT_LEVERAGE }
    }
}

#[derive(Clone, Debug)]
pub struct Args {
    // sources
    pub source_mode: SourceMode,
    pub telegram_token: Option<String>,
    pub telegram_channel: Option<String>,
    pub mock_interval_ms: u64,

    // venue
    pub venue_mode: VenueMode,
    pub lbank_rest_url: String,
    pub lbank_api_key: Option<String>,
    pub lbank_api_secret: Option<String>,
    pub mock_balance: f64,
    pub positions_poll_secs: u64,

    // guard
    pub submit_zero_size: bool,

    // files/metrics
    pub record_file: Option<String>,
    pub metrics_port: u16,
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key).unwrap_or_default().trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Clamp the configured fallback leverage into [1, 125].
pub fn clamp_leverage(v: i64) -> u32 {
    v.clamp(1, MAX_LEVERAGE as i64) as u32
}

pub fn load() -> (Args, SizingCfg) {
    // Pastikan .env dibaca
    let _ = dotenv();

    // ===== Source =====
    let source_mode = SourceMode::from_env("SOURCE_MODE", SourceMode::Mock);
    let telegram_token = env_nonempty("TELEGRAM_BOT_TOKEN");
    let telegram_channel = env_nonempty("TELEGRAM_CHANNEL");
    let mock_interval_ms = env::var("MOCK_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5_000);

    // ===== Venue =====
    let venue_mode = VenueMode::from_env("VENUE_MODE", VenueMode::Mock);
    let lbank_rest_url = env_nonempty("LBANK_REST_URL")
        .unwrap_or_else(|| "https://api.lbkex.com".to_string());
    let lbank_api_key = env_nonempty("LBANK_API_KEY");
    let lbank_api_secret = env_nonempty("LBANK_API_SECRET");
    let mock_balance = env::var("MOCK_BALANCE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1_000.0);
    let positions_poll_secs = env::var("POSITIONS_POLL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);

    let submit_zero_size = env_bool("SUBMIT_ZERO_SIZE", false);

    // RECORD_FILE= (kosong) mematikan trade log
    let record_file = match env::var("RECORD_FILE") {
        Ok(s) if s.trim().is_empty() => None,
        Ok(s) => Some(s),
        Err(_) => Some("tradelog.jsonl".to_string()),
    };
    let metrics_port = env::var("METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9898);

    let args = Args {
        source_mode,
        telegram_token,
        telegram_channel,
        mock_interval_ms,
        venue_mode,
        lbank_rest_url,
        lbank_api_key,
        lbank_api_secret,
        mock_balance,
        positions_poll_secs,
        submit_zero_size,
        record_file,
        metrics_port,
    };

    // ===== Sizing =====
    let allocation = env::var("TP_SPLITS")
        .map(|s| AllocationProfile::parse(&s))
        .unwrap_or_default();
    let default_leverage = env::var("DEFAULT_LEVERAGE")
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .map(clamp_leverage)
        .unwrap_or(DEFAULT_LEVERAGE);

    let sizing = SizingCfg { allocation, default_leverage };
    (args, sizing)
}
