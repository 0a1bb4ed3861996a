// ===============================
// src/main.rs
// ===============================
/*
 # dry run satu pesan (tanpa order)
 printf 'BTC/USDT LONG\nEnter price: 64000\nTP1: 65000\nStop Loss: 63000\n' | cargo run -- plan --balance 1000

 # metrics
 curl -s localhost:9898/metrics | egrep '^(messages_total|plans_total|venue_legs_total)'
*/
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
mod domain;
mod config;
mod metrics;
mod recorder;
mod source;           // mock / stdin / telegram
mod parser;
mod planner;
mod risk;             // desk: parse -> size -> plan -> check
mod gateway;          // mock venue + account front
mod gateway_lbank;    // real LBank futures REST
mod lbank;            // helper (signer/decoders) for LBank
mod posttrade;
mod positions;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle, time::Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{Args, SizingCfg, SourceMode, VenueMode};
use crate::domain::{Event, ExecReport, Submission};
use crate::gateway::Account;

#[derive(Parser)]
#[command(name = "signal_futures_bot")]
#[command(about = "Turn channel trading signals into sized futures orders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the bot (default)
    Run,
    /// Parse one message and print the resulting plan, without touching a venue
    Plan {
        /// Available balance used for sizing
        #[arg(short, long, default_value_t = 1000.0)]
        balance: f64,
        /// Message file; stdin when omitted
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode output: {0}")]
    Json(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() {
    // ---- Logging ----
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let (args, sizing) = config::load();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_bot(args, sizing).await,
        Command::Plan { balance, file } => {
            if let Err(e) = dry_run(&sizing, balance, file) {
                error!(%e, "plan failed");
                std::process::exit(1);
            }
        }
    }
}

fn dry_run(sizing: &SizingCfg, balance: f64, file: Option<PathBuf>) -> Result<(), CliError> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let out = match parser::SignalParser::new(sizing).parse(&text) {
        Ok(spec) => {
            let plan = planner::OrderPlanner::new(sizing).plan(&spec, balance);
            serde_json::json!({ "signal": spec, "plan": plan })
        }
        Err(e) => serde_json::json!({ "rejected": e.to_string() }),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn run_bot(args: Args, sizing: SizingCfg) {
    info!(
        source_mode = args.source_mode.as_str(),
        venue_mode = args.venue_mode.as_str(),
        tp_splits = ?sizing.allocation.weights(),
        default_leverage = sizing.default_leverage,
        submit_zero_size = args.submit_zero_size,
        record_file = ?args.record_file,
        "startup config"
    );

    // ---- Metrics ----
    metrics::init();
    metrics::CONFIG_SOURCE_MODE.with_label_values(&[args.source_mode.as_str()]).set(1);
    metrics::CONFIG_VENUE_MODE.with_label_values(&[args.venue_mode.as_str()]).set(1);
    metrics::CONFIG_DEFAULT_LEVERAGE.set(sizing.default_leverage as i64);
    if args.metrics_port != 0 {
        metrics::serve_metrics(args.metrics_port);
    }

    // ---- Buses ----
    let (msg_tx, msg_rx) = mpsc::channel::<String>(256);
    let (sub_tx, sub_rx) = mpsc::channel::<Submission>(256);
    let (exec_tx, exec_rx) = mpsc::channel::<ExecReport>(1024);
    let (rec_tx, rec_rx) = mpsc::channel::<Event>(4096);

    // ---- Recorder (optional) ----
    // tanpa RECORD_FILE event tetap dikonsumsi supaya pengirim tidak tertahan
    let recorder = match args.record_file.clone() {
        Some(path) => tokio::spawn(recorder::run(rec_rx, path)),
        None => tokio::spawn(recorder::discard(rec_rx)),
    };

    // ---- Venue ----
    let account = match args.venue_mode {
        VenueMode::Mock => {
            tokio::spawn(gateway::run_venue(sub_rx, exec_tx, rec_tx.clone(), "mock".into(), 5));
            Account::Mock { balance: args.mock_balance }
        }
        VenueMode::LBank => {
            let client = match gateway_lbank::LbankClient::new(
                &args.lbank_rest_url,
                args.lbank_api_key.clone(),
                args.lbank_api_secret.clone(),
            ) {
                Ok(c) => Arc::new(c),
                Err(e) => {
                    error!(%e, "lbank venue unavailable");
                    return;
                }
            };
            tokio::spawn(gateway_lbank::run_venue_lbank(
                client.clone(),
                sub_rx,
                exec_tx,
                rec_tx.clone(),
                "lbank".into(),
            ));
            if args.positions_poll_secs > 0 {
                tokio::spawn(positions::run(client.clone(), Duration::from_secs(args.positions_poll_secs)));
            }
            Account::LBank(client)
        }
    };

    // ---- Post-Trade ----
    let posttrade = tokio::spawn(posttrade::run(exec_rx, rec_tx.clone()));

    // ---- Source ----
    let source_task = match args.source_mode {
        SourceMode::Mock => tokio::spawn(source::run_mock(msg_tx, args.mock_interval_ms)),
        SourceMode::Stdin => tokio::spawn(source::run_stdin(msg_tx)),
        SourceMode::Telegram => match (args.telegram_token.clone(), args.telegram_channel.clone()) {
            (Some(token), Some(channel)) => tokio::spawn(source::run_telegram(msg_tx, token, channel)),
            _ => {
                error!("SOURCE_MODE=telegram needs TELEGRAM_BOT_TOKEN and TELEGRAM_CHANNEL");
                return;
            }
        },
    };

    // ---- Desk ----
    let desk = risk::Desk::new(&sizing, account, args.submit_zero_size);
    let mut desk_task = tokio::spawn(risk::run(msg_rx, sub_tx, rec_tx, desk));

    // ---- Heartbeat ----
    let mut upstream = vec![source_task];
    loop {
        tokio::select! {
            _ = &mut desk_task => {
                info!("signal source closed, draining");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c, shutting down");
                upstream.push(desk_task);
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(60)) => {
                info!(messages = metrics::MESSAGES.get(), plans = metrics::PLANS.get(), "heartbeat");
            }
        }
    }

    drain(upstream, posttrade, recorder).await;
}

/// Urutan shutdown: source + desk berhenti -> gateway -> posttrade -> recorder (flush).
/// Order yang sedang dikirim gateway tetap diselesaikan.
async fn drain(
    upstream: Vec<JoinHandle<()>>,
    posttrade: JoinHandle<()>,
    recorder: JoinHandle<()>,
) {
    for h in upstream {
        h.abort();
        let _ = h.await;
    }
    let _ = posttrade.await;
    let _ = recorder.await;
    info!("shutdown complete");
}
