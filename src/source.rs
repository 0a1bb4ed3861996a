// ===============================
// src/source.rs
// ===============================
//
// Signal sources (semua mengirim String mentah ke desk):
// - run_mock     : putar contoh sinyal tiap interval
// - run_stdin    : baca stdin, pesan dipisah baris kosong
// - run_telegram : teloxide, ambil post dari channel yang dikonfigurasi
//
use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::Chat;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, info, warn};

const MOCK_SIGNALS: [&str; 4] = [
    "🔥 BTC/USDT LONG\nLeverage: 20x\nEnter price: 64000\nTP1: 64800\nTP2: 65500\nTP3: 66500\nStop Loss: 62900",
    "ETH-USDT SHORT x15\nEnter price: 3150.5\nTP1: 3100\nTP2: 3050\nStop Loss: 3220",
    "Symbol: SOLUSDT long\nEnter price：142.3\nTP1：146\nStop Loss：138.9",
    "Market update: BTC looks strong today, no trade yet.",
];

/// Generator sinyal mock, berputar terus
pub async fn run_mock(tx: mpsc::Sender<String>, every_ms: u64) {
    for text in MOCK_SIGNALS.iter().cycle() {
        if tx.send(text.to_string()).await.is_err() {
            warn!("mock source: desk channel closed");
            return;
        }
        sleep(Duration::from_millis(every_ms)).await;
    }
}

/// Collects lines into messages; a blank line ends a message.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    lines: Vec<String>,
}

impl MessageAssembler {
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        if line.trim().is_empty() {
            return self.finish();
        }
        self.lines.push(line.trim_end().to_string());
        None
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        let msg = self.lines.join("\n");
        self.lines.clear();
        Some(msg)
    }
}

pub async fn run_stdin(tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut asm = MessageAssembler::default();
    loop {
        let next = match lines.next_line().await {
            Ok(Some(line)) => asm.push_line(&line),
            Ok(None) => {
                if let Some(msg) = asm.finish() {
                    let _ = tx.send(msg).await;
                }
                info!("stdin source: EOF");
                return;
            }
            Err(e) => {
                error!(?e, "stdin read error");
                return;
            }
        };
        if let Some(msg) = next {
            if tx.send(msg).await.is_err() {
                return;
            }
        }
    }
}

/// `wanted` is either a numeric chat id or a username (with or without `@`).
pub fn channel_matches(chat_id: i64, username: Option<&str>, wanted: &str) -> bool {
    let wanted = wanted.trim();
    if let Ok(id) = wanted.parse::<i64>() {
        return chat_id == id;
    }
    let wanted = wanted.trim_start_matches('@');
    username.map(|u| u.eq_ignore_ascii_case(wanted)).unwrap_or(false)
}

fn chat_matches(chat: &Chat, wanted: &str) -> bool {
    channel_matches(chat.id.0, chat.username(), wanted)
}

async fn on_post(msg: Message, tx: mpsc::Sender<String>, channel: Arc<String>) -> ResponseResult<()> {
    if !chat_matches(&msg.chat, &channel) {
        return Ok(());
    }
    if let Some(text) = msg.text().or_else(|| msg.caption()) {
        if tx.send(text.to_string()).await.is_err() {
            warn!("telegram source: desk channel closed");
        }
    }
    Ok(())
}

/// Bot harus admin di channel agar menerima channel_post.
pub async fn run_telegram(tx: mpsc::Sender<String>, token: String, channel: String) {
    info!(%channel, "telegram source: starting");
    let bot = Bot::new(token);
    let channel = Arc::new(channel);

    let handler = dptree::entry()
        .branch(Update::filter_channel_post().endpoint(on_post))
        .branch(Update::filter_message().endpoint(on_post));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![tx, channel])
        .default_handler(|_| async {})
        .build()
        .dispatch()
        .await;
    info!("telegram source: dispatcher stopped");
}
