// ===============================
// src/recorder.rs
// ===============================
//
// Trade log JSONL (append-only):
// - Satu baris JSON per Event (Trade / Exec / Note).
// - BufWriter, flush periodik tiap 1s dan tiap 100 event.
// - Parent directory dibuat otomatis.
// - Jika tulis gagal, reopen file sekali lalu lanjut.
//
// ENV: `RECORD_FILE=/path/to/tradelog.jsonl` (kosong = mati).
//
use std::path::Path;
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info};

use crate::domain::Event;

const FLUSH_EVERY_N_EVENTS: u32 = 100;

async fn open_writer(path: &str) -> std::io::Result<BufWriter<File>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path).await?;
    Ok(BufWriter::new(file))
}

async fn write_line(writer: &mut BufWriter<File>, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await
}

/// Trade log mati: event dibuang.
pub async fn discard(mut rx: mpsc::Receiver<Event>) {
    while rx.recv().await.is_some() {}
}

pub async fn run(mut rx: mpsc::Receiver<Event>, path: String) {
    let mut writer = match open_writer(&path).await {
        Ok(w) => w,
        Err(e) => {
            error!(?e, %path, "recorder: open failed, trade log disabled");
            return;
        }
    };
    info!(%path, "recorder: started");

    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut since_last_flush: u32 = 0;

    loop {
        tokio::select! {
            maybe_ev = rx.recv() => {
                let Some(ev) = maybe_ev else {
                    // Channel closed: flush dan keluar
                    let _ = writer.flush().await;
                    info!("recorder: channel closed, stopped");
                    break;
                };
                let line = match serde_json::to_string(&ev) {
                    Ok(s) => s,
                    Err(e) => {
                        error!(?e, "recorder: serialize error, skip event");
                        continue;
                    }
                };

                if let Err(e) = write_line(&mut writer, &line).await {
                    error!(?e, "recorder: write failed, attempting reopen");
                    match open_writer(&path).await {
                        Ok(w) => {
                            writer = w;
                            if let Err(e2) = write_line(&mut writer, &line).await {
                                error!(?e2, "recorder: write failed again after reopen, drop event");
                                continue;
                            }
                        }
                        Err(e2) => {
                            error!(?e2, "recorder: reopen failed, drop event");
                            continue;
                        }
                    }
                }

                since_last_flush += 1;
                if since_last_flush >= FLUSH_EVERY_N_EVENTS {
                    let _ = writer.flush().await;
                    since_last_flush = 0;
                }
            }

            _ = tick.tick() => {
                let _ = writer.flush().await;
                since_last_flush = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Side, TradeRecord};

    #[tokio::test]
    async fn test_appends_jsonl_and_flushes_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("trades.jsonl");
        let path_str = path.to_string_lossy().to_string();

        // file lama harus tetap ada (append)
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{\"Note\":\"old\"}\n").unwrap();

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(run(rx, path_str));
        tx.send(Event::Trade(TradeRecord {
            symbol: "btc_usdt".into(),
            side: Side::Buy,
            entry: 100.0,
            sl: 90.0,
            tps: vec![110.0, 120.0],
            size: 30.0,
            lev: 10,
            result: Some(serde_json::json!({"result": true})),
        }))
        .await
        .unwrap();
        tx.send(Event::Note("hello".into())).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "{\"Note\":\"old\"}");
        let v: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(v["Trade"]["symbol"], "btc_usdt");
        assert_eq!(v["Trade"]["side"], "buy");
        assert_eq!(v["Trade"]["lev"], 10);
        assert_eq!(lines[2], "{\"Note\":\"hello\"}");
    }
}
