// ===============================
// src/posttrade.rs
// ===============================
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use crate::domain::{Event, ExecReport, ExecStatus};

/// Log setiap hasil leg, lalu teruskan ke recorder.
pub async fn run(mut exec_rx: mpsc::Receiver<ExecReport>, rec_tx: mpsc::Sender<Event>) {
    while let Some(er) = exec_rx.recv().await {
        match &er.status {
            ExecStatus::Ack => info!(cl_id = %er.cl_id, symbol = %er.symbol, kind = er.kind.as_str(), venue = %er.venue, "ACK"),
            ExecStatus::Skipped(r) => warn!(cl_id = %er.cl_id, kind = er.kind.as_str(), reason = %r, "SKIPPED"),
            ExecStatus::Rejected(r) => warn!(cl_id = %er.cl_id, kind = er.kind.as_str(), reason = %r, "REJECT"),
        }
        if rec_tx.send(Event::Exec(er)).await.is_err() {
            debug!("trade log closed, exec report dropped");
        }
    }
}
