//! Log-shipping pipeline: the linear sequence of transforms between a
//! worker's raw log output and the socket that ships it to the controller.
//!
//! Modeled as explicit stages wired together with bounded `mpsc` channels —
//! the same back-pressured pipelining idiom `harmonia-nar`'s NAR encoder
//! uses to feed an HTTP body through a bounded channel (`ChannelWriter` in
//! `harmonia-nar::archive::byte_stream`) — rather than an open-coded event
//! loop: unbatch -> filter progress -> renumber -> batch -> end-marker ->
//! socket sink. Only the shape of a shipped record is this crate's
//! concern; the wire format beyond that shape belongs to the log
//! transport, out of scope here.

use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

use crate::error::EffectError;

/// Overall budget for the pipeline to finish draining once its input
/// closes. Unlike the daemon-proxy drain timeout, expiry here is fatal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(600);

const CHANNEL_CAPACITY: usize = 256;
const BATCH_SIZE: usize = 64;

/// One line of raw log output as read off a worker, before it has been
/// filtered, renumbered, or grouped into a batch.
#[derive(Debug, Clone)]
pub struct RawLogLine {
    pub text: String,
    /// Progress lines (build percentage ticks, spinners) are dropped before
    /// shipping; only lines worth persisting survive to the socket.
    pub is_progress: bool,
}

/// The shape of one shipped log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogMessage {
    pub index: u64,
    pub text: String,
}

/// A group of log messages written to the socket in one write, with a flag
/// marking the final batch of the stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogBatch {
    pub messages: Vec<LogMessage>,
    pub end: bool,
}

/// Drive `lines` through the pipeline and write newline-delimited JSON
/// batches to `sink`, ending with a batch carrying `end: true`.
///
/// Fails with [`EffectError::LogDrainTimeout`] if the pipeline has not
/// fully drained — every stage finished, the sink flushed — within 600
/// seconds of `lines` closing.
pub async fn drain_log_pipeline<S>(lines: mpsc::Receiver<RawLogLine>, sink: S) -> Result<(), EffectError>
where
    S: AsyncWrite + Unpin + Send + 'static,
{
    match timeout(DRAIN_TIMEOUT, run_pipeline(lines, sink)).await {
        Ok(result) => result,
        Err(_) => Err(EffectError::LogDrainTimeout),
    }
}

async fn run_pipeline<S>(lines: mpsc::Receiver<RawLogLine>, mut sink: S) -> Result<(), EffectError>
where
    S: AsyncWrite + Unpin + Send + 'static,
{
    let (filtered_tx, filtered_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (numbered_tx, numbered_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (batched_tx, mut batched_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let filter_task = tokio::spawn(filter_progress(lines, filtered_tx));
    let renumber_task = tokio::spawn(renumber(filtered_rx, numbered_tx));
    let batch_task = tokio::spawn(batch_and_mark_end(numbered_rx, batched_tx));

    while let Some(batch) = batched_rx.recv().await {
        let is_end = batch.end;
        write_batch(&mut sink, &batch).await?;
        if is_end {
            break;
        }
    }
    sink.flush()
        .await
        .map_err(|e| EffectError::FatalError(format!("log sink flush failed: {e}")))?;

    for task in [filter_task, renumber_task, batch_task] {
        let _ = task.await;
    }

    Ok(())
}

/// Drop progress lines. The transport feeding this stage (the worker
/// protocol's framed events) already yields one record per frame, so
/// "unbatching" has nothing left to do by the time a line reaches here.
async fn filter_progress(mut lines: mpsc::Receiver<RawLogLine>, tx: mpsc::Sender<RawLogLine>) {
    while let Some(line) = lines.recv().await {
        if line.is_progress {
            continue;
        }
        if tx.send(line).await.is_err() {
            return;
        }
    }
}

/// Assign each surviving line a strictly increasing index.
async fn renumber(mut lines: mpsc::Receiver<RawLogLine>, tx: mpsc::Sender<LogMessage>) {
    let mut index = 0u64;
    while let Some(line) = lines.recv().await {
        let message = LogMessage { index, text: line.text };
        index += 1;
        if tx.send(message).await.is_err() {
            return;
        }
    }
}

/// Group messages into batches of `BATCH_SIZE`, flushing a (possibly
/// short) final batch carrying `end: true` once the input closes.
async fn batch_and_mark_end(mut messages: mpsc::Receiver<LogMessage>, tx: mpsc::Sender<LogBatch>) {
    let mut pending = Vec::with_capacity(BATCH_SIZE);
    while let Some(message) = messages.recv().await {
        pending.push(message);
        if pending.len() >= BATCH_SIZE {
            let batch = LogBatch {
                messages: std::mem::replace(&mut pending, Vec::with_capacity(BATCH_SIZE)),
                end: false,
            };
            if tx.send(batch).await.is_err() {
                return;
            }
        }
    }
    let _ = tx.send(LogBatch { messages: pending, end: true }).await;
}

async fn write_batch<S: AsyncWrite + Unpin>(sink: &mut S, batch: &LogBatch) -> Result<(), EffectError> {
    let mut line = serde_json::to_vec(batch)
        .map_err(|e| EffectError::FatalError(format!("log batch serialization failed: {e}")))?;
    line.push(b'\n');
    sink.write_all(&line)
        .await
        .map_err(|e| EffectError::FatalError(format!("log sink write failed: {e}")))?;
    debug!(count = batch.messages.len(), end = batch.end, "shipped log batch");
    Ok(())
}
