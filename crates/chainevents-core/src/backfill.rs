//! Reconnect backfill: window planning and the chunked replay loop.
//!
//! On subscribe the listener asks its [`ReconnectRangeSource`] which blocks
//! were missed, resumes after the watermark if that is more recent, clips the
//! window to the last `max_backfill_window` blocks before the end, and replays the
//! window chunk by chunk through the strategy's backfill source.
//!
//! [`ReconnectRangeSource`]: crate::strategy::ReconnectRangeSource

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::handler::HandlerChain;
use crate::range::{clip_window, BlockChunks};
use crate::strategy::{ChainStrategy, RawItem};
use crate::types::DisconnectedRange;
use crate::watermark::Watermark;

/// An inclusive block window to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillWindow {
    pub start: u64,
    pub end: u64,
}

/// Work out which blocks to replay.
///
/// Returns `None` when there is no usable start (no discovered range and no
/// watermark) or nothing left to replay.
pub fn plan_window(
    discovered: Option<&DisconnectedRange>,
    watermark: Option<u64>,
    head: u64,
    max_window: u64,
) -> Option<BackfillWindow> {
    let resume = watermark.map(|w| w.saturating_add(1));
    let start = match (discovered.map(|r| r.start_block), resume) {
        (Some(found), Some(resume)) => found.max(resume),
        (Some(found), None) => found,
        (None, Some(resume)) => resume,
        (None, None) => return None,
    };
    let end = discovered.map_or(head, |r| r.end_or(head));
    if start > end {
        return None;
    }
    Some(BackfillWindow {
        start: clip_window(start, end, max_window),
        end,
    })
}

/// Outcome of a backfill run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackfillReport {
    pub chunks: u64,
    pub events: usize,
    pub cancelled: bool,
}

/// Replay `window` chunk by chunk, dispatching every event of a chunk before
/// fetching the next one. The first chunk error ends the run.
pub(crate) async fn run<R: RawItem>(
    strategy: &ChainStrategy<R>,
    window: BackfillWindow,
    chunk_size: u64,
    cancel: &CancellationToken,
    handlers: &HandlerChain,
    watermark: &Watermark,
    verbose: bool,
) -> Result<BackfillReport> {
    let storage = strategy.backfill_storage()?;
    let mut report = BackfillReport::default();

    for chunk in BlockChunks::new(window.start, window.end, chunk_size) {
        if cancel.is_cancelled() {
            tracing::info!(next = chunk.start(), "Backfill cancelled");
            report.cancelled = true;
            return Ok(report);
        }
        let (from, to) = (*chunk.start(), *chunk.end());
        let range = DisconnectedRange::between(from, to);

        let events = match &storage {
            Some(fetcher) => {
                let events = fetcher.fetch(Some(&range), false).await?;
                handlers.dispatch_all(&events, verbose).await;
                events.len()
            }
            None => {
                let raws = strategy.poller.poll(&range, chunk_size).await?;
                let mut count = 0;
                for raw in &raws {
                    let events = strategy.processor.process(raw).await;
                    handlers.dispatch_all(&events, verbose).await;
                    count += events.len();
                }
                count
            }
        };
        watermark.advance(to);
        report.chunks += 1;
        report.events += events;

        tracing::info!(
            current = from,
            batch_end = to,
            total = window.end,
            events,
            "Backfill batch complete"
        );
    }

    tracing::info!(at = window.end, events = report.events, "Backfill complete");
    Ok(report)
}
