//! Windowed call statistics stream.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use super::StreamExit;
use crate::application::ports::{EventSource, SinkClosed, StreamSink};
use crate::domain::audit::{Stat, StatWindow};
use crate::infrastructure::metrics;

/// Count events from `source` and flush a [`Stat`] to `sink` every `period`.
///
/// The first flush happens one full period after the call. Windows with no
/// events still flush an empty snapshot. Closing the source ends the loop
/// without a final flush.
///
/// # Errors
///
/// Returns [`SinkClosed`] if a flush cannot be delivered.
///
/// # Panics
///
/// Panics if `period` is zero.
pub async fn run_stats_stream<Src, S>(
    mut source: Src,
    sink: S,
    period: Duration,
) -> Result<StreamExit, SinkClosed>
where
    Src: EventSource,
    S: StreamSink<Stat>,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut window = StatWindow::new();

    loop {
        tokio::select! {
            item = source.recv() => match item {
                Some(event) => window.record(&event),
                None => return Ok(StreamExit::MailboxClosed),
            },
            _ = ticker.tick() => {
                let stat = window.flush_now();
                let calls = stat.total_calls();
                sink.send(stat).await?;
                metrics::record_stat_flush();
                tracing::trace!(calls, "Statistics window flushed");
            }
            () = sink.closed() => return Ok(StreamExit::ClientGone),
        }
    }
}
