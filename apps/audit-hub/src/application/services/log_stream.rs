//! Raw audit log stream.

use std::sync::Arc;

use super::StreamExit;
use crate::application::ports::{EventSource, StreamSink};
use crate::domain::audit::Event;

/// Forward every event from `source` to `sink` until either side closes.
pub async fn run_log_stream<Src, S>(mut source: Src, sink: S) -> StreamExit
where
    Src: EventSource,
    S: StreamSink<Arc<Event>>,
{
    loop {
        tokio::select! {
            item = source.recv() => match item {
                Some(event) => {
                    if sink.send(event).await.is_err() {
                        return StreamExit::ClientGone;
                    }
                }
                None => return StreamExit::MailboxClosed,
            },
            () = sink.closed() => return StreamExit::ClientGone,
        }
    }
}
