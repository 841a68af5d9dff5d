//! Application Services
//!
//! Long-lived observer loops, one per streaming client.
//!
//! - `log_stream`: Forwards every audit event verbatim
//! - `stats_stream`: Aggregates events into fixed windows and flushes them
//!
//! Each loop owns its event source and drops it on return, so the caller
//! can deregister the subscriber without racing a blocked broadcast.

mod log_stream;
mod stats_stream;

pub use log_stream::run_log_stream;
pub use stats_stream::run_stats_stream;

/// Why an observer loop returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamExit {
    /// The mailbox was closed by deregistration or shutdown.
    MailboxClosed,
    /// The client went away.
    ClientGone,
}

impl StreamExit {
    /// Reason label for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MailboxClosed => "mailbox_closed",
            Self::ClientGone => "client_gone",
        }
    }
}
