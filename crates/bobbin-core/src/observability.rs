use serde::{Deserialize, Serialize};

use crate::queue::Concurrency;

/// Point-in-time snapshot of a [`TaskQueue`](crate::TaskQueue).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Entries waiting to be dequeued.
    pub queued: usize,
    /// Tasks dequeued and not yet settled.
    pub running: usize,
    pub paused: bool,
    pub concurrency: Concurrency,
}
