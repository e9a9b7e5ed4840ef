//! Bookkeeping state behind a [`TaskQueue`](super::TaskQueue).

use std::time::Duration;

use tokio::sync::{broadcast, oneshot};

use super::events::QueueEvent;
use super::job::Job;
use super::options::Concurrency;
use super::priority::PriorityList;

/// Condition a waiter is parked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitCondition {
    Empty,
    SizeBelow(usize),
    Idle,
}

impl WaitCondition {
    pub fn is_met(self, queued: usize, in_flight: usize) -> bool {
        match self {
            WaitCondition::Empty => queued == 0,
            WaitCondition::SizeBelow(limit) => queued < limit,
            WaitCondition::Idle => queued == 0 && in_flight == 0,
        }
    }
}

pub(crate) struct Waiter {
    pub condition: WaitCondition,
    pub tx: oneshot::Sender<()>,
}

pub(crate) struct QueueState {
    pub concurrency: Concurrency,
    pub in_flight: usize,
    pub paused: bool,
    pub default_timeout: Option<Duration>,
    pub entries: PriorityList<Job>,
    pub waiters: Vec<Waiter>,
    pub events: broadcast::Sender<QueueEvent>,
}

impl QueueState {
    pub fn emit(&self, event: QueueEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Wake every waiter whose condition holds right now.
    ///
    /// Waiters whose future was dropped are discarded on the way.
    pub fn resolve_waiters(&mut self) {
        if self.waiters.is_empty() {
            return;
        }
        let queued = self.entries.len();
        let in_flight = self.in_flight;
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.waiters)
            .into_iter()
            .filter(|w| !w.tx.is_closed())
            .partition(|w| w.condition.is_met(queued, in_flight));
        self.waiters = waiting;
        for waiter in ready {
            let _ = waiter.tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(WaitCondition::Empty, 0, 3, true)]
    #[case(WaitCondition::Empty, 1, 0, false)]
    #[case(WaitCondition::SizeBelow(2), 1, 5, true)]
    #[case(WaitCondition::SizeBelow(2), 2, 0, false)]
    #[case(WaitCondition::SizeBelow(0), 0, 0, false)]
    #[case(WaitCondition::Idle, 0, 0, true)]
    #[case(WaitCondition::Idle, 0, 1, false)]
    #[case(WaitCondition::Idle, 1, 0, false)]
    fn conditions(
        #[case] condition: WaitCondition,
        #[case] queued: usize,
        #[case] in_flight: usize,
        #[case] met: bool,
    ) {
        assert_eq!(condition.is_met(queued, in_flight), met);
    }
}
