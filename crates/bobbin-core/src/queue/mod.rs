//! Priority task queue with a concurrency ceiling.
//!
//! Design intent:
//! - The queue owns pending entries; a dequeued entry is moved into its own
//!   spawned task and is no longer tracked, only counted.
//! - Every bookkeeping step (counts, list, events, waiters) happens under one
//!   lock that is never held across an `.await`.
//! - Completion handlers only hold a weak reference. Once every `TaskQueue`
//!   handle is dropped, running tasks still finish but nothing new starts.

mod events;
mod handle;
mod job;
mod options;
mod priority;
mod state;

pub use events::QueueEvent;
pub use handle::TaskHandle;
pub use options::{BatchMode, Concurrency, QueueConfig, SubmitOptions};
pub use priority::PriorityList;

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::{join_all, try_join_all};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, trace};

use self::job::Job;
use self::state::{QueueState, WaitCondition, Waiter};
use crate::error::{ConfigError, TaskError};
use crate::ids::TaskId;
use crate::observability::QueueStats;
use crate::sync::lock;

struct Shared {
    state: Mutex<QueueState>,
}

impl Shared {
    /// Start as many pending entries as the current limit allows.
    ///
    /// Runs after every submission, completion, `start()` and concurrency
    /// change. Iterative on purpose: starting a task never re-enters this loop.
    fn drain(self: &Arc<Self>, state: &mut QueueState) {
        loop {
            if state.entries.is_empty() {
                state.emit(QueueEvent::Drained);
                if state.in_flight == 0 {
                    state.emit(QueueEvent::Idle);
                }
                break;
            }
            if state.paused || !state.concurrency.has_room(state.in_flight) {
                break;
            }
            let Some(job) = state.entries.pop_front() else {
                break;
            };
            if job.is_cancelled() {
                // never started, so no count to give back
                trace!(task_id = %job.task_id, "discarding cancelled task before start");
                continue;
            }

            state.in_flight += 1;
            debug!(
                task_id = %job.task_id,
                in_flight = state.in_flight,
                queued = state.entries.len(),
                "task started"
            );
            state.emit(QueueEvent::Active {
                task_id: job.task_id,
            });
            self.launch(job);
        }
        state.resolve_waiters();
    }

    /// Fire-and-forget: the spawned task reports back through `complete`.
    fn launch(self: &Arc<Self>, job: Job) {
        let queue = Arc::downgrade(self);
        let Job { task_id, run, .. } = job;
        tokio::spawn(async move {
            let settlement = run().await;
            if let Some(shared) = queue.upgrade() {
                shared.complete(task_id, settlement.error.clone());
            }
            (settlement.deliver)();
        });
    }

    fn complete(self: &Arc<Self>, task_id: TaskId, error: Option<String>) {
        let mut state = lock(&self.state);
        state.in_flight = state.in_flight.saturating_sub(1);
        match &error {
            Some(error) => debug!(%task_id, %error, in_flight = state.in_flight, "task failed"),
            None => debug!(%task_id, in_flight = state.in_flight, "task completed"),
        }
        state.emit(QueueEvent::Settled { task_id, error });
        state.emit(QueueEvent::Next);
        self.drain(&mut state);
    }
}

/// Priority task queue.
///
/// Cheap to clone; clones share the same queue. Must be used from within a
/// Tokio runtime because started tasks are spawned.
///
/// # Example
/// ```ignore
/// let queue = TaskQueue::new(QueueConfig::default().with_concurrency(2))?;
/// let handle = queue.submit(|| async { Ok::<_, String>(42) }, SubmitOptions::default());
/// assert_eq!(handle.await?, 42);
/// queue.on_idle().await;
/// ```
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<Shared>,
}

impl TaskQueue {
    pub fn new(config: QueueConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);
        let state = QueueState {
            concurrency: config.concurrency,
            in_flight: 0,
            paused: !config.autostart,
            default_timeout: config.default_timeout,
            entries: PriorityList::new(),
            waiters: Vec::new(),
            events,
        };
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
            }),
        })
    }

    /// Queue `task` and start it right away if there is room.
    ///
    /// `Submitted` is emitted before the dequeue attempt, so with free
    /// capacity the task is already counted as in-flight when this returns.
    /// Failures never surface here; they resolve the returned handle.
    pub fn submit<F, Fut, T, E>(&self, task: F, options: SubmitOptions) -> TaskHandle<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let task_id = TaskId::generate();
        let (tx, rx) = oneshot::channel();
        let handle = TaskHandle::new(task_id, rx, options.cancel.clone());

        let mut state = lock(&self.shared.state);
        let timeout = options.timeout.or(state.default_timeout);
        let job = Job::new(task_id, task, options.cancel, timeout, tx);
        state.entries.insert(options.priority, job);
        debug!(
            %task_id,
            priority = options.priority,
            queued = state.entries.len(),
            "task submitted"
        );
        state.emit(QueueEvent::Submitted {
            task_id,
            priority: options.priority,
        });
        self.shared.drain(&mut state);

        handle
    }

    /// Submit every task with the same options.
    ///
    /// All tasks are queued before this returns. The returned future reports
    /// according to `mode`:
    /// - [`BatchMode::SettleAll`]: always `Ok`, one result per task in
    ///   submission order, once every task has settled.
    /// - [`BatchMode::FailFast`]: `Err` with the first failure as soon as it
    ///   happens (the remaining tasks keep running), otherwise `Ok` with every
    ///   value.
    pub fn submit_all<I, F, Fut, T, E>(
        &self,
        tasks: I,
        options: SubmitOptions,
        mode: BatchMode,
    ) -> impl Future<Output = Result<Vec<Result<T, TaskError<E>>>, TaskError<E>>> + Send + 'static
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let handles: Vec<TaskHandle<T, E>> = tasks
            .into_iter()
            .map(|task| self.submit(task, options.clone()))
            .collect();
        debug!(count = handles.len(), ?mode, "batch submitted");

        async move {
            match mode {
                BatchMode::SettleAll => Ok(join_all(handles).await),
                BatchMode::FailFast => try_join_all(handles)
                    .await
                    .map(|values| values.into_iter().map(Ok).collect()),
            }
        }
    }

    /// Resume dequeuing. No-op unless paused.
    pub fn start(&self) {
        let mut state = lock(&self.shared.state);
        if !state.paused {
            return;
        }
        state.paused = false;
        debug!(queued = state.entries.len(), "queue started");
        self.shared.drain(&mut state);
    }

    /// Stop dequeuing. Running tasks are not affected.
    pub fn pause(&self) {
        let mut state = lock(&self.shared.state);
        state.paused = true;
        debug!(queued = state.entries.len(), "queue paused");
    }

    /// Drop every entry that has not started yet. Their handles never resolve.
    pub fn clear(&self) {
        let mut state = lock(&self.shared.state);
        let discarded = state.entries.len();
        state.entries.clear();
        debug!(discarded, "queue cleared");
        state.resolve_waiters();
    }

    /// Resolves once no entry is waiting to be dequeued.
    pub fn on_empty(&self) -> impl Future<Output = ()> + Send + 'static {
        self.wait_for(WaitCondition::Empty)
    }

    /// Resolves once fewer than `limit` entries are waiting to be dequeued.
    pub fn on_size_below(&self, limit: usize) -> impl Future<Output = ()> + Send + 'static {
        self.wait_for(WaitCondition::SizeBelow(limit))
    }

    /// Resolves once nothing is waiting and nothing is running.
    pub fn on_idle(&self) -> impl Future<Output = ()> + Send + 'static {
        self.wait_for(WaitCondition::Idle)
    }

    /// Register the waiter now; the condition is re-checked at every later
    /// state change, never speculatively.
    fn wait_for(&self, condition: WaitCondition) -> impl Future<Output = ()> + Send + 'static {
        let rx = {
            let mut state = lock(&self.shared.state);
            if condition.is_met(state.entries.len(), state.in_flight) {
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(Waiter { condition, tx });
                Some(rx)
            }
        };
        async move {
            if let Some(rx) = rx {
                // Err only when the queue itself is gone
                let _ = rx.await;
            }
        }
    }

    pub fn concurrency(&self) -> Concurrency {
        lock(&self.shared.state).concurrency
    }

    /// Change the ceiling. Raising it starts more work immediately; lowering
    /// it only throttles future dequeues.
    pub fn set_concurrency(&self, concurrency: Concurrency) -> Result<(), ConfigError> {
        let concurrency = concurrency.validate()?;
        let mut state = lock(&self.shared.state);
        state.concurrency = concurrency;
        debug!(?concurrency, in_flight = state.in_flight, "concurrency changed");
        self.shared.drain(&mut state);
        Ok(())
    }

    /// Entries waiting to be dequeued.
    pub fn size(&self) -> usize {
        lock(&self.shared.state).entries.len()
    }

    /// Entries waiting at exactly `priority`.
    pub fn size_by_priority(&self, priority: i32) -> usize {
        lock(&self.shared.state).entries.count_priority(priority)
    }

    /// Tasks currently running (dequeued, not yet settled).
    pub fn pending(&self) -> usize {
        lock(&self.shared.state).in_flight
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.shared.state).paused
    }

    pub fn stats(&self) -> QueueStats {
        let state = lock(&self.shared.state);
        QueueStats {
            queued: state.entries.len(),
            running: state.in_flight,
            paused: state.paused,
            concurrency: state.concurrency,
        }
    }

    /// Subscribe to lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        lock(&self.shared.state).events.subscribe()
    }
}
