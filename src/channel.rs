//! Thread-safe result channel connecting a task's producer to its consumers.
//!
//! The channel is the synchronization core shared by both facets of a
//! streaming task: the producer deposits values through an [`Inlet`], and
//! consumers pull them through the task handle. One mutex guards the value
//! queue, the terminal marker, and the task phase together, so every
//! check-then-wait and every deposit-then-signal is atomic with respect to
//! the rest of the lifecycle.
//!
//! Waiting follows tokio's queue pattern for [`Notify`]: the `Notified`
//! future is pinned and enabled before the state is re-checked under the
//! lock, so a signal arriving between the check and the await is never lost.
//! Timeouts wrap only the suspension, never the removal, which makes the
//! pull future cancel-safe: a value popped from the queue is always
//! returned.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{FailureCause, NextError, PutError};
use crate::task::TaskState;

/// Terminal marker recorded once, after the last deposited value.
#[derive(Debug)]
pub(crate) enum Terminal {
    /// The producer finished normally.
    End,
    /// The producer failed; the cause is shared with every consumer.
    Failed(FailureCause),
}

/// State guarded by the channel mutex.
struct ChannelState<T> {
    queue: VecDeque<T>,
    terminal: Option<Terminal>,
    phase: TaskState,
}

/// Synchronization core shared by a task handle and its inlet.
pub(crate) struct ResultChannel<T> {
    state: Mutex<ChannelState<T>>,
    /// Wakes consumers suspended in [`ResultChannel::take_next`].
    readable: Notify,
    /// Wakes a producer suspended on a full queue.
    writable: Notify,
    /// Interruption signal, tripped by `cancel(true)`.
    interrupt: CancellationToken,
    /// `None` means unbounded.
    capacity: Option<usize>,
}

impl<T> ResultChannel<T> {
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(ChannelState {
                queue: VecDeque::new(),
                terminal: None,
                phase: TaskState::Pending,
            }),
            readable: Notify::new(),
            writable: Notify::new(),
            interrupt: CancellationToken::new(),
            capacity: capacity.map(|limit| limit.max(1)),
        }
    }

    /// Locks the channel state. Poisoning cannot occur: no critical section
    /// in this module panics while holding the guard.
    fn lock(&self) -> MutexGuard<'_, ChannelState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_room(&self, state: &ChannelState<T>) -> bool {
        self.capacity.map_or(true, |limit| state.queue.len() < limit)
    }

    pub(crate) async fn put(&self, value: T) -> Result<(), PutError<T>> {
        self.put_inner(value, None).await
    }

    pub(crate) async fn put_timeout(
        &self,
        value: T,
        timeout: Duration,
    ) -> Result<(), PutError<T>> {
        // A deadline past the end of the clock means no deadline.
        self.put_inner(value, Instant::now().checked_add(timeout))
            .await
    }

    async fn put_inner(&self, value: T, deadline: Option<Instant>) -> Result<(), PutError<T>> {
        let writable = self.writable.notified();
        tokio::pin!(writable);
        loop {
            writable.as_mut().enable();
            {
                let mut state = self.lock();
                if self.interrupt.is_cancelled() {
                    return Err(PutError::Interrupted(value));
                }
                if state.terminal.is_some() {
                    return Err(PutError::Closed(value));
                }
                if self.has_room(&state) {
                    state.queue.push_back(value);
                    let queued = state.queue.len();
                    drop(state);
                    self.readable.notify_one();
                    trace!(queued, "value deposited");
                    return Ok(());
                }
            }
            match deadline {
                Some(at) => {
                    if time::timeout_at(at, writable.as_mut()).await.is_err() {
                        return Err(PutError::Timeout(value));
                    }
                }
                None => writable.as_mut().await,
            }
            writable.set(self.writable.notified());
        }
    }

    /// Pulls the next value, suspending until one is deposited, the task
    /// reaches a terminal phase, or `deadline` elapses.
    ///
    /// Priority under a single lock acquisition: cancellation, then the
    /// failure terminal, then queued values, then the end-of-stream
    /// terminal. Terminal markers are observed in place and never removed.
    pub(crate) async fn take_next(
        &self,
        deadline: Option<Instant>,
    ) -> Result<Option<T>, NextError> {
        let readable = self.readable.notified();
        tokio::pin!(readable);
        loop {
            readable.as_mut().enable();
            {
                let mut state = self.lock();
                if state.phase == TaskState::Cancelled {
                    return Err(NextError::Cancelled);
                }
                if let Some(Terminal::Failed(cause)) = &state.terminal {
                    return Err(NextError::Failed(Arc::clone(cause)));
                }
                if let Some(value) = state.queue.pop_front() {
                    let queued = state.queue.len();
                    drop(state);
                    self.writable.notify_one();
                    trace!(queued, "value taken");
                    return Ok(Some(value));
                }
                if matches!(state.terminal, Some(Terminal::End)) {
                    return Ok(None);
                }
            }
            match deadline {
                Some(at) => {
                    if time::timeout_at(at, readable.as_mut()).await.is_err() {
                        return Err(NextError::Timeout);
                    }
                }
                None => readable.as_mut().await,
            }
            readable.set(self.readable.notified());
        }
    }

    /// Records the terminal marker and the matching phase, then wakes every
    /// pull waiter. The first terminal wins; a marker arriving after
    /// cancellation is discarded so the cancelled outcome stands.
    pub(crate) fn close(&self, terminal: Terminal) {
        {
            let mut state = self.lock();
            if state.phase == TaskState::Cancelled || state.terminal.is_some() {
                return;
            }
            state.phase = match &terminal {
                Terminal::End => TaskState::Completed,
                Terminal::Failed(_) => TaskState::Failed,
            };
            state.terminal = Some(terminal);
        }
        self.readable.notify_waiters();
    }

    /// Moves a pending or running task to `Cancelled` and wakes both waiter
    /// sets. Returns `false` without side effects once a terminal phase was
    /// reached.
    pub(crate) fn cancel(&self, interrupt: bool) -> bool {
        let transitioned = {
            let mut state = self.lock();
            match state.phase {
                TaskState::Pending | TaskState::Running => {
                    state.phase = TaskState::Cancelled;
                    true
                }
                _ => false,
            }
        };
        if transitioned {
            if interrupt {
                self.interrupt.cancel();
            }
            self.readable.notify_waiters();
            self.writable.notify_waiters();
        }
        transitioned
    }

    /// Pending → Running gate for the at-most-once run. On refusal, returns
    /// the phase that blocked the start.
    pub(crate) fn try_start(&self) -> Result<(), TaskState> {
        let mut state = self.lock();
        if state.phase == TaskState::Pending {
            state.phase = TaskState::Running;
            Ok(())
        } else {
            Err(state.phase)
        }
    }

    pub(crate) fn phase(&self) -> TaskState {
        self.lock().phase
    }

    pub(crate) fn interrupt_token(&self) -> &CancellationToken {
        &self.interrupt
    }
}

/// Producer facet of a streaming task's result channel.
///
/// Handed to the producer callback by the task's run; deliberately not
/// `Clone`, so a task has exactly one producer. Dropping the inlet does not
/// end the stream; the task records the terminal marker when the callback
/// returns.
pub struct Inlet<T> {
    channel: Arc<ResultChannel<T>>,
}

impl<T> Inlet<T> {
    pub(crate) fn new(channel: Arc<ResultChannel<T>>) -> Self {
        Self { channel }
    }

    /// Deposits a value at the tail of the stream, suspending while the
    /// queue is at capacity.
    ///
    /// Fails with [`PutError::Interrupted`] once the task was cancelled with
    /// interruption, and with [`PutError::Closed`] if the stream already
    /// carries its terminal marker. The rejected value rides back inside the
    /// error.
    pub async fn put(&self, value: T) -> Result<(), PutError<T>> {
        self.channel.put(value).await
    }

    /// Like [`Inlet::put`], but gives up with [`PutError::Timeout`] when
    /// capacity does not free up within `timeout`. A timeout too large for
    /// the clock to represent waits unboundedly.
    pub async fn put_timeout(&self, value: T, timeout: Duration) -> Result<(), PutError<T>> {
        self.channel.put_timeout(value, timeout).await
    }

    /// Whether the task was cancelled with interruption. Long-running
    /// callbacks should check this between units of work.
    pub fn is_interrupted(&self) -> bool {
        self.channel.interrupt_token().is_cancelled()
    }

    /// Resolves once the task is cancelled with interruption, letting a
    /// callback `select!` between useful work and shutdown.
    pub async fn interrupted(&self) {
        self.channel.interrupt_token().cancelled().await;
    }
}

impl<T> std::fmt::Debug for Inlet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inlet").finish_non_exhaustive()
    }
}
