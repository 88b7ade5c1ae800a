//! Bounded event channel from a real-time producer to a worker thread.
//!
//! The producer side never blocks: pushes into a full queue are dropped and
//! counted, and the wake-up notification is skipped if the consumer holds
//! the lock. The consumer wakes on notification or, at the latest, after
//! its poll interval.

use crate::midi::TimedEvent;
use crate::shutdown::CancellationToken;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Longest time the consumer sleeps without a notification.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct Shared {
    queue: ArrayQueue<TimedEvent>,
    lock: Mutex<()>,
    ready: Condvar,
    dropped: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates a channel holding at most `capacity` events (at least one).
pub fn event_channel(capacity: usize) -> (EventProducer, EventConsumer) {
    let shared = Arc::new(Shared {
        queue: ArrayQueue::new(capacity.max(1)),
        lock: Mutex::new(()),
        ready: Condvar::new(),
        dropped: AtomicU64::new(0),
    });
    (
        EventProducer {
            shared: Arc::clone(&shared),
        },
        EventConsumer {
            shared,
            poll_interval: DEFAULT_POLL_INTERVAL,
        },
    )
}

/// Real-time side. Neither method blocks or allocates.
pub struct EventProducer {
    shared: Arc<Shared>,
}

impl EventProducer {
    /// Enqueues `event` and notifies the consumer. Returns `false` if the
    /// queue was full and the event was dropped.
    pub fn try_push(&self, event: TimedEvent) -> bool {
        if self.shared.queue.push(event).is_err() {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.try_notify();
        true
    }

    /// Signals the consumer unless it currently holds the lock.
    pub fn try_notify(&self) -> bool {
        match self.shared.lock.try_lock() {
            Ok(_guard) => {
                self.shared.ready.notify_one();
                true
            }
            Err(_) => false,
        }
    }
}

/// Worker side.
pub struct EventConsumer {
    shared: Arc<Shared>,
    poll_interval: Duration,
}

impl EventConsumer {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.is_empty()
    }

    /// Total number of events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Hands every event queued when the call started to `f`, oldest first.
    pub fn drain<F: FnMut(TimedEvent)>(&self, mut f: F) -> usize {
        let available = self.shared.queue.len();
        let mut handled = 0;
        while handled < available {
            match self.shared.queue.pop() {
                Some(event) => f(event),
                None => break,
            }
            handled += 1;
        }
        handled
    }

    /// Drains and waits until `token` is cancelled.
    pub fn run<F: FnMut(TimedEvent)>(&self, token: &CancellationToken, mut f: F) {
        let mut guard = self.shared.lock();
        while !token.is_cancelled() {
            self.drain(&mut f);
            if token.is_cancelled() {
                break;
            }
            if self.shared.queue.is_empty() {
                guard = self
                    .shared
                    .ready
                    .wait_timeout(guard, self.poll_interval)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        }
    }

    pub fn waker(&self) -> ChannelWaker {
        ChannelWaker {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Wakes a consumer blocked in [`EventConsumer::run`], e.g. after the
/// cancellation token was set. May block briefly, so never call it from a
/// real-time context.
#[derive(Clone)]
pub struct ChannelWaker {
    shared: Arc<Shared>,
}

impl ChannelWaker {
    pub fn wake(&self) {
        let _guard = self.shared.lock();
        self.shared.ready.notify_all();
    }
}
