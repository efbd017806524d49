//! Per-scope publish/subscribe
//!
//! Every scope (a room, a room's question list, a question's responses)
//! owns a [`Topic`]. The store publishes the scope's full snapshot after each
//! committed mutation while still holding its write lock, so all observers
//! of one scope see snapshots in commit order.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::AbortHandle;

/// Read-side failures, delivered separately from snapshots
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// The observer fell behind and `n` snapshots were skipped.
    /// Delivery resumes with the oldest retained snapshot.
    #[error("Observer lagged behind by {0} updates")]
    Lagged(u64),

    /// The scope was removed (e.g. its question was deleted)
    #[error("Subscription scope closed")]
    ScopeClosed,
}

impl SubscriptionError {
    pub fn code(&self) -> &'static str {
        match self {
            SubscriptionError::Lagged(_) => "RESYNC",
            SubscriptionError::ScopeClosed => "SCOPE_CLOSED",
        }
    }
}

/// Publishing half of a scope
#[derive(Debug)]
pub struct Topic<T> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a snapshot. Having no observers is fine.
    pub fn publish(&self, snapshot: T) {
        let _ = self.tx.send(snapshot);
    }

    /// Attach an observer that first sees `current`.
    ///
    /// Callers must hold the same lock mutations publish under, otherwise an
    /// update could slip between the snapshot and the subscription.
    pub fn subscribe(&self, current: T) -> Subscription<T> {
        Subscription {
            initial: Some(current),
            rx: self.tx.subscribe(),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving half: the current snapshot, then one snapshot per change.
/// Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription<T> {
    initial: Option<T>,
    rx: broadcast::Receiver<T>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    pub async fn recv(&mut self) -> Result<T, SubscriptionError> {
        if let Some(snapshot) = self.initial.take() {
            return Ok(snapshot);
        }
        match self.rx.recv().await {
            Ok(snapshot) => Ok(snapshot),
            Err(RecvError::Lagged(n)) => Err(SubscriptionError::Lagged(n)),
            Err(RecvError::Closed) => Err(SubscriptionError::ScopeClosed),
        }
    }

    /// Run callbacks on a background task until disposed or the scope
    /// closes. `on_error` receives lag notices and the final close.
    pub fn on_change<F, E>(mut self, mut on_change: F, mut on_error: E) -> Disposer
    where
        F: FnMut(T) + Send + 'static,
        E: FnMut(SubscriptionError) + Send + 'static,
    {
        let inner = Arc::new(DisposerInner {
            cancelled: AtomicBool::new(false),
            gate: Mutex::new(()),
            handle: Mutex::new(None),
        });
        let task_inner = inner.clone();

        let handle = tokio::spawn(async move {
            loop {
                let next = self.recv().await;
                // Checking the flag and running the callback happen under the
                // gate, so dispose() on another thread waits for a callback
                // already past the check.
                let _gate = lock(&task_inner.gate);
                if task_inner.cancelled.load(Ordering::Acquire) {
                    break;
                }
                let closed = task_inner.in_callback(|| match next {
                    Ok(snapshot) => {
                        on_change(snapshot);
                        false
                    }
                    Err(SubscriptionError::ScopeClosed) => {
                        on_error(SubscriptionError::ScopeClosed);
                        true
                    }
                    Err(e) => {
                        on_error(e);
                        false
                    }
                });
                if closed {
                    break;
                }
            }
        });

        *lock(&inner.handle) = Some(handle.abort_handle());
        Disposer { inner }
    }
}

fn lock<G>(mutex: &Mutex<G>) -> MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

thread_local! {
    /// Identity of the observer whose callback is running on this thread
    static RUNNING_OBSERVER: Cell<usize> = const { Cell::new(0) };
}

/// Detaches a callback observer. Cloneable so a callback can hold a copy
/// and dispose itself.
#[derive(Debug, Clone)]
pub struct Disposer {
    inner: Arc<DisposerInner>,
}

#[derive(Debug)]
struct DisposerInner {
    cancelled: AtomicBool,
    /// Held while the observer task checks `cancelled` and runs a callback
    gate: Mutex<()>,
    handle: Mutex<Option<AbortHandle>>,
}

impl DisposerInner {
    fn id(&self) -> usize {
        self as *const Self as usize
    }

    fn in_callback<R>(&self, f: impl FnOnce() -> R) -> R {
        let previous = RUNNING_OBSERVER.with(|cell| cell.replace(self.id()));
        let result = f();
        RUNNING_OBSERVER.with(|cell| cell.set(previous));
        result
    }
}

impl Disposer {
    /// Idempotent; no callback starts after this returns. Called from
    /// another thread while a callback is running, it waits for that
    /// callback to finish. Called from inside the observer's own callback,
    /// it returns immediately.
    pub fn dispose(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        let reentrant = RUNNING_OBSERVER.with(|cell| cell.get()) == self.inner.id();
        if !reentrant {
            drop(lock(&self.inner.gate));
        }
        if let Some(handle) = lock(&self.inner.handle).take() {
            handle.abort();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}
