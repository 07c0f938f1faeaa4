//! Observable cells
//!
//! A [`Signal`] owns a value and a list of subscribers that are called
//! with a snapshot of the value after every write. Subscribing while an
//! [`EffectScope`](crate::EffectScope) is current binds the subscription
//! to that scope.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::scope::current_scope;

/// Subscriber ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

trait Unsubscribe: Send + Sync {
    fn remove(&self, id: SubscriberId) -> bool;
}

struct SignalInner<T> {
    value: RwLock<T>,
    subscribers: Mutex<Vec<(SubscriberId, Callback<T>)>>,
    next_subscriber_id: AtomicU64,
    version: AtomicU64,
}

impl<T: Send + Sync + 'static> Unsubscribe for SignalInner<T> {
    fn remove(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }
}

/// Mutable observable cell
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Signal<T> {
    /// Create a new signal
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                value: RwLock::new(value),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber_id: AtomicU64::new(1),
                version: AtomicU64::new(0),
            }),
        }
    }

    /// Clone the current value
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Read the current value in place.
    ///
    /// The signal is read-locked while `f` runs; `f` must not write to it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Replace the value and notify subscribers
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value;
        self.notify();
    }

    /// Mutate the value in place and notify subscribers
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = {
            let mut value = self.inner.value.write();
            f(&mut value)
        };
        self.notify();
        result
    }

    /// Number of writes so far
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Subscribe to writes.
    ///
    /// If a scope is current the subscription is released when it stops.
    /// Dropping the returned handle does not unsubscribe.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed));
        self.inner.subscribers.lock().push((id, Arc::new(callback)));

        let source: Arc<dyn Unsubscribe> = self.inner.clone();
        let subscription = Subscription {
            id,
            source: Arc::downgrade(&source),
        };

        if let Some(scope) = current_scope() {
            let bound = subscription.clone();
            scope.on_dispose(move || {
                bound.unsubscribe();
            });
        }

        subscription
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Check if two handles refer to the same cell
    pub fn ptr_eq(&self, other: &Signal<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self) {
        self.inner.version.fetch_add(1, Ordering::AcqRel);

        // Subscribers run without any lock held so they may read or write
        // the signal themselves.
        let subscribers: Vec<Callback<T>> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        if subscribers.is_empty() {
            return;
        }

        let snapshot = self.get();
        for callback in subscribers {
            callback(&snapshot);
        }
    }
}

impl<T: Clone + Default + Send + Sync + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &*self.inner.value.read())
            .field("version", &self.inner.version.load(Ordering::Relaxed))
            .finish()
    }
}

/// Handle to a signal subscription
#[derive(Clone)]
pub struct Subscription {
    id: SubscriberId,
    source: Weak<dyn Unsubscribe>,
}

impl Subscription {
    /// Subscriber ID
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the subscriber. Returns `false` if it was already removed or
    /// the signal is gone.
    pub fn unsubscribe(&self) -> bool {
        match self.source.upgrade() {
            Some(source) => source.remove(self.id),
            None => false,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
