//! Observable state containers.
//!
//! [`Observable`] is a current-value cell: readers take a snapshot with
//! [`Observable::get`] or follow changes through a `watch` receiver, and
//! synchronous listeners run on every [`Observable::set`] in registration
//! order. Each piece of portal state has exactly one owner that calls `set`.
//!
//! [`Generation`] hands out monotonically increasing tickets so an async
//! result can be dropped when a newer request superseded it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`Observable::listen`], used to detach the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct Observable<T> {
    tx: watch::Sender<T>,
    listeners: Mutex<Vec<(ListenerId, Listener<T>)>>,
    next_listener: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            tx: watch::Sender::new(initial),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Run `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Register a listener called synchronously after each [`Self::set`].
    pub fn listen(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    pub fn unlisten(&self, id: ListenerId) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(listener_id, _)| *listener_id != id);
    }

    /// Replace the value and notify listeners.
    ///
    /// Listeners run after the lock is released, so a listener may read this
    /// observable or register further listeners.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value.clone());
        let listeners: Vec<Listener<T>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.tx.borrow())
            .finish_non_exhaustive()
    }
}

/// A request generation. Only the latest issued ticket is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug)]
pub struct Generation {
    issued: AtomicU64,
    settled: watch::Sender<u64>,
}

impl Default for Generation {
    fn default() -> Self {
        Self::new()
    }
}

impl Generation {
    #[must_use]
    pub fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
            settled: watch::Sender::new(0),
        }
    }

    /// Issue a new ticket, superseding every earlier one.
    pub fn issue(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.0
    }

    /// Mark `ticket` as finished. Stale tickets settle too; waiters only
    /// care whether the latest one has.
    pub fn settle(&self, ticket: Ticket) {
        self.settled.send_if_modified(|settled| {
            if ticket.0 > *settled {
                *settled = ticket.0;
                true
            } else {
                false
            }
        });
    }

    /// Wait until the latest ticket issued before this call has settled.
    pub async fn idle(&self) {
        let target = self.issued.load(Ordering::SeqCst);
        let mut settled = self.settled.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = settled.wait_for(|settled| *settled >= target).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn listeners_run_in_registration_order() {
        let observable = Observable::new(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            observable.listen(move |value: &i32| seen.lock().unwrap().push((tag, *value)));
        }

        observable.set(7);
        assert_eq!(*seen.lock().unwrap(), vec![("first", 7), ("second", 7)]);
        assert_eq!(observable.get(), 7);
    }

    #[test]
    fn unlisten_detaches() {
        let observable = Observable::new(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = observable.listen(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        observable.set(1);
        observable.unlisten(id);
        observable.set(2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_read_the_observable() {
        let observable = Arc::new(Observable::new(String::new()));
        let inner = Arc::clone(&observable);
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        observable.listen(move |_| *sink.lock().unwrap() = inner.get());

        observable.set("hello".into());
        assert_eq!(*seen.lock().unwrap(), "hello");
    }

    #[test]
    fn only_latest_ticket_is_current() {
        let generation = Generation::new();
        let first = generation.issue();
        let second = generation.issue();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
    }

    #[tokio::test]
    async fn idle_waits_for_latest_ticket() {
        let generation = Arc::new(Generation::new());
        let stale = generation.issue();
        let latest = generation.issue();

        generation.settle(stale);
        let waiter = {
            let generation = Arc::clone(&generation);
            tokio::spawn(async move { generation.idle().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        generation.settle(latest);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn idle_returns_immediately_without_tickets() {
        Generation::new().idle().await;
    }
}
