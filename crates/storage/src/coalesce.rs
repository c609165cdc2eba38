//! Request coalescing for tile computations.
//!
//! When several requests for the same tile arrive while it is being computed,
//! only the first one (the leader) does the work. Every other request (a
//! follower) subscribes to the leader's broadcast channel and receives the
//! same result.
//!
//! ```text
//! Request A ─┐
//!            │                          leader
//! Request B ─┼──► RequestCoalescer ───► computes tile once
//!            │          │                    │
//! Request C ─┘          ▼                    ▼
//!               [B, C wait on the      InFlight::complete
//!                broadcast channel] ◄────────┘
//! ```
//!
//! The in-flight map sits behind one mutex that is only held to insert,
//! subscribe or remove, never while a tile is computed. If a leader's
//! [`InFlight`] guard is dropped without completing (for example because the
//! computation panicked) the channel closes and followers see
//! `RecvError::Closed`.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// One result is ever sent per channel.
const CHANNEL_CAPACITY: usize = 1;

/// Tracks in-flight computations keyed by `K`, sharing results of type `V`.
pub struct RequestCoalescer<K, V> {
    inner: Arc<Inner<K, V>>,
}

struct Inner<K, V> {
    in_flight: Mutex<HashMap<K, Slot<V>>>,
    next_id: AtomicU64,
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_requests: AtomicU64,
}

struct Slot<V> {
    id: u64,
    sender: broadcast::Sender<V>,
}

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CoalescerStats {
    /// Total registrations
    pub total_requests: u64,
    /// Registrations that waited for existing work
    pub coalesced_requests: u64,
    /// Registrations that started new work
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Fraction of requests that were coalesced (0.0 to 1.0).
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

/// Outcome of [`RequestCoalescer::register`].
pub enum Registration<K: Hash + Eq + Clone + Debug, V: Clone> {
    /// No computation was running: the caller must compute the value and
    /// hand it to [`InFlight::complete`].
    Leader(InFlight<K, V>),
    /// A computation is already running: wait on the receiver.
    Follower(broadcast::Receiver<V>),
}

impl<K: Hash + Eq + Clone + Debug, V: Clone> Registration<K, V> {
    pub fn is_leader(&self) -> bool {
        matches!(self, Self::Leader(_))
    }
}

impl<K, V> Clone for RequestCoalescer<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Hash + Eq + Clone + Debug, V: Clone> Default for RequestCoalescer<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + Clone + Debug, V: Clone> RequestCoalescer<K, V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                in_flight: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                total_requests: AtomicU64::new(0),
                coalesced_requests: AtomicU64::new(0),
                new_requests: AtomicU64::new(0),
            }),
        }
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        // The map stays consistent even if a holder panicked: every critical
        // section is a single insert, lookup or remove
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register interest in `key`.
    ///
    /// Exactly one caller per key becomes the leader until that leader
    /// completes or drops its guard.
    pub fn register(&self, key: K) -> Registration<K, V> {
        self.inner.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut in_flight = self.in_flight();
        if let Some(slot) = in_flight.get(&key) {
            let rx = slot.sender.subscribe();
            drop(in_flight);
            self.inner
                .coalesced_requests
                .fetch_add(1, Ordering::Relaxed);
            debug!(key = ?key, "Coalescing request - waiting for in-flight computation");
            return Registration::Follower(rx);
        }

        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        in_flight.insert(
            key.clone(),
            Slot {
                id,
                sender: tx.clone(),
            },
        );
        let in_flight_count = in_flight.len();
        drop(in_flight);

        self.inner.new_requests.fetch_add(1, Ordering::Relaxed);
        debug!(key = ?key, in_flight_count, "New request - starting computation");

        Registration::Leader(InFlight {
            coalescer: self.clone(),
            key,
            id,
            sender: Some(tx),
        })
    }

    /// Remove `key` if it is still owned by registration `id`.
    fn release(&self, key: &K, id: u64) {
        let mut in_flight = self.in_flight();
        if in_flight.get(key).is_some_and(|slot| slot.id == id) {
            in_flight.remove(key);
        }
    }

    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            total_requests: self.inner.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.inner.coalesced_requests.load(Ordering::Relaxed),
            new_requests: self.inner.new_requests.load(Ordering::Relaxed),
        }
    }

    /// Number of keys currently being computed.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight().len()
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            total_requests = stats.total_requests,
            coalesced = stats.coalesced_requests,
            new_requests = stats.new_requests,
            in_flight = self.in_flight_count(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Request coalescing statistics"
        );
    }
}

/// Leader's handle on an in-flight computation.
///
/// Dropping it without calling [`complete`](Self::complete) unregisters the
/// key and closes the channel, releasing all followers.
pub struct InFlight<K: Hash + Eq + Clone + Debug, V: Clone> {
    coalescer: RequestCoalescer<K, V>,
    key: K,
    id: u64,
    sender: Option<broadcast::Sender<V>>,
}

impl<K: Hash + Eq + Clone + Debug, V: Clone> InFlight<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Receive the result alongside the followers.
    pub fn subscribe(&self) -> broadcast::Receiver<V> {
        match &self.sender {
            Some(sender) => sender.subscribe(),
            // Unreachable while the guard is alive; a fresh closed channel
            None => broadcast::channel(CHANNEL_CAPACITY).1,
        }
    }

    /// Unregister the key and publish `value` to every follower.
    ///
    /// Returns the number of followers that were waiting.
    pub fn complete(mut self, value: V) -> usize {
        let Some(sender) = self.sender.take() else {
            return 0;
        };
        self.coalescer.release(&self.key, self.id);

        let waiters = sender.receiver_count();
        // Err only means nobody is listening
        let _ = sender.send(value);
        if waiters > 0 {
            debug!(key = ?self.key, waiters, "Broadcast result to coalesced waiters");
        }
        waiters
    }
}

impl<K: Hash + Eq + Clone + Debug, V: Clone> Drop for InFlight<K, V> {
    fn drop(&mut self) {
        if self.sender.take().is_some() {
            self.coalescer.release(&self.key, self.id);
            debug!(key = ?self.key, "In-flight computation abandoned - releasing waiters");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_first_request_leads() {
        let coalescer: RequestCoalescer<&str, u32> = RequestCoalescer::new();

        let first = coalescer.register("a");
        assert!(first.is_leader());
        assert_eq!(coalescer.in_flight_count(), 1);

        let second = coalescer.register("a");
        assert!(!second.is_leader());

        // Different key is independent
        assert!(coalescer.register("b").is_leader());

        let stats = coalescer.stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.coalesced_requests, 1);
        assert_eq!(stats.new_requests, 2);
    }

    #[tokio::test]
    async fn test_followers_receive_result() {
        let coalescer: RequestCoalescer<&str, u32> = RequestCoalescer::new();

        let Registration::Leader(leader) = coalescer.register("a") else {
            panic!("expected leader");
        };
        let mut followers: Vec<_> = (0..3)
            .map(|_| match coalescer.register("a") {
                Registration::Follower(rx) => rx,
                Registration::Leader(_) => panic!("expected follower"),
            })
            .collect();

        assert_eq!(leader.complete(42), 3);
        for rx in &mut followers {
            assert_eq!(rx.recv().await.unwrap(), 42);
        }
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_complete_allows_new_leader() {
        let coalescer: RequestCoalescer<&str, u32> = RequestCoalescer::new();

        let Registration::Leader(leader) = coalescer.register("a") else {
            panic!("expected leader");
        };
        leader.complete(1);

        assert!(coalescer.register("a").is_leader());
    }

    #[tokio::test]
    async fn test_dropped_leader_releases_followers() {
        let coalescer: RequestCoalescer<&str, u32> = RequestCoalescer::new();

        let leader = coalescer.register("a");
        let Registration::Follower(mut rx) = coalescer.register("a") else {
            panic!("expected follower");
        };

        drop(leader);

        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
        assert_eq!(coalescer.in_flight_count(), 0);
        assert!(coalescer.register("a").is_leader());
    }

    #[tokio::test]
    async fn test_panicking_leader_releases_followers() {
        let coalescer: RequestCoalescer<&str, u32> = RequestCoalescer::new();

        let Registration::Leader(leader) = coalescer.register("a") else {
            panic!("expected leader");
        };
        let Registration::Follower(mut rx) = coalescer.register("a") else {
            panic!("expected follower");
        };

        let task = tokio::spawn(async move {
            let _leader = leader;
            panic!("computation failed");
        });
        assert!(task.await.is_err());

        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[test]
    fn test_coalescing_ratio() {
        let stats = CoalescerStats {
            total_requests: 10,
            coalesced_requests: 4,
            new_requests: 6,
        };
        assert!((stats.coalescing_ratio() - 0.4).abs() < f64::EPSILON);
        assert_eq!(CoalescerStats::default().coalescing_ratio(), 0.0);
    }
}
