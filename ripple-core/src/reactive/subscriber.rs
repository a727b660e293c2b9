//! Subscriber lists.
//!
//! A subscriber is a raw observer callback attached to one node. Each node
//! keeps its subscribers in registration order and invokes them after every
//! pass in which its value changed.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::warn;

/// Unique identifier for a subscriber.
///
/// Each registration gets a fresh ID, so subscribing the same closure twice
/// yields two independent registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) type Callback<V> = Rc<RefCell<dyn FnMut(&V)>>;

struct Entry<V> {
    callback: Callback<V>,

    /// Version of the node's value the subscriber has already seen.
    since: u64,
}

/// The subscribers of one node.
pub(crate) struct Subscribers<V> {
    entries: RefCell<IndexMap<SubscriberId, Entry<V>>>,
}

impl<V> Subscribers<V> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(IndexMap::new()),
        }
    }

    /// Register `callback` as having already seen version `since`.
    pub(crate) fn insert(&self, callback: Callback<V>, since: u64) -> SubscriberId {
        let id = SubscriberId::new();
        self.entries.borrow_mut().insert(id, Entry { callback, since });
        id
    }

    /// Detach a subscriber. Returns false if it was already gone.
    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        // The callback is dropped after the borrow ends: its captures may
        // release other subscriptions on this same node.
        let removed = self.entries.borrow_mut().shift_remove(&id);
        removed.is_some()
    }

    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.entries.borrow().contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Invoke every subscriber with `value`, which is at `version`.
    ///
    /// Iterates over a snapshot, so callbacks may subscribe or release
    /// (themselves included) while the notification is running. A subscriber
    /// released by an earlier callback is skipped, and so is one that was
    /// registered after the value reached `version` (its subscribe-time
    /// replay already delivered it).
    pub(crate) fn notify(&self, value: &V, version: u64) {
        let snapshot: SmallVec<[(SubscriberId, Callback<V>); 4]> = self
            .entries
            .borrow()
            .iter()
            .filter(|(_, entry)| entry.since < version)
            .map(|(id, entry)| (*id, Rc::clone(&entry.callback)))
            .collect();

        for (id, callback) in snapshot {
            if !self.contains(id) {
                continue;
            }
            match callback.try_borrow_mut() {
                Ok(mut callback) => (&mut *callback)(value),
                Err(_) => warn!(?id, "subscriber is already running; notification skipped"),
            }
        }
    }
}
