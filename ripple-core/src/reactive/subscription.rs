//! Subscription handles.
//!
//! Every subscribe operation returns a [`Subscription`]. Holding it keeps the
//! callback attached (and the observed node alive); releasing or dropping it
//! detaches the callback. Owners that bind many callbacks at once, such as a
//! UI element, collect them in a [`SubscriptionSet`] and tear them all down
//! together.

use std::any::Any;
use std::fmt;

/// A cancellable listener registration.
///
/// Release is idempotent, and it is safe to release a subscription from
/// inside the very callback it registered.
#[must_use = "dropping a Subscription immediately detaches its callback"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new<F>(release: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription that is already released.
    pub fn empty() -> Self {
        Self { release: None }
    }

    /// Detach the callback. Calling this more than once is a no-op.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A scope that owns a group of subscriptions.
///
/// Everything added is released together by [`release_all`] or when the set
/// is dropped, in the order it was added. Arbitrary values (node handles,
/// delegates) can be parked here too so they live exactly as long as the
/// owner.
///
/// [`release_all`]: SubscriptionSet::release_all
#[derive(Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
    retained: Vec<Box<dyn Any>>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Keep `value` alive until the set is released.
    pub fn keep_alive<T: 'static>(&mut self, value: T) {
        self.retained.push(Box::new(value));
    }

    /// Release every subscription and drop every retained value.
    pub fn release_all(&mut self) {
        for mut subscription in std::mem::take(&mut self.subscriptions) {
            subscription.release();
        }
        self.retained.clear();
    }

    /// Number of subscriptions currently held.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty() && self.retained.is_empty()
    }
}

impl Extend<Subscription> for SubscriptionSet {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        self.subscriptions.extend(iter);
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for SubscriptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSet")
            .field("subscriptions", &self.subscriptions.len())
            .field("retained", &self.retained.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn counting(counter: &Rc<Cell<u32>>) -> Subscription {
        let counter = counter.clone();
        Subscription::new(move || counter.set(counter.get() + 1))
    }

    #[test]
    fn release_runs_once() {
        let released = Rc::new(Cell::new(0));
        let mut subscription = counting(&released);

        assert!(subscription.is_active());
        subscription.release();
        subscription.release();
        drop(subscription);

        assert_eq!(released.get(), 1);
    }

    #[test]
    fn drop_releases() {
        let released = Rc::new(Cell::new(0));
        {
            let _subscription = counting(&released);
        }
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn empty_subscription_is_inactive() {
        let subscription = Subscription::empty();
        assert!(!subscription.is_active());
    }

    #[test]
    fn set_releases_everything_in_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut set = SubscriptionSet::new();
        for tag in 0..3 {
            let order = order.clone();
            set.add(Subscription::new(move || order.borrow_mut().push(tag)));
        }
        assert_eq!(set.len(), 3);

        set.release_all();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert!(set.is_empty());

        // Nothing left to release on drop
        drop(set);
        assert_eq!(order.borrow().len(), 3);
    }

    #[test]
    fn set_drops_retained_values() {
        let marker = Rc::new(());
        let mut set = SubscriptionSet::new();
        set.keep_alive(marker.clone());
        assert_eq!(Rc::strong_count(&marker), 2);

        drop(set);
        assert_eq!(Rc::strong_count(&marker), 1);
    }
}
