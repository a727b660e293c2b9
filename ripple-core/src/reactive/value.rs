//! Value Nodes
//!
//! Every node in the graph, whatever its kind, is a [`NodeCore`]: a cached
//! value, the equality predicate that decides whether a new value counts as a
//! change, its subscribers, and (for computed nodes) the rule that produces
//! the value from its sources.
//!
//! # How Nodes Work
//!
//! 1. A node registers with the runtime on creation and declares its sources
//!    as graph edges.
//!
//! 2. Computed nodes evaluate eagerly once, when they are built.
//!
//! 3. During a pass, the runtime asks a dirty node to recompute. The node
//!    evaluates its rule and compares the result with its cached value using
//!    its equality predicate.
//!
//! 4. If the values compare equal the node reports "unchanged": the old value
//!    is kept and propagation stops there.
//!
//! [`Node`] is the cheap, cloneable read handle applications hold. Cloning it
//! shares the same underlying node.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use super::runtime::{Reactive, ReactiveHandle, Recompute, Runtime};
use super::subscriber::{Callback, Subscribers};
use super::subscription::Subscription;
use crate::graph::{NodeId, NodeKind};

/// Equality predicate deciding whether a freshly computed value is a change.
pub type Equality<V> = Rc<dyn Fn(&V, &V) -> bool>;

/// Result of evaluating a computed node's rule.
pub(crate) enum Evaluation<V> {
    Ready(V),

    /// A source has no value yet.
    Pending,

    /// The rule bound a source that has not settled in the running pass.
    Defer,
}

/// How a computed node derives its value from its sources.
pub(crate) trait Rule<V> {
    fn evaluate(&mut self, owner: NodeId) -> Evaluation<V>;
}

pub(crate) struct NodeCore<V> {
    id: NodeId,

    /// The cached value (None until first write or successful evaluation).
    value: RefCell<Option<V>>,

    /// Bumped every time the cached value changes.
    version: Cell<u64>,

    equality: Equality<V>,
    subscribers: Subscribers<V>,

    /// Absent for inputs and constants.
    rule: RefCell<Option<Box<dyn Rule<V>>>>,

    _handle: ReactiveHandle,
}

impl<V: Clone + 'static> NodeCore<V> {
    fn create(
        kind: NodeKind,
        value: Option<V>,
        equality: Equality<V>,
        rule: Option<Box<dyn Rule<V>>>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let id = NodeId::new();
            Self {
                id,
                value: RefCell::new(value),
                version: Cell::new(0),
                equality,
                subscribers: Subscribers::new(),
                rule: RefCell::new(rule),
                _handle: Runtime::register(id, kind, weak.clone()),
            }
        })
    }

    /// A node that is only ever changed from outside.
    pub(crate) fn root(value: Option<V>, equality: Equality<V>) -> Rc<Self> {
        Self::create(NodeKind::Input, value, equality, None)
    }

    /// A node computed by `rule` from `sources`.
    pub(crate) fn computed(
        kind: NodeKind,
        sources: &[NodeId],
        equality: Equality<V>,
        rule: Box<dyn Rule<V>>,
    ) -> Rc<Self> {
        let core = Self::create(kind, None, equality, Some(rule));
        for &source in sources {
            Runtime::add_edge(source, core.id);
        }

        Runtime::deferring(|| {
            if let Evaluation::Ready(value) = core.evaluate() {
                core.store(value);
            }
        });
        core
    }

    fn evaluate(&self) -> Evaluation<V> {
        match self.rule.borrow_mut().as_mut() {
            Some(rule) => rule.evaluate(self.id),
            None => Evaluation::Pending,
        }
    }

    /// Store `value` unless it equals the cached one. Returns whether the
    /// cached value changed.
    pub(crate) fn store(&self, value: V) -> bool {
        let changed = match self.value.borrow().as_ref() {
            Some(current) => !(self.equality)(current, &value),
            None => true,
        };
        if changed {
            self.overwrite(value);
        }
        changed
    }

    /// Replace the cached value without consulting the equality predicate.
    pub(crate) fn overwrite(&self, value: V) {
        let previous = self.value.replace(Some(value));
        self.version.set(self.version.get() + 1);
        drop(previous);
    }

    /// Apply `mutate` to a copy of the value and store it if it differs.
    pub(crate) fn mutate(&self, mutate: impl FnOnce(&mut V)) -> bool {
        let Some(mut next) = self.current() else {
            warn!(node = self.id.raw(), "change on a node without a value ignored");
            return false;
        };
        mutate(&mut next);
        self.store(next)
    }

    /// Apply `mutate` to a copy of the value and store it unconditionally.
    pub(crate) fn mutate_unconditionally(&self, mutate: impl FnOnce(&mut V)) -> bool {
        let Some(mut next) = self.current() else {
            warn!(node = self.id.raw(), "write_with on a node without a value ignored");
            return false;
        };
        mutate(&mut next);
        self.overwrite(next);
        true
    }

    pub(crate) fn current(&self) -> Option<V> {
        self.value.borrow().clone()
    }
}

impl<V> NodeCore<V> {
    pub(crate) fn id(&self) -> NodeId {
        self.id
    }
}

impl<V: Clone + 'static> Reactive for NodeCore<V> {
    fn recompute(&self) -> Recompute {
        match self.evaluate() {
            Evaluation::Ready(value) => {
                if self.store(value) {
                    Recompute::Changed
                } else {
                    Recompute::Unchanged
                }
            }
            Evaluation::Pending => Recompute::Unchanged,
            Evaluation::Defer => Recompute::Deferred,
        }
    }

    /// Values are only written while nodes settle, never while observers
    /// run, so callbacks receive a borrow of the cached value.
    fn notify(&self) {
        let value = self.value.borrow();
        if let Some(value) = value.as_ref() {
            self.subscribers.notify(value, self.version.get());
        }
    }
}

/// A read-only handle to a node in the graph.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Input;
///
/// let count = Input::new(0);
/// let doubled = count.map(|x| x * 2);
///
/// let _subscription = doubled.subscribe(|value| println!("doubled: {value}"));
/// count.write(3); // prints "doubled: 6"
/// ```
pub struct Node<V> {
    pub(crate) core: Rc<NodeCore<V>>,
}

impl<V> Node<V> {
    /// The node's graph identity.
    pub fn id(&self) -> NodeId {
        self.core.id
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    pub fn subscriber_count(&self) -> usize {
        self.core.subscribers.len()
    }
}

impl<V: Clone + 'static> Node<V> {
    pub(crate) fn from_core(core: Rc<NodeCore<V>>) -> Self {
        Self { core }
    }

    /// A node that holds `value` forever.
    pub fn constant(value: V) -> Self {
        Self::from_core(NodeCore::root(Some(value), Rc::new(|_: &V, _: &V| true)))
    }

    /// Clone of the current value, or `None` if the node has never held one.
    pub fn current_value(&self) -> Option<V> {
        self.core.current()
    }

    /// Borrow the current value without cloning it.
    ///
    /// `f` must not write to inputs that would recompute this node; writes
    /// issued from inside a pass are queued, so this only matters outside one.
    pub fn with_value<R>(&self, f: impl FnOnce(Option<&V>) -> R) -> R {
        f(self.core.value.borrow().as_ref())
    }

    pub fn has_value(&self) -> bool {
        self.core.value.borrow().is_some()
    }

    pub(crate) fn version(&self) -> u64 {
        self.core.version.get()
    }

    /// Register `callback` to run after every pass in which this node's
    /// value changed.
    ///
    /// If the node already holds a value, `callback` is invoked with it
    /// before this returns. The returned [`Subscription`] keeps the node
    /// alive; release or drop it to detach.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&V) + 'static,
    {
        let callback: Callback<V> = Rc::new(RefCell::new(callback));
        let subscriber = self
            .core
            .subscribers
            .insert(Rc::clone(&callback), self.version());

        if let Some(value) = self.current_value() {
            Runtime::deferring(|| {
                let mut callback = callback.borrow_mut();
                (&mut *callback)(&value);
            });
        }

        let core = Rc::clone(&self.core);
        Subscription::new(move || {
            if core.subscribers.remove(subscriber) {
                trace!(node = core.id().raw(), ?subscriber, "subscriber released");
            }
        })
    }
}

impl<V> Clone for Node<V> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.core.id)
            .field("value", &*self.core.value.borrow())
            .field("subscriber_count", &self.core.subscribers.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
