//! Input Nodes
//!
//! An input is the only kind of node application code changes directly.
//! Every change to an input starts a propagation pass over the nodes that
//! read from it.
//!
//! # Writing
//!
//! - [`Input::write`] replaces the value and always propagates, even when the
//!   new value equals the old one. The input's own subscribers fire; derived
//!   nodes downstream stop propagation when their recomputed value is equal.
//!
//! - [`Input::change`] edits a copy of the value in place and propagates only
//!   if the result differs from the old value under the input's equality
//!   predicate.
//!
//! A write issued while a pass is running (from a transform, a selector or a
//! subscriber callback) is queued and runs as its own pass once the current
//! one has finished notifying.

use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use super::runtime::Runtime;
use super::value::{Equality, Node, NodeCore};

/// A node whose value is set from outside the graph.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Input;
///
/// let name = Input::new(String::from("ada"));
/// name.change(|n| n.make_ascii_uppercase());
/// assert_eq!(name.current_value().as_deref(), Some("ADA"));
/// ```
pub struct Input<V> {
    node: Node<V>,
}

impl<V: Clone + PartialEq + 'static> Input<V> {
    /// Create an input holding `value`, compared with `PartialEq`.
    pub fn new(value: V) -> Self {
        Self::from_parts(Some(value), Rc::new(|a: &V, b: &V| a == b))
    }

    /// Create an input with no value yet.
    pub fn empty() -> Self {
        Self::from_parts(None, Rc::new(|a: &V, b: &V| a == b))
    }
}

impl<V: Clone + 'static> Input<V> {
    /// Create an input holding `value`, compared with `equality`.
    pub fn with_equality<E>(value: V, equality: E) -> Self
    where
        E: Fn(&V, &V) -> bool + 'static,
    {
        Self::from_parts(Some(value), Rc::new(equality))
    }

    pub fn empty_with_equality<E>(equality: E) -> Self
    where
        E: Fn(&V, &V) -> bool + 'static,
    {
        Self::from_parts(None, Rc::new(equality))
    }

    fn from_parts(value: Option<V>, equality: Equality<V>) -> Self {
        Self {
            node: Node::from_core(NodeCore::root(value, equality)),
        }
    }

    /// Replace the value and propagate unconditionally.
    pub fn write(&self, value: V) {
        let core = Rc::clone(&self.node.core);
        Runtime::submit(Box::new(move || {
            core.overwrite(value);
            Some(core.id())
        }));
    }

    /// Edit the value in place; propagate only if it actually changed.
    ///
    /// Does nothing (beyond a warning) if the input has no value yet.
    pub fn change<F>(&self, mutate: F)
    where
        F: FnOnce(&mut V) + 'static,
    {
        let core = Rc::clone(&self.node.core);
        Runtime::submit(Box::new(move || {
            core.mutate(mutate).then(|| core.id())
        }));
    }

    /// Edit the value in place and propagate unconditionally.
    pub fn write_with<F>(&self, mutate: F)
    where
        F: FnOnce(&mut V) + 'static,
    {
        let core = Rc::clone(&self.node.core);
        Runtime::submit(Box::new(move || {
            core.mutate_unconditionally(mutate).then(|| core.id())
        }));
    }

    /// A read-only handle to this input.
    pub fn node(&self) -> Node<V> {
        self.node.clone()
    }
}

impl<V> Deref for Input<V> {
    type Target = Node<V>;

    fn deref(&self) -> &Node<V> {
        &self.node
    }
}

impl<V> Clone for Input<V> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Input<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Input").field(&self.node).finish()
    }
}

/// A value that arrives exactly once.
///
/// Starts empty; [`resolve`](OneShot::resolve) sets the value and notifies
/// everything downstream. Resolving a second time is a programming error.
pub struct OneShot<V> {
    input: Input<V>,
    resolved: Cell<bool>,
}

impl<V: Clone + 'static> OneShot<V> {
    pub fn new() -> Self {
        Self {
            input: Input::empty_with_equality(|_: &V, _: &V| false),
            resolved: Cell::new(false),
        }
    }

    /// Set the value.
    ///
    /// # Panics
    ///
    /// Panics if the value was already resolved.
    pub fn resolve(&self, value: V) {
        assert!(!self.resolved.replace(true), "one-shot value resolved twice");
        self.input.write(value);
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get()
    }

    pub fn node(&self) -> Node<V> {
        self.input.node()
    }
}

impl<V: Clone + 'static> Default for OneShot<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for OneShot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShot")
            .field("resolved", &self.resolved.get())
            .field("node", &self.input.node)
            .finish()
    }
}
