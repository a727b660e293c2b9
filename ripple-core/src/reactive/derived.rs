//! Derived Nodes
//!
//! A derived node computes its value with a pure transform over one or two
//! fixed sources. It is evaluated eagerly when built, then recomputed once
//! per pass in which any of its sources changed.
//!
//! # Why Eager
//!
//! Derived values are observed through subscriptions, so a node that nobody
//! reads is usually not built at all. Computing on construction means every
//! node holds a value as soon as its sources do, and a subscriber always gets
//! a consistent first value.

use std::rc::Rc;

use super::value::{Evaluation, Node, NodeCore, Rule};
use crate::graph::{NodeId, NodeKind};

struct MapRule<S, V> {
    source: Node<S>,
    transform: Box<dyn Fn(&S) -> V>,
}

impl<S: Clone + 'static, V> Rule<V> for MapRule<S, V> {
    fn evaluate(&mut self, _owner: NodeId) -> Evaluation<V> {
        let transform = &self.transform;
        self.source.with_value(|value| match value {
            Some(value) => Evaluation::Ready(transform(value)),
            None => Evaluation::Pending,
        })
    }
}

struct CombineRule<A, B, V> {
    left: Node<A>,
    right: Node<B>,
    transform: Box<dyn Fn(&A, &B) -> V>,
}

impl<A, B, V> Rule<V> for CombineRule<A, B, V>
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    fn evaluate(&mut self, _owner: NodeId) -> Evaluation<V> {
        let transform = &self.transform;
        self.left.with_value(|left| {
            self.right.with_value(|right| match (left, right) {
                (Some(left), Some(right)) => Evaluation::Ready(transform(left, right)),
                _ => Evaluation::Pending,
            })
        })
    }
}

impl<V: Clone + 'static> Node<V> {
    /// A node holding `transform` applied to this node's value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ripple_core::reactive::Input;
    ///
    /// let celsius = Input::new(100.0);
    /// let fahrenheit = celsius.map(|c| c * 9.0 / 5.0 + 32.0);
    /// assert_eq!(fahrenheit.current_value(), Some(212.0));
    /// ```
    pub fn map<U, F>(&self, transform: F) -> Node<U>
    where
        U: Clone + PartialEq + 'static,
        F: Fn(&V) -> U + 'static,
    {
        self.map_with_equality(|a: &U, b: &U| a == b, transform)
    }

    /// Like [`map`](Node::map), deciding changes with `equality`.
    pub fn map_with_equality<U, E, F>(&self, equality: E, transform: F) -> Node<U>
    where
        U: Clone + 'static,
        E: Fn(&U, &U) -> bool + 'static,
        F: Fn(&V) -> U + 'static,
    {
        let rule = MapRule {
            source: self.clone(),
            transform: Box::new(transform),
        };
        Node::from_core(NodeCore::computed(
            NodeKind::Derived,
            &[self.id()],
            Rc::new(equality),
            Box::new(rule),
        ))
    }

    /// A node holding `transform` applied to this node's value and `other`'s.
    ///
    /// When both sources change in the same pass the transform still runs
    /// once.
    pub fn combine<W, U, F>(&self, other: &Node<W>, transform: F) -> Node<U>
    where
        W: Clone + 'static,
        U: Clone + PartialEq + 'static,
        F: Fn(&V, &W) -> U + 'static,
    {
        self.combine_with_equality(other, |a: &U, b: &U| a == b, transform)
    }

    pub fn combine_with_equality<W, U, E, F>(
        &self,
        other: &Node<W>,
        equality: E,
        transform: F,
    ) -> Node<U>
    where
        W: Clone + 'static,
        U: Clone + 'static,
        E: Fn(&U, &U) -> bool + 'static,
        F: Fn(&V, &W) -> U + 'static,
    {
        let rule = CombineRule {
            left: self.clone(),
            right: other.clone(),
            transform: Box::new(transform),
        };
        Node::from_core(NodeCore::computed(
            NodeKind::Derived,
            &[self.id(), other.id()],
            Rc::new(equality),
            Box::new(rule),
        ))
    }
}
