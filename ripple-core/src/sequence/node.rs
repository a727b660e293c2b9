//! Change-log nodes.
//!
//! Nodes and inputs holding a [`ChangeLog`] get incremental operations on
//! top of the plain value ones: element-wise mapping that only maps new
//! edits, and observers that receive one snapshot followed by individual
//! edits.

use std::rc::Rc;

use tracing::trace;

use super::change_log::{ChangeLog, Cursor, Edit};
use crate::graph::{NodeId, NodeKind};
use crate::reactive::value::{Evaluation, NodeCore, Rule};
use crate::reactive::{Input, Node, Runtime, Subscription};

struct MapItemsRule<T, U> {
    source: Node<ChangeLog<T>>,
    transform: Box<dyn Fn(&T) -> U>,
    mapped: Option<ChangeLog<U>>,

    /// The point in the source's history `mapped` already reflects.
    seen: Option<Cursor>,
}

impl<T: Clone + 'static, U: Clone + 'static> Rule<ChangeLog<U>> for MapItemsRule<T, U> {
    fn evaluate(&mut self, owner: NodeId) -> Evaluation<ChangeLog<U>> {
        let Self {
            source,
            transform,
            mapped,
            seen,
        } = self;
        let transform: &dyn Fn(&T) -> U = &**transform;

        source.with_value(|log| {
            let Some(log) = log else {
                return Evaluation::Pending;
            };

            let pending = seen.as_ref().and_then(|cursor| log.changes_after(cursor));
            let extended = match (mapped.as_mut(), pending) {
                (Some(current), Some(pending)) => pending
                    .iter()
                    .all(|edit| current.try_apply(edit.map(transform)).is_ok()),
                _ => false,
            };
            if !extended {
                trace!(node = owner.raw(), "sequence remapped from scratch");
                *mapped = Some(log.map_items(transform));
            }
            *seen = Some(log.cursor());

            match mapped {
                Some(current) => Evaluation::Ready(current.clone()),
                None => Evaluation::Pending,
            }
        })
    }
}

impl<T: Clone + 'static> Node<ChangeLog<T>> {
    /// A node holding this log with every element mapped through `transform`.
    ///
    /// Edits are mapped as they arrive, so `transform` runs once per new
    /// element rather than once per element per pass.
    pub fn map_items<U, F>(&self, transform: F) -> Node<ChangeLog<U>>
    where
        U: Clone + PartialEq + 'static,
        F: Fn(&T) -> U + 'static,
    {
        self.map_items_with_equality(|a: &ChangeLog<U>, b: &ChangeLog<U>| a == b, transform)
    }

    pub fn map_items_with_equality<U, E, F>(&self, equality: E, transform: F) -> Node<ChangeLog<U>>
    where
        U: Clone + 'static,
        E: Fn(&ChangeLog<U>, &ChangeLog<U>) -> bool + 'static,
        F: Fn(&T) -> U + 'static,
    {
        let rule = MapItemsRule {
            source: self.clone(),
            transform: Box::new(transform),
            mapped: None,
            seen: None,
        };
        Node::from_core(NodeCore::computed(
            NodeKind::Derived,
            &[self.id()],
            Rc::new(equality),
            Box::new(rule),
        ))
    }

    /// Observe the log as one snapshot followed by individual edits.
    ///
    /// `on_snapshot` runs once with the current elements before this
    /// returns. After that, each pass that changes the log delivers only the
    /// edits recorded since the previous delivery to `on_edit`. If the log
    /// was rebased or replaced by an unrelated one, the edits cannot be
    /// replayed and `on_snapshot` runs again with the new elements instead.
    /// The same happens when the log is overwritten by a copy that diverged
    /// from it, even though that copy shares its generation.
    ///
    /// # Panics
    ///
    /// Panics if the node holds no value yet.
    pub fn subscribe_changes<S, E>(&self, mut on_snapshot: S, mut on_edit: E) -> Subscription
    where
        S: FnMut(&[T]) + 'static,
        E: FnMut(&Edit<T>) + 'static,
    {
        Runtime::deferring(move || {
            let Some(mut cursor) = self.with_value(|log| {
                log.map(|log| {
                    on_snapshot(log.latest());
                    log.cursor()
                })
            }) else {
                panic!("subscribe_changes requires a node that already holds a value");
            };

            self.subscribe(move |log: &ChangeLog<T>| {
                match log.changes_after(&cursor) {
                    Some(pending) => pending.iter().for_each(&mut on_edit),
                    None => on_snapshot(log.latest()),
                }
                cursor = log.cursor();
            })
        })
    }
}

impl<T: Clone + PartialEq + 'static> Node<ChangeLog<T>> {
    /// A node holding the log's current elements.
    pub fn latest(&self) -> Node<Vec<T>> {
        self.map(|log| log.latest().to_vec())
    }
}

/// Editing helpers. Each records its edit through [`Input::change`], so an
/// edit that leaves the elements as they were does not propagate.
///
/// Each helper clones the whole log to diff it, so long-lived inputs that
/// take many edits should be [`rebase`](Input::rebase)d now and then.
impl<T: Clone + PartialEq + 'static> Input<ChangeLog<T>> {
    pub fn append(&self, value: T) {
        self.change(move |log| log.append(value));
    }

    pub fn insert(&self, value: T, index: usize) {
        self.change(move |log| log.insert(value, index));
    }

    pub fn remove(&self, index: usize) {
        self.change(move |log| log.remove(index));
    }

    pub fn replace(&self, value: T, index: usize) {
        self.change(move |log| log.replace(value, index));
    }

    pub fn move_item(&self, from: usize, to: usize) {
        self.change(move |log| log.move_item(from, to));
    }

    pub fn apply(&self, edit: Edit<T>) {
        self.change(move |log| log.apply(edit));
    }

    pub fn mutate<F>(&self, index: usize, f: F)
    where
        F: FnOnce(&mut T) + 'static,
    {
        self.change(move |log| {
            log.mutate(index, f);
        });
    }

    pub fn remove_where<P>(&self, predicate: P)
    where
        P: FnMut(&T) -> bool + 'static,
    {
        self.change(move |log| {
            log.remove_where(predicate);
        });
    }

    /// Rebase the log. Always propagates so observers resynchronize.
    pub fn rebase(&self) {
        self.write_with(|log| log.rebase());
    }
}
