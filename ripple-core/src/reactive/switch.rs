//! Dynamic Nodes
//!
//! A dynamic node mirrors the value of an inner node chosen by a selector
//! over an outer source. When the outer source changes the selector runs
//! again and the node may rebind to a different inner node: the edge from
//! the old inner node is removed and one from the new inner node is added,
//! so the old node's later changes are ignored.
//!
//! If the newly bound inner node is itself still waiting in the running
//! pass, the dynamic node defers and is recomputed once the inner node has
//! settled.

use std::rc::Rc;

use tracing::{debug, trace};

use super::runtime::Runtime;
use super::value::{Evaluation, Node, NodeCore, Rule};
use crate::graph::{NodeId, NodeKind};

struct SwitchRule<S, V> {
    source: Node<S>,
    selector: Box<dyn Fn(&S) -> Node<V>>,

    /// Source version the current inner node was selected for.
    selected_at: Option<u64>,

    inner: Option<Node<V>>,
}

impl<S: Clone + 'static, V: Clone + 'static> SwitchRule<S, V> {
    fn bind(&mut self, owner: NodeId, next: Node<V>) {
        if let Some(current) = &self.inner {
            if current.ptr_eq(&next) {
                trace!(node = owner.raw(), "selector kept the bound node");
                return;
            }
            Runtime::remove_edge(current.id(), owner);
        }

        Runtime::add_edge(next.id(), owner);
        debug!(node = owner.raw(), inner = next.id().raw(), "dynamic node rebound");

        let previous = self.inner.replace(next);
        drop(previous);
    }
}

impl<S: Clone + 'static, V: Clone + 'static> Rule<V> for SwitchRule<S, V> {
    fn evaluate(&mut self, owner: NodeId) -> Evaluation<V> {
        let version = self.source.version();
        if self.selected_at != Some(version) {
            let selector = &self.selector;
            let Some(next) = self.source.with_value(|value| value.map(selector)) else {
                return Evaluation::Pending;
            };
            self.selected_at = Some(version);
            self.bind(owner, next);
        }

        let Some(inner) = &self.inner else {
            return Evaluation::Pending;
        };
        if Runtime::is_pending(inner.id()) {
            return Evaluation::Defer;
        }
        match inner.current_value() {
            Some(value) => Evaluation::Ready(value),
            None => Evaluation::Pending,
        }
    }
}

impl<V: Clone + 'static> Node<V> {
    /// A node mirroring whichever node `selector` picks for this node's
    /// current value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ripple_core::reactive::{Input, Node};
    ///
    /// let use_metric = Input::new(true);
    /// let metres = Input::new(1.0);
    /// let feet = metres.map(|m| m * 3.28084);
    ///
    /// let metres_node = metres.node();
    /// let shown = use_metric.flat_map(move |metric| {
    ///     if *metric { metres_node.clone() } else { feet.clone() }
    /// });
    /// assert_eq!(shown.current_value(), Some(1.0));
    ///
    /// use_metric.write(false);
    /// assert_eq!(shown.current_value(), Some(3.28084));
    /// ```
    pub fn flat_map<U, F>(&self, selector: F) -> Node<U>
    where
        U: Clone + PartialEq + 'static,
        F: Fn(&V) -> Node<U> + 'static,
    {
        self.flat_map_with_equality(|a: &U, b: &U| a == b, selector)
    }

    pub fn flat_map_with_equality<U, E, F>(&self, equality: E, selector: F) -> Node<U>
    where
        U: Clone + 'static,
        E: Fn(&U, &U) -> bool + 'static,
        F: Fn(&V) -> Node<U> + 'static,
    {
        let rule = SwitchRule {
            source: self.clone(),
            selector: Box::new(selector),
            selected_at: None,
            inner: None,
        };
        Node::from_core(NodeCore::computed(
            NodeKind::Dynamic,
            &[self.id()],
            Rc::new(equality),
            Box::new(rule),
        ))
    }
}

impl Node<bool> {
    /// A node mirroring `then` while this node is true and `otherwise` while
    /// it is false.
    pub fn choose<U>(&self, then: &Node<U>, otherwise: &Node<U>) -> Node<U>
    where
        U: Clone + PartialEq + 'static,
    {
        let (then, otherwise) = (then.clone(), otherwise.clone());
        self.flat_map(move |flag| {
            if *flag {
                then.clone()
            } else {
                otherwise.clone()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::reactive::{Input, Node, Runtime};

    #[test]
    fn follows_selected_inner_node() {
        let which = Input::new(0usize);
        let a = Input::new("a1");
        let b = Input::new("b1");
        let nodes = [a.node(), b.node()];
        let current = which.flat_map(move |i| nodes[*i].clone());
        assert_eq!(current.current_value(), Some("a1"));

        a.write("a2");
        assert_eq!(current.current_value(), Some("a2"));

        which.write(1);
        assert_eq!(current.current_value(), Some("b1"));
    }

    #[test]
    fn ignores_old_inner_after_switch() {
        let flag = Input::new(true);
        let a = Input::new(1);
        let b = Input::new(2);
        let node = flag.choose(&a, &b);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = node.subscribe(move |v| sink.borrow_mut().push(*v));

        flag.write(false);
        let passes = Runtime::pass_count();
        a.write(100);
        assert_eq!(Runtime::pass_count(), passes + 1);
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(node.current_value(), Some(2));
    }

    #[test]
    fn rebinds_to_node_built_in_selector() {
        let base = Input::new(10);
        let offset = Input::new(1);
        let offset_node = offset.node();
        let built = Rc::new(Cell::new(0));
        let built_clone = built.clone();
        let shifted = base.flat_map(move |b| {
            built_clone.set(built_clone.get() + 1);
            let b = *b;
            offset_node.map(move |o| b + o)
        });
        assert_eq!(shifted.current_value(), Some(11));

        base.write(20);
        assert_eq!(shifted.current_value(), Some(21));
        offset.write(5);
        assert_eq!(shifted.current_value(), Some(25));
        assert_eq!(built.get(), 2);
    }

    #[test]
    fn defers_until_pending_inner_settles() {
        // The inner node sits two steps downstream of the same input as the
        // selector source, so it is still waiting when the selector rebinds.
        let input = Input::new(1);
        let small = Node::constant(-1);
        let is_big = input.map(|x| *x > 2);
        let doubled = input.map(|x| x * 2).map(|x| *x);
        let doubled_clone = doubled.clone();
        let picked = is_big.flat_map(move |big| {
            if *big {
                doubled_clone.clone()
            } else {
                small.clone()
            }
        });
        assert_eq!(picked.current_value(), Some(-1));

        let passes = Runtime::pass_count();
        input.write(3);
        assert_eq!(Runtime::pass_count(), passes + 1);
        assert_eq!(picked.current_value(), Some(6));
        assert_eq!(doubled.current_value(), Some(6));
    }

    #[test]
    fn selector_returning_same_node_keeps_binding() {
        let source = Input::new(1);
        let target = Input::new("x");
        let target_node = target.node();
        let node = source.flat_map(move |_| target_node.clone());

        source.write(2);
        target.write("y");
        assert_eq!(node.current_value(), Some("y"));
    }
}
