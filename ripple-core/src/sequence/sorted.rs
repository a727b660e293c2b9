//! Sorted views of change-log nodes.
//!
//! A sorted view holds the source's elements ordered by a comparator, as a
//! [`ChangeLog`] of its own. Each source edit is translated into the view
//! edits that keep it ordered: an insert lands at its sorted position, a
//! replace that changes an element's rank becomes a move followed by the
//! replace. Elements that compare equal keep their source order.

use std::cmp::Ordering;
use std::rc::Rc;

use tracing::trace;

use super::change_log::{ChangeLog, Cursor, Edit};
use crate::graph::{NodeId, NodeKind};
use crate::reactive::value::{Evaluation, NodeCore, Rule};
use crate::reactive::Node;

/// An ordering over elements, shared between the nodes that use it.
///
/// Comparators are closures and cannot be compared, so an input holding one
/// is usually built with identity equality:
///
/// ```rust
/// use std::rc::Rc;
/// use ripple_core::{Comparator, Input};
///
/// let by_length: Comparator<String> = Rc::new(|a: &String, b: &String| a.len().cmp(&b.len()));
/// let order = Input::with_equality(by_length, |a, b| Rc::ptr_eq(a, b));
/// # let _ = order;
/// ```
pub type Comparator<T> = Rc<dyn Fn(&T, &T) -> Ordering>;

type Compare<'a, T> = &'a dyn Fn(&T, &T) -> Ordering;

/// The view plus, for each of its elements, the element's source index.
struct SortedItems<T> {
    view: ChangeLog<T>,
    origins: Vec<usize>,
}

impl<T: Clone> SortedItems<T> {
    fn build(items: &[T], compare: Compare<'_, T>) -> Self {
        let mut origins: Vec<usize> = (0..items.len()).collect();
        // Stable, so equal elements keep their source order.
        origins.sort_by(|&a, &b| compare(&items[a], &items[b]));
        let view = ChangeLog::new(origins.iter().map(|&i| items[i].clone()).collect());
        Self { view, origins }
    }

    /// Where an element with this value and source index belongs, counted
    /// with the view slot `skip` taken out.
    fn position(
        &self,
        value: &T,
        origin: usize,
        skip: Option<usize>,
        compare: Compare<'_, T>,
    ) -> usize {
        let items = self.view.latest();
        let len = items.len() - usize::from(skip.is_some());
        let (mut low, mut high) = (0, len);
        while low < high {
            let mid = low + (high - low) / 2;
            let slot = match skip {
                Some(skipped) if mid >= skipped => mid + 1,
                _ => mid,
            };
            let before = match compare(&items[slot], value) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => self.origins[slot] < origin,
            };
            if before {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        low
    }

    fn slot_of(&self, origin: usize) -> Option<usize> {
        self.origins.iter().position(|&o| o == origin)
    }

    /// Move the element in view slot `slot` to where its source index now
    /// places it.
    fn reposition(&mut self, slot: usize, compare: Compare<'_, T>) -> Option<()> {
        let value = self.view.get(slot)?.clone();
        let target = self.position(&value, self.origins[slot], Some(slot), compare);
        if target != slot {
            self.view.try_apply(Edit::Move { from: slot, to: target }).ok()?;
            let origin = self.origins.remove(slot);
            self.origins.insert(target, origin);
        }
        Some(())
    }

    /// Mirror one source edit into the view. Returns `None` if the edit does
    /// not fit the view's idea of the source, which leaves the view unusable.
    fn apply(&mut self, edit: &Edit<T>, compare: Compare<'_, T>) -> Option<()> {
        match edit {
            Edit::Insert { value, index } => {
                for origin in self.origins.iter_mut().filter(|o| **o >= *index) {
                    *origin += 1;
                }
                let target = self.position(value, *index, None, compare);
                self.view
                    .try_apply(Edit::Insert {
                        value: value.clone(),
                        index: target,
                    })
                    .ok()?;
                self.origins.insert(target, *index);
            }
            Edit::Remove { index } => {
                let slot = self.slot_of(*index)?;
                self.view.try_apply(Edit::Remove { index: slot }).ok()?;
                self.origins.remove(slot);
                for origin in self.origins.iter_mut().filter(|o| **o > *index) {
                    *origin -= 1;
                }
            }
            Edit::Replace { value, index } => {
                let slot = self.slot_of(*index)?;
                let target = self.position(value, *index, Some(slot), compare);
                if target != slot {
                    self.view.try_apply(Edit::Move { from: slot, to: target }).ok()?;
                    self.origins.remove(slot);
                    self.origins.insert(target, *index);
                }
                self.view
                    .try_apply(Edit::Replace {
                        value: value.clone(),
                        index: target,
                    })
                    .ok()?;
            }
            Edit::Move { from, to } => {
                let slot = self.slot_of(*from)?;
                for origin in &mut self.origins {
                    *origin = match *origin {
                        o if o == *from => *to,
                        o if from < to && o > *from && o <= *to => o - 1,
                        o if to < from && o >= *to && o < *from => o + 1,
                        o => o,
                    };
                }
                // Only the tie-break against equal elements can change.
                self.reposition(slot, compare)?;
            }
        }
        Some(())
    }
}

struct SortRule<T> {
    source: Node<ChangeLog<T>>,
    comparator: Node<Comparator<T>>,
    sorted: Option<SortedItems<T>>,

    /// The point in the source's history `sorted` already reflects.
    seen: Option<Cursor>,

    /// Version of the comparator `sorted` was ordered with.
    comparator_version: u64,
}

impl<T: Clone + 'static> Rule<ChangeLog<T>> for SortRule<T> {
    fn evaluate(&mut self, owner: NodeId) -> Evaluation<ChangeLog<T>> {
        let Self {
            source,
            comparator,
            sorted,
            seen,
            comparator_version,
        } = self;

        let Some(compare) = comparator.current_value() else {
            return Evaluation::Pending;
        };
        let compare: Compare<'_, T> = &*compare;
        let version = comparator.version();

        source.with_value(|log| {
            let Some(log) = log else {
                return Evaluation::Pending;
            };

            let pending = seen.as_ref().and_then(|cursor| log.changes_after(cursor));
            let extended = match (sorted.as_mut(), pending) {
                (Some(current), Some(pending)) if *comparator_version == version => pending
                    .iter()
                    .all(|edit| current.apply(edit, compare).is_some()),
                _ => false,
            };
            if !extended {
                trace!(node = owner.raw(), "sorted view rebuilt");
                *sorted = Some(SortedItems::build(log.latest(), compare));
            }
            *seen = Some(log.cursor());
            *comparator_version = version;

            match sorted {
                Some(current) => Evaluation::Ready(current.view.clone()),
                None => Evaluation::Pending,
            }
        })
    }
}

impl<T: Clone + PartialEq + 'static> Node<ChangeLog<T>> {
    /// A node holding this log's elements ordered by `comparator`.
    ///
    /// Source edits become the view edits that keep it ordered, so
    /// [`subscribe_changes`](Node::subscribe_changes) on the view delivers
    /// index-correct inserts, removes, moves and replaces. Elements that
    /// compare equal keep their source order. When the comparator node
    /// changes, or the source is rebased or replaced, the view is rebuilt
    /// and its observers get a fresh snapshot.
    pub fn sorted_by(&self, comparator: &Node<Comparator<T>>) -> Node<ChangeLog<T>> {
        let rule = SortRule {
            source: self.clone(),
            comparator: comparator.clone(),
            sorted: None,
            seen: None,
            comparator_version: comparator.version(),
        };
        Node::from_core(NodeCore::computed(
            NodeKind::Derived,
            &[self.id(), comparator.id()],
            Rc::new(|a: &ChangeLog<T>, b: &ChangeLog<T>| a == b),
            Box::new(rule),
        ))
    }
}

impl<T: Clone + Ord + 'static> Node<ChangeLog<T>> {
    /// A node holding this log's elements in ascending order.
    pub fn sorted(&self) -> Node<ChangeLog<T>> {
        let natural: Comparator<T> = Rc::new(|a: &T, b: &T| a.cmp(b));
        self.sorted_by(&Node::constant(natural))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::reactive::{Input, Subscription};

    fn natural(a: &i32, b: &i32) -> Ordering {
        a.cmp(b)
    }

    /// Subscribe to `node`, mirroring it through snapshots and edits.
    fn mirror<T: Clone + 'static>(
        node: &Node<ChangeLog<T>>,
    ) -> (Rc<RefCell<Vec<T>>>, Rc<RefCell<Vec<Edit<T>>>>, Subscription) {
        let rows = Rc::new(RefCell::new(Vec::new()));
        let edits = Rc::new(RefCell::new(Vec::new()));
        let (snapshot_rows, edit_rows, edit_log) = (rows.clone(), rows.clone(), edits.clone());
        let subscription = node.subscribe_changes(
            move |items| *snapshot_rows.borrow_mut() = items.to_vec(),
            move |edit| {
                edit.clone().apply_to(&mut edit_rows.borrow_mut()).unwrap();
                edit_log.borrow_mut().push(edit.clone());
            },
        );
        (rows, edits, subscription)
    }

    #[test]
    fn build_is_stable() {
        let items = [(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd')];
        let sorted = SortedItems::build(&items, &|a: &(i32, char), b: &(i32, char)| a.0.cmp(&b.0));
        assert_eq!(sorted.view.latest(), &[(1, 'b'), (1, 'd'), (2, 'a'), (2, 'c')]);
        assert_eq!(sorted.origins, vec![1, 3, 0, 2]);
    }

    #[test]
    fn position_skips_a_slot() {
        let sorted = SortedItems::build(&[10, 20, 30, 40], &natural);
        assert_eq!(sorted.position(&25, 9, None, &natural), 2);
        // With 20 taken out, 25 goes right after 10.
        assert_eq!(sorted.position(&25, 9, Some(1), &natural), 1);
        assert_eq!(sorted.position(&45, 9, Some(0), &natural), 3);
    }

    #[test]
    fn applied_edits_match_a_rebuild() {
        let mut source = ChangeLog::new(vec![5, 3, 8, 3]);
        let mut sorted = SortedItems::build(source.latest(), &natural);
        let edits = [
            Edit::Insert { value: 4, index: 1 },
            Edit::Replace { value: 1, index: 3 },
            Edit::Move { from: 0, to: 4 },
            Edit::Insert { value: 3, index: 0 },
            Edit::Remove { index: 2 },
            Edit::Replace { value: 9, index: 0 },
            Edit::Move { from: 3, to: 1 },
        ];

        for edit in edits {
            source.apply(edit.clone());
            sorted.apply(&edit, &natural).unwrap();

            let rebuilt = SortedItems::build(source.latest(), &natural);
            assert_eq!(sorted.view.latest(), rebuilt.view.latest(), "after {edit:?}");
            assert_eq!(sorted.origins, rebuilt.origins, "after {edit:?}");
        }
    }

    #[test]
    fn unknown_source_index_is_rejected() {
        let mut sorted = SortedItems::build(&[1, 2], &natural);
        assert!(sorted.apply(&Edit::Remove { index: 5 }, &natural).is_none());
    }

    #[test]
    fn view_edits_are_index_correct() {
        let list = Input::new(ChangeLog::new(vec![30, 10]));
        let view = list.sorted();
        let (rows, edits, _subscription) = mirror(&view);
        assert_eq!(*rows.borrow(), vec![10, 30]);

        list.append(20);
        list.replace(5, 0);
        list.remove(1);

        assert_eq!(
            *edits.borrow(),
            vec![
                Edit::Insert { value: 20, index: 1 },
                Edit::Move { from: 2, to: 0 },
                Edit::Replace { value: 5, index: 0 },
                Edit::Remove { index: 1 },
            ]
        );
        assert_eq!(*rows.borrow(), vec![5, 20]);
        assert_eq!(view.current_value().unwrap().latest(), &[5, 20]);
    }

    #[test]
    fn comparator_change_resnapshots() {
        let list = Input::new(ChangeLog::new(vec![2, 3, 1]));
        let ascending: Comparator<i32> = Rc::new(natural);
        let order = Input::with_equality(ascending, |a: &Comparator<i32>, b: &Comparator<i32>| {
            Rc::ptr_eq(a, b)
        });
        let view = list.sorted_by(&order);
        let snapshots = Rc::new(RefCell::new(Vec::new()));
        let sink = snapshots.clone();
        let _subscription =
            view.subscribe_changes(move |items| sink.borrow_mut().push(items.to_vec()), |_| {});

        order.write(Rc::new(|a: &i32, b: &i32| b.cmp(a)));
        list.append(0);

        assert_eq!(*snapshots.borrow(), vec![vec![1, 2, 3], vec![3, 2, 1]]);
        assert_eq!(view.current_value().unwrap().latest(), &[3, 2, 1, 0]);
    }

    #[test]
    fn source_rebase_rebuilds_the_view() {
        let list = Input::new(ChangeLog::new(vec![2, 1]));
        let view = list.sorted();
        let before = view.current_value().unwrap().generation();

        list.rebase();
        list.append(0);

        let after = view.current_value().unwrap();
        assert_ne!(after.generation(), before);
        assert_eq!(after.latest(), &[0, 1, 2]);
    }
}
