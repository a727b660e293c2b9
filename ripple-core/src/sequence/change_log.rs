//! Change-log sequences.
//!
//! A [`ChangeLog`] is a list that remembers how it got to its current state:
//! an `initial` snapshot plus the ordered [`Edit`]s applied since. `latest` is
//! always the replay of `changes` onto `initial`, so a consumer that has seen
//! the first `k` edits can catch up by replaying `changes[k..]` instead of
//! diffing whole lists.

use std::fmt;
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::EditError;

/// Generations and edit stamps share one counter, so no two histories ever
/// carry the same mark.
fn next_stamp() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// How far a consumer has read into a log's history.
///
/// A cursor names the log's generation, a position, and the stamp of the
/// last edit before that position. It only resumes on a log that still
/// carries that exact edit there, so a diverged copy of the same log is
/// never mistaken for a continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    generation: u64,
    position: usize,
    last: Option<u64>,
}

impl Cursor {
    /// Number of edits already consumed.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// One recorded change to a sequence.
///
/// Indices refer to the sequence as it was just before the edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edit<T> {
    Insert { value: T, index: usize },
    Remove { index: usize },
    Replace { value: T, index: usize },

    /// Remove the element at `from`, then insert it at `to`.
    Move { from: usize, to: usize },
}

impl<T> Edit<T> {
    /// The element carried by an insert or replace.
    pub fn value(&self) -> Option<&T> {
        match self {
            Edit::Insert { value, .. } | Edit::Replace { value, .. } => Some(value),
            Edit::Remove { .. } | Edit::Move { .. } => None,
        }
    }

    /// The same edit with its element mapped through `f`.
    pub fn map<U>(&self, f: impl FnOnce(&T) -> U) -> Edit<U> {
        match self {
            Edit::Insert { value, index } => Edit::Insert {
                value: f(value),
                index: *index,
            },
            Edit::Remove { index } => Edit::Remove { index: *index },
            Edit::Replace { value, index } => Edit::Replace {
                value: f(value),
                index: *index,
            },
            Edit::Move { from, to } => Edit::Move {
                from: *from,
                to: *to,
            },
        }
    }

    /// Check that the edit is valid for a sequence of length `len`.
    pub fn check(&self, len: usize) -> Result<(), EditError> {
        let out_of_bounds = |index| EditError::IndexOutOfBounds { index, len };
        match *self {
            Edit::Insert { index, .. } if index > len => Err(out_of_bounds(index)),
            Edit::Remove { index } | Edit::Replace { index, .. } if index >= len => {
                Err(out_of_bounds(index))
            }
            Edit::Move { from, .. } if from >= len => Err(out_of_bounds(from)),
            Edit::Move { to, .. } if to >= len => Err(out_of_bounds(to)),
            _ => Ok(()),
        }
    }

    /// Apply the edit to `items`, leaving them untouched on error.
    pub fn apply_to(self, items: &mut Vec<T>) -> Result<(), EditError> {
        self.check(items.len())?;
        self.apply_unchecked(items);
        Ok(())
    }

    fn apply_unchecked(self, items: &mut Vec<T>) {
        match self {
            Edit::Insert { value, index } => items.insert(index, value),
            Edit::Remove { index } => {
                items.remove(index);
            }
            Edit::Replace { value, index } => items[index] = value,
            Edit::Move { from, to } => {
                let item = items.remove(from);
                items.insert(to, item);
            }
        }
    }
}

/// A sequence plus the history of edits that produced it.
///
/// Two logs compare equal when their `latest` elements are equal, whatever
/// history led there.
///
/// The history grows with every edit and is copied along with the log, so
/// a log held by an input costs a full copy per recorded edit once it has
/// observers or mapped dependents. Call [`rebase`](ChangeLog::rebase) (or
/// `Input::rebase`) at natural checkpoints to keep it short; observers
/// resynchronize from a snapshot.
///
/// # Example
///
/// ```rust
/// use ripple_core::sequence::{ChangeLog, Edit};
///
/// let mut log = ChangeLog::new(vec![1, 2, 3]);
/// log.append(4);
/// log.replace(11, 0);
///
/// assert_eq!(log.latest(), &[11, 2, 3, 4]);
/// assert_eq!(log.changes()[0], Edit::Insert { value: 4, index: 3 });
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(
    try_from = "ChangeLogRepr<T>",
    into = "ChangeLogRepr<T>",
    bound(
        serialize = "T: Clone + Serialize",
        deserialize = "T: Clone + Deserialize<'de>"
    )
)]
pub struct ChangeLog<T> {
    initial: Vec<T>,
    changes: Vec<Edit<T>>,
    latest: Vec<T>,

    /// One unique stamp per entry of `changes`.
    stamps: Vec<u64>,

    /// Identifies the reference point `changes` are relative to. Fresh for
    /// every newly built log and every rebase; kept by clones.
    generation: u64,
}

impl<T> ChangeLog<T> {
    pub fn initial(&self) -> &[T] {
        &self.initial
    }

    pub fn changes(&self) -> &[Edit<T>] {
        &self.changes
    }

    pub fn latest(&self) -> &[T] {
        &self.latest
    }

    /// Edits recorded after the first `cursor` ones.
    pub fn changes_since(&self, cursor: usize) -> &[Edit<T>] {
        self.changes.get(cursor..).unwrap_or(&[])
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A cursor positioned after every edit recorded so far.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            generation: self.generation,
            position: self.changes.len(),
            last: self.stamps.last().copied(),
        }
    }

    /// Edits recorded after `cursor`, or `None` if this log's history does
    /// not continue the one the cursor was taken from (it was rebased,
    /// replaced, or diverged from a shared ancestor).
    pub fn changes_after(&self, cursor: &Cursor) -> Option<&[Edit<T>]> {
        if cursor.generation != self.generation || cursor.position > self.changes.len() {
            return None;
        }
        let last = match cursor.position {
            0 => None,
            position => Some(self.stamps[position - 1]),
        };
        if last != cursor.last {
            return None;
        }
        Some(&self.changes[cursor.position..])
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.latest.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.latest.iter()
    }

    /// Index of the first element matching `predicate`.
    pub fn position(&self, predicate: impl FnMut(&T) -> bool) -> Option<usize> {
        self.latest.iter().position(predicate)
    }
}

impl<T: Clone> ChangeLog<T> {
    /// A log whose initial and latest snapshots are `items`.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            initial: items.clone(),
            changes: Vec::new(),
            latest: items,
            stamps: Vec::new(),
            generation: next_stamp(),
        }
    }

    /// Rebuild a log from its initial snapshot and history.
    pub fn from_parts(initial: Vec<T>, changes: Vec<Edit<T>>) -> Result<Self, EditError> {
        let mut latest = initial.clone();
        for edit in &changes {
            edit.clone().apply_to(&mut latest)?;
        }
        let stamps = changes.iter().map(|_| next_stamp()).collect();
        Ok(Self {
            initial,
            changes,
            latest,
            stamps,
            generation: next_stamp(),
        })
    }

    /// Record `edit`, or return an error and leave the log untouched.
    pub fn try_apply(&mut self, edit: Edit<T>) -> Result<(), EditError> {
        edit.check(self.latest.len())?;
        edit.clone().apply_unchecked(&mut self.latest);
        self.changes.push(edit);
        self.stamps.push(next_stamp());
        Ok(())
    }

    /// Record `edit`.
    ///
    /// # Panics
    ///
    /// Panics if the edit's indices are out of bounds.
    pub fn apply(&mut self, edit: Edit<T>) {
        if let Err(err) = self.try_apply(edit) {
            panic!("{err}");
        }
    }

    pub fn append(&mut self, value: T) {
        let index = self.latest.len();
        self.apply(Edit::Insert { value, index });
    }

    pub fn insert(&mut self, value: T, index: usize) {
        self.apply(Edit::Insert { value, index });
    }

    pub fn remove(&mut self, index: usize) {
        self.apply(Edit::Remove { index });
    }

    pub fn replace(&mut self, value: T, index: usize) {
        self.apply(Edit::Replace { value, index });
    }

    pub fn move_item(&mut self, from: usize, to: usize) {
        self.apply(Edit::Move { from, to });
    }

    /// Remove every element matching `predicate`. Returns how many went.
    ///
    /// Removals are recorded from the highest index down, so each recorded
    /// index is still valid when the history is replayed.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let matches: Vec<usize> = self
            .latest
            .iter()
            .enumerate()
            .filter(|(_, item)| predicate(item))
            .map(|(index, _)| index)
            .collect();

        for &index in matches.iter().rev() {
            self.apply(Edit::Remove { index });
        }
        matches.len()
    }

    /// Make the current elements the new reference point, forgetting history.
    pub fn rebase(&mut self) {
        self.initial = self.latest.clone();
        self.changes.clear();
        self.stamps.clear();
        self.generation = next_stamp();
    }

    /// Element-wise image of the log: same edit kinds, same indices.
    pub fn map_items<U: Clone>(&self, mut f: impl FnMut(&T) -> U) -> ChangeLog<U> {
        let initial: Vec<U> = self.initial.iter().map(&mut f).collect();
        let changes: Vec<Edit<U>> = self.changes.iter().map(|edit| edit.map(&mut f)).collect();

        let mut latest = initial.clone();
        for edit in &changes {
            edit.clone().apply_unchecked(&mut latest);
        }
        ChangeLog {
            initial,
            changes,
            latest,
            stamps: self.stamps.clone(),
            generation: self.generation,
        }
    }
}

impl<T: Clone + PartialEq> ChangeLog<T> {
    /// Edit the element at `index` in place, recording a replace only if it
    /// actually changed. Returns whether it did.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn mutate(&mut self, index: usize, f: impl FnOnce(&mut T)) -> bool {
        let Some(current) = self.latest.get(index) else {
            panic!(
                "{}",
                EditError::IndexOutOfBounds {
                    index,
                    len: self.latest.len()
                }
            );
        };
        let mut value = current.clone();
        f(&mut value);
        if value == *current {
            return false;
        }
        self.apply(Edit::Replace { value, index });
        true
    }
}

impl<T> Default for ChangeLog<T> {
    fn default() -> Self {
        Self {
            initial: Vec::new(),
            changes: Vec::new(),
            latest: Vec::new(),
            stamps: Vec::new(),
            generation: next_stamp(),
        }
    }
}

impl<T: PartialEq> PartialEq for ChangeLog<T> {
    fn eq(&self, other: &Self) -> bool {
        self.latest == other.latest
    }
}

impl<T: Eq> Eq for ChangeLog<T> {}

impl<T: fmt::Debug> fmt::Debug for ChangeLog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeLog")
            .field("latest", &self.latest)
            .field("changes", &self.changes.len())
            .finish()
    }
}

impl<T: Clone> From<Vec<T>> for ChangeLog<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T: Clone> FromIterator<T> for ChangeLog<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a ChangeLog<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Wire shape: `latest` is recomputed on the way in.
#[derive(Serialize, Deserialize)]
struct ChangeLogRepr<T> {
    initial: Vec<T>,
    changes: Vec<Edit<T>>,
}

impl<T: Clone> TryFrom<ChangeLogRepr<T>> for ChangeLog<T> {
    type Error = EditError;

    fn try_from(repr: ChangeLogRepr<T>) -> Result<Self, Self::Error> {
        Self::from_parts(repr.initial, repr.changes)
    }
}

impl<T> From<ChangeLog<T>> for ChangeLogRepr<T> {
    fn from(log: ChangeLog<T>) -> Self {
        Self {
            initial: log.initial,
            changes: log.changes,
        }
    }
}
