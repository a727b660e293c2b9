//! Change-Log Sequences
//!
//! Lists that carry their own edit history. A node holding a [`ChangeLog`]
//! lets observers and downstream mapped sequences replay only the edits
//! recorded since they last looked, rather than comparing whole lists.
//!
//! # Concepts
//!
//! ## Edits
//!
//! An [`Edit`] is one insert, remove, replace or move. Indices always refer
//! to the sequence as it was just before the edit, so replaying a log's
//! edits in order over its initial snapshot reproduces its latest elements.
//!
//! ## Cursors
//!
//! A consumer keeps a [`Cursor`]: the log's generation, how many edits it
//! has seen, and the stamp of the last one. When the log changes it replays
//! `changes_after(&cursor)`. If the log was rebased, replaced, or diverged
//! from the copy the cursor was taken on, the stamps no longer line up and
//! the consumer takes a fresh snapshot instead.
//!
//! ## Sorted views
//!
//! [`Node::sorted_by`](crate::Node::sorted_by) keeps a sorted copy of a
//! change-log node and translates each source edit into the edits that keep
//! the sorted copy in order, so observers of the view stay incremental too.

mod change_log;
mod node;
mod sorted;

pub use change_log::{ChangeLog, Cursor, Edit};
pub use sorted::Comparator;
