//! Ripple Core
//!
//! This crate provides a push-based incremental computation engine. It
//! implements:
//!
//! - Input nodes written from outside the graph
//! - Derived nodes computed from one or two sources with pure transforms
//! - Dynamic nodes that rebind to a different inner node over time
//! - Change-log sequences that propagate individual edits instead of whole
//!   lists, including mapped and sorted views
//! - Subscriptions with RAII release
//!
//! Every write starts a propagation pass that recomputes each affected node
//! at most once, in dependency order, and notifies observers only after the
//! whole graph has settled.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: dependency graph and the pass scheduler
//! - `reactive`: the thread-local runtime, node types and subscriptions
//! - `sequence`: change-log sequences and their incremental node operations
//! - `error`: error types shared across modules
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use ripple_core::{ChangeLog, Input};
//!
//! let count = Input::new(1);
//! let doubled = count.map(|x| x * 2);
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! let _subscription = doubled.subscribe(move |v| sink.borrow_mut().push(*v));
//!
//! count.write(5);
//! assert_eq!(*seen.borrow(), vec![2, 10]);
//!
//! let todos = Input::new(ChangeLog::new(vec!["write docs"]));
//! let lengths = todos.map_items(|title| title.len());
//! todos.append("ship it");
//! assert_eq!(lengths.current_value().unwrap().latest(), &[10, 7]);
//! ```
//!
//! The runtime is single-threaded: node handles are `!Send`, and each thread
//! that builds nodes gets its own independent graph.

pub mod error;
pub mod graph;
pub mod reactive;
pub mod sequence;

pub use error::{EditError, PropagationError};
pub use reactive::{Equality, Input, Node, OneShot, Runtime, Subscription, SubscriptionSet};
pub use sequence::{ChangeLog, Comparator, Cursor, Edit};
