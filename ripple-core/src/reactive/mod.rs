//! Reactive Primitives
//!
//! This module implements the node types applications build graphs from,
//! and the thread-local runtime that propagates changes through them.
//!
//! # Concepts
//!
//! ## Inputs
//!
//! An [`Input`] holds a value set from outside the graph. Writing to it
//! starts a propagation pass.
//!
//! ## Derived Nodes
//!
//! `map` and `combine` build nodes computed by a pure transform of one or two
//! sources. A derived node caches its value and recomputes only in passes
//! where one of its sources changed; if the recomputed value is equal under
//! the node's equality predicate, propagation stops there.
//!
//! ## Dynamic Nodes
//!
//! `flat_map` builds a node that follows whichever inner node a selector
//! picks for the current value of its source, rebinding when the source
//! changes.
//!
//! ## Subscriptions
//!
//! Observers attach with `subscribe` and get a [`Subscription`] back.
//! Callbacks run after a pass has fully settled, once per pass in which the
//! observed value changed.
//!
//! # Implementation Notes
//!
//! Dependencies are declared when a node is built, not discovered by
//! tracking reads. The runtime keeps a weak registry from node IDs to nodes,
//! so the graph never keeps a node alive: derived nodes own their sources,
//! and observers own the nodes they watch through their subscriptions.

mod derived;
mod input;
mod runtime;
mod subscriber;
mod subscription;
mod switch;
pub(crate) mod value;

pub use input::{Input, OneShot};
pub use runtime::Runtime;
pub use subscription::{Subscription, SubscriptionSet};
pub use value::{Equality, Node};
