//! Graph Vertices
//!
//! This module defines the bookkeeping record the scheduler keeps for every
//! live node: its kind, its dirty state during a pass, and its edges.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// An input cell (or constant). These are the roots of the graph:
    /// they have dependents but never dependencies.
    Input,

    /// A node computed from a fixed set of sources.
    Derived,

    /// A node whose inner source is rebound as its outer source changes.
    Dynamic,
}

/// Dirty state of a vertex within a propagation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// Not part of the running pass, or already settled.
    Clean,

    /// Reachable from the changed input, but no dependency has reported a
    /// change yet.
    MaybeDirty,

    /// At least one dependency changed; the node must recompute.
    Dirty,
}

/// A vertex in the dependency graph.
#[derive(Debug)]
pub struct Vertex {
    id: NodeId,
    kind: NodeKind,
    dirty: DirtyState,

    /// Nodes this node reads from.
    dependencies: IndexSet<NodeId>,

    /// Nodes that read from this node, in the order they subscribed.
    dependents: IndexSet<NodeId>,
}

impl Vertex {
    /// Create a vertex for an existing node ID.
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            dirty: DirtyState::Clean,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn dirty_state(&self) -> DirtyState {
        self.dirty
    }

    pub fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty == DirtyState::Dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }

    /// Mark as reachable. Never downgrades a vertex that is already dirty.
    pub fn mark_maybe_dirty(&mut self) {
        if self.dirty == DirtyState::Clean {
            self.dirty = DirtyState::MaybeDirty;
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = DirtyState::Dirty;
    }

    pub fn add_dependency(&mut self, node_id: NodeId) -> bool {
        self.dependencies.insert(node_id)
    }

    pub fn remove_dependency(&mut self, node_id: NodeId) -> bool {
        self.dependencies.shift_remove(&node_id)
    }

    pub fn dependencies(&self) -> &IndexSet<NodeId> {
        &self.dependencies
    }

    pub fn add_dependent(&mut self, node_id: NodeId) -> bool {
        self.dependents.insert(node_id)
    }

    pub fn remove_dependent(&mut self, node_id: NodeId) -> bool {
        self.dependents.shift_remove(&node_id)
    }

    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }
}
