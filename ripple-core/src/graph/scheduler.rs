//! Update Scheduler
//!
//! The scheduler owns the dependency graph and decides the order in which
//! nodes are recomputed after an input changes. It never runs user code
//! itself: the runtime asks it for the next ready node, recomputes that node,
//! and reports back whether its value changed.
//!
//! # Algorithm
//!
//! A pass is an incremental run of Kahn's algorithm over the set of nodes
//! reachable from the changed input:
//!
//! 1. Mark every reachable node "maybe dirty", and the input's direct
//!    dependents "dirty"
//! 2. Compute each reachable node's in-degree, counting only dependencies
//!    that are themselves part of the pass
//! 3. Hand out nodes whose in-degree is zero, one at a time
//! 4. When a node completes, release its dependents; if its value changed,
//!    mark those dependents dirty
//! 5. Only dirty nodes are recomputed, so a node whose dependencies all
//!    compared equal is skipped
//!
//! Because in-degrees are maintained live rather than sorted up front, the
//! graph may change while a pass is running: an edge added from a node that
//! has not settled yet pulls the dependent into the pass, which is how a
//! dynamic node waits for a freshly bound inner node.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::trace;

use super::node::{NodeId, Vertex};
use crate::error::PropagationError;

/// Bookkeeping for the pass currently running.
#[derive(Debug)]
struct Pass {
    /// Nodes still pending, mapped to the number of pending dependencies.
    in_degree: HashMap<NodeId, usize>,

    /// Nodes whose dependencies have all settled.
    ready: VecDeque<NodeId>,

    /// Nodes whose value changed, in settle order. Starts with the root.
    changed: Vec<NodeId>,
}

impl Pass {
    /// One pending dependency of `node_id` has settled or gone away.
    fn release(&mut self, node_id: NodeId) {
        if let Some(degree) = self.in_degree.get_mut(&node_id) {
            if *degree > 0 {
                *degree -= 1;
                if *degree == 0 {
                    self.ready.push_back(node_id);
                }
            }
        }
    }
}

/// The update scheduler manages the dependency graph and coordinates passes.
#[derive(Debug)]
pub struct UpdateScheduler {
    /// All live vertices, indexed by ID.
    vertices: HashMap<NodeId, Vertex>,

    pass: Option<Pass>,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self {
            vertices: HashMap::new(),
            pass: None,
        }
    }

    /// Add a vertex to the graph.
    pub fn add_vertex(&mut self, vertex: Vertex) -> NodeId {
        let id = vertex.id();
        self.vertices.insert(id, vertex);
        id
    }

    /// Remove a vertex and every edge touching it.
    pub fn remove_vertex(&mut self, node_id: NodeId) {
        let Some(vertex) = self.vertices.remove(&node_id) else {
            return;
        };

        for dep_id in vertex.dependencies() {
            if let Some(dep) = self.vertices.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }
        for dependent_id in vertex.dependents() {
            if let Some(dependent) = self.vertices.get_mut(dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }

        if let Some(pass) = self.pass.as_mut() {
            if pass.in_degree.remove(&node_id).is_some() {
                for dependent_id in vertex.dependents() {
                    pass.release(*dependent_id);
                }
            }
        }
    }

    pub fn vertex(&self, node_id: NodeId) -> Option<&Vertex> {
        self.vertices.get(&node_id)
    }

    /// Add a dependency edge: `dependent` reads from `dependency`.
    ///
    /// During a pass, if `dependency` has not settled yet, `dependent` (and
    /// anything downstream of it) waits for it.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        let inserted = self
            .vertices
            .get_mut(&dependency)
            .map_or(false, |dep| dep.add_dependent(dependent));
        if let Some(dependent_vertex) = self.vertices.get_mut(&dependent) {
            dependent_vertex.add_dependency(dependency);
        }
        if !inserted {
            return;
        }

        let Self { vertices, pass } = self;
        let Some(pass) = pass.as_mut() else {
            return;
        };
        if !pass.in_degree.contains_key(&dependency) {
            return;
        }

        match pass.in_degree.get_mut(&dependent) {
            Some(degree) => *degree += 1,
            None => Self::enlist(vertices, pass, dependent),
        }
    }

    /// Remove a dependency edge.
    pub fn remove_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        let removed = self
            .vertices
            .get_mut(&dependency)
            .map_or(false, |dep| dep.remove_dependent(dependent));
        if let Some(dependent_vertex) = self.vertices.get_mut(&dependent) {
            dependent_vertex.remove_dependency(dependency);
        }

        if let (true, Some(pass)) = (removed, self.pass.as_mut()) {
            if pass.in_degree.contains_key(&dependency) {
                pass.release(dependent);
            }
        }
    }

    /// Get the total number of vertices in the graph.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn in_pass(&self) -> bool {
        self.pass.is_some()
    }

    /// Whether `node_id` is part of the running pass and has not settled.
    pub fn is_pending(&self, node_id: NodeId) -> bool {
        self.pass
            .as_ref()
            .map_or(false, |pass| pass.in_degree.contains_key(&node_id))
    }

    /// Start a pass for a change of `root`.
    pub fn begin_pass(&mut self, root: NodeId) {
        debug_assert!(self.pass.is_none(), "a pass is already running");

        let reachable = self.collect_reachable(root);
        let members: HashSet<NodeId> = reachable.iter().copied().collect();

        for node_id in &reachable {
            if let Some(vertex) = self.vertices.get_mut(node_id) {
                vertex.mark_maybe_dirty();
            }
        }
        let direct: Vec<NodeId> = self
            .vertices
            .get(&root)
            .map(|vertex| vertex.dependents().iter().copied().collect())
            .unwrap_or_default();
        for node_id in direct {
            if let Some(vertex) = self.vertices.get_mut(&node_id) {
                vertex.mark_dirty();
            }
        }

        // Kahn's algorithm, counting only edges within the pass
        let mut in_degree = HashMap::with_capacity(reachable.len());
        let mut ready = VecDeque::new();
        for &node_id in &reachable {
            if let Some(vertex) = self.vertices.get(&node_id) {
                let degree = vertex
                    .dependencies()
                    .iter()
                    .filter(|d| members.contains(d))
                    .count();
                in_degree.insert(node_id, degree);
                if degree == 0 {
                    ready.push_back(node_id);
                }
            }
        }

        trace!(root = root.raw(), reachable = reachable.len(), "pass scheduled");
        self.pass = Some(Pass {
            in_degree,
            ready,
            changed: vec![root],
        });
    }

    /// Take the next node whose dependencies have all settled.
    ///
    /// Returns the node ID and whether it is dirty (must recompute).
    pub fn next_ready(&mut self) -> Option<(NodeId, bool)> {
        let Self { vertices, pass } = self;
        let pass = pass.as_mut()?;

        while let Some(node_id) = pass.ready.pop_front() {
            // Settled, removed, or waiting again since it was queued
            if pass.in_degree.get(&node_id) != Some(&0) {
                continue;
            }
            let dirty = vertices.get(&node_id).map_or(false, Vertex::is_dirty);
            return Some((node_id, dirty));
        }
        None
    }

    /// Settle a node handed out by [`next_ready`](Self::next_ready).
    pub fn complete(&mut self, node_id: NodeId, changed: bool) {
        let Self { vertices, pass } = self;
        let Some(pass) = pass.as_mut() else {
            return;
        };
        if pass.in_degree.remove(&node_id).is_none() {
            return;
        }

        let dependents: Vec<NodeId> = match vertices.get_mut(&node_id) {
            Some(vertex) => {
                vertex.mark_clean();
                vertex.dependents().iter().copied().collect()
            }
            None => Vec::new(),
        };

        if changed {
            pass.changed.push(node_id);
        }
        for dependent_id in dependents {
            if !pass.in_degree.contains_key(&dependent_id) {
                continue;
            }
            if changed {
                if let Some(dependent) = vertices.get_mut(&dependent_id) {
                    dependent.mark_dirty();
                }
            }
            pass.release(dependent_id);
        }
    }

    /// Put a node handed out by [`next_ready`](Self::next_ready) back to
    /// wait; it stays dirty and is handed out again once its new pending
    /// dependencies settle.
    pub fn defer(&mut self, node_id: NodeId) {
        if let Some(pass) = self.pass.as_mut() {
            if pass.in_degree.get(&node_id) == Some(&0) {
                pass.ready.push_back(node_id);
            }
        }
    }

    /// End the pass, returning the nodes whose value changed in settle order.
    pub fn finish_pass(&mut self) -> Result<Vec<NodeId>, PropagationError> {
        let Some(pass) = self.pass.take() else {
            return Ok(Vec::new());
        };

        let remaining = pass.in_degree.len();
        for node_id in pass.in_degree.keys() {
            if let Some(vertex) = self.vertices.get_mut(node_id) {
                vertex.mark_clean();
            }
        }

        if remaining > 0 {
            return Err(PropagationError::Cycle { remaining });
        }
        Ok(pass.changed)
    }

    /// Drop the running pass without finishing it.
    pub fn abort_pass(&mut self) {
        if let Some(pass) = self.pass.take() {
            for node_id in pass.in_degree.keys() {
                if let Some(vertex) = self.vertices.get_mut(node_id) {
                    vertex.mark_clean();
                }
            }
        }
    }

    /// Pull `node_id` and everything downstream of it into the running pass.
    fn enlist(vertices: &mut HashMap<NodeId, Vertex>, pass: &mut Pass, node_id: NodeId) {
        pass.in_degree.insert(node_id, 1);
        let mut stack = vec![node_id];

        while let Some(current) = stack.pop() {
            let Some(vertex) = vertices.get_mut(&current) else {
                continue;
            };
            vertex.mark_maybe_dirty();
            for &dependent_id in vertex.dependents() {
                match pass.in_degree.get_mut(&dependent_id) {
                    Some(degree) => *degree += 1,
                    None => {
                        pass.in_degree.insert(dependent_id, 1);
                        stack.push(dependent_id);
                    }
                }
            }
        }
    }

    /// Every node transitively downstream of `root`, excluding `root`.
    fn collect_reachable(&self, root: NodeId) -> Vec<NodeId> {
        let mut reachable = Vec::new();
        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);

        while let Some(node_id) = queue.pop_front() {
            let Some(vertex) = self.vertices.get(&node_id) else {
                continue;
            };
            for &dependent_id in vertex.dependents() {
                if visited.insert(dependent_id) {
                    reachable.push(dependent_id);
                    queue.push_back(dependent_id);
                }
            }
        }

        reachable
    }
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new()
    }
}
