//! Dependency Graph
//!
//! This module implements the dependency graph that records which nodes read
//! from which, and the scheduler that orders recomputation after a change.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph (DAG) where:
//!
//! - Vertices stand for live nodes (inputs, derived and dynamic nodes)
//! - Edges represent dependencies: if A reads B, there is an edge from B to A
//!
//! The graph only stores IDs. Values, transforms and subscribers live on the
//! nodes themselves; the runtime maps IDs back to nodes through a weak
//! registry, so the graph never keeps a node alive.
//!
//! # Design Decisions
//!
//! 1. We use a centralized graph rather than per-node listener lists because:
//!    - It enables dependency-ordered passes with no per-node re-checking
//!    - It makes cycle detection a by-product of scheduling
//!
//! 2. The graph is indexed by node ID for O(1) lookups.
//!
//! 3. We maintain both forward (dependencies) and reverse (dependents) edges
//!    to enable efficient traversal in both directions.

mod node;
mod scheduler;

pub use node::{DirtyState, NodeId, NodeKind, Vertex};
pub use scheduler::UpdateScheduler;
