//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects inputs, derived
//! nodes and subscribers. It owns the dependency graph, maps node IDs back to
//! live nodes, and drives propagation passes.
//!
//! # How It Works
//!
//! 1. When a node is created, it registers with the runtime and receives a
//!    [`ReactiveHandle`]; dropping the handle unregisters it.
//!
//! 2. Derived nodes declare their sources as graph edges.
//!
//! 3. When an input is written, the runtime runs a pass:
//!    a. The scheduler hands out reachable nodes in dependency order
//!    b. Dirty nodes recompute and report whether their value changed
//!    c. Once every node has settled, subscribers of changed nodes fire
//!
//! 4. A write issued while the runtime is busy (inside a transform, a
//!    subscriber callback, or a construction-time evaluation) is queued and
//!    runs as its own pass after the current work completes.
//!
//! # Thread Model
//!
//! The runtime is thread-local. Nodes are `Rc`-based and never leave the
//! thread that created them, so no locking is involved anywhere.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::thread;

use tracing::{debug, debug_span, trace, warn};

use crate::graph::{NodeId, NodeKind, UpdateScheduler, Vertex};

/// The capability the runtime needs from a node, independent of its value
/// type.
pub(crate) trait Reactive {
    /// Re-evaluate the node against the current values of its sources.
    fn recompute(&self) -> Recompute;

    /// Deliver the current value to subscribers.
    fn notify(&self);
}

/// Outcome of [`Reactive::recompute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recompute {
    Changed,
    Unchanged,
    /// The node bound a new source that has not settled yet; recompute it
    /// again once that source settles.
    Deferred,
}

/// A queued write. Applies the new value and returns the node to propagate
/// from, or `None` if nothing changed.
pub(crate) type Write = Box<dyn FnOnce() -> Option<NodeId>>;

struct RuntimeState {
    scheduler: UpdateScheduler,

    /// Weak references so the runtime never keeps a node alive.
    registry: HashMap<NodeId, Weak<dyn Reactive>>,

    /// Set while a pass (or other deferring scope) is running.
    busy: bool,

    deferred: VecDeque<Write>,

    passes: u64,
}

impl RuntimeState {
    fn new() -> Self {
        Self {
            scheduler: UpdateScheduler::new(),
            registry: HashMap::new(),
            busy: false,
            deferred: VecDeque::new(),
            passes: 0,
        }
    }

    fn lookup(&self, node_id: NodeId) -> Option<Rc<dyn Reactive>> {
        self.registry.get(&node_id).and_then(Weak::upgrade)
    }
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::new());
}

/// Run `f` with the runtime borrowed. `f` must not call back into user code.
fn with_runtime<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> R {
    RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
}

/// Registration of a node with the runtime.
///
/// Dropping this handle unregisters the node and removes its graph edges.
pub(crate) struct ReactiveHandle {
    node_id: NodeId,
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.node_id);
    }
}

/// Clears the busy flag when the outermost deferring scope ends, including
/// by unwinding.
struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let abandoned = RUNTIME
            .try_with(|rt| {
                let mut rt = rt.try_borrow_mut().ok()?;
                rt.busy = false;
                if thread::panicking() {
                    rt.scheduler.abort_pass();
                    Some(std::mem::take(&mut rt.deferred))
                } else {
                    None
                }
            })
            .ok()
            .flatten();
        // Queued writes own nodes; drop them with the runtime released.
        drop(abandoned);
    }
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Register a node. The node must stay registered for as long as it
    /// holds the returned handle.
    pub(crate) fn register(
        node_id: NodeId,
        kind: NodeKind,
        reactive: Weak<dyn Reactive>,
    ) -> ReactiveHandle {
        with_runtime(|rt| {
            rt.scheduler.add_vertex(Vertex::new(node_id, kind));
            rt.registry.insert(node_id, reactive);
        });
        trace!(node = node_id.raw(), ?kind, "node registered");
        ReactiveHandle { node_id }
    }

    fn unregister(node_id: NodeId) {
        // The thread-local may already be gone during thread teardown.
        let _ = RUNTIME.try_with(|rt| match rt.try_borrow_mut() {
            Ok(mut rt) => {
                rt.registry.remove(&node_id);
                rt.scheduler.remove_vertex(node_id);
            }
            Err(_) => warn!(node = node_id.raw(), "runtime borrowed during drop; node left registered"),
        });
    }

    /// Record that `dependent` reads from `dependency`.
    pub(crate) fn add_edge(dependency: NodeId, dependent: NodeId) {
        with_runtime(|rt| rt.scheduler.add_edge(dependency, dependent));
    }

    pub(crate) fn remove_edge(dependency: NodeId, dependent: NodeId) {
        with_runtime(|rt| rt.scheduler.remove_edge(dependency, dependent));
    }

    /// Whether `node_id` still has to settle in the running pass.
    pub(crate) fn is_pending(node_id: NodeId) -> bool {
        with_runtime(|rt| rt.scheduler.is_pending(node_id))
    }

    /// Submit a write. Runs it (and everything it triggers) immediately,
    /// unless the runtime is busy, in which case it is queued behind the
    /// current work.
    pub(crate) fn submit(write: Write) {
        let (owner, queued) = with_runtime(|rt| {
            rt.deferred.push_back(write);
            (!std::mem::replace(&mut rt.busy, true), rt.deferred.len())
        });
        if !owner {
            debug!(queued, "write deferred until the current pass completes");
            return;
        }

        let _guard = DrainGuard;
        Self::drain();
    }

    /// Run `f` with writes deferred until it returns.
    ///
    /// Used around user code that runs outside a pass (construction-time
    /// evaluation, subscribe-time replay) so a write from inside it cannot
    /// start a pass that re-enters the node being built.
    pub(crate) fn deferring<R>(f: impl FnOnce() -> R) -> R {
        let owner = with_runtime(|rt| !std::mem::replace(&mut rt.busy, true));
        if !owner {
            return f();
        }

        let _guard = DrainGuard;
        let result = f();
        Self::drain();
        result
    }

    fn drain() {
        while let Some(write) = with_runtime(|rt| rt.deferred.pop_front()) {
            if let Some(root) = write() {
                Self::propagate(root);
            }
        }
    }

    fn propagate(root: NodeId) {
        let pass = with_runtime(|rt| {
            rt.passes += 1;
            rt.scheduler.begin_pass(root);
            rt.passes
        });
        let span = debug_span!("pass", pass, root = root.raw());
        let _enter = span.enter();

        let mut recomputed = 0usize;
        loop {
            let next = with_runtime(|rt| {
                rt.scheduler
                    .next_ready()
                    .map(|(node_id, dirty)| (node_id, if dirty { rt.lookup(node_id) } else { None }))
            });
            let Some((node_id, reactive)) = next else {
                break;
            };

            // Clean nodes and nodes dropped mid-pass settle unchanged
            let outcome = match &reactive {
                Some(reactive) => {
                    recomputed += 1;
                    reactive.recompute()
                }
                None => Recompute::Unchanged,
            };
            trace!(node = node_id.raw(), ?outcome, "node settled");

            with_runtime(|rt| match outcome {
                Recompute::Changed => rt.scheduler.complete(node_id, true),
                Recompute::Unchanged => rt.scheduler.complete(node_id, false),
                Recompute::Deferred => rt.scheduler.defer(node_id),
            });
            drop(reactive);
        }

        let changed = match with_runtime(|rt| rt.scheduler.finish_pass()) {
            Ok(changed) => changed,
            Err(err) => panic!("{err}"),
        };
        debug!(recomputed, changed = changed.len(), "pass complete");

        for node_id in changed {
            if let Some(reactive) = with_runtime(|rt| rt.lookup(node_id)) {
                reactive.notify();
            }
        }
    }

    /// Whether a pass or deferring scope is running on this thread.
    ///
    /// Writes issued while this is true are queued.
    pub fn is_propagating() -> bool {
        with_runtime(|rt| rt.busy)
    }

    /// Number of passes run on this thread so far.
    pub fn pass_count() -> u64 {
        with_runtime(|rt| rt.passes)
    }

    /// Number of live nodes registered on this thread.
    pub fn node_count() -> usize {
        with_runtime(|rt| rt.scheduler.vertex_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    type Log = Rc<RefCell<Vec<String>>>;

    struct MockReactive {
        id: NodeId,
        name: &'static str,
        outcome: Cell<Recompute>,
        on_recompute: RefCell<Option<Box<dyn FnMut()>>>,
        log: Log,
        _handle: ReactiveHandle,
    }

    impl MockReactive {
        fn new(name: &'static str, kind: NodeKind, log: &Log) -> Rc<Self> {
            Rc::new_cyclic(|weak: &Weak<Self>| {
                let id = NodeId::new();
                Self {
                    id,
                    name,
                    outcome: Cell::new(Recompute::Changed),
                    on_recompute: RefCell::new(None),
                    log: log.clone(),
                    _handle: Runtime::register(id, kind, weak.clone()),
                }
            })
        }
    }

    impl Reactive for MockReactive {
        fn recompute(&self) -> Recompute {
            self.log.borrow_mut().push(format!("recompute {}", self.name));
            if let Some(hook) = self.on_recompute.borrow_mut().as_mut() {
                hook();
            }
            self.outcome.get()
        }

        fn notify(&self) {
            self.log.borrow_mut().push(format!("notify {}", self.name));
        }
    }

    fn write_of(node: &Rc<MockReactive>) -> Write {
        let id = node.id;
        Box::new(move || Some(id))
    }

    #[test]
    fn dropping_a_node_unregisters_it() {
        let log = Log::default();
        let before = Runtime::node_count();

        let node = MockReactive::new("a", NodeKind::Input, &log);
        assert_eq!(Runtime::node_count(), before + 1);

        drop(node);
        assert_eq!(Runtime::node_count(), before);
    }

    #[test]
    fn pass_recomputes_then_notifies() {
        let log = Log::default();
        let input = MockReactive::new("input", NodeKind::Input, &log);
        let derived = MockReactive::new("derived", NodeKind::Derived, &log);
        Runtime::add_edge(input.id, derived.id);

        let passes = Runtime::pass_count();
        Runtime::submit(write_of(&input));

        assert_eq!(Runtime::pass_count(), passes + 1);
        assert_eq!(
            *log.borrow(),
            vec!["recompute derived", "notify input", "notify derived"]
        );
        assert!(!Runtime::is_propagating());
    }

    #[test]
    fn unchanged_node_is_not_notified() {
        let log = Log::default();
        let input = MockReactive::new("input", NodeKind::Input, &log);
        let derived = MockReactive::new("derived", NodeKind::Derived, &log);
        let leaf = MockReactive::new("leaf", NodeKind::Derived, &log);
        Runtime::add_edge(input.id, derived.id);
        Runtime::add_edge(derived.id, leaf.id);
        derived.outcome.set(Recompute::Unchanged);

        Runtime::submit(write_of(&input));

        assert_eq!(*log.borrow(), vec!["recompute derived", "notify input"]);
    }

    #[test]
    fn write_during_pass_runs_as_next_pass() {
        let log = Log::default();
        let first = MockReactive::new("first", NodeKind::Input, &log);
        let second = MockReactive::new("second", NodeKind::Input, &log);
        let derived = MockReactive::new("derived", NodeKind::Derived, &log);
        Runtime::add_edge(first.id, derived.id);

        let write = Cell::new(Some(write_of(&second)));
        let hook_log = log.clone();
        *derived.on_recompute.borrow_mut() = Some(Box::new(move || {
            if let Some(write) = write.take() {
                assert!(Runtime::is_propagating());
                Runtime::submit(write);
                hook_log.borrow_mut().push("queued".to_string());
            }
        }));

        let passes = Runtime::pass_count();
        Runtime::submit(write_of(&first));

        assert_eq!(Runtime::pass_count(), passes + 2);
        assert_eq!(
            *log.borrow(),
            vec![
                "recompute derived",
                "queued",
                "notify first",
                "notify derived",
                "notify second",
            ]
        );
    }

    #[test]
    fn deferring_scope_holds_writes_until_it_ends() {
        let log = Log::default();
        let input = MockReactive::new("input", NodeKind::Input, &log);

        let result = Runtime::deferring(|| {
            Runtime::submit(write_of(&input));
            log.borrow_mut().push("scope body".to_string());
            42
        });

        assert_eq!(result, 42);
        assert_eq!(*log.borrow(), vec!["scope body", "notify input"]);
    }

    #[test]
    fn write_returning_none_skips_the_pass() {
        let passes = Runtime::pass_count();
        Runtime::submit(Box::new(|| None));
        assert_eq!(Runtime::pass_count(), passes);
    }

    #[test]
    #[should_panic(expected = "dependency cycle")]
    fn cycle_panics() {
        let log = Log::default();
        let input = MockReactive::new("input", NodeKind::Input, &log);
        let a = MockReactive::new("a", NodeKind::Derived, &log);
        let b = MockReactive::new("b", NodeKind::Derived, &log);
        Runtime::add_edge(input.id, a.id);
        Runtime::add_edge(a.id, b.id);
        Runtime::add_edge(b.id, a.id);

        Runtime::submit(write_of(&input));
    }
}
