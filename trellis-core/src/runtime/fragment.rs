//! Fragment Contract
//!
//! A fragment is the rendered output of one component: generated view code
//! that knows how to create, claim, mount, patch, transition out and destroy
//! itself. The runtime never looks inside a fragment.
//!
//! Rendering targets are opaque here. [`Target`], [`Anchor`] and [`HostNode`]
//! are identity handles the rendering layer maps onto real surfaces.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::dirty::FieldSet;
use super::state::State;

fn next_handle_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A container that fragments mount into.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Target {
    id: u64,
    label: Arc<str>,
    nodes: Arc<[HostNode]>,
}

impl Target {
    /// Create an empty target.
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self::with_nodes(label, Vec::new())
    }

    /// A target that already contains server-rendered nodes.
    pub fn with_nodes(label: impl Into<Arc<str>>, nodes: Vec<HostNode>) -> Self {
        Self {
            id: next_handle_id(),
            label: label.into(),
            nodes: nodes.into(),
        }
    }

    /// Existing child nodes, claimed when mounting with hydration.
    pub fn nodes(&self) -> &[HostNode] {
        &self.nodes
    }

    /// A detached container for slot content.
    pub fn slot(name: &str) -> Self {
        Self::new(format!("slot:{name}"))
    }

    /// Identity of this target; clones share it.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Human-readable name, used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({}#{})", self.label, self.id)
    }
}

/// A position marker inside a target; content mounts before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Anchor(u64);

impl Anchor {
    /// Create a fresh, unique anchor.
    pub fn new() -> Self {
        Self(next_handle_id())
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::new()
    }
}

/// A pre-existing node offered to a fragment during hydration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostNode(pub u64);

/// Called once when an outro transition has finished.
pub type OutroCallback = Box<dyn FnOnce() + Send>;

/// Rendered output of a component.
///
/// Methods take `&mut self`; the owning instance never holds its own lock
/// while calling them, so implementations may call back into any component.
pub trait Fragment: Send {
    /// Build the fragment's nodes.
    fn create(&mut self);

    /// Adopt pre-existing nodes instead of creating new ones.
    fn claim(&mut self, nodes: &[HostNode]);

    /// Attach to `target`, before `anchor` if given.
    fn mount(&mut self, target: &Target, anchor: Option<Anchor>);

    /// Whether this fragment has an intro transition.
    fn has_intro(&self) -> bool {
        false
    }

    /// Attach with an intro transition. `enabled` is false while a parent is
    /// performing its initial, intro-suppressed mount.
    fn intro(&mut self, target: &Target, anchor: Option<Anchor>, enabled: bool) {
        let _ = enabled;
        self.mount(target, anchor);
    }

    /// Bring the rendered output up to date with `state`.
    fn patch(&mut self, dirty: FieldSet, state: &State);

    /// Run the exit transition; `on_complete` fires when it finishes.
    /// Fragments without an outro complete immediately.
    fn outro(&mut self, on_complete: OutroCallback) {
        on_complete();
    }

    /// Tear down. `detach` removes the nodes from their host.
    fn destroy(&mut self, detach: bool);
}

/// Fragment that renders nothing.
#[derive(Debug, Default)]
pub struct EmptyFragment;

impl Fragment for EmptyFragment {
    fn create(&mut self) {}
    fn claim(&mut self, _nodes: &[HostNode]) {}
    fn mount(&mut self, _target: &Target, _anchor: Option<Anchor>) {}
    fn patch(&mut self, _dirty: FieldSet, _state: &State) {}
    fn destroy(&mut self, _detach: bool) {}
}
