//! Parent/child tree contract shared by every evaluation participant.
//!
//! Ownership flows strictly from parent to child: a node lives in exactly one
//! parent's `children` list and keeps only a weak back-reference upward.
//! Children are evaluated in insertion order. Cycles are not detected; keeping
//! the graph acyclic is the caller's job.

use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};

use crate::foundation::error::{ExpError, ExpResult};

pub type Shared<T> = Rc<RefCell<T>>;
pub type NodeRef = Rc<RefCell<dyn Node>>;
pub type WeakNodeRef = Weak<RefCell<dyn Node>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// One evaluation call flowing down the tree: `(index, time, payload...)`.
#[derive(Clone, Copy, Debug)]
pub struct Sample<'a> {
    pub index: usize,
    pub time: f64,
    pub payload: &'a [f64],
}

impl<'a> Sample<'a> {
    pub fn new(index: usize, time: f64, payload: &'a [f64]) -> Self {
        Self {
            index,
            time,
            payload,
        }
    }

    /// Same index and time, different payload.
    pub fn with_payload<'b>(&self, payload: &'b [f64]) -> Sample<'b> {
        Sample {
            index: self.index,
            time: self.time,
            payload,
        }
    }
}

/// Sampling shape a subtree sees once the tree is finalized.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct TreeShape {
    pub item_dimensions: Vec<usize>,
    pub num_calls_per_activation: usize,
}

impl TreeShape {
    pub fn new(item_dimensions: Vec<usize>) -> Self {
        let num_calls_per_activation = item_dimensions.iter().product();
        Self {
            item_dimensions,
            num_calls_per_activation,
        }
    }

    /// Sample count along the fastest-varying axis (the scanline length).
    pub fn last_dimension_length(&self) -> usize {
        self.item_dimensions.last().copied().unwrap_or(0)
    }

    pub fn with_extra_dimension(&self, len: usize) -> Self {
        let mut dims = self.item_dimensions.clone();
        dims.push(len);
        Self::new(dims)
    }
}

#[derive(Default)]
pub struct NodeCore {
    children: Vec<NodeRef>,
    parent: Option<WeakNodeRef>,
    shape: Option<TreeShape>,
}

impl fmt::Debug for NodeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCore")
            .field("children", &self.children.len())
            .field("has_parent", &self.parent().is_some())
            .field("shape", &self.shape)
            .finish()
    }
}

impl NodeCore {
    pub fn children(&self) -> &[NodeRef] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Shape recorded by the last `finalize` pass.
    pub fn shape(&self) -> Option<&TreeShape> {
        self.shape.as_ref()
    }

    pub fn set_shape(&mut self, shape: TreeShape) {
        self.shape = Some(shape);
    }

    /// The finalized shape, or the one implied by the current ancestry.
    pub fn resolve_shape(&self) -> Option<TreeShape> {
        self.shape
            .clone()
            .or_else(|| self.parent().and_then(|p| shape_seen_under(&p)))
    }

    pub fn evaluate_children(&self, sample: Sample<'_>) {
        for child in &self.children {
            evaluate_node(child, sample);
        }
    }

    pub fn after_activation_children(&self) {
        for child in &self.children {
            match child.try_borrow_mut() {
                Ok(mut node) => node.on_after_activation(),
                Err(_) => tracing::warn!("node is already borrowed during on_after_activation"),
            }
        }
    }

    /// Finalizes every child, continuing past failures; returns the first one.
    pub fn finalize_children(&self, shape: &TreeShape) -> ExpResult<()> {
        let mut first_err = None;
        for child in &self.children {
            let res = match child.try_borrow_mut() {
                Ok(mut node) => node.finalize(shape).map_err(|err| {
                    tracing::warn!(kind = node.kind(), %err, "node is inert after failed finalize");
                    err
                }),
                Err(_) => Err(ExpError::tree(
                    "node is already borrowed while finalizing (cycle in the tree?)",
                )),
            };
            if let Err(err) = res {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

pub trait Node {
    fn core(&self) -> &NodeCore;
    fn core_mut(&mut self) -> &mut NodeCore;

    fn kind(&self) -> &'static str;

    /// Receives one sample from the parent.
    fn evaluate_self(&mut self, sample: Sample<'_>);

    /// Called right after this node has been attached to a parent.
    fn on_add(&mut self) {}

    /// Resolves sizes top-down once the tree is assembled.
    fn finalize(&mut self, shape: &TreeShape) -> ExpResult<()> {
        let downstream = self.shape_for_children(shape);
        self.core_mut().set_shape(shape.clone());
        self.core().finalize_children(&downstream)
    }

    /// Shape this node presents to its own children.
    fn shape_for_children(&self, upstream: &TreeShape) -> TreeShape {
        upstream.clone()
    }

    /// End of one activation pass; cascades depth-first by default.
    fn on_after_activation(&mut self) {
        self.core().after_activation_children();
    }

    /// `Some` for domain roots: the sampling shape they drive.
    fn domain_shape(&self) -> Option<TreeShape> {
        None
    }

    /// Domain roots drop their finalized state so the next activation re-sizes the tree.
    fn invalidate_shape(&mut self) {}
}

pub fn evaluate_node(node: &NodeRef, sample: Sample<'_>) {
    match node.try_borrow_mut() {
        Ok(mut n) => n.evaluate_self(sample),
        Err(_) => tracing::warn!(
            index = sample.index,
            "node re-entered during evaluation (cycle in the tree?)"
        ),
    }
}

/// Shape seen by a child of `parent`, found by walking up to the domain.
pub fn shape_seen_under(parent: &NodeRef) -> Option<TreeShape> {
    let p = parent.try_borrow().ok()?;
    if let Some(shape) = p.domain_shape() {
        return Some(shape);
    }
    let grandparent = p.core().parent()?;
    let upstream = shape_seen_under(&grandparent)?;
    Some(p.shape_for_children(&upstream))
}

/// Appends `child` to `parent`, detaching it from any previous parent first.
pub fn attach(parent: &NodeRef, child: NodeRef) {
    if Rc::ptr_eq(parent, &child) {
        tracing::warn!("refusing to add a node to itself");
        return;
    }
    let previous = child.borrow().core().parent();
    if let Some(previous) = previous {
        detach(&previous, &child);
    }
    parent.borrow_mut().core_mut().children.push(child.clone());
    {
        let mut node = child.borrow_mut();
        node.core_mut().parent = Some(Rc::downgrade(parent));
        node.on_add();
    }
    invalidate_domain_above(parent);
}

/// Marks the governing domain stale so the new subtree is sized on the next activation.
fn invalidate_domain_above(node: &NodeRef) {
    let mut current = Some(node.clone());
    while let Some(node) = current {
        let Ok(mut guard) = node.try_borrow_mut() else {
            tracing::warn!("tree changed during evaluation; new nodes are sized on the next build");
            return;
        };
        if guard.domain_shape().is_some() {
            guard.invalidate_shape();
            return;
        }
        current = guard.core().parent();
    }
}

/// Removes the first occurrence of `child`; no-op when absent.
pub fn detach(parent: &NodeRef, child: &NodeRef) -> bool {
    let removed = {
        let mut p = parent.borrow_mut();
        let children = &mut p.core_mut().children;
        match children.iter().position(|c| Rc::ptr_eq(c, child)) {
            Some(pos) => {
                children.remove(pos);
                true
            }
            None => false,
        }
    };
    if removed {
        child.borrow_mut().core_mut().parent = None;
    }
    removed
}

/// Tree-building methods on shared node handles.
pub trait NodeExt {
    /// Attaches `child` and hands it back so calls can be chained.
    fn add<C: Node + 'static>(&self, child: Shared<C>) -> Shared<C>;
    fn remove<C: Node + 'static>(&self, child: &Shared<C>) -> bool;
}

impl<P: Node + 'static> NodeExt for Shared<P> {
    fn add<C: Node + 'static>(&self, child: Shared<C>) -> Shared<C> {
        let parent: NodeRef = self.clone();
        let child_ref: NodeRef = child.clone();
        attach(&parent, child_ref);
        child
    }

    fn remove<C: Node + 'static>(&self, child: &Shared<C>) -> bool {
        let parent: NodeRef = self.clone();
        let child_ref: NodeRef = child.clone();
        detach(&parent, &child_ref)
    }
}
