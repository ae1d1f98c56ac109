//! Domain roots: sampling policies that drive one evaluation pass per `activate`.

pub mod area;
pub mod array;

use std::rc::Rc;

use crate::{
    foundation::error::ExpResult,
    node::{Node, NodeCore, Shared, TreeShape},
    render_loop::{Listen, ListenerId, LoopEvent, RenderLoop},
};

pub trait Domain: Node {
    /// Shape of the sample space this domain drives.
    fn shape(&self) -> &TreeShape;

    /// Whether `build` ran since the last node was attached below this domain.
    fn is_built(&self) -> bool;

    /// Top-down finalize of the whole tree below this domain.
    ///
    /// Every child is finalized even if a sibling fails; the first failure is
    /// returned and the failing node stays inert.
    fn build(&mut self) -> ExpResult<()>;

    /// Evaluates every sample index once, then runs `on_after_activation`.
    /// Builds first when the domain is stale.
    fn activate(&mut self, t: f64);

    fn num_calls_per_activation(&self) -> usize {
        self.shape().num_calls_per_activation
    }
}

/// Activates `domain` on every update tick of `render_loop` until it is dropped.
pub fn drive<D: Domain + 'static>(domain: &Shared<D>, render_loop: &RenderLoop) -> ListenerId {
    let weak = Rc::downgrade(domain);
    render_loop.on(LoopEvent::Update, move |frame| match weak.upgrade() {
        Some(domain) => {
            domain.borrow_mut().activate(frame.t);
            Listen::Continue
        }
        None => Listen::Stop,
    })
}

/// Row-major flat index of `axis_indices` (last axis fastest).
pub fn flat_index(axis_indices: &[usize], item_dimensions: &[usize]) -> usize {
    axis_indices
        .iter()
        .zip(item_dimensions)
        .fold(0, |acc, (i, n)| acc * n + i)
}

/// Advances `axis_indices` like an odometer; returns `false` after the last tuple.
pub fn advance_axes(axis_indices: &mut [usize], item_dimensions: &[usize]) -> bool {
    for d in (0..axis_indices.len()).rev() {
        axis_indices[d] += 1;
        if axis_indices[d] < item_dimensions[d] {
            return true;
        }
        axis_indices[d] = 0;
    }
    false
}

pub(crate) fn build_tree(core: &NodeCore, shape: &TreeShape, kind: &'static str) -> ExpResult<()> {
    let res = core.finalize_children(shape);
    match &res {
        Ok(()) => tracing::debug!(
            kind,
            calls = shape.num_calls_per_activation,
            "domain tree finalized"
        ),
        Err(err) => tracing::warn!(kind, %err, "domain tree finalized with inert nodes"),
    }
    res
}
