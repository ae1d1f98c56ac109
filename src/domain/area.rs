use serde::{Deserialize, Serialize};

use crate::{
    domain::{Domain, advance_axes, build_tree},
    foundation::error::{ExpError, ExpResult, ensure},
    node::{Node, NodeCore, Sample, Shared, TreeShape, shared},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    /// One `[min, max]` pair per axis.
    pub bounds: Vec<[f64; 2]>,
    /// Samples per axis, used for every axis unless `item_dimensions` is set.
    pub num_items: usize,
    /// Explicit per-axis sample counts; overrides `num_items`.
    pub item_dimensions: Option<Vec<usize>>,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            bounds: vec![[-1.0, 1.0]],
            num_items: 16,
            item_dimensions: None,
        }
    }
}

impl AreaConfig {
    pub fn new(bounds: Vec<[f64; 2]>) -> Self {
        Self {
            bounds,
            ..Self::default()
        }
    }

    pub fn num_items(mut self, n: usize) -> Self {
        self.num_items = n;
        self
    }

    pub fn item_dimensions(mut self, dims: Vec<usize>) -> Self {
        self.item_dimensions = Some(dims);
        self
    }

    fn resolved_dimensions(&self) -> ExpResult<Vec<usize>> {
        ensure(!self.bounds.is_empty(), "Area bounds must have at least one axis")?;
        let dims = match &self.item_dimensions {
            Some(dims) => dims.clone(),
            None => vec![self.num_items; self.bounds.len()],
        };
        if dims.len() != self.bounds.len() {
            return Err(ExpError::validation(format!(
                "Area has {} bounds but {} item dimensions",
                self.bounds.len(),
                dims.len()
            )));
        }
        for (axis, (n, [lo, hi])) in dims.iter().zip(&self.bounds).enumerate() {
            ensure(
                *n >= 2,
                format!("Area axis {axis} needs at least 2 samples, got {n}"),
            )?;
            ensure(
                lo.is_finite() && hi.is_finite(),
                format!("Area axis {axis} bounds must be finite"),
            )?;
        }
        Ok(dims)
    }
}

/// Continuous domain: each axis samples `[min, max]` with both endpoints included.
#[derive(Debug)]
pub struct Area {
    core: NodeCore,
    bounds: Vec<[f64; 2]>,
    shape: TreeShape,
    built: bool,
}

impl Area {
    pub fn new(config: AreaConfig) -> ExpResult<Shared<Self>> {
        let dims = config.resolved_dimensions()?;
        Ok(shared(Self {
            core: NodeCore::default(),
            bounds: config.bounds,
            shape: TreeShape::new(dims),
            built: false,
        }))
    }

    pub fn bounds(&self) -> &[[f64; 2]] {
        &self.bounds
    }

    pub fn num_dimensions(&self) -> usize {
        self.bounds.len()
    }

    pub fn item_dimensions(&self) -> &[usize] {
        &self.shape.item_dimensions
    }

    fn coordinate(&self, axis: usize, i: usize) -> f64 {
        let [lo, hi] = self.bounds[axis];
        let n = self.shape.item_dimensions[axis];
        lo + (hi - lo) * (i as f64 / (n - 1) as f64)
    }
}

impl Node for Area {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "Area"
    }

    fn evaluate_self(&mut self, sample: Sample<'_>) {
        tracing::warn!(
            index = sample.index,
            "Area is a tree root; ignoring evaluation from a parent"
        );
    }

    fn finalize(&mut self, _shape: &TreeShape) -> ExpResult<()> {
        self.build()
    }

    fn domain_shape(&self) -> Option<TreeShape> {
        Some(self.shape.clone())
    }

    fn invalidate_shape(&mut self) {
        self.built = false;
    }
}

impl Domain for Area {
    fn shape(&self) -> &TreeShape {
        &self.shape
    }

    fn is_built(&self) -> bool {
        self.built
    }

    #[tracing::instrument(skip(self), fields(dims = ?self.shape.item_dimensions))]
    fn build(&mut self) -> ExpResult<()> {
        self.built = true;
        build_tree(&self.core, &self.shape, "Area")
    }

    fn activate(&mut self, t: f64) {
        if !self.built {
            // Failures were already logged; inert nodes simply ignore samples.
            let _ = self.build();
        }

        let dims = self.shape.item_dimensions.clone();
        let mut axes = vec![0usize; dims.len()];
        let mut coords = vec![0.0; dims.len()];
        let mut index = 0;
        loop {
            for (axis, i) in axes.iter().enumerate() {
                coords[axis] = self.coordinate(axis, *i);
            }
            self.core.evaluate_children(Sample::new(index, t, &coords));
            index += 1;
            if !advance_axes(&mut axes, &dims) {
                break;
            }
        }

        self.on_after_activation();
    }
}
