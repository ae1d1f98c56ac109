use serde::{Deserialize, Serialize};

use crate::{
    domain::{Domain, build_tree},
    foundation::error::{ExpError, ExpResult, ensure},
    node::{Node, NodeCore, Sample, Shared, TreeShape, shared},
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ArrayConfig {
    /// One coordinate tuple per sample; all tuples share one length.
    pub data: Vec<Vec<f64>>,
}

impl ArrayConfig {
    pub fn new(data: Vec<Vec<f64>>) -> Self {
        Self { data }
    }

    /// One-dimensional samples, each forwarded as a singleton payload.
    pub fn from_scalars(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            data: values.into_iter().map(|v| vec![v]).collect(),
        }
    }
}

/// Discrete domain over literal data points.
#[derive(Debug)]
pub struct ArrayDomain {
    core: NodeCore,
    data: Vec<Vec<f64>>,
    shape: TreeShape,
    built: bool,
}

impl ArrayDomain {
    pub fn new(config: ArrayConfig) -> ExpResult<Shared<Self>> {
        let data = config.data;
        ensure(!data.is_empty(), "Array data must be non-empty")?;
        let width = data[0].len();
        ensure(width > 0, "Array data points must have at least one coordinate")?;
        if let Some((i, bad)) = data.iter().enumerate().find(|(_, p)| p.len() != width) {
            return Err(ExpError::validation(format!(
                "Array data point {i} has {} coordinates, expected {width}",
                bad.len()
            )));
        }
        let shape = TreeShape::new(vec![data.len()]);
        Ok(shared(Self {
            core: NodeCore::default(),
            data,
            shape,
            built: false,
        }))
    }

    pub fn data(&self) -> &[Vec<f64>] {
        &self.data
    }

    pub fn num_dimensions(&self) -> usize {
        self.data[0].len()
    }
}

impl Node for ArrayDomain {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "Array"
    }

    fn evaluate_self(&mut self, sample: Sample<'_>) {
        tracing::warn!(
            index = sample.index,
            "Array is a tree root; ignoring evaluation from a parent"
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

impl Domain for ArrayDomain {
    fn shape(&self) -> &TreeShape {
        &self.shape
    }

    fn is_built(&self) -> bool {
        self.built
    }

    #[tracing::instrument(skip(self), fields(len = self.data.len()))]
    fn build(&mut self) -> ExpResult<()> {
        self.built = true;
        build_tree(&self.core, &self.shape, "Array")
    }

    fn activate(&mut self, t: f64) {
        if !self.built {
            let _ = self.build();
        }
        for (i, point) in self.data.iter().enumerate() {
            self.core.evaluate_children(Sample::new(i, t, point));
        }
        self.on_after_activation();
    }
}
