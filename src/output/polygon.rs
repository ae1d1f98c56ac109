use crate::{
    anim::{Animatable, Value},
    foundation::{
        error::ExpResult,
        math::{Vec3, vec3_from_slice},
    },
    node::{Node, NodeCore, Sample, Shared, TreeShape, shared},
    output::{BufferAttribute, Material, triangulate::triangulate_polygon},
};

pub type PolygonConfig = Material;

/// Treats each activation's samples as one closed planar polygon.
///
/// Unlike the other outputs the face list is rebuilt on every activation,
/// since the outline may change shape from frame to frame.
#[derive(Debug)]
pub struct ClosedPolygonOutput {
    core: NodeCore,
    material: Material,
    points: Vec<Vec3>,
    positions: BufferAttribute,
    indices: Vec<u32>,
    index_version: u64,
}

impl ClosedPolygonOutput {
    pub fn new(config: PolygonConfig) -> Shared<Self> {
        shared(Self {
            core: NodeCore::default(),
            material: config,
            points: Vec::new(),
            positions: BufferAttribute::new(3, 0),
            indices: Vec::new(),
            index_version: 0,
        })
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn positions(&self) -> &BufferAttribute {
        &self.positions
    }

    /// Triangle list from the last completed activation.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn index_version(&self) -> u64 {
        self.index_version
    }
}

impl Node for ClosedPolygonOutput {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "ClosedPolygonOutput"
    }

    fn finalize(&mut self, shape: &TreeShape) -> ExpResult<()> {
        self.core.set_shape(shape.clone());
        self.points.reserve(shape.num_calls_per_activation);
        Ok(())
    }

    fn evaluate_self(&mut self, sample: Sample<'_>) {
        self.points.push(vec3_from_slice(sample.payload));
    }

    fn on_after_activation(&mut self) {
        self.core.after_activation_children();
        self.positions.resize(self.points.len());
        for (i, p) in self.points.iter().enumerate() {
            self.positions.set_item(i, p);
        }
        self.positions.mark_dirty();

        match triangulate_polygon(&self.points) {
            Ok(indices) => self.indices = indices,
            Err(err) => {
                tracing::warn!(points = self.points.len(), %err, "polygon triangulation failed");
                self.indices.clear();
            }
        }
        self.index_version += 1;
        self.points.clear();
    }
}

impl Animatable for ClosedPolygonOutput {
    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "color" | "opacity" => self.material.get_property(name),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: Value) -> ExpResult<()> {
        self.material.set_property("ClosedPolygonOutput", name, value)
    }
}
