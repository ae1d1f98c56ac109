use crate::{
    anim::{Animatable, Value},
    foundation::{
        error::{ExpError, ExpResult},
        math::{Vec3, vec3_from_slice},
    },
    node::{Node, NodeCore, Sample, Shared, TreeShape, shared},
    output::{BufferAttribute, Material, OutputState, warn_overflow, warn_unsized},
};

pub type LineConfig = Material;

/// Disconnected segments along the fastest-varying axis.
///
/// Each scanline of `N` samples becomes `N - 1` segments with two vertices
/// each, so every vertex can carry its own color. Inner samples are written
/// twice (end of one segment, start of the next); scanline ends once, which
/// keeps independent scanlines from being joined.
#[derive(Debug)]
pub struct LineOutput {
    core: NodeCore,
    material: Material,
    positions: BufferAttribute,
    colors: BufferAttribute,
    state: OutputState,
    scanline: usize,
    cursor: usize,
    warned_overflow: bool,
    warned_unsized: bool,
}

impl LineOutput {
    pub fn new(config: LineConfig) -> Shared<Self> {
        shared(Self::unshared(config))
    }

    pub(crate) fn unshared(material: Material) -> Self {
        Self {
            core: NodeCore::default(),
            material,
            positions: BufferAttribute::new(3, 0),
            colors: BufferAttribute::new(3, 0),
            state: OutputState::Unsized,
            scanline: 0,
            cursor: 0,
            warned_overflow: false,
            warned_unsized: false,
        }
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn positions(&self) -> &BufferAttribute {
        &self.positions
    }

    pub fn colors(&self) -> &BufferAttribute {
        &self.colors
    }

    pub fn state(&self) -> OutputState {
        self.state
    }

    /// Samples per scanline.
    pub fn scanline_length(&self) -> usize {
        self.scanline
    }

    pub(crate) fn size_for(&mut self, shape: &TreeShape, kind: &'static str) -> ExpResult<()> {
        let n = shape.last_dimension_length();
        if n < 2 {
            self.state = OutputState::Inert;
            return Err(ExpError::tree(format!(
                "{kind} needs at least 2 samples per scanline, got {n}"
            )));
        }
        let scanlines = shape.num_calls_per_activation / n;
        let capacity = scanlines * 2 * (n - 1);
        self.scanline = n;
        self.positions = BufferAttribute::new(3, capacity);
        self.colors = BufferAttribute::new(3, capacity);
        self.colors.fill_items(&self.material.color.to_array());
        self.colors.mark_dirty();
        self.cursor = 0;
        self.state = OutputState::Ready;
        tracing::debug!(kind, scanlines, capacity, "line buffers allocated");
        Ok(())
    }

    /// `false` until a finalize pass sized the buffers.
    pub(crate) fn ensure_ready(&mut self, kind: &'static str) -> bool {
        if self.state == OutputState::Unsized {
            warn_unsized(kind, &mut self.warned_unsized);
        }
        self.state == OutputState::Ready
    }

    fn push_vertex(&mut self, p: Vec3, kind: &'static str) {
        if self.positions.set_item(self.cursor, &p) {
            self.cursor += 1;
        } else {
            warn_overflow(kind, &mut self.warned_overflow, self.positions.count());
        }
    }

    /// Writes one sample; returns its scanline position and point.
    pub(crate) fn write_sample(&mut self, sample: Sample<'_>, kind: &'static str) -> Option<(usize, Vec3)> {
        if !self.ensure_ready(kind) {
            return None;
        }
        let p = vec3_from_slice(sample.payload);
        let n = self.scanline;
        let first = sample.index % n;
        self.push_vertex(p, kind);
        if first != 0 && first != n - 1 {
            self.push_vertex(p, kind);
        }
        Some((first, p))
    }

    pub(crate) fn end_activation(&mut self) {
        if self.state == OutputState::Ready {
            self.positions.mark_dirty();
        }
        self.cursor = 0;
    }

    pub(crate) fn set_material_property(
        &mut self,
        kind: &'static str,
        name: &str,
        value: Value,
    ) -> ExpResult<()> {
        self.material.set_property(kind, name, value)?;
        if name == "color" {
            self.colors.fill_items(&self.material.color.to_array());
            self.colors.mark_dirty();
        }
        Ok(())
    }
}

impl Node for LineOutput {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "LineOutput"
    }

    fn finalize(&mut self, shape: &TreeShape) -> ExpResult<()> {
        self.core.set_shape(shape.clone());
        self.size_for(shape, "LineOutput")
    }

    fn evaluate_self(&mut self, sample: Sample<'_>) {
        self.write_sample(sample, "LineOutput");
    }

    fn on_after_activation(&mut self) {
        self.core.after_activation_children();
        self.end_activation();
    }
}

impl Animatable for LineOutput {
    fn get_property(&self, name: &str) -> Option<Value> {
        self.material.get_property(name)
    }

    fn set_property(&mut self, name: &str, value: Value) -> ExpResult<()> {
        self.set_material_property("LineOutput", name, value)
    }
}
