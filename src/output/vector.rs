use std::f64::consts::FRAC_PI_2;

use serde::Serialize;

use crate::{
    anim::{Animatable, Value},
    foundation::{
        error::ExpResult,
        math::{Vec3, add, length, normalize, scale, sub},
    },
    node::{Node, NodeCore, Sample, Shared, TreeShape, shared},
    output::{
        BufferAttribute, Material,
        line::{LineConfig, LineOutput},
    },
};

pub type VectorConfig = LineConfig;

/// Cone placed at the end of one scanline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Arrowhead {
    pub position: Vec3,
    /// Unit direction of the last segment.
    pub direction: Vec3,
    /// In `[0, 1]`; shrinks smoothly to 0 as the segment vanishes.
    pub scale: f64,
}

impl Default for Arrowhead {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            direction: [0.0, 1.0, 0.0],
            scale: 0.0,
        }
    }
}

/// Arrowhead size for a vector of the given length.
pub fn arrowhead_scale(vector_length: f64) -> f64 {
    let clamped = (vector_length / 3.0).clamp(0.0, 1.0);
    (1.0 - clamped).acos() / FRAC_PI_2
}

/// A line output with one arrowhead per scanline, at its last sample.
#[derive(Debug)]
pub struct VectorOutput {
    line: LineOutput,
    arrowheads: Vec<Arrowhead>,
    previous: Vec3,
}

impl VectorOutput {
    pub fn new(config: VectorConfig) -> Shared<Self> {
        shared(Self {
            line: LineOutput::unshared(config),
            arrowheads: Vec::new(),
            previous: [0.0; 3],
        })
    }

    pub fn line(&self) -> &LineOutput {
        &self.line
    }

    pub fn positions(&self) -> &BufferAttribute {
        self.line.positions()
    }

    pub fn material(&self) -> &Material {
        self.line.material()
    }

    pub fn arrowheads(&self) -> &[Arrowhead] {
        &self.arrowheads
    }

    fn size_arrowheads(&mut self, shape: &TreeShape) {
        let n = shape.last_dimension_length().max(1);
        self.arrowheads = vec![Arrowhead::default(); shape.num_calls_per_activation / n];
    }
}

impl Node for VectorOutput {
    fn core(&self) -> &NodeCore {
        self.line.core()
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        self.line.core_mut()
    }

    fn kind(&self) -> &'static str {
        "VectorOutput"
    }

    fn finalize(&mut self, shape: &TreeShape) -> ExpResult<()> {
        self.line.core_mut().set_shape(shape.clone());
        self.line.size_for(shape, "VectorOutput")?;
        self.size_arrowheads(shape);
        Ok(())
    }

    fn evaluate_self(&mut self, sample: Sample<'_>) {
        let Some((first, p)) = self.line.write_sample(sample, "VectorOutput") else {
            return;
        };

        let n = self.line.scanline_length();
        if first == n - 1 {
            let line_number = sample.index / n;
            match self.arrowheads.get_mut(line_number) {
                Some(arrow) => {
                    let delta = sub(p, self.previous);
                    arrow.position = p;
                    match normalize(delta) {
                        Some(dir) => {
                            arrow.direction = dir;
                            arrow.scale = arrowhead_scale(length(delta) * (n - 1) as f64);
                        }
                        None => arrow.scale = 0.0,
                    }
                }
                None => tracing::warn!(line_number, "VectorOutput has no arrowhead for this scanline"),
            }
        }
        self.previous = p;
    }

    fn on_after_activation(&mut self) {
        self.line.on_after_activation();
    }
}

impl Animatable for VectorOutput {
    fn get_property(&self, name: &str) -> Option<Value> {
        self.line.get_property(name)
    }

    fn set_property(&mut self, name: &str, value: Value) -> ExpResult<()> {
        self.line.set_material_property("VectorOutput", name, value)
    }
}

/// Point where an arrowhead of `arrow` would place its tip.
pub fn arrow_tip(arrow: &Arrowhead, size: f64) -> Vec3 {
    add(arrow.position, scale(arrow.direction, size * arrow.scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrowhead_follows_last_segment() {
        let v = VectorOutput::new(VectorConfig::default());
        let mut out = v.borrow_mut();
        out.finalize(&TreeShape::new(vec![2, 2])).unwrap();
        out.evaluate_self(Sample::new(0, 0.0, &[0.0, 0.0, 0.0]));
        out.evaluate_self(Sample::new(1, 0.0, &[0.0, 3.0, 0.0]));
        out.evaluate_self(Sample::new(2, 0.0, &[1.0, 1.0, 0.0]));
        out.evaluate_self(Sample::new(3, 0.0, &[2.0, 1.0, 0.0]));
        let heads = out.arrowheads();
        assert_eq!(heads.len(), 2);
        assert_eq!(heads[0].position, [0.0, 3.0, 0.0]);
        assert_eq!(heads[0].direction, [0.0, 1.0, 0.0]);
        assert!((heads[0].scale - 1.0).abs() < 1e-12);
        assert_eq!(heads[1].direction, [1.0, 0.0, 0.0]);
        assert!(heads[1].scale > 0.0 && heads[1].scale < 1.0);
    }

    #[test]
    fn zero_length_keeps_direction_and_hides() {
        let v = VectorOutput::new(VectorConfig::default());
        let mut out = v.borrow_mut();
        out.finalize(&TreeShape::new(vec![2])).unwrap();
        out.evaluate_self(Sample::new(0, 0.0, &[0.0, 0.0, 0.0]));
        out.evaluate_self(Sample::new(1, 0.0, &[1.0, 0.0, 0.0]));
        out.on_after_activation();
        out.evaluate_self(Sample::new(0, 0.0, &[1.0, 0.0, 0.0]));
        out.evaluate_self(Sample::new(1, 0.0, &[1.0, 0.0, 0.0]));
        let head = out.arrowheads()[0];
        assert_eq!(head.direction, [1.0, 0.0, 0.0]);
        assert_eq!(head.scale, 0.0);
        assert_eq!(arrow_tip(&head, 2.0), head.position);
    }

    #[test]
    fn scale_is_monotonic_in_length() {
        assert_eq!(arrowhead_scale(0.0), 0.0);
        assert!(arrowhead_scale(0.5) < arrowhead_scale(1.0));
        assert!((arrowhead_scale(10.0) - 1.0).abs() < 1e-12);
    }
}
