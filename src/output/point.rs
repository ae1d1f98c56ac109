use serde::{Deserialize, Serialize};

use crate::{
    anim::{Animatable, Value},
    foundation::{
        color::Rgb,
        error::ExpResult,
        math::{Vec3, vec3_from_slice},
    },
    node::{Node, NodeCore, Sample, Shared, TreeShape, shared},
    output::Material,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointConfig {
    pub color: Rgb,
    pub opacity: f64,
    /// Point diameter in world units.
    pub width: f64,
}

impl Default for PointConfig {
    fn default() -> Self {
        Self {
            color: Rgb::default(),
            opacity: 1.0,
            width: 1.0,
        }
    }
}

impl From<PointConfig> for Material {
    fn from(c: PointConfig) -> Self {
        Material {
            color: c.color,
            opacity: c.opacity,
            width: c.width,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PointInstance {
    pub position: Vec3,
    pub scale: f64,
    pub visible: bool,
}

/// One instance per sample, all sharing a single material.
///
/// The pool grows on demand; instances past this activation's cursor are hidden.
#[derive(Debug)]
pub struct PointOutput {
    core: NodeCore,
    material: Material,
    points: Vec<PointInstance>,
    cursor: usize,
}

impl PointOutput {
    pub fn new(config: PointConfig) -> Shared<Self> {
        shared(Self {
            core: NodeCore::default(),
            material: config.into(),
            points: Vec::new(),
            cursor: 0,
        })
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn points(&self) -> &[PointInstance] {
        &self.points
    }

    pub fn visible_points(&self) -> impl Iterator<Item = &PointInstance> {
        self.points.iter().filter(|p| p.visible)
    }

    fn grow_to(&mut self, len: usize) {
        while self.points.len() < len {
            self.points.push(PointInstance {
                position: [0.0; 3],
                scale: self.material.width,
                visible: false,
            });
        }
    }
}

impl Node for PointOutput {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "PointOutput"
    }

    fn finalize(&mut self, shape: &TreeShape) -> ExpResult<()> {
        self.core.set_shape(shape.clone());
        self.grow_to(shape.num_calls_per_activation);
        Ok(())
    }

    fn evaluate_self(&mut self, sample: Sample<'_>) {
        self.grow_to(self.cursor + 1);
        let width = self.material.width;
        let point = &mut self.points[self.cursor];
        point.position = vec3_from_slice(sample.payload);
        point.scale = width;
        point.visible = true;
        self.cursor += 1;
    }

    fn on_after_activation(&mut self) {
        self.core.after_activation_children();
        for point in &mut self.points[self.cursor..] {
            point.visible = false;
        }
        self.cursor = 0;
    }
}

impl Animatable for PointOutput {
    fn get_property(&self, name: &str) -> Option<Value> {
        self.material.get_property(name)
    }

    fn set_property(&mut self, name: &str, value: Value) -> ExpResult<()> {
        self.material.set_property("PointOutput", name, value)?;
        if name == "width" {
            let width = self.material.width;
            self.points.iter_mut().for_each(|p| p.scale = width);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_grows_and_hides_leftovers() {
        let out = PointOutput::new(PointConfig::default());
        let mut p = out.borrow_mut();
        for i in 0..3 {
            p.evaluate_self(Sample::new(i, 0.0, &[i as f64, 1.0]));
        }
        p.on_after_activation();
        assert_eq!(p.points().len(), 3);
        assert_eq!(p.points()[2].position, [2.0, 1.0, 0.0]);

        p.evaluate_self(Sample::new(0, 0.0, &[5.0]));
        p.on_after_activation();
        assert_eq!(p.visible_points().count(), 1);
    }

    #[test]
    fn width_animates_every_instance() {
        let out = PointOutput::new(PointConfig::default());
        let mut p = out.borrow_mut();
        p.finalize(&TreeShape::new(vec![4])).unwrap();
        p.set_property("width", Value::Number(0.25)).unwrap();
        assert!(p.points().iter().all(|pt| pt.scale == 0.25));
    }
}
