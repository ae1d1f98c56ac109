//! Leaf nodes that accumulate evaluated coordinates into renderer buffers.
//!
//! Outputs are sized when their domain finalizes the tree. Attaching a node
//! marks the domain stale, so the next activation finalizes again. Samples
//! reaching an output that was never finalized are dropped with a warning, as
//! are writes past capacity.

pub mod array_sink;
pub mod line;
pub mod point;
pub mod polygon;
pub mod surface;
pub mod triangulate;
pub mod vector;

use serde::{Deserialize, Serialize};

use crate::{
    anim::Value,
    foundation::{
        color::Rgb,
        error::{ExpError, ExpResult},
    },
};

/// Flat `f32` vertex attribute handed to an external renderer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BufferAttribute {
    data: Vec<f32>,
    item_size: usize,
    needs_update: bool,
    version: u64,
}

impl BufferAttribute {
    pub fn new(item_size: usize, count: usize) -> Self {
        Self {
            data: vec![0.0; item_size * count],
            item_size,
            needs_update: false,
            version: 0,
        }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn count(&self) -> usize {
        self.data.len().checked_div(self.item_size).unwrap_or(0)
    }

    pub fn item(&self, i: usize) -> Option<&[f32]> {
        let start = i * self.item_size;
        self.data.get(start..start + self.item_size)
    }

    /// Writes one item, zero-padding or truncating `values` to `item_size`.
    /// Returns `false` when `i` is past the end.
    pub fn set_item(&mut self, i: usize, values: &[f64]) -> bool {
        let start = i * self.item_size;
        let Some(slot) = self.data.get_mut(start..start + self.item_size) else {
            return false;
        };
        for (k, dst) in slot.iter_mut().enumerate() {
            *dst = values.get(k).copied().unwrap_or(0.0) as f32;
        }
        true
    }

    pub fn fill_items(&mut self, values: &[f64]) {
        for i in 0..self.count() {
            self.set_item(i, values);
        }
    }

    pub fn resize(&mut self, count: usize) {
        self.data.resize(self.item_size * count, 0.0);
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn mark_dirty(&mut self) {
        self.needs_update = true;
        self.version += 1;
    }

    /// Renderer side: consumes the dirty flag.
    pub fn take_update(&mut self) -> bool {
        std::mem::take(&mut self.needs_update)
    }
}

/// Appearance shared by line, vector, point and polygon outputs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub color: Rgb,
    pub opacity: f64,
    pub width: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Rgb::default(),
            opacity: 1.0,
            width: 5.0,
        }
    }
}

impl Material {
    pub fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "color" => Some(self.color.into()),
            "opacity" => Some(Value::Number(self.opacity)),
            "width" => Some(Value::Number(self.width)),
            _ => None,
        }
    }

    pub fn set_property(&mut self, owner: &str, name: &str, value: Value) -> ExpResult<()> {
        match (name, &value) {
            ("color", Value::Vector(v)) => self.color = Rgb::from_slice(v)?,
            ("opacity", Value::Number(v)) => self.opacity = *v,
            ("width", Value::Number(v)) => self.width = *v,
            ("color" | "opacity" | "width", other) => {
                return Err(ExpError::animation(format!(
                    "{owner}.{name} cannot be set from a {}",
                    other.kind()
                )));
            }
            _ => {
                return Err(ExpError::animation(format!(
                    "{owner} has no property '{name}'"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputState {
    /// Not finalized yet; samples are dropped.
    Unsized,
    Ready,
    /// Sizing failed; samples are ignored.
    Inert,
}

pub(crate) fn warn_unsized(kind: &'static str, warned: &mut bool) {
    if !*warned {
        tracing::warn!(kind, "output was never finalized by a domain; dropping samples");
        *warned = true;
    }
}

pub(crate) fn warn_overflow(kind: &'static str, warned: &mut bool, capacity: usize) {
    if !*warned {
        tracing::warn!(kind, capacity, "output buffer is full; dropping writes");
        *warned = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_item_pads_and_bounds_checks() {
        let mut attr = BufferAttribute::new(3, 2);
        assert!(attr.set_item(1, &[1.0, 2.0]));
        assert_eq!(attr.item(1), Some(&[1.0, 2.0, 0.0][..]));
        assert!(!attr.set_item(2, &[1.0]));
        assert_eq!(attr.count(), 2);
    }

    #[test]
    fn dirty_flag_bumps_version() {
        let mut attr = BufferAttribute::new(2, 1);
        attr.mark_dirty();
        attr.mark_dirty();
        assert_eq!(attr.version(), 2);
        assert!(attr.take_update());
        assert!(!attr.needs_update());
    }

    #[test]
    fn material_properties_round_trip_through_values() {
        let mut m = Material::default();
        m.set_property("Line", "color", Value::Vector(vec![1.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(m.color, Rgb::new(1.0, 0.0, 0.0));
        assert!(m.set_property("Line", "width", Value::Flag(true)).is_err());
        assert!(m.set_property("Line", "glow", Value::Number(1.0)).is_err());
        assert_eq!(m.get_property("opacity"), Some(Value::Number(1.0)));
    }
}
