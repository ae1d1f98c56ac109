use serde::{Deserialize, Serialize};

use crate::{
    anim::{Animatable, Value},
    foundation::{
        color::Rgb,
        error::{ExpError, ExpResult},
        math::{Vec3, cross, normalize, sub, vec3_from_slice},
    },
    node::{Node, NodeCore, Sample, Shared, TreeShape, shared},
    output::{BufferAttribute, OutputState, warn_overflow, warn_unsized},
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub color: Rgb,
    pub opacity: f64,
    pub show_grid: bool,
    /// Grid cells along each UV axis.
    pub grid_squares: u32,
    pub grid_color: Rgb,
    pub grid_line_width: f64,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            color: Rgb::from_hex(0x55aa55),
            opacity: 1.0,
            show_grid: true,
            grid_squares: 16,
            grid_color: Rgb::from_hex(0x3b763b),
            grid_line_width: 0.15,
        }
    }
}

/// Per-vertex normals of a row-major `rows x cols` grid of `xyz` positions.
///
/// Tangents are forward differences, switching to backward differences on
/// the last row and column. Degenerate cells fall back to `+z`.
pub fn compute_grid_normals(positions: &[f32], rows: usize, cols: usize) -> Vec<Vec3> {
    let at = |i: usize, j: usize| -> Vec3 {
        let k = (i * cols + j) * 3;
        match positions.get(k..k + 3) {
            Some(p) => [f64::from(p[0]), f64::from(p[1]), f64::from(p[2])],
            None => [0.0; 3],
        }
    };
    let mut normals = Vec::with_capacity(rows * cols);
    for i in 0..rows {
        for j in 0..cols {
            let du = if i + 1 < rows {
                sub(at(i + 1, j), at(i, j))
            } else {
                sub(at(i, j), at(i - 1, j))
            };
            let dv = if j + 1 < cols {
                sub(at(i, j + 1), at(i, j))
            } else {
                sub(at(i, j), at(i, j - 1))
            };
            normals.push(normalize(cross(du, dv)).unwrap_or([0.0, 0.0, 1.0]));
        }
    }
    normals
}

/// Double-sided triangle list for a `rows x cols` grid.
pub fn grid_indices(rows: usize, cols: usize) -> Vec<u32> {
    let mut indices = Vec::with_capacity(rows.saturating_sub(1) * cols.saturating_sub(1) * 12);
    for i in 0..rows.saturating_sub(1) {
        for j in 0..cols.saturating_sub(1) {
            let a = (i * cols + j) as u32;
            let b = a + 1;
            let c = a + cols as u32;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b, b, c, d]);
            indices.extend_from_slice(&[a, b, c, b, d, c]);
        }
    }
    indices
}

/// Triangulated grid over a 2-D domain.
///
/// Topology and UVs are built once; each activation updates positions and
/// recomputes normals.
#[derive(Debug)]
pub struct SurfaceOutput {
    core: NodeCore,
    config: SurfaceConfig,
    positions: BufferAttribute,
    normals: BufferAttribute,
    uvs: BufferAttribute,
    indices: Vec<u32>,
    rows: usize,
    cols: usize,
    state: OutputState,
    cursor: usize,
    warned_overflow: bool,
    warned_unsized: bool,
}

impl SurfaceOutput {
    pub fn new(config: SurfaceConfig) -> Shared<Self> {
        shared(Self {
            core: NodeCore::default(),
            config,
            positions: BufferAttribute::new(3, 0),
            normals: BufferAttribute::new(3, 0),
            uvs: BufferAttribute::new(2, 0),
            indices: Vec::new(),
            rows: 0,
            cols: 0,
            state: OutputState::Unsized,
            cursor: 0,
            warned_overflow: false,
            warned_unsized: false,
        })
    }

    pub fn material(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn positions(&self) -> &BufferAttribute {
        &self.positions
    }

    pub fn normals(&self) -> &BufferAttribute {
        &self.normals
    }

    pub fn uvs(&self) -> &BufferAttribute {
        &self.uvs
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn grid_size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn size_for(&mut self, shape: &TreeShape) -> ExpResult<()> {
        let (rows, cols) = match shape.item_dimensions[..] {
            [rows, cols] if rows >= 2 && cols >= 2 => (rows, cols),
            _ => {
                self.state = OutputState::Inert;
                return Err(ExpError::tree(format!(
                    "SurfaceOutput needs a 2-D domain with at least 2x2 samples, got {:?}",
                    shape.item_dimensions
                )));
            }
        };
        let count = rows * cols;
        self.rows = rows;
        self.cols = cols;
        self.positions = BufferAttribute::new(3, count);
        self.normals = BufferAttribute::new(3, count);
        self.uvs = BufferAttribute::new(2, count);
        for i in 0..rows {
            for j in 0..cols {
                let u = j as f64 / (cols - 1) as f64;
                let v = i as f64 / (rows - 1) as f64;
                self.uvs.set_item(i * cols + j, &[u, v]);
            }
        }
        self.uvs.mark_dirty();
        self.indices = grid_indices(rows, cols);
        self.cursor = 0;
        self.state = OutputState::Ready;
        tracing::debug!(rows, cols, triangles = self.indices.len() / 3, "surface topology built");
        Ok(())
    }

    fn ensure_ready(&mut self) -> bool {
        if self.state == OutputState::Unsized {
            warn_unsized("SurfaceOutput", &mut self.warned_unsized);
        }
        self.state == OutputState::Ready
    }

    fn recompute_normals(&mut self) {
        let normals = compute_grid_normals(self.positions.data(), self.rows, self.cols);
        for (i, n) in normals.iter().enumerate() {
            self.normals.set_item(i, n);
        }
        self.normals.mark_dirty();
    }
}

impl Node for SurfaceOutput {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "SurfaceOutput"
    }

    fn finalize(&mut self, shape: &TreeShape) -> ExpResult<()> {
        self.core.set_shape(shape.clone());
        self.size_for(shape)
    }

    fn evaluate_self(&mut self, sample: Sample<'_>) {
        if !self.ensure_ready() {
            return;
        }
        if self.positions.set_item(self.cursor, &vec3_from_slice(sample.payload)) {
            self.cursor += 1;
        } else {
            warn_overflow("SurfaceOutput", &mut self.warned_overflow, self.positions.count());
        }
    }

    fn on_after_activation(&mut self) {
        self.core.after_activation_children();
        if self.state == OutputState::Ready {
            self.positions.mark_dirty();
            self.recompute_normals();
        }
        self.cursor = 0;
    }
}

impl Animatable for SurfaceOutput {
    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "color" => Some(self.config.color.into()),
            "grid_color" => Some(self.config.grid_color.into()),
            "opacity" => Some(Value::Number(self.config.opacity)),
            "show_grid" => Some(Value::Flag(self.config.show_grid)),
            "grid_squares" => Some(Value::Number(f64::from(self.config.grid_squares))),
            "grid_line_width" => Some(Value::Number(self.config.grid_line_width)),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: Value) -> ExpResult<()> {
        match (name, value) {
            ("color", Value::Vector(v)) => self.config.color = Rgb::from_slice(&v)?,
            ("grid_color", Value::Vector(v)) => self.config.grid_color = Rgb::from_slice(&v)?,
            ("opacity", Value::Number(v)) => self.config.opacity = v,
            ("show_grid", Value::Flag(v)) => self.config.show_grid = v,
            ("grid_squares", Value::Number(v)) => {
                // Tweens pass through fractional counts; keep at least one cell.
                self.config.grid_squares = v.round().max(1.0) as u32;
            }
            ("grid_line_width", Value::Number(v)) => self.config.grid_line_width = v.max(0.0),
            (name, value) => {
                return Err(ExpError::animation(format!(
                    "SurfaceOutput cannot set '{name}' from a {}",
                    value.kind()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_grid_normals_point_along_z() {
        let (rows, cols) = (3, 4);
        let mut positions = Vec::new();
        for i in 0..rows {
            for j in 0..cols {
                positions.extend_from_slice(&[i as f32, j as f32 * 0.5, 0.0]);
            }
        }
        for n in compute_grid_normals(&positions, rows, cols) {
            assert_eq!(n[0], 0.0);
            assert_eq!(n[1], 0.0);
            assert_eq!(n[2].abs(), 1.0);
        }
    }

    #[test]
    fn topology_is_double_sided() {
        let idx = grid_indices(2, 3);
        // Two quads, two faces each, both windings.
        assert_eq!(idx.len(), 2 * 2 * 2 * 3);
        assert_eq!(&idx[..6], &[0, 3, 1, 1, 3, 4]);
        assert_eq!(&idx[6..12], &[0, 1, 3, 1, 4, 3]);
    }

    #[test]
    fn requires_a_two_dimensional_domain() {
        for dims in [vec![16], vec![2, 1], vec![2, 2, 2]] {
            let out = SurfaceOutput::new(SurfaceConfig::default());
            let mut s = out.borrow_mut();
            assert!(s.finalize(&TreeShape::new(dims)).is_err());
            s.evaluate_self(Sample::new(0, 0.0, &[1.0, 2.0, 3.0]));
            assert!(s.positions().data().is_empty());
        }
    }

    #[test]
    fn uvs_span_the_unit_square() {
        let out = SurfaceOutput::new(SurfaceConfig::default());
        let mut s = out.borrow_mut();
        s.finalize(&TreeShape::new(vec![3, 2])).unwrap();
        assert_eq!(s.uvs().item(0), Some(&[0.0, 0.0][..]));
        assert_eq!(s.uvs().item(5), Some(&[1.0, 1.0][..]));
        assert_eq!(s.grid_size(), (3, 2));
    }

    #[test]
    fn grid_settings_are_animatable() {
        let out = SurfaceOutput::new(SurfaceConfig::default());
        let mut s = out.borrow_mut();
        assert_eq!(s.get_property("grid_squares"), Some(Value::Number(16.0)));
        s.set_property("grid_squares", Value::Number(7.6)).unwrap();
        s.set_property("grid_line_width", Value::Number(0.4)).unwrap();
        assert_eq!(s.material().grid_squares, 8);
        assert_eq!(s.get_property("grid_line_width"), Some(Value::Number(0.4)));
        s.set_property("grid_squares", Value::Number(0.0)).unwrap();
        assert_eq!(s.material().grid_squares, 1);
        assert!(s.set_property("grid_squares", Value::Flag(true)).is_err());
    }
}
