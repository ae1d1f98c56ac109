pub type Vec3 = [f64; 3];

pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(a: Vec3, k: f64) -> Vec3 {
    [a[0] * k, a[1] * k, a[2] * k]
}

pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn length(a: Vec3) -> f64 {
    dot(a, a).sqrt()
}

/// Unit vector along `a`, or `None` when `a` has no usable length.
pub fn normalize(a: Vec3) -> Option<Vec3> {
    let len = length(a);
    if len.is_finite() && len > f64::EPSILON {
        Some(scale(a, 1.0 / len))
    } else {
        None
    }
}

/// Reads up to three leading coordinates, treating missing ones as 0.
pub fn vec3_from_slice(v: &[f64]) -> Vec3 {
    let at = |i: usize| v.get(i).copied().unwrap_or(0.0);
    [at(0), at(1), at(2)]
}

/// Component-wise `t * to + (1 - t) * from`.
///
/// When lengths differ the shared prefix is blended and the remaining tail is
/// taken from the longer input unchanged.
pub fn lerp_vectors(from: &[f64], to: &[f64], t: f64) -> Vec<f64> {
    let n = from.len().max(to.len());
    (0..n)
        .map(|i| match (from.get(i), to.get(i)) {
            (Some(a), Some(b)) => t * b + (1.0 - t) * a,
            (Some(v), None) | (None, Some(v)) => *v,
            (None, None) => 0.0,
        })
        .collect()
}

pub fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}
