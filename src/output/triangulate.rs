//! Planar polygon triangulation: project to 2-D, then clip ears.

use kurbo::{Point, Vec2};

use crate::foundation::{
    error::{ExpError, ExpResult},
    math::Vec3,
};

const EPS: f64 = 1e-12;

/// Newell's method; unnormalized, zero for degenerate input.
pub fn newell_normal(points: &[Vec3]) -> Vec3 {
    let mut n = [0.0; 3];
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        n[0] += (a[1] - b[1]) * (a[2] + b[2]);
        n[1] += (a[2] - b[2]) * (a[0] + b[0]);
        n[2] += (a[0] - b[0]) * (a[1] + b[1]);
    }
    n
}

/// Drops the coordinate along which the polygon's normal is largest.
pub fn project_to_plane(points: &[Vec3]) -> Vec<Point> {
    let n = newell_normal(points).map(f64::abs);
    let drop = if n[0] > n[1] && n[0] > n[2] {
        0
    } else if n[1] > n[2] {
        1
    } else {
        2
    };
    points
        .iter()
        .map(|p| match drop {
            0 => Point::new(p[1], p[2]),
            1 => Point::new(p[2], p[0]),
            _ => Point::new(p[0], p[1]),
        })
        .collect()
}

pub fn signed_area(points: &[Point]) -> f64 {
    let mut twice = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        twice += a.to_vec2().cross(b.to_vec2());
    }
    twice / 2.0
}

fn strictly_inside(p: Point, a: Point, b: Point, c: Point) -> bool {
    let side = |from: Point, to: Point| -> f64 { Vec2::cross(to - from, p - from) };
    side(a, b) > EPS && side(b, c) > EPS && side(c, a) > EPS
}

/// Ear clipping over a simple polygon; indices refer to `points`.
pub fn ear_clip(points: &[Point]) -> ExpResult<Vec<[usize; 3]>> {
    if points.len() < 3 {
        return Err(ExpError::validation(format!(
            "a polygon needs at least 3 points, got {}",
            points.len()
        )));
    }
    let area = signed_area(points);
    if area.abs() < EPS {
        return Err(ExpError::validation("polygon has zero area"));
    }

    let mut remaining: Vec<usize> = (0..points.len()).collect();
    if area < 0.0 {
        remaining.reverse();
    }

    let mut triangles = Vec::with_capacity(points.len() - 2);
    while remaining.len() > 3 {
        let len = remaining.len();
        let mut clipped = false;
        for k in 0..len {
            let prev = remaining[(k + len - 1) % len];
            let cur = remaining[k];
            let next = remaining[(k + 1) % len];
            let (a, b, c) = (points[prev], points[cur], points[next]);
            let turn = Vec2::cross(b - a, c - b);
            if turn.abs() <= EPS {
                // Collinear vertex: drop it without emitting a sliver.
                remaining.remove(k);
                clipped = true;
                break;
            }
            if turn < 0.0 {
                continue;
            }
            let blocked = remaining
                .iter()
                .filter(|&&i| i != prev && i != cur && i != next)
                .any(|&i| strictly_inside(points[i], a, b, c));
            if !blocked {
                triangles.push([prev, cur, next]);
                remaining.remove(k);
                clipped = true;
                break;
            }
        }
        if !clipped {
            return Err(ExpError::validation(
                "polygon could not be triangulated (self-intersecting?)",
            ));
        }
    }
    if let [a, b, c] = remaining[..] {
        let turn = Vec2::cross(points[b] - points[a], points[c] - points[b]);
        if turn.abs() > EPS {
            triangles.push([a, b, c]);
        }
    }
    Ok(triangles)
}

/// Flat triangle index list for a planar polygon in 3-D.
pub fn triangulate_polygon(points: &[Vec3]) -> ExpResult<Vec<u32>> {
    let projected = project_to_plane(points);
    let triangles = ear_clip(&projected)?;
    Ok(triangles
        .iter()
        .flat_map(|t| t.iter().map(|&i| i as u32))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_becomes_two_triangles() {
        let square = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let idx = triangulate_polygon(&square).unwrap();
        assert_eq!(idx.len(), 6);
    }

    #[test]
    fn clockwise_input_is_handled() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 0.0),
        ];
        assert!(signed_area(&pts) < 0.0);
        assert_eq!(ear_clip(&pts).unwrap().len(), 2);
    }

    #[test]
    fn concave_polygon_avoids_the_notch() {
        // Arrow-like shape with a reflex vertex at index 3.
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(2.0, 1.0),
            Point::new(0.0, 4.0),
        ];
        let tris = ear_clip(&pts).unwrap();
        assert_eq!(tris.len(), 3);
        let total: f64 = tris
            .iter()
            .map(|t| signed_area(&[pts[t[0]], pts[t[1]], pts[t[2]]]))
            .sum();
        assert!((total - signed_area(&pts)).abs() < 1e-9);
    }

    #[test]
    fn vertical_plane_drops_the_dominant_axis() {
        let wall = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]];
        let n = newell_normal(&wall);
        assert!(n[1].abs() > n[0].abs() && n[1].abs() > n[2].abs());
        assert_eq!(triangulate_polygon(&wall).unwrap().len(), 6);
    }

    #[test]
    fn degenerate_input_is_an_error() {
        assert!(triangulate_polygon(&[[0.0; 3], [1.0, 0.0, 0.0]]).is_err());
        let line = [[0.0; 3], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        assert!(triangulate_polygon(&line).is_err());
    }
}
