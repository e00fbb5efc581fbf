//! Polygon → triangle conversion

use crate::float_types::Real;
use crate::mesh::{Mesh, Polygon};
use nalgebra::Point3;

impl Polygon {
    /// Fan-triangulate this polygon. Triangles come back unchanged; anything
    /// with fewer than three indices yields nothing.
    pub fn triangulate(&self, points: &[Point3<Real>]) -> Vec<[usize; 3]> {
        let n = self.indices.len();
        if n < 3 {
            return Vec::new();
        }
        if n == 3 {
            return vec![[self.indices[0], self.indices[1], self.indices[2]]];
        }

        let start = self.find_best_fan_start(points);
        let apex = self.indices[start];
        (1..n - 1)
            .map(|i| {
                [
                    apex,
                    self.indices[(start + i) % n],
                    self.indices[(start + i + 1) % n],
                ]
            })
            .collect()
    }

    /// Fan apex that minimises the largest angle over the fan's triangles.
    fn find_best_fan_start(&self, points: &[Point3<Real>]) -> usize {
        let n = self.indices.len();
        let mut best_start = 0;
        let mut best_score = Real::MAX;

        for start in 0..n {
            let v0 = points[self.indices[start]];
            let mut max_angle: Real = 0.0;
            for i in 1..n - 1 {
                let v1 = points[self.indices[(start + i) % n]];
                let v2 = points[self.indices[(start + i + 1) % n]];
                for angle in triangle_angles(v0, v1, v2) {
                    // NaN comes from a zero-length side and counts as the worst case
                    max_angle = if angle.is_nan() { Real::MAX } else { max_angle.max(angle) };
                }
            }
            if max_angle < best_score {
                best_score = max_angle;
                best_start = start;
            }
        }

        best_start
    }
}

/// The three interior angles of triangle `abc`
fn triangle_angles(a: Point3<Real>, b: Point3<Real>, c: Point3<Real>) -> [Real; 3] {
    let ab = b - a;
    let ac = c - a;
    let bc = c - b;

    let angle = |u: nalgebra::Vector3<Real>, v: nalgebra::Vector3<Real>| {
        (u.dot(&v) / (u.norm() * v.norm())).clamp(-1.0, 1.0).acos()
    };

    [angle(ab, ac), angle(-ab, bc), angle(-ac, -bc)]
}

impl Mesh {
    /// Every polygon replaced by triangles, in face order. Points are shared, not copied.
    pub fn triangulate(&self) -> Mesh {
        let polygons = self
            .polygons
            .iter()
            .flat_map(|p| p.triangulate(&self.points))
            .map(|[a, b, c]| Polygon::triangle(a, b, c))
            .collect();

        Mesh {
            points: self.points.clone(),
            polygons,
            normals: self.normals.clone(),
        }
    }

    pub fn is_triangulated(&self) -> bool {
        self.polygons.iter().all(|p| p.len() == 3)
    }
}
