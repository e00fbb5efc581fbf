//! Quadric error metric.
//!
//! A quadric is the symmetric 4×4 matrix `Σ p pᵀ` over planes `p = [a b c d]`
//! with unit normals, so that `vᵀ Q v` with `v = [x y z 1]` is the sum of
//! squared distances from `(x, y, z)` to those planes.

use crate::float_types::{Real, tolerance};
use nalgebra::{Matrix4, Point3, Vector3, Vector4};
use std::ops::{Add, AddAssign};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric {
    matrix: Matrix4<Real>,
}

impl Default for Quadric {
    fn default() -> Self {
        Self {
            matrix: Matrix4::zeros(),
        }
    }
}

impl Quadric {
    /// Quadric of the plane `normal · x + d = 0`. `normal` must be unit length.
    #[must_use]
    pub fn from_plane(normal: &Vector3<Real>, d: Real) -> Self {
        let p = Vector4::new(normal.x, normal.y, normal.z, d);
        Self {
            matrix: p * p.transpose(),
        }
    }

    /// Quadric of the plane through `a`, `b`, `c`, or `None` for a degenerate triangle.
    #[must_use]
    pub fn from_triangle(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Option<Self> {
        let normal = (b - a).cross(&(c - a)).try_normalize(Real::EPSILON)?;
        Some(Self::from_plane(&normal, -normal.dot(&a.coords)))
    }

    /// Quadric of the plane through edge `ab` perpendicular to a face with `face_normal`.
    /// Keeps collapses from pulling an open boundary inward.
    #[must_use]
    pub fn boundary_constraint(
        a: &Point3<Real>,
        b: &Point3<Real>,
        face_normal: &Vector3<Real>,
    ) -> Option<Self> {
        let normal = (b - a).cross(face_normal).try_normalize(Real::EPSILON)?;
        Some(Self::from_plane(&normal, -normal.dot(&a.coords)))
    }

    #[must_use]
    pub fn scaled(&self, weight: Real) -> Self {
        Self {
            matrix: self.matrix * weight,
        }
    }

    /// Sum of squared distances from `p` to the planes of this quadric.
    #[must_use]
    pub fn evaluate(&self, p: &Point3<Real>) -> Real {
        let v = p.to_homogeneous();
        v.dot(&(self.matrix * v))
    }

    /// Point minimising the error, or `None` when the 3×3 system is singular
    /// (for instance when all planes are parallel).
    #[must_use]
    pub fn optimal_point(&self) -> Option<Point3<Real>> {
        let a = self.matrix.fixed_view::<3, 3>(0, 0).into_owned();
        if a.determinant().abs() < tolerance() {
            return None;
        }
        let b = -self.matrix.fixed_view::<3, 1>(0, 3).into_owned();
        a.try_inverse().map(|inverse| Point3::from(inverse * b))
    }
}

impl AddAssign<&Quadric> for Quadric {
    fn add_assign(&mut self, other: &Quadric) {
        self.matrix += other.matrix;
    }
}

impl Add for Quadric {
    type Output = Quadric;

    fn add(mut self, other: Quadric) -> Quadric {
        self += &other;
        self
    }
}
