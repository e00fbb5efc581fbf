//! Windowed-sinc mesh smoothing

use crate::float_types::{PI, Real, tolerance};
use crate::mesh::Mesh;
use crate::params::SmoothingParams;
use nalgebra::{Point3, Vector3};

/// How a point takes part in smoothing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PointClass {
    /// Never moves.
    Fixed,
    /// Moves towards the average of these neighbours.
    Free(Vec<usize>),
}

/// Newton-Raphson steps spent on the cut-off offset.
const OFFSET_ITERATIONS: usize = 50;

/// Filter weights `σ_0..=σ_n` of the windowed-sinc low-pass filter.
///
/// The pass band `k_pb` maps to the angle `θ_pb = acos(1 - k_pb / 2)`. The
/// ideal low-pass response with cut-off `θ_pb + offset` is expanded in
/// Chebyshev polynomials and tapered with a Hamming window; the offset is
/// found by Newton-Raphson so that the response at `k_pb` is one. The weights
/// are finally scaled to sum to one, which keeps the response at zero
/// frequency exact.
pub fn filter_coefficients(iterations: u32, pass_band: Real) -> Vec<Real> {
    let n = iterations as usize;
    let theta_pb = (1.0 - 0.5 * pass_band.clamp(0.0, 2.0)).acos();

    let window: Vec<Real> = (0..=n)
        .map(|i| 0.54 + 0.46 * ((i as Real) * PI / (n as Real + 1.0)).cos())
        .collect();
    // T_i(cos θ_pb) = cos(i θ_pb)
    let chebyshev: Vec<Real> = (0..=n).map(|i| ((i as Real) * theta_pb).cos()).collect();

    // sinc coefficient of term i for cut-off theta, and its derivative
    let sinc = |i: usize, theta: Real| -> (Real, Real) {
        if i == 0 {
            (theta / PI, 1.0 / PI)
        } else {
            let i = i as Real;
            (2.0 * (i * theta).sin() / (i * PI), 2.0 * (i * theta).cos() / PI)
        }
    };

    let mut offset: Real = 0.0;
    for _ in 0..OFFSET_ITERATIONS {
        let theta = (theta_pb + offset).clamp(0.0, PI);
        let (mut f, mut df) = (0.0, 0.0);
        for i in 0..=n {
            let (c, dc) = sinc(i, theta);
            f += window[i] * c * chebyshev[i];
            df += window[i] * dc * chebyshev[i];
        }
        if (f - 1.0).abs() < tolerance() || df.abs() < Real::EPSILON {
            break;
        }
        offset -= (f - 1.0) / df;
    }

    let theta = (theta_pb + offset).clamp(0.0, PI);
    let mut sigma: Vec<Real> = (0..=n).map(|i| window[i] * sinc(i, theta).0).collect();

    let sum: Real = sigma.iter().sum();
    if sum.abs() > Real::EPSILON {
        sigma.iter_mut().for_each(|s| *s /= sum);
    }
    tracing::trace!(%offset, "windowed-sinc cut-off offset");
    sigma
}

impl Mesh {
    /// Classify every point from the edge structure.
    ///
    /// - boundary edges (one face) pin their points unless boundary smoothing
    ///   is on, in which case the point slides along its two boundary neighbours
    /// - non-manifold edges (three or more faces) pin their points unless
    ///   non-manifold smoothing is on
    /// - with feature-edge smoothing, edges whose dihedral angle exceeds the
    ///   feature angle restrict their points to the feature line
    ///
    /// A constrained point with other than two constraint neighbours is pinned.
    fn classify_points(&self, params: &SmoothingParams) -> Vec<PointClass> {
        let n = self.points.len();
        let neighbors = self.point_neighbors();
        let mut pinned = vec![false; n];
        let mut constraint: Vec<Option<Vec<usize>>> = vec![None; n];

        let face_normals: Vec<Option<Vector3<Real>>> = self
            .polygons
            .iter()
            .map(|p| p.normal(&self.points))
            .collect();
        let cos_feature = params.feature_angle.to_radians().cos();

        fn constrain(a: usize, b: usize, constraint: &mut [Option<Vec<usize>>]) {
            constraint[a].get_or_insert_with(Vec::new).push(b);
            constraint[b].get_or_insert_with(Vec::new).push(a);
        }

        for (&(a, b), faces) in &self.edge_faces() {
            match faces.len() {
                1 if params.boundary_smoothing => constrain(a, b, &mut constraint),
                1 => {
                    pinned[a] = true;
                    pinned[b] = true;
                },
                2 if params.feature_edge_smoothing => {
                    if let (Some(n1), Some(n2)) = (face_normals[faces[0]], face_normals[faces[1]]) {
                        if n1.dot(&n2) < cos_feature {
                            constrain(a, b, &mut constraint);
                        }
                    }
                },
                2 => {},
                _ if params.non_manifold_smoothing => {},
                _ => {
                    pinned[a] = true;
                    pinned[b] = true;
                },
            }
        }

        (0..n)
            .map(|i| {
                if pinned[i] || neighbors[i].is_empty() {
                    return PointClass::Fixed;
                }
                match constraint[i].take() {
                    Some(mut line) => {
                        line.sort_unstable();
                        line.dedup();
                        if line.len() == 2 {
                            PointClass::Free(line)
                        } else {
                            PointClass::Fixed
                        }
                    },
                    None => PointClass::Free(neighbors[i].clone()),
                }
            })
            .collect()
    }

    /// **Windowed-sinc smoothing**
    ///
    /// With the uniform averaging operator `W` (`W x` is the mean of the
    /// neighbours of each free point, `x` itself for a fixed point) and the
    /// half step `M = (I + W) / 2` the filter evaluates
    /// ```text
    /// x_0     = x
    /// x_1     = M x_0
    /// x_{k+1} = 2 M x_k - x_{k-1}
    /// result  = Σ σ_k x_k
    /// ```
    /// which is the Chebyshev expansion of a low-pass transfer function in the
    /// Laplacian eigenvalue `k = 1 - λ(W)`, flat up to the pass band, so the
    /// surface does not shrink the way plain Laplacian smoothing does.
    ///
    /// Fixed points keep their exact coordinates. Connectivity is unchanged.
    /// Point normals are dropped since points move.
    pub fn smoothed(&self, params: &SmoothingParams) -> Mesh {
        if params.iterations == 0 || self.is_empty() {
            return self.clone();
        }

        let classes = self.classify_points(params);
        let sigma = filter_coefficients(params.iterations, params.pass_band);

        // optional mapping into a unit box around the origin
        let (center, scale) = match self.bounding_box() {
            Some((lo, hi)) if params.normalize_coordinates => {
                let extent = (hi - lo).max();
                let scale = if extent > 0.0 { 1.0 / extent } else { 1.0 };
                (nalgebra::center(&lo, &hi), scale)
            },
            _ => (Point3::origin(), 1.0),
        };

        let x0: Vec<Vector3<Real>> = self
            .points
            .iter()
            .map(|p| (p - center) * scale)
            .collect();

        let half_step = |x: &[Vector3<Real>]| -> Vec<Vector3<Real>> {
            classes
                .iter()
                .zip(x)
                .map(|(class, &xi)| match class {
                    PointClass::Fixed => xi,
                    PointClass::Free(nbrs) => {
                        let mean = nbrs.iter().map(|&j| x[j]).sum::<Vector3<Real>>()
                            / nbrs.len() as Real;
                        0.5 * (xi + mean)
                    },
                })
                .collect()
        };

        let mut result: Vec<Vector3<Real>> = x0.iter().map(|x| x * sigma[0]).collect();
        let mut previous = x0;
        let mut current = half_step(&previous);
        accumulate(&mut result, &current, sigma[1]);

        for &s in &sigma[2..] {
            let next: Vec<Vector3<Real>> = half_step(&current)
                .into_iter()
                .zip(&previous)
                .map(|(m, p)| 2.0 * m - p)
                .collect();
            accumulate(&mut result, &next, s);
            previous = std::mem::replace(&mut current, next);
        }

        let points = result
            .into_iter()
            .zip(&classes)
            .zip(&self.points)
            .map(|((x, class), original)| match class {
                PointClass::Fixed => *original,
                PointClass::Free(_) => center + x / scale,
            })
            .collect();

        Mesh {
            points,
            polygons: self.polygons.clone(),
            normals: None,
        }
    }
}

fn accumulate(result: &mut [Vector3<Real>], x: &[Vector3<Real>], weight: Real) {
    for (r, xi) in result.iter_mut().zip(x) {
        *r += xi * weight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::test_shapes::{cube_quads, sphere};
    use approx::assert_relative_eq;

    /// `n × n` points on the z = 0 plane, two triangles per cell.
    fn grid(n: usize) -> Mesh {
        let points = (0..n * n)
            .map(|i| Point3::new((i % n) as Real, (i / n) as Real, 0.0))
            .collect();
        let mut triangles = Vec::new();
        for y in 0..n - 1 {
            for x in 0..n - 1 {
                let i = y * n + x;
                triangles.push([i, i + 1, i + n + 1]);
                triangles.push([i, i + n + 1, i + n]);
            }
        }
        Mesh::from_triangles(points, &triangles)
    }

    fn on_boundary(i: usize, n: usize) -> bool {
        let (x, y) = (i % n, i / n);
        x == 0 || y == 0 || x == n - 1 || y == n - 1
    }

    fn radial_spread(mesh: &Mesh) -> (Real, Real) {
        let radii: Vec<Real> = mesh.points.iter().map(|p| p.coords.norm()).collect();
        let mean = radii.iter().sum::<Real>() / radii.len() as Real;
        let var = radii.iter().map(|r| (r - mean).powi(2)).sum::<Real>() / radii.len() as Real;
        (mean, var.sqrt())
    }

    /// Transfer function `Σ σ_i T_i(1 - k / 2)` at Laplacian eigenvalue `k`.
    fn response(sigma: &[Real], k: Real) -> Real {
        let x = 1.0 - 0.5 * k;
        let (mut previous, mut current) = (1.0, x);
        let mut total = sigma[0];
        for (i, &s) in sigma.iter().enumerate().skip(1) {
            if i > 1 {
                let next = 2.0 * x * current - previous;
                previous = std::mem::replace(&mut current, next);
            }
            total += s * current;
        }
        total
    }

    #[test]
    fn filter_passes_up_to_the_pass_band() {
        let sigma = filter_coefficients(15, 0.01);
        assert_eq!(sigma.len(), 16);
        assert_relative_eq!(sigma.iter().sum::<Real>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(response(&sigma, 0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(response(&sigma, 0.01), 1.0, epsilon = 5e-3);
        assert!(response(&sigma, 0.005) > 0.99);
        // high frequencies are cut
        assert!(response(&sigma, 1.0).abs() < 0.01);
        assert!(response(&sigma, 2.0).abs() < 0.01);

        let wide = filter_coefficients(20, 0.1);
        assert_relative_eq!(response(&wide, 0.1), 1.0, epsilon = 5e-3);
    }

    #[test]
    fn zero_iterations_is_identity() {
        let mesh = sphere(2.0, 2);
        let params = SmoothingParams::default().with_iterations(0);
        assert_eq!(mesh.smoothed(&params), mesh);
    }

    #[test]
    fn pinned_boundary_and_flat_plane_stay_put() {
        let n = 7;
        let mut mesh = grid(n);
        for (i, p) in mesh.points.iter_mut().enumerate() {
            if !on_boundary(i, n) {
                p.z = if i % 2 == 0 { 0.3 } else { -0.3 };
            }
        }
        let max_before = mesh.points.iter().map(|p| p.z.abs()).fold(0.0, Real::max);

        let smooth = mesh.smoothed(&SmoothingParams::default());
        // bit for bit, not merely close
        for i in (0..n * n).filter(|&i| on_boundary(i, n)) {
            assert_eq!(smooth.points[i], mesh.points[i]);
        }
        let max_after = smooth.points.iter().map(|p| p.z.abs()).fold(0.0, Real::max);
        assert!(max_after < max_before);

        let flat = grid(n).smoothed(&SmoothingParams::default());
        assert!(flat.points.iter().all(|p| p.z.abs() < 1e-12));
    }

    #[test]
    fn boundary_smoothing_slides_along_the_boundary() {
        let n = 5;
        let mut mesh = grid(n);
        // bump a boundary point off the x axis, within the plane
        mesh.points[2].y = -0.4;
        let params = SmoothingParams::default().with_boundary_smoothing(true);
        let smooth = mesh.smoothed(&params);
        assert!(smooth.points[2].y > -0.4);
        // corners have two boundary neighbours too and stay on the plane
        assert!(smooth.points.iter().all(|p| p.z.abs() < 1e-12));
        assert_eq!(smooth.polygons, mesh.polygons);
    }

    #[test]
    fn noisy_sphere_gets_rounder_without_collapsing() {
        let mut mesh = sphere(10.0, 3);
        for (i, p) in mesh.points.iter_mut().enumerate() {
            let bump = if i % 2 == 0 { 1.04 } else { 0.96 };
            *p = Point3::from(p.coords * bump);
        }
        let (mean_before, spread_before) = radial_spread(&mesh);

        let smooth = mesh.smoothed(&SmoothingParams::default());
        let (mean_after, spread_after) = radial_spread(&smooth);
        assert!(spread_after < 0.5 * spread_before);
        assert!(mean_after > 0.95 * mean_before, "{mean_before} -> {mean_after}");
    }

    #[test]
    fn smoothing_commutes_with_translation() {
        let mesh = sphere(1.0, 2);
        let offset = Vector3::new(100.0, -40.0, 7.0);
        let mut moved = mesh.clone();
        moved.points.iter_mut().for_each(|p| *p += offset);

        let params = SmoothingParams::default();
        let a = mesh.smoothed(&params);
        let b = moved.smoothed(&params);
        for (p, q) in a.points.iter().zip(&b.points) {
            assert_relative_eq!(p + offset, *q, epsilon = 1e-9);
        }
    }

    #[test]
    fn sharp_cube_edges_are_features() {
        let cube = cube_quads().triangulate();
        let params = SmoothingParams::default().with_feature_edge_smoothing(true, 60.0);
        // every corner touches three feature edges, so all points are pinned
        let classes = cube.classify_points(&params);
        assert!(classes.iter().all(|c| *c == PointClass::Fixed));
        let smooth = cube.smoothed(&params);
        assert_eq!(smooth.points, cube.points);

        let loose = cube.classify_points(&SmoothingParams::default());
        assert!(loose.iter().all(|c| matches!(c, PointClass::Free(_))));
    }
}
