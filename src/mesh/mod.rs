//! Indexed polygon mesh and the post-processing stages that operate on it.
//!
//! Each stage lives in its own file as an `impl Mesh` block and returns a new
//! [`Mesh`], leaving the input untouched.

use crate::errors::{GenerationError, GenerationResult};
use crate::float_types::Real;
use crate::transform::AffineTransform;
use nalgebra::{Point3, Vector3};

#[cfg(feature = "hashmap")]
pub(crate) use hashbrown::HashMap;
#[cfg(not(feature = "hashmap"))]
pub(crate) use std::collections::HashMap;

pub mod clean;
pub mod decimate;
pub mod normals;
pub mod quadric;
pub mod smoothing;
pub mod triangulate;

/// Undirected edge key with the smaller index first.
pub(crate) const fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

/// A face given by indices into the mesh point array, in winding order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Polygon {
    pub indices: Vec<usize>,
}

impl Polygon {
    pub const fn new(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn triangle(a: usize, b: usize, c: usize) -> Self {
        Self {
            indices: vec![a, b, c],
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Reverses winding order
    pub fn flip(&mut self) {
        self.indices.reverse();
    }

    /// Return an iterator over paired indices each forming an edge of the polygon
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.indices
            .iter()
            .zip(self.indices.iter().cycle().skip(1))
            .map(|(&a, &b)| (a, b))
    }

    /// Newell's area vector: direction is the face normal, length twice the area.
    pub fn area_vector(&self, points: &[Point3<Real>]) -> Vector3<Real> {
        self.edges().fold(Vector3::zeros(), |acc, (a, b)| {
            acc + points[a].coords.cross(&points[b].coords)
        })
    }

    /// Unit normal, or `None` for a degenerate face.
    pub fn normal(&self, points: &[Point3<Real>]) -> Option<Vector3<Real>> {
        self.area_vector(points).try_normalize(Real::EPSILON)
    }

    pub fn area(&self, points: &[Point3<Real>]) -> Real {
        0.5 * self.area_vector(points).norm()
    }

    pub fn centroid(&self, points: &[Point3<Real>]) -> Point3<Real> {
        let sum: Vector3<Real> = self.indices.iter().map(|&i| points[i].coords).sum();
        Point3::from(sum / self.indices.len().max(1) as Real)
    }
}

/// Points plus variable-length polygons referencing them.
///
/// `normals`, when present, holds one unit normal per point and is
/// invalidated (set to `None`) by any stage that moves or renumbers points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub points: Vec<Point3<Real>>,
    pub polygons: Vec<Polygon>,
    pub normals: Option<Vec<Vector3<Real>>>,
}

impl Mesh {
    pub const fn new(points: Vec<Point3<Real>>, polygons: Vec<Polygon>) -> Self {
        Self {
            points,
            polygons,
            normals: None,
        }
    }

    pub fn from_triangles(points: Vec<Point3<Real>>, triangles: &[[usize; 3]]) -> Self {
        let polygons = triangles
            .iter()
            .map(|&[a, b, c]| Polygon::triangle(a, b, c))
            .collect();
        Self::new(points, polygons)
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn cell_count(&self) -> usize {
        self.polygons.len()
    }

    /// A mesh without faces carries no geometry, whatever points it holds.
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn point_array_size(&self) -> usize {
        self.points.len() * 3
    }

    /// `Σ (1 + n)` over all faces: every face is stored as its length followed by its indices.
    pub fn cell_array_size(&self) -> usize {
        self.polygons.iter().map(|p| 1 + p.len()).sum()
    }

    /// Write `x, y, z` per point into `buffer`, returning the number of values written.
    pub fn write_points(&self, buffer: &mut [f32]) -> GenerationResult<usize> {
        let size = self.point_array_size();
        if buffer.len() < size {
            return Err(GenerationError::InvalidInput(format!(
                "point buffer holds {} values, expected {size}",
                buffer.len()
            )));
        }
        for (chunk, p) in buffer.chunks_exact_mut(3).zip(&self.points) {
            chunk[0] = p.x as f32;
            chunk[1] = p.y as f32;
            chunk[2] = p.z as f32;
        }
        Ok(size)
    }

    /// Write each face as `[n, i0, .., i(n-1)]` into `buffer`, returning the number of values written.
    pub fn write_cells(&self, buffer: &mut [i32]) -> GenerationResult<usize> {
        let size = self.cell_array_size();
        if buffer.len() < size {
            return Err(GenerationError::InvalidInput(format!(
                "cell buffer holds {} values, expected {size}",
                buffer.len()
            )));
        }

        let to_i32 = |value: usize| {
            i32::try_from(value).map_err(|_| {
                GenerationError::InvalidInput(format!("index {value} does not fit in a 32-bit cell array"))
            })
        };

        let mut cursor = 0;
        for polygon in &self.polygons {
            buffer[cursor] = to_i32(polygon.len())?;
            cursor += 1;
            for &index in &polygon.indices {
                buffer[cursor] = to_i32(index)?;
                cursor += 1;
            }
        }
        Ok(cursor)
    }

    pub fn flat_points(&self) -> Vec<f32> {
        let mut buffer = vec![0.0; self.point_array_size()];
        // the buffer is sized exactly
        let _ = self.write_points(&mut buffer);
        buffer
    }

    pub fn flat_cells(&self) -> GenerationResult<Vec<i32>> {
        let mut buffer = vec![0; self.cell_array_size()];
        self.write_cells(&mut buffer)?;
        Ok(buffer)
    }

    /// Check that every index is in range and every coordinate finite.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.points.len();
        for (face, polygon) in self.polygons.iter().enumerate() {
            if let Some(&bad) = polygon.indices.iter().find(|&&i| i >= n) {
                return Err(format!("face {face} references point {bad} of {n}"));
            }
        }
        if let Some(i) = self
            .points
            .iter()
            .position(|p| !p.coords.iter().all(|c| c.is_finite()))
        {
            return Err(format!("point {i} is not finite"));
        }
        if let Some(normals) = &self.normals {
            if normals.len() != n {
                return Err(format!("{} normals for {n} points", normals.len()));
            }
        }
        Ok(())
    }

    pub fn bounding_box(&self) -> Option<(Point3<Real>, Point3<Real>)> {
        let first = self.points.first()?;
        Some(self.points.iter().fold((*first, *first), |(lo, hi), p| {
            (lo.inf(p), hi.sup(p))
        }))
    }

    /// Compute the centroid of the points
    pub fn centroid(&self) -> Point3<Real> {
        if self.points.is_empty() {
            return Point3::origin();
        }
        let sum: Vector3<Real> = self.points.iter().map(|p| p.coords).sum();
        Point3::from(sum / self.points.len() as Real)
    }

    /// Signed enclosed volume; positive when faces wind counter-clockwise seen from outside.
    pub fn signed_volume(&self) -> Real {
        let reference = self.centroid();
        signed_volume_about(&self.points, self.polygons.iter(), &reference)
    }

    /// Faces incident to every undirected edge.
    pub fn edge_faces(&self) -> HashMap<(usize, usize), Vec<usize>> {
        let mut map: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (face, polygon) in self.polygons.iter().enumerate() {
            for (a, b) in polygon.edges() {
                map.entry(edge_key(a, b)).or_default().push(face);
            }
        }
        map
    }

    /// Sorted, deduplicated neighbour list for each point.
    pub fn point_neighbors(&self) -> Vec<Vec<usize>> {
        let mut neighbors = vec![Vec::new(); self.points.len()];
        for polygon in &self.polygons {
            for (a, b) in polygon.edges() {
                if a != b {
                    neighbors[a].push(b);
                    neighbors[b].push(a);
                }
            }
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }
        neighbors
    }

    /// Drop points no face references, keeping the remaining points in order.
    pub fn remove_unused_points(&self) -> Mesh {
        let mut remap = vec![usize::MAX; self.points.len()];
        for polygon in &self.polygons {
            for &i in &polygon.indices {
                remap[i] = 0;
            }
        }

        let mut points = Vec::new();
        let mut normals = self.normals.as_ref().map(|_| Vec::new());
        for (old, slot) in remap.iter_mut().enumerate() {
            if *slot == 0 {
                *slot = points.len();
                points.push(self.points[old]);
                if let (Some(out), Some(src)) = (normals.as_mut(), self.normals.as_ref()) {
                    out.push(src[old]);
                }
            }
        }

        let polygons = self
            .polygons
            .iter()
            .map(|p| Polygon::new(p.indices.iter().map(|&i| remap[i]).collect()))
            .collect();

        Mesh {
            points,
            polygons,
            normals,
        }
    }

    /// Map every point through `transform`. Normals follow the inverse transpose.
    /// Connectivity is kept as is, even when the transform mirrors.
    pub fn transformed(&self, transform: &AffineTransform) -> Mesh {
        let points = self
            .points
            .iter()
            .map(|p| transform.transform_point(p))
            .collect();

        let normals = match (&self.normals, transform.normal_matrix()) {
            (Some(normals), Some(m)) => Some(
                normals
                    .iter()
                    .map(|n| (m * n).try_normalize(Real::EPSILON).unwrap_or_else(Vector3::zeros))
                    .collect(),
            ),
            _ => None,
        };

        Mesh {
            points,
            polygons: self.polygons.clone(),
            normals,
        }
    }
}

/// Signed volume of the faces in `polygons` measured from `reference`.
pub(crate) fn signed_volume_about<'a>(
    points: &[Point3<Real>],
    polygons: impl Iterator<Item = &'a Polygon>,
    reference: &Point3<Real>,
) -> Real {
    let mut volume = 0.0;
    for polygon in polygons {
        let Some(&first) = polygon.indices.first() else {
            continue;
        };
        let a = points[first] - reference;
        for pair in polygon.indices[1..].windows(2) {
            let b = points[pair[0]] - reference;
            let c = points[pair[1]] - reference;
            volume += a.dot(&b.cross(&c));
        }
    }
    volume / 6.0
}

#[cfg(test)]
pub(crate) mod test_shapes {
    use super::*;

    /// Unit cube as six outward-facing quads.
    pub fn cube_quads() -> Mesh {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let faces = [
            [0, 3, 2, 1],
            [4, 5, 6, 7],
            [0, 1, 5, 4],
            [2, 3, 7, 6],
            [1, 2, 6, 5],
            [0, 4, 7, 3],
        ];
        Mesh::new(
            points,
            faces.iter().map(|f| Polygon::new(f.to_vec())).collect(),
        )
    }

    /// Closed octahedron with outward winding, `subdivisions` rounds of midpoint
    /// refinement projected onto a sphere of `radius`.
    pub fn sphere(radius: Real, subdivisions: usize) -> Mesh {
        let mut points = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
        ];
        let mut triangles: Vec<[usize; 3]> = vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];

        for _ in 0..subdivisions {
            let mut midpoints: std::collections::BTreeMap<(usize, usize), usize> =
                std::collections::BTreeMap::new();
            let mut midpoint = |a: usize, b: usize, points: &mut Vec<Point3<Real>>| {
                *midpoints.entry(edge_key(a, b)).or_insert_with(|| {
                    let m = Point3::from((points[a].coords + points[b].coords).normalize());
                    points.push(m);
                    points.len() - 1
                })
            };
            let mut next = Vec::with_capacity(triangles.len() * 4);
            for [a, b, c] in triangles {
                let ab = midpoint(a, b, &mut points);
                let bc = midpoint(b, c, &mut points);
                let ca = midpoint(c, a, &mut points);
                next.extend([[a, ab, ca], [ab, b, bc], [ca, bc, c], [ab, bc, ca]]);
            }
            triangles = next;
        }

        let points = points.into_iter().map(|p| p * radius).collect();
        Mesh::from_triangles(points, &triangles)
    }
}
