//! Duplicate point merging and degenerate face removal

use crate::float_types::{Real, tolerance};
use crate::mesh::{HashMap, Mesh, Polygon};
use nalgebra::Point3;

/// Hashable key of a point: its exact bit pattern, or its cell on a grid of
/// pitch `merge_tolerance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PointKey {
    Exact([u64; 3]),
    Quantized([i64; 3]),
}

fn point_key(p: &Point3<Real>, merge_tolerance: Real) -> PointKey {
    if merge_tolerance > 0.0 {
        PointKey::Quantized([
            (p.x / merge_tolerance).round() as i64,
            (p.y / merge_tolerance).round() as i64,
            (p.z / merge_tolerance).round() as i64,
        ])
    } else {
        // +0.0 and -0.0 are the same point
        let bits = |c: Real| (c + 0.0).to_bits() as u64;
        PointKey::Exact([bits(p.x), bits(p.y), bits(p.z)])
    }
}

impl Mesh {
    /// Merge coincident points, drop faces that collapse or have no area, then
    /// drop points no face uses.
    ///
    /// With `merge_tolerance == 0` only bit-identical points merge. Surviving
    /// points keep the order of their first occurrence.
    pub fn cleaned(&self, merge_tolerance: Real) -> Mesh {
        let mut first: HashMap<PointKey, usize> = HashMap::with_capacity(self.points.len());
        let mut remap = Vec::with_capacity(self.points.len());
        let mut points = Vec::new();
        let mut normals = self.normals.as_ref().map(|_| Vec::new());

        for (i, p) in self.points.iter().enumerate() {
            let next = points.len();
            let index = *first.entry(point_key(p, merge_tolerance)).or_insert(next);
            if index == next {
                points.push(*p);
                if let (Some(out), Some(src)) = (normals.as_mut(), self.normals.as_ref()) {
                    out.push(src[i]);
                }
            }
            remap.push(index);
        }

        let min_area = merge_tolerance.max(tolerance()).powi(2);
        let polygons = self
            .polygons
            .iter()
            .filter_map(|polygon| {
                let mut indices: Vec<usize> = polygon.indices.iter().map(|&i| remap[i]).collect();
                indices.dedup();
                while indices.len() > 1 && indices.first() == indices.last() {
                    indices.pop();
                }

                let mut distinct = indices.clone();
                distinct.sort_unstable();
                distinct.dedup();
                if distinct.len() < 3 {
                    return None;
                }

                let polygon = Polygon::new(indices);
                (polygon.area(&points) > min_area).then_some(polygon)
            })
            .collect();

        Mesh {
            points,
            polygons,
            normals,
        }
        .remove_unused_points()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::test_shapes::cube_quads;
    use approx::assert_relative_eq;

    /// The cube's triangles with every corner duplicated per face, as a
    /// triangle soup comes out of an extractor.
    fn soup() -> Mesh {
        let cube = cube_quads().triangulate();
        let mut points = Vec::new();
        let mut polygons = Vec::new();
        for polygon in &cube.polygons {
            let start = points.len();
            points.extend(polygon.indices.iter().map(|&i| cube.points[i]));
            polygons.push(Polygon::triangle(start, start + 1, start + 2));
        }
        Mesh::new(points, polygons)
    }

    #[test]
    fn duplicates_merge_to_shared_points() {
        let soup = soup();
        assert_eq!(soup.point_count(), 36);
        let clean = soup.cleaned(0.0);
        assert_eq!(clean.point_count(), 8);
        assert_eq!(clean.cell_count(), 12);
        assert_relative_eq!(clean.signed_volume(), 1.0, epsilon = 1e-12);
        // first occurrence order
        assert_eq!(clean.points[0], soup.points[0]);
    }

    #[test]
    fn collapsed_and_flat_faces_are_dropped() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(9.0, 9.0, 9.0),
        ];
        let mesh = Mesh::new(
            points,
            vec![
                Polygon::triangle(0, 1, 3),
                // collapses onto an edge after merging
                Polygon::triangle(0, 1, 2),
                // collinear
                Polygon::triangle(0, 1, 4),
            ],
        );
        let clean = mesh.cleaned(0.0);
        assert_eq!(clean.cell_count(), 1);
        assert_eq!(clean.point_count(), 3);
        assert_eq!(clean.polygons[0].indices, vec![0, 1, 2]);
    }

    #[test]
    fn tolerance_merges_nearby_points() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0 + 1e-4, 1e-4, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let mesh = Mesh::new(
            points,
            vec![Polygon::triangle(0, 1, 2), Polygon::triangle(3, 4, 2)],
        );
        assert_eq!(mesh.cleaned(0.0).point_count(), 5);
        let merged = mesh.cleaned(1e-2);
        assert_eq!(merged.point_count(), 4);
        assert_eq!(merged.polygons[1].indices, vec![1, 3, 2]);
    }

    #[test]
    fn negative_zero_is_zero() {
        let mesh = Mesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(-0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![Polygon::triangle(0, 2, 3), Polygon::triangle(1, 2, 3)],
        );
        assert_eq!(mesh.cleaned(0.0).point_count(), 3);
    }
}
