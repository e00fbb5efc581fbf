//! Quadric-error edge-collapse decimation.

use crate::float_types::Real;
use crate::mesh::quadric::Quadric;
use crate::mesh::{Mesh, Polygon, edge_key};
use crate::params::DecimationParams;
use nalgebra::{Point3, Vector3};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, info};

/// An edge collapse candidate in the priority queue.
#[derive(Debug, Clone)]
struct EdgeCollapse {
    cost: Real,
    /// Surviving vertex.
    keep: usize,
    /// Vertex merged into `keep`.
    remove: usize,
    /// Vertex versions at the time the candidate was computed.
    stamps: (u32, u32),
    target: Point3<Real>,
}

impl PartialEq for EdgeCollapse {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EdgeCollapse {}

impl PartialOrd for EdgeCollapse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCollapse {
    fn cmp(&self, other: &Self) -> Ordering {
        // min-heap on cost, ties go to the lower edge so runs are reproducible
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.keep.cmp(&self.keep))
            .then_with(|| other.remove.cmp(&self.remove))
    }
}

/// Working state of one decimation run.
struct Collapser<'a> {
    params: &'a DecimationParams,
    positions: Vec<Point3<Real>>,
    faces: Vec<[usize; 3]>,
    face_alive: Vec<bool>,
    vertex_faces: Vec<Vec<usize>>,
    vertex_alive: Vec<bool>,
    versions: Vec<u32>,
    quadrics: Vec<Quadric>,
    active_faces: usize,
}

impl<'a> Collapser<'a> {
    fn new(mesh: &Mesh, params: &'a DecimationParams) -> Self {
        let faces: Vec<[usize; 3]> = mesh
            .polygons
            .iter()
            .map(|p| [p.indices[0], p.indices[1], p.indices[2]])
            .collect();

        let mut vertex_faces = vec![Vec::new(); mesh.points.len()];
        for (f, face) in faces.iter().enumerate() {
            for &v in face {
                vertex_faces[v].push(f);
            }
        }

        let mut collapser = Self {
            params,
            positions: mesh.points.clone(),
            face_alive: vec![true; faces.len()],
            active_faces: faces.len(),
            faces,
            vertex_faces,
            vertex_alive: vec![true; mesh.points.len()],
            versions: vec![0; mesh.points.len()],
            quadrics: vec![Quadric::default(); mesh.points.len()],
        };
        collapser.compute_quadrics(mesh);
        collapser
    }

    /// Face planes for every vertex, plus weighted constraint planes along open boundaries.
    fn compute_quadrics(&mut self, mesh: &Mesh) {
        for face in &self.faces {
            let [a, b, c] = face.map(|v| self.positions[v]);
            if let Some(q) = Quadric::from_triangle(&a, &b, &c) {
                for &v in face {
                    self.quadrics[v] += &q;
                }
            }
        }

        for (&(a, b), faces) in &mesh.edge_faces() {
            if faces.len() != 1 {
                continue;
            }
            let Some(normal) = mesh.polygons[faces[0]].normal(&self.positions) else {
                continue;
            };
            if let Some(q) =
                Quadric::boundary_constraint(&self.positions[a], &self.positions[b], &normal)
            {
                let q = q.scaled(self.params.boundary_penalty);
                self.quadrics[a] += &q;
                self.quadrics[b] += &q;
            }
        }
    }

    fn live_faces(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.vertex_faces[v]
            .iter()
            .copied()
            .filter(|&f| self.face_alive[f])
    }

    fn neighbors(&self, v: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .live_faces(v)
            .flat_map(|f| self.faces[f])
            .filter(|&u| u != v)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Live faces containing both `a` and `b`.
    fn shared_faces(&self, a: usize, b: usize) -> usize {
        self.live_faces(a)
            .filter(|&f| self.faces[f].contains(&b))
            .count()
    }

    fn is_boundary_vertex(&self, v: usize) -> bool {
        self.neighbors(v)
            .into_iter()
            .any(|u| self.shared_faces(v, u) == 1)
    }

    /// Cheapest placement for the merged vertex of edge `(a, b)`.
    fn candidate(&self, a: usize, b: usize) -> Option<EdgeCollapse> {
        if a == b {
            return None;
        }
        let boundary_edge = self.shared_faces(a, b) == 1;
        if self.params.preserve_boundary
            && (boundary_edge || self.is_boundary_vertex(a) || self.is_boundary_vertex(b))
        {
            return None;
        }

        let (keep, remove) = edge_key(a, b);
        let combined = self.quadrics[keep] + self.quadrics[remove];
        let target = combined.optimal_point().unwrap_or_else(|| {
            let pa = self.positions[keep];
            let pb = self.positions[remove];
            [pa, pb, nalgebra::center(&pa, &pb)]
                .into_iter()
                .min_by(|p, q| combined.evaluate(p).total_cmp(&combined.evaluate(q)))
                .unwrap_or(pa)
        });

        Some(EdgeCollapse {
            cost: combined.evaluate(&target).max(0.0),
            keep,
            remove,
            stamps: (self.versions[keep], self.versions[remove]),
            target,
        })
    }

    fn is_stale(&self, collapse: &EdgeCollapse) -> bool {
        !self.vertex_alive[collapse.keep]
            || !self.vertex_alive[collapse.remove]
            || self.versions[collapse.keep] != collapse.stamps.0
            || self.versions[collapse.remove] != collapse.stamps.1
    }

    /// Link condition, face budget and fold-over test.
    fn is_valid(&self, collapse: &EdgeCollapse) -> bool {
        let (keep, remove) = (collapse.keep, collapse.remove);
        let shared = self.shared_faces(keep, remove);
        if shared == 0 || shared >= self.active_faces {
            return false;
        }

        // the endpoints may only share the apexes of the faces on the edge
        let near_keep = self.neighbors(keep);
        let common = self
            .neighbors(remove)
            .into_iter()
            .filter(|u| *u != keep && near_keep.binary_search(u).is_ok())
            .count();
        if common != shared {
            return false;
        }

        // an interior edge between two boundary vertices would pinch the surface
        if shared == 2 && self.is_boundary_vertex(keep) && self.is_boundary_vertex(remove) {
            return false;
        }

        for v in [keep, remove] {
            for f in self.live_faces(v) {
                let face = self.faces[f];
                if face.contains(&keep) && face.contains(&remove) {
                    continue;
                }
                let before = self.area_vector(&face, None);
                let after = self.area_vector(&face, Some(collapse));
                if after.dot(&before) <= 0.0 {
                    return false;
                }
            }
        }
        true
    }

    fn area_vector(&self, face: &[usize; 3], collapse: Option<&EdgeCollapse>) -> Vector3<Real> {
        let [a, b, c] = face.map(|v| match collapse {
            Some(m) if v == m.keep || v == m.remove => m.target,
            _ => self.positions[v],
        });
        (b - a).cross(&(c - a))
    }

    fn apply(&mut self, collapse: &EdgeCollapse) {
        let (keep, remove) = (collapse.keep, collapse.remove);
        self.positions[keep] = collapse.target;
        let q = self.quadrics[remove];
        self.quadrics[keep] += &q;
        self.vertex_alive[remove] = false;
        self.versions[keep] += 1;
        self.versions[remove] += 1;

        let moved = std::mem::take(&mut self.vertex_faces[remove]);
        for f in moved {
            if !self.face_alive[f] {
                continue;
            }
            if self.faces[f].contains(&keep) {
                self.face_alive[f] = false;
                self.active_faces -= 1;
            } else {
                for v in &mut self.faces[f] {
                    if *v == remove {
                        *v = keep;
                    }
                }
                self.vertex_faces[keep].push(f);
            }
        }
        let alive = &self.face_alive;
        self.vertex_faces[keep].retain(|&f| alive[f]);
    }

    fn into_mesh(self) -> Mesh {
        let polygons = self
            .faces
            .iter()
            .zip(&self.face_alive)
            .filter(|&(_, &alive)| alive)
            .map(|(&[a, b, c], _)| Polygon::triangle(a, b, c))
            .collect();
        Mesh::new(self.positions, polygons).remove_unused_points()
    }
}

impl Mesh {
    /// **Quadric-error decimation**
    ///
    /// Collapses edges in order of increasing quadric error until at most
    /// `ceil(n · (1 - target_reduction))` triangles remain or no valid collapse
    /// is left. Every vertex starts with the planes of its faces; open boundary
    /// edges add perpendicular planes weighted by `boundary_penalty`.
    ///
    /// A collapse is rejected when
    /// - the endpoints share neighbours other than the apexes of the edge's faces
    /// - it would turn any surviving face over
    /// - it would remove the last remaining faces
    ///
    /// Non-triangular input is triangulated first. Unused points are dropped from the result.
    pub fn decimated(&self, params: &DecimationParams) -> Mesh {
        let mesh = if self.is_triangulated() {
            self.clone()
        } else {
            self.triangulate()
        };

        let original = mesh.cell_count();
        let target = params.target_triangles(original);
        if original == 0 || original <= target {
            return Mesh {
                normals: None,
                ..mesh
            };
        }

        info!(original, target, "Starting mesh decimation");

        let mut collapser = Collapser::new(&mesh, params);
        let mut edges: Vec<(usize, usize)> = mesh.edge_faces().into_keys().collect();
        edges.sort_unstable();
        let mut heap: BinaryHeap<EdgeCollapse> = edges
            .into_iter()
            .filter_map(|(a, b)| collapser.candidate(a, b))
            .collect();

        let mut performed = 0usize;
        let mut rejected = 0usize;
        while collapser.active_faces > target {
            let Some(collapse) = heap.pop() else {
                break;
            };
            if collapser.is_stale(&collapse) {
                continue;
            }
            if !collapser.is_valid(&collapse) {
                rejected += 1;
                continue;
            }

            collapser.apply(&collapse);
            performed += 1;

            let keep = collapse.keep;
            for u in collapser.neighbors(keep) {
                heap.extend(collapser.candidate(keep, u));
            }
        }

        debug!(performed, rejected, remaining = collapser.active_faces, "Decimation finished");
        collapser.into_mesh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::test_shapes::sphere;

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

    fn is_closed(mesh: &Mesh) -> bool {
        mesh.edge_faces().values().all(|faces| faces.len() == 2)
    }

    #[test]
    fn sphere_halves_and_stays_closed() {
        let mesh = sphere(5.0, 3);
        assert_eq!(mesh.cell_count(), 512);

        let half = mesh.decimated(&DecimationParams::with_target_reduction(0.5));
        assert!(half.cell_count() <= 256);
        assert!(half.cell_count() > 0);
        assert!(half.validate().is_ok());
        assert!(is_closed(&half));
        assert!(half.signed_volume() > 0.0);
        let ratio = half.signed_volume() / mesh.signed_volume();
        assert!((0.85..1.15).contains(&ratio), "volume ratio {ratio}");
    }

    #[test]
    fn reduction_is_monotonic() {
        let mesh = sphere(5.0, 3);
        let counts: Vec<usize> = [0.0, 0.5, 0.9, 1.0]
            .iter()
            .map(|&r| {
                mesh.decimated(&DecimationParams::with_target_reduction(r))
                    .cell_count()
            })
            .collect();
        assert_eq!(counts[0], 512);
        assert!(counts.windows(2).all(|w| w[1] <= w[0]), "{counts:?}");
        assert!(counts[3] > 0);
    }

    #[test]
    fn no_reduction_keeps_mesh() {
        let mesh = sphere(1.0, 1);
        let same = mesh.decimated(&DecimationParams::with_target_reduction(0.0));
        assert_eq!(same.points, mesh.points);
        assert_eq!(same.polygons, mesh.polygons);
    }

    #[test]
    fn decimation_is_deterministic() {
        let mesh = sphere(2.0, 2);
        let params = DecimationParams::with_target_reduction(0.7);
        assert_eq!(mesh.decimated(&params), mesh.decimated(&params));
    }

    #[test]
    fn preserved_boundary_keeps_outline() {
        let n = 6;
        let mesh = grid(n);
        let params = DecimationParams::with_target_reduction(0.8).with_preserve_boundary(true);
        let out = mesh.decimated(&params);
        assert!(out.cell_count() < mesh.cell_count());

        for (i, p) in mesh.points.iter().enumerate() {
            let (x, y) = (i % n, i / n);
            if x == 0 || y == 0 || x == n - 1 || y == n - 1 {
                assert!(out.points.contains(p), "boundary point {p} was removed");
            }
        }
        // the plane stays flat and keeps its area
        assert!(out.points.iter().all(|p| p.z.abs() < 1e-9));
        let area: Real = out.polygons.iter().map(|p| p.area(&out.points)).sum();
        approx::assert_relative_eq!(area, 25.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_mesh_passes_through() {
        let out = Mesh::default().decimated(&DecimationParams::default());
        assert!(out.is_empty());
        assert_eq!(out.point_count(), 0);
    }
}
