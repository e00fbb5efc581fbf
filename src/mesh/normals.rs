//! Winding consistency, outward orientation and per-point normals

use crate::float_types::Real;
use crate::mesh::{Mesh, Polygon, edge_key, signed_volume_about};
use nalgebra::{Point3, Vector3};
use std::collections::VecDeque;

impl Mesh {
    /// Faces grouped into edge-connected components, each re-wound so that
    /// neighbours across a manifold edge traverse it in opposite directions.
    ///
    /// Returns the re-wound polygons and the component id of every face.
    /// Edges shared by more than two faces are not crossed.
    fn consistent_components(&self) -> (Vec<Polygon>, Vec<usize>) {
        let edge_faces = self.edge_faces();
        let mut polygons = self.polygons.clone();
        let mut component = vec![usize::MAX; polygons.len()];
        let mut components = 0;
        let mut queue = VecDeque::new();

        for seed in 0..polygons.len() {
            if component[seed] != usize::MAX {
                continue;
            }
            component[seed] = components;
            queue.push_back(seed);

            while let Some(face) = queue.pop_front() {
                let edges: Vec<(usize, usize)> = polygons[face].edges().collect();
                for (a, b) in edges {
                    let Some(incident) = edge_faces.get(&edge_key(a, b)) else {
                        continue;
                    };
                    if incident.len() != 2 {
                        continue;
                    }
                    for &other in incident {
                        if other == face || component[other] != usize::MAX {
                            continue;
                        }
                        // a consistent neighbour walks this edge as (b, a)
                        if polygons[other].edges().any(|e| e == (a, b)) {
                            polygons[other].flip();
                        }
                        component[other] = components;
                        queue.push_back(other);
                    }
                }
            }
            components += 1;
        }

        (polygons, component)
    }

    /// Consistently wound copy with every connected component facing outward:
    /// a component whose signed volume about its own centroid is negative is reversed.
    pub fn auto_oriented(&self) -> Mesh {
        let (mut polygons, component) = self.consistent_components();
        let components = component.iter().map(|&c| c + 1).max().unwrap_or(0);
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); components];
        for (face, &id) in component.iter().enumerate() {
            groups[id].push(face);
        }

        // last component that counted each point
        let mut seen = vec![usize::MAX; self.points.len()];
        for (id, faces) in groups.iter().enumerate() {
            let mut sum = Vector3::zeros();
            let mut count = 0usize;
            for &f in faces {
                for &i in &polygons[f].indices {
                    if seen[i] != id {
                        seen[i] = id;
                        sum += self.points[i].coords;
                        count += 1;
                    }
                }
            }
            let centroid = Point3::from(sum / count.max(1) as Real);

            let volume = signed_volume_about(&self.points, faces.iter().map(|&f| &polygons[f]), &centroid);
            if volume < 0.0 {
                for &f in faces {
                    polygons[f].flip();
                }
            }
        }

        Mesh {
            points: self.points.clone(),
            polygons,
            normals: None,
        }
    }

    /// Area-weighted point normals from the current winding. Points without
    /// a non-degenerate incident face get a zero normal.
    pub fn point_normals(&self) -> Vec<Vector3<Real>> {
        let mut normals = vec![Vector3::zeros(); self.points.len()];
        for polygon in &self.polygons {
            // length is twice the area, which is the weight
            let weighted = polygon.area_vector(&self.points);
            for &i in &polygon.indices {
                normals[i] += weighted;
            }
        }
        normals
            .into_iter()
            .map(|n| n.try_normalize(Real::EPSILON).unwrap_or_else(Vector3::zeros))
            .collect()
    }

    /// Normals stage: consistent winding, outward auto-orientation, then an
    /// optional reversal of every face. Point normals follow the final winding.
    pub fn with_normals(&self, flip_normals: bool) -> Mesh {
        let mut mesh = self.auto_oriented();
        if flip_normals {
            mesh.polygons.iter_mut().for_each(Polygon::flip);
        }
        mesh.normals = Some(mesh.point_normals());
        mesh
    }
}
