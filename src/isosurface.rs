//! Isosurface extraction from a scalar volume

use crate::errors::{GenerationError, GenerationResult};
use crate::float_types::Real;
use crate::mesh::{Mesh, Polygon};
use crate::volume::Volume;
use fast_surface_nets::{SurfaceNetsBuffer, surface_nets};
use nalgebra::Point3;

/// Extraction of the surface separating samples below `iso_value` from
/// samples at or above it.
pub trait IsosurfaceOps {
    /// Triangle mesh in local coordinates `origin + direction · (spacing ⊙ index)`.
    /// A volume without a crossing yields an empty mesh.
    fn extract(&self, volume: &Volume, iso_value: Real) -> GenerationResult<Mesh>;
}

/// Surface-nets extraction over the voxel grid.
///
/// The grid is padded by one voxel of samples below the isovalue, so a region
/// at or above it that touches the volume border is capped there and the
/// surface stays closed. Vertices that land in the padding are clamped back
/// onto the border.
pub struct SurfaceNetsOps;

/// Field value of the padding layer, below the isovalue.
const PADDING: f32 = -1.0;

impl SurfaceNetsOps {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for SurfaceNetsOps {
    fn default() -> Self {
        Self::new()
    }
}

impl IsosurfaceOps for SurfaceNetsOps {
    fn extract(&self, volume: &Volume, iso_value: Real) -> GenerationResult<Mesh> {
        let [nx, ny, nz] = volume.dimensions();
        // a slab one voxel thick has no cells
        if nx < 2 || ny < 2 || nz < 2 {
            return Ok(Mesh::default());
        }

        let shape = volume.shape().padded(1);
        let size = (shape.nx as u64) * (shape.ny as u64) * (shape.nz as u64);
        if size > u32::MAX as u64 {
            return Err(GenerationError::InvalidInput(format!(
                "volume {nx}x{ny}x{nz} is too large to extract"
            )));
        }

        let iso = iso_value as f32;
        let above = volume.samples().iter().filter(|&&v| v >= iso).count();
        if above == 0 || above == volume.samples().len() {
            return Ok(Mesh::default());
        }

        let mut field = vec![0.0_f32; size as usize];
        for (i, value) in field.iter_mut().enumerate() {
            let px = i % shape.nx as usize;
            let py = (i / shape.nx as usize) % shape.ny as usize;
            let pz = i / (shape.nx as usize * shape.ny as usize);
            let inside = |p: usize, n: usize| (1..=n).contains(&p);
            *value = if inside(px, nx) && inside(py, ny) && inside(pz, nz) {
                volume.value(px - 1, py - 1, pz - 1) - iso
            } else {
                PADDING
            };
        }

        let mut buffer = SurfaceNetsBuffer::default();
        surface_nets(
            &field,
            &shape,
            [0, 0, 0],
            [shape.nx - 1, shape.ny - 1, shape.nz - 1],
            &mut buffer,
        );

        if buffer.indices.is_empty() {
            return Ok(Mesh::default());
        }

        let upper = [nx as Real - 1.0, ny as Real - 1.0, nz as Real - 1.0];
        let points = buffer
            .positions
            .iter()
            .map(|p| {
                let index = Point3::new(
                    (p[0] as Real - 1.0).clamp(0.0, upper[0]),
                    (p[1] as Real - 1.0).clamp(0.0, upper[1]),
                    (p[2] as Real - 1.0).clamp(0.0, upper[2]),
                );
                volume.index_to_physical(&index)
            })
            .collect();

        let polygons = buffer
            .indices
            .chunks_exact(3)
            .map(|t| Polygon::triangle(t[0] as usize, t[1] as usize, t[2] as usize))
            .collect();

        Ok(Mesh::new(points, polygons))
    }
}
