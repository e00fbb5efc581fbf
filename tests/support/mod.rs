//! Test support library
//! Volume builders shared by the integration tests.

#![allow(dead_code)]

use volmesh::RawVolume;

pub const IDENTITY: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Owned volume arguments, borrowed as a [`RawVolume`] on demand.
pub struct VolumeArgs<T> {
    pub samples: Vec<T>,
    pub dims: [u16; 3],
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    pub direction: [f64; 9],
}

impl<T> VolumeArgs<T> {
    pub fn raw(&self) -> RawVolume<'_, T> {
        RawVolume::new(&self.samples, &self.dims, &self.spacing, &self.origin, &self.direction)
    }
}

/// Samples from `f(x, y, z)`, x varying fastest, on an axis-aligned unit grid.
pub fn volume_from<T>(dims: [u16; 3], f: impl Fn(usize, usize, usize) -> T) -> VolumeArgs<T> {
    let [nx, ny, nz] = dims.map(usize::from);
    let mut samples = Vec::with_capacity(nx * ny * nz);
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                samples.push(f(x, y, z));
            }
        }
    }
    VolumeArgs {
        samples,
        dims,
        spacing: [1.0; 3],
        origin: [0.0; 3],
        direction: IDENTITY,
    }
}

/// Cube of side `n` holding a bright ball of `radius` voxels centred in the grid.
pub fn ball(n: u16, radius: f32) -> VolumeArgs<i16> {
    let c = (n as f32 - 1.0) / 2.0;
    volume_from([n; 3], |x, y, z| {
        let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2) + (z as f32 - c).powi(2)).sqrt();
        if d < radius { 500 } else { -500 }
    })
}

/// Decode a length-prefixed cell array back into faces.
pub fn decode_cells(cells: &[i32]) -> Vec<Vec<i32>> {
    let mut faces = Vec::new();
    let mut cursor = 0;
    while cursor < cells.len() {
        let n = cells[cursor] as usize;
        faces.push(cells[cursor + 1..cursor + 1 + n].to_vec());
        cursor += 1 + n;
    }
    assert_eq!(cursor, cells.len(), "cell array ends inside a face");
    faces
}

