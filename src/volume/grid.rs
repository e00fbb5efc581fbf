//! Grid shape shared by volume indexing and surface extraction

/// The shape describing a dense voxel grid, x varying fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
}

impl GridShape {
    pub const fn new(nx: u32, ny: u32, nz: u32) -> Self {
        Self { nx, ny, nz }
    }

    /// The same grid grown by `pad` voxels on every side.
    pub const fn padded(&self, pad: u32) -> Self {
        Self {
            nx: self.nx + 2 * pad,
            ny: self.ny + 2 * pad,
            nz: self.nz + 2 * pad,
        }
    }

    /// Linear offset of `[x, y, z]` in samples.
    #[inline]
    pub const fn offset(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.ny as usize + y) * self.nx as usize + x
    }

    /// Stride of one step along `axis` (0 = x, 1 = y, 2 = z).
    #[inline]
    pub const fn stride(&self, axis: usize) -> usize {
        match axis {
            0 => 1,
            1 => self.nx as usize,
            _ => self.nx as usize * self.ny as usize,
        }
    }
}

impl fast_surface_nets::ndshape::Shape<3> for GridShape {
    type Coord = u32;

    #[inline]
    fn as_array(&self) -> [Self::Coord; 3] {
        [self.nx, self.ny, self.nz]
    }

    fn size(&self) -> Self::Coord {
        self.nx * self.ny * self.nz
    }

    fn usize(&self) -> usize {
        self.nx as usize * self.ny as usize * self.nz as usize
    }

    fn linearize(&self, coords: [Self::Coord; 3]) -> u32 {
        let [x, y, z] = coords;
        (z * self.ny + y) * self.nx + x
    }

    fn delinearize(&self, i: u32) -> [Self::Coord; 3] {
        let x = i % self.nx;
        let yz = i / self.nx;
        let y = yz % self.ny;
        let z = yz / self.ny;
        [x, y, z]
    }
}
