//! Voxel grid plus the geometric metadata that places it in physical space.

use crate::errors::{GenerationError, GenerationResult};
use crate::float_types::{Real, tolerance};
use nalgebra::{Matrix3, Point3, Vector3};

pub mod gaussian;
pub mod grid;

pub use grid::GridShape;

/// Volume arguments as they arrive from a host caller.
///
/// Every buffer is optional so that an absent argument can be reported as
/// [`GenerationError::InvalidInput`] instead of being unrepresentable.
#[derive(Debug, Clone, Copy)]
pub struct RawVolume<'a, T> {
    pub samples: Option<&'a [T]>,
    /// Number of samples the caller claims to pass.
    pub sample_count: usize,
    /// Voxel counts along x, y, z.
    pub dimensions: Option<&'a [u16]>,
    pub spacing: Option<&'a [f64]>,
    pub origin: Option<&'a [f64]>,
    /// Direction cosines, row-major.
    pub direction: Option<&'a [f64]>,
}

impl<'a, T> RawVolume<'a, T> {
    /// All arguments present, `sample_count` taken from the sample buffer.
    pub const fn new(
        samples: &'a [T],
        dimensions: &'a [u16],
        spacing: &'a [f64],
        origin: &'a [f64],
        direction: &'a [f64],
    ) -> Self {
        Self {
            samples: Some(samples),
            sample_count: samples.len(),
            dimensions: Some(dimensions),
            spacing: Some(spacing),
            origin: Some(origin),
            direction: Some(direction),
        }
    }
}

fn required<'a, U>(value: Option<&'a [U]>, len: usize, name: &str) -> GenerationResult<&'a [U]> {
    let value =
        value.ok_or_else(|| GenerationError::InvalidInput(format!("missing {name}")))?;
    if value.len() < len {
        return Err(GenerationError::InvalidInput(format!(
            "{name} has {} values, expected {len}",
            value.len()
        )));
    }
    Ok(&value[..len])
}

fn voxel_count(dimensions: &[usize; 3]) -> GenerationResult<usize> {
    dimensions
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| {
            GenerationError::InvalidInput(format!("dimensions {dimensions:?} are too large"))
        })
}

/// A dense scalar volume. Samples are stored as `f32` whatever the input width.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    shape: GridShape,
    spacing: Vector3<Real>,
    origin: Point3<Real>,
    direction: Matrix3<Real>,
    samples: Vec<f32>,
}

impl Volume {
    /// Build a volume from already widened samples, x varying fastest.
    pub fn new(
        dimensions: [usize; 3],
        spacing: Vector3<Real>,
        origin: Point3<Real>,
        direction: Matrix3<Real>,
        samples: Vec<f32>,
    ) -> GenerationResult<Self> {
        if dimensions.iter().any(|&d| d == 0 || d > u32::MAX as usize / 4) {
            return Err(GenerationError::InvalidInput(format!(
                "dimensions {dimensions:?} must all be positive"
            )));
        }
        let expected = voxel_count(&dimensions)?;
        if samples.len() != expected {
            return Err(GenerationError::InvalidInput(format!(
                "buffer size {} and number of voxels {expected} differ",
                samples.len()
            )));
        }

        Ok(Self {
            shape: GridShape::new(dimensions[0] as u32, dimensions[1] as u32, dimensions[2] as u32),
            spacing,
            origin,
            direction,
            samples,
        })
    }

    /// Validate host arguments and widen every sample to floating point.
    pub fn from_raw<T: Copy + Into<f32>>(raw: &RawVolume<'_, T>) -> GenerationResult<Self> {
        let samples = raw
            .samples
            .ok_or_else(|| GenerationError::InvalidInput("missing samples".into()))?;
        let dims = required(raw.dimensions, 3, "dimensions")?;
        let spacing = required(raw.spacing, 3, "spacing")?;
        let origin = required(raw.origin, 3, "origin")?;
        let direction = required(raw.direction, 9, "direction")?;

        let dimensions = [dims[0] as usize, dims[1] as usize, dims[2] as usize];
        let voxels = voxel_count(&dimensions)?;
        if raw.sample_count != voxels {
            return Err(GenerationError::InvalidInput(format!(
                "buffer size {} and number of voxels {voxels} differ",
                raw.sample_count
            )));
        }
        if samples.len() < voxels {
            return Err(GenerationError::InvalidInput(format!(
                "sample buffer holds {} values, expected {voxels}",
                samples.len()
            )));
        }

        let widened = samples[..voxels].iter().map(|&s| s.into()).collect();
        let direction = Matrix3::from_row_slice(direction).map(|d| d as Real);

        Self::new(
            dimensions,
            Vector3::new(spacing[0] as Real, spacing[1] as Real, spacing[2] as Real),
            Point3::new(origin[0] as Real, origin[1] as Real, origin[2] as Real),
            direction,
            widened,
        )
    }

    /// Signed 16-bit intensities (CT, MR).
    pub fn from_i16(raw: &RawVolume<'_, i16>) -> GenerationResult<Self> {
        Self::from_raw(raw)
    }

    /// Unsigned 16-bit samples (label maps).
    pub fn from_u16(raw: &RawVolume<'_, u16>) -> GenerationResult<Self> {
        Self::from_raw(raw)
    }

    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    pub const fn dimensions(&self) -> [usize; 3] {
        [
            self.shape.nx as usize,
            self.shape.ny as usize,
            self.shape.nz as usize,
        ]
    }

    pub const fn spacing(&self) -> &Vector3<Real> {
        &self.spacing
    }

    pub const fn origin(&self) -> &Point3<Real> {
        &self.origin
    }

    pub const fn direction(&self) -> &Matrix3<Real> {
        &self.direction
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample at voxel `[x, y, z]`.
    pub fn value(&self, x: usize, y: usize, z: usize) -> f32 {
        self.samples[self.shape.offset(x, y, z)]
    }

    /// Same geometry, different samples. `samples` must have the same length.
    pub(crate) fn with_samples(&self, samples: Vec<f32>) -> Self {
        debug_assert_eq!(samples.len(), self.samples.len());
        Self {
            shape: self.shape,
            spacing: self.spacing,
            origin: self.origin,
            direction: self.direction,
            samples,
        }
    }

    /// Copy of this volume with its direction cosines reset to identity.
    pub fn with_identity_direction(&self) -> Self {
        let mut volume = self.clone();
        volume.direction = Matrix3::identity();
        volume
    }

    /// Physical position of a (possibly fractional) voxel index:
    /// `origin + direction · (spacing ⊙ index)`.
    pub fn index_to_physical(&self, index: &Point3<Real>) -> Point3<Real> {
        self.origin + self.direction * self.spacing.component_mul(&index.coords)
    }

    /// Sorted distinct non-zero sample values (the labels of a segmentation).
    pub fn unique_labels(&self) -> Vec<f32> {
        let mut labels: Vec<f32> = self.samples.iter().copied().filter(|&s| s != 0.0).collect();
        labels.sort_by(f32::total_cmp);
        labels.dedup();
        labels
    }

    /// Volume that is `+1` where the sample equals `label` and `-1` elsewhere,
    /// so that the zero isovalue traces the boundary of that label.
    pub fn label_mask(&self, label: f32) -> Self {
        let samples = self
            .samples
            .iter()
            .map(|&s| if s == label { 1.0 } else { -1.0 })
            .collect();
        self.with_samples(samples)
    }

    /// Report metadata that would make the physical mapping meaningless.
    /// Nothing here is enforced: generation proceeds with whatever was given.
    pub fn check_geometry(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.spacing.iter().any(|&s| s <= 0.0 || !s.is_finite()) {
            warnings.push(format!("spacing {:?} is not strictly positive", self.spacing.as_slice()));
        }

        let gram = self.direction.transpose() * self.direction;
        let deviation = (gram - Matrix3::identity()).amax();
        if !deviation.is_finite() || deviation > tolerance().sqrt() {
            warnings.push(format!(
                "direction matrix is not orthonormal (max deviation {deviation})"
            ));
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const IDENTITY: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

    #[test]
    fn from_raw_widens_samples() {
        let samples: [i16; 8] = [-3, -2, -1, 0, 1, 2, 3, i16::MAX];
        let raw = RawVolume::new(&samples, &[2, 2, 2], &[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], &IDENTITY);
        let volume = Volume::from_raw(&raw).expect("valid volume");

        assert_eq!(volume.dimensions(), [2, 2, 2]);
        assert_eq!(volume.samples()[0], -3.0);
        assert_eq!(volume.samples()[7], 32767.0);
        assert_eq!(volume.value(1, 1, 1), 32767.0);
        assert_eq!(volume.value(1, 0, 0), -2.0);
        assert_eq!(volume.value(0, 1, 0), -1.0);
        assert_eq!(volume.value(0, 0, 1), 1.0);
    }

    #[test]
    fn from_raw_reads_direction_row_major() {
        let samples = [0u16; 1];
        let direction = [0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let raw = RawVolume::new(&samples, &[1, 1, 1], &[1.0; 3], &[0.0; 3], &direction);
        let volume = Volume::from_raw(&raw).unwrap();
        assert_eq!(volume.direction()[(0, 1)], 1.0);
        assert_eq!(volume.direction()[(1, 0)], -1.0);
    }

    #[test]
    fn from_raw_rejects_missing_arguments() {
        let samples = [0i16; 8];
        let mut raw = RawVolume::new(&samples, &[2, 2, 2], &[1.0; 3], &[0.0; 3], &IDENTITY);
        raw.origin = None;
        let err = Volume::from_raw(&raw).unwrap_err();
        assert_eq!(err, GenerationError::InvalidInput("missing origin".into()));

        let mut raw = RawVolume::new(&samples, &[2, 2, 2], &[1.0; 3], &[0.0; 3], &IDENTITY);
        raw.samples = None;
        assert!(Volume::from_raw(&raw).is_err());

        let raw = RawVolume::new(&samples, &[2, 2], &[1.0; 3], &[0.0; 3], &IDENTITY);
        assert!(Volume::from_raw(&raw).is_err());
    }

    #[test]
    fn from_raw_rejects_size_mismatch() {
        let samples = [0i16; 8];
        let mut raw = RawVolume::new(&samples, &[2, 2, 2], &[1.0; 3], &[0.0; 3], &IDENTITY);
        raw.sample_count = 7;
        assert!(matches!(Volume::from_raw(&raw), Err(GenerationError::InvalidInput(_))));

        let raw = RawVolume::new(&samples, &[2, 2, 3], &[1.0; 3], &[0.0; 3], &IDENTITY);
        assert!(Volume::from_raw(&raw).is_err());

        let raw = RawVolume::new(&samples[..0], &[0, 2, 2], &[1.0; 3], &[0.0; 3], &IDENTITY);
        assert!(Volume::from_raw(&raw).is_err());
    }

    #[test]
    fn index_to_physical_applies_spacing_direction_origin() {
        let direction = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let volume = Volume::new(
            [1, 1, 1],
            Vector3::new(2.0, 3.0, 4.0),
            Point3::new(10.0, 20.0, 30.0),
            direction,
            vec![0.0],
        )
        .unwrap();

        let p = volume.index_to_physical(&Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(p, Point3::new(7.0, 22.0, 34.0));

        let flat = volume.with_identity_direction();
        let q = flat.index_to_physical(&Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(q, Point3::new(12.0, 23.0, 34.0));
    }

    #[test]
    fn labels_and_masks() {
        let volume = Volume::new(
            [4, 1, 1],
            Vector3::repeat(1.0),
            Point3::origin(),
            Matrix3::identity(),
            vec![0.0, 3.0, 1.0, 3.0],
        )
        .unwrap();
        assert_eq!(volume.unique_labels(), vec![1.0, 3.0]);
        assert_eq!(volume.label_mask(3.0).samples(), &[-1.0, 1.0, -1.0, 1.0]);
    }

    #[test]
    fn geometry_warnings_are_reported_not_enforced() {
        let volume = Volume::new(
            [1, 1, 1],
            Vector3::new(1.0, -1.0, 1.0),
            Point3::origin(),
            Matrix3::repeat(1.0),
            vec![0.0],
        )
        .unwrap();
        assert_eq!(volume.check_geometry().len(), 2);
        assert!(volume.with_identity_direction().check_geometry().len() == 1);
    }
}
