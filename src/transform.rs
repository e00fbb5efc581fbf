//! Affine transforms between mesh-local, voxel-index and NIFTI/RAS space.
//!
//! The mesh pipeline produces points in a local space where
//! `p = origin + spacing ⊙ index`. [`local_to_ras`] undoes that mapping and
//! then applies the NIFTI sform built from the volume's metadata, so that a
//! mesh extracted from a flattened volume lands in scanner space.

use crate::float_types::Real;
use crate::volume::Volume;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// A 3D affine map stored as a homogeneous 4×4 matrix with last row `[0 0 0 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    matrix: Matrix4<Real>,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Assemble from a linear part and a translation.
    pub fn from_parts(linear: Matrix3<Real>, translation: Vector3<Real>) -> Self {
        let mut matrix = linear.to_homogeneous();
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
        Self { matrix }
    }

    pub const fn matrix(&self) -> &Matrix4<Real> {
        &self.matrix
    }

    pub fn linear(&self) -> Matrix3<Real> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn translation(&self) -> Vector3<Real> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// `self ∘ inner`: the returned transform applies `inner` first.
    pub fn compose(&self, inner: &AffineTransform) -> AffineTransform {
        AffineTransform {
            matrix: self.matrix * inner.matrix,
        }
    }

    /// Transform a point (homogeneous coordinate 1).
    pub fn transform_point(&self, p: &Point3<Real>) -> Point3<Real> {
        Point3::from(self.linear() * p.coords + self.translation())
    }

    /// Transform a surface normal with the inverse transpose of the linear part.
    /// Returns `None` when the linear part is singular.
    pub fn normal_matrix(&self) -> Option<Matrix3<Real>> {
        self.linear().try_inverse().map(|inverse| inverse.transpose())
    }

    /// Whether the transform reverses orientation (negative determinant).
    pub fn is_mirroring(&self) -> bool {
        self.linear().determinant() < 0.0
    }
}

/// Flip between LPS and RAS: negate x and y, keep z.
pub fn lps_to_ras() -> Matrix4<Real> {
    Matrix4::from_diagonal(&Vector4::new(-1.0, -1.0, 1.0, 1.0))
}

/// Voxel-index → RAS transform (the NIFTI sform).
///
/// The linear part is the element-wise product of `flip · scale` with the
/// direction cosines, not a matrix product. Consumers of these meshes rely
/// on exactly this construction.
pub fn voxel_to_ras(
    direction: &Matrix3<Real>,
    origin: &Point3<Real>,
    spacing: &Vector3<Real>,
) -> AffineTransform {
    let scale = Matrix4::new_nonuniform_scaling(spacing);
    let flip = lps_to_ras();

    let flipped_scale = flip * scale;
    let linear = flipped_scale
        .fixed_view::<3, 3>(0, 0)
        .component_mul(direction);

    let offset = flip.fixed_view::<3, 3>(0, 0) * origin.coords;

    AffineTransform::from_parts(linear, offset)
}

/// Local (mesh) → voxel-index transform: scale by `1/spacing`, translate by `-origin/spacing`.
pub fn local_to_voxel(origin: &Point3<Real>, spacing: &Vector3<Real>) -> AffineTransform {
    let inverse_spacing = spacing.map(|s| 1.0 / s);
    let translation = -origin.coords.component_div(spacing);
    AffineTransform::from_parts(Matrix3::from_diagonal(&inverse_spacing), translation)
}

/// Composed mesh-local → RAS transform for `volume`.
pub fn local_to_ras(volume: &Volume) -> AffineTransform {
    let vox2ras = voxel_to_ras(volume.direction(), volume.origin(), volume.spacing());
    let local2vox = local_to_voxel(volume.origin(), volume.spacing());
    vox2ras.compose(&local2vox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_metadata_only_flips_x_and_y() {
        let volume = Volume::new(
            [1, 1, 1],
            Vector3::repeat(1.0),
            Point3::origin(),
            Matrix3::identity(),
            vec![0.0],
        )
        .unwrap();
        let t = local_to_ras(&volume);
        assert_relative_eq!(
            t.transform_point(&Point3::new(1.5, -2.0, 3.25)),
            Point3::new(-1.5, 2.0, 3.25)
        );
        assert!(!t.is_mirroring());
    }

    #[test]
    fn sform_uses_elementwise_direction_product() {
        let direction = Matrix3::new(0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let t = voxel_to_ras(&direction, &Point3::new(1.0, 2.0, 3.0), &Vector3::new(2.0, 3.0, 4.0));

        // diag(-2, -3, 4) ⊙ direction keeps only the diagonal, which is (0, 0, 1) here
        assert_relative_eq!(t.linear(), Matrix3::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 4.0));
        assert_relative_eq!(t.translation(), Vector3::new(-1.0, -2.0, 3.0));
    }

    #[test]
    fn local_to_voxel_inverts_index_mapping() {
        let origin = Point3::new(-10.0, 5.0, 2.0);
        let spacing = Vector3::new(0.5, 2.0, 4.0);
        let t = local_to_voxel(&origin, &spacing);

        let index = Point3::new(3.0, 1.0, 7.0);
        let local = origin + spacing.component_mul(&index.coords);
        assert_relative_eq!(t.transform_point(&local), index, epsilon = 1e-12);
    }

    #[test]
    fn composed_transform_matches_step_by_step() {
        let volume = Volume::new(
            [1, 1, 1],
            Vector3::new(0.8, 0.8, 1.5),
            Point3::new(90.0, -126.0, -72.0),
            Matrix3::identity(),
            vec![0.0],
        )
        .unwrap();
        let local = Point3::new(100.0, -100.0, -50.0);

        let vox = local_to_voxel(volume.origin(), volume.spacing()).transform_point(&local);
        let expected = voxel_to_ras(volume.direction(), volume.origin(), volume.spacing())
            .transform_point(&vox);
        assert_relative_eq!(local_to_ras(&volume).transform_point(&local), expected, epsilon = 1e-9);
        // with identity direction the composition reduces to the axis flip
        assert_relative_eq!(expected, Point3::new(-100.0, 100.0, -50.0), epsilon = 1e-9);
    }

    #[test]
    fn compose_applies_inner_first() {
        let scale = AffineTransform::from_parts(Matrix3::from_diagonal_element(2.0), Vector3::zeros());
        let shift = AffineTransform::from_parts(Matrix3::identity(), Vector3::new(1.0, 0.0, 0.0));
        let p = Point3::new(1.0, 1.0, 1.0);
        assert_relative_eq!(scale.compose(&shift).transform_point(&p), Point3::new(4.0, 2.0, 2.0));
        assert_relative_eq!(shift.compose(&scale).transform_point(&p), Point3::new(3.0, 2.0, 2.0));
    }

    #[test]
    fn normal_matrix_of_singular_transform_is_none() {
        let t = AffineTransform::from_parts(Matrix3::zeros(), Vector3::zeros());
        assert!(t.normal_matrix().is_none());
        assert!(AffineTransform::identity().normal_matrix().is_some());
    }
}
