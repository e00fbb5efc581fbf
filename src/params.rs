//! Generation parameters.
//!
//! Every field is a plain value: setters store it without validation and the
//! pipeline reads it when [`crate::generator::ModelGenerator::generate_model`] runs.

use crate::errors::{GenerationError, GenerationResult};
use crate::float_types::Real;
use serde::{Deserialize, Serialize};

/// Parameters controlling one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationParameters {
    /// Isovalue the surface is extracted at. The primary path keeps this at 0.
    pub iso_value: Real,

    /// Gaussian pre-smoothing standard deviation, in voxels.
    pub gaussian_sigma: Real,

    /// Kernel half-width as a multiple of `gaussian_sigma`.
    pub gaussian_radius_factor: Real,

    /// Number of windowed-sinc terms per smoothing pass.
    pub smoothing_iterations: u32,

    /// Pass-band of the windowed-sinc filter, in `(0, 2)`. Smaller is smoother.
    pub smoothing_pass_band: Real,

    /// Dihedral angle in degrees above which an edge is a feature edge.
    pub smoothing_feature_angle: Real,

    /// Fraction of triangles the decimation tries to remove.
    pub decimation_target_reduction: Real,

    /// Reverse every face after outward auto-orientation.
    pub flip_normals: bool,

    /// Distance under which points are merged by the clean stage. 0 merges exact duplicates only.
    pub merge_tolerance: Real,

    /// Map the final mesh into NIFTI/RAS space.
    pub apply_transform_for_nifti: bool,

    /// Raise volume, transform and mesh dumps to `info` level.
    pub debug_print: bool,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            iso_value: 0.0,
            gaussian_sigma: 0.5,
            gaussian_radius_factor: 1.5,
            smoothing_iterations: 15,
            smoothing_pass_band: 0.01,
            smoothing_feature_angle: 120.0,
            decimation_target_reduction: 0.9,
            flip_normals: true,
            merge_tolerance: 0.0,
            apply_transform_for_nifti: false,
            debug_print: false,
        }
    }
}

impl GenerationParameters {
    /// Settings of the label-image generator: wider blur, isovalue 1.
    #[must_use]
    pub fn label_variant() -> Self {
        Self {
            iso_value: 1.0,
            gaussian_sigma: 0.8,
            decimation_target_reduction: 0.3,
            ..Default::default()
        }
    }

    /// Decode parameters from a JSON document. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> GenerationResult<Self> {
        serde_json::from_str(json).map_err(|e| GenerationError::InvalidConfig(e.to_string()))
    }

    pub fn to_json(&self) -> GenerationResult<String> {
        serde_json::to_string(self).map_err(|e| GenerationError::InvalidConfig(e.to_string()))
    }

    /// Parameters shared by both smoothing passes.
    pub fn smoothing(&self) -> SmoothingParams {
        SmoothingParams {
            iterations: self.smoothing_iterations,
            pass_band: self.smoothing_pass_band,
            feature_angle: self.smoothing_feature_angle,
            ..Default::default()
        }
    }

    pub fn decimation(&self) -> DecimationParams {
        DecimationParams {
            target_reduction: self.decimation_target_reduction,
            ..Default::default()
        }
    }
}

/// Parameters for windowed-sinc smoothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingParams {
    /// Number of Chebyshev terms. 0 leaves the mesh untouched.
    pub iterations: u32,

    /// Pass-band in `(0, 2)`.
    pub pass_band: Real,

    /// Feature angle in degrees, used only with `feature_edge_smoothing`.
    pub feature_angle: Real,

    /// Move boundary vertices along the boundary instead of pinning them.
    pub boundary_smoothing: bool,

    /// Detect feature edges and restrict their vertices to move along them.
    pub feature_edge_smoothing: bool,

    /// Smooth vertices on edges shared by more than two faces.
    pub non_manifold_smoothing: bool,

    /// Run the filter in a unit box centred at the origin.
    pub normalize_coordinates: bool,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            iterations: 15,
            pass_band: 0.01,
            feature_angle: 120.0,
            boundary_smoothing: false,
            feature_edge_smoothing: false,
            non_manifold_smoothing: true,
            normalize_coordinates: true,
        }
    }
}

impl SmoothingParams {
    #[must_use]
    pub const fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    #[must_use]
    pub const fn with_pass_band(mut self, pass_band: Real) -> Self {
        self.pass_band = pass_band;
        self
    }

    #[must_use]
    pub const fn with_boundary_smoothing(mut self, enabled: bool) -> Self {
        self.boundary_smoothing = enabled;
        self
    }

    #[must_use]
    pub const fn with_feature_edge_smoothing(mut self, enabled: bool, feature_angle: Real) -> Self {
        self.feature_edge_smoothing = enabled;
        self.feature_angle = feature_angle;
        self
    }
}

/// Parameters for quadric-error decimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecimationParams {
    /// Fraction of triangles to remove, clamped to `[0, 1]`.
    pub target_reduction: Real,

    /// Never collapse an edge that lies on the mesh boundary.
    pub preserve_boundary: bool,

    /// Weight of the constraint planes added along boundary edges.
    pub boundary_penalty: Real,
}

impl Default for DecimationParams {
    fn default() -> Self {
        Self {
            target_reduction: 0.9,
            preserve_boundary: false,
            boundary_penalty: 10.0,
        }
    }
}

impl DecimationParams {
    #[must_use]
    pub fn with_target_reduction(target_reduction: Real) -> Self {
        Self {
            target_reduction,
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn with_preserve_boundary(mut self, preserve: bool) -> Self {
        self.preserve_boundary = preserve;
        self
    }

    /// Number of triangles to keep out of `triangles`.
    pub fn target_triangles(&self, triangles: usize) -> usize {
        let keep = 1.0 - self.target_reduction.clamp(0.0, 1.0);
        ((triangles as Real) * keep).ceil() as usize
    }
}
