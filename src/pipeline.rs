//! The fixed volume → mesh stage sequence.
//!
//! ```text
//! pre_smooth → extract → triangulate → normals → clean → smooth → decimate → smooth_again
//! ```
//! Every stage takes the previous stage's complete output. An empty
//! extraction short-circuits to an empty mesh; any later stage that loses all
//! geometry, or leaves an index out of range or a coordinate non-finite,
//! fails the whole run.

use crate::errors::{GenerationError, GenerationResult};
use crate::isosurface::{IsosurfaceOps, SurfaceNetsOps};
use crate::mesh::Mesh;
use crate::params::GenerationParameters;
use crate::transform::AffineTransform;
use crate::volume::Volume;
use std::fmt;
use tracing::{debug, info};

/// One step of the pipeline, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    PreSmooth,
    Extract,
    Triangulate,
    Normals,
    Clean,
    Smooth,
    Decimate,
    SmoothAgain,
    Transform,
}

impl Stage {
    pub const fn name(&self) -> &'static str {
        match self {
            Stage::PreSmooth => "pre_smooth",
            Stage::Extract => "extract",
            Stage::Triangulate => "triangulate",
            Stage::Normals => "normals",
            Stage::Clean => "clean",
            Stage::Smooth => "smooth",
            Stage::Decimate => "decimate",
            Stage::SmoothAgain => "smooth_again",
            Stage::Transform => "transform",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validate a stage's output and log its size.
fn checked(stage: Stage, input_had_geometry: bool, mesh: Mesh) -> GenerationResult<Mesh> {
    mesh.validate()
        .map_err(|reason| GenerationError::processing(stage, reason))?;
    if input_had_geometry && mesh.is_empty() {
        return Err(GenerationError::processing(stage, "produced no geometry"));
    }
    debug!(
        stage = %stage,
        points = mesh.point_count(),
        cells = mesh.cell_count(),
        "Stage finished"
    );
    Ok(mesh)
}

/// Run every stage with the default surface-nets extractor.
pub fn run(volume: &Volume, params: &GenerationParameters) -> GenerationResult<Mesh> {
    run_with(&SurfaceNetsOps::new(), volume, params)
}

/// Run every stage with `extractor` producing the initial surface.
pub fn run_with<E: IsosurfaceOps>(
    extractor: &E,
    volume: &Volume,
    params: &GenerationParameters,
) -> GenerationResult<Mesh> {
    let smoothed = volume.gaussian_smoothed(params.gaussian_sigma, params.gaussian_radius_factor);
    debug!(stage = %Stage::PreSmooth, sigma = params.gaussian_sigma, "Stage finished");

    let mesh = checked(Stage::Extract, false, extractor.extract(&smoothed, params.iso_value)?)?;
    drop(smoothed);
    if mesh.is_empty() {
        info!("Volume has no crossing at the isovalue; mesh is empty");
        return Ok(Mesh::default());
    }

    let smoothing = params.smoothing();

    let mesh = checked(Stage::Triangulate, true, mesh.triangulate())?;
    let mesh = checked(Stage::Normals, true, mesh.with_normals(params.flip_normals))?;
    let mesh = checked(Stage::Clean, true, mesh.cleaned(params.merge_tolerance))?;
    let mesh = checked(Stage::Smooth, true, mesh.smoothed(&smoothing))?;
    let mesh = checked(Stage::Decimate, true, mesh.decimated(&params.decimation()))?;

    let mut mesh = mesh.smoothed(&smoothing);
    mesh.normals = Some(mesh.point_normals());
    checked(Stage::SmoothAgain, true, mesh)
}

/// Map a finished mesh through `transform`.
pub fn transform(mesh: &Mesh, transform: &AffineTransform) -> GenerationResult<Mesh> {
    if transform.is_mirroring() {
        debug!("Transform mirrors; cells keep their order");
    }
    checked(Stage::Transform, !mesh.is_empty(), mesh.transformed(transform))
}
