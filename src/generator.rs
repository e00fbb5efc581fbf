//! Stateful generator holding one volume and the last generated mesh.
//!
//! A generator is used by one caller at a time: one generation in flight per
//! instance. Setting a new volume discards the previous volume and mesh.

use crate::errors::{GenerationError, GenerationResult};
use crate::float_types::Real;
use crate::mesh::Mesh;
use crate::params::GenerationParameters;
use crate::pipeline;
use crate::transform::{AffineTransform, local_to_ras};
use crate::volume::{RawVolume, Volume};
use serde::Serialize;
use std::borrow::Cow;
use tracing::{debug, error, info, warn};

/// Flattened model as written by [`ModelGenerator::model_json`].
#[derive(Debug, Serialize)]
struct ModelJson<'a> {
    points: &'a [f32],
    cells: &'a [i32],
}

#[derive(Debug, Default)]
pub struct ModelGenerator {
    params: GenerationParameters,
    volume: Option<Volume>,
    mesh: Option<Mesh>,
    last_transform: Option<AffineTransform>,
    last_error: Option<String>,
}

impl ModelGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters(params: GenerationParameters) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    pub const fn parameters(&self) -> &GenerationParameters {
        &self.params
    }

    pub fn set_parameters(&mut self, params: GenerationParameters) {
        self.params = params;
    }

    /// Replace all parameters from a JSON document; missing keys take their defaults.
    pub fn set_parameters_json(&mut self, json: &str) -> GenerationResult<()> {
        let result = GenerationParameters::from_json(json).map(|params| self.params = params);
        self.record(result)
    }

    /// Remember a failure on the error side channel and pass it on.
    fn record<T>(&mut self, result: GenerationResult<T>) -> GenerationResult<T> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(err) => {
                error!(%err, "Generation request failed");
                self.last_error = Some(err.to_string());
            },
        }
        result
    }

    /// Message of the most recent failed call, cleared by the next successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // --- Volume

    /// Store a 16-bit signed volume. On failure the previous volume and mesh stay as they were.
    pub fn set_volume(&mut self, raw: &RawVolume<'_, i16>) -> GenerationResult<()> {
        let result = Volume::from_i16(raw).map(|volume| self.replace_volume(volume));
        self.record(result)
    }

    /// Store a 16-bit unsigned volume (label images).
    pub fn set_volume_u16(&mut self, raw: &RawVolume<'_, u16>) -> GenerationResult<()> {
        let result = Volume::from_u16(raw).map(|volume| self.replace_volume(volume));
        self.record(result)
    }

    /// Store an already built volume, discarding any previous volume and mesh.
    pub fn replace_volume(&mut self, volume: Volume) {
        for warning in volume.check_geometry() {
            warn!(%warning, "Volume geometry is not physical; continuing");
        }
        debug!(dimensions = ?volume.dimensions(), "Volume set");
        self.volume = Some(volume);
        self.mesh = None;
        self.last_transform = None;
    }

    pub const fn volume(&self) -> Option<&Volume> {
        self.volume.as_ref()
    }

    // --- Parameters

    pub fn set_iso_value(&mut self, value: Real) {
        self.params.iso_value = value;
    }

    pub fn set_gaussian_sigma(&mut self, sigma: Real) {
        self.params.gaussian_sigma = sigma;
    }

    pub fn set_smoothing_iterations(&mut self, iterations: u32) {
        self.params.smoothing_iterations = iterations;
    }

    pub fn set_smoothing_pass_band(&mut self, pass_band: Real) {
        self.params.smoothing_pass_band = pass_band;
    }

    pub fn set_smoothing_feature_angle(&mut self, angle: Real) {
        self.params.smoothing_feature_angle = angle;
    }

    pub fn set_decimation_target_reduction(&mut self, reduction: Real) {
        self.params.decimation_target_reduction = reduction;
    }

    pub fn set_flip_normals(&mut self, flip: bool) {
        self.params.flip_normals = flip;
    }

    pub fn set_apply_transform_for_nifti(&mut self, apply: bool) {
        self.params.apply_transform_for_nifti = apply;
    }

    pub fn set_debug_print(&mut self, debug_print: bool) {
        self.params.debug_print = debug_print;
    }

    // --- Generation

    /// Run the full pipeline on the stored volume.
    ///
    /// The previous mesh is cleared first, so after a failure queries report
    /// [`GenerationError::NoMesh`]. With `apply_transform_for_nifti` the
    /// surface is extracted from a copy of the volume with identity direction
    /// and then mapped by the local → RAS transform built from the stored
    /// direction; the stored volume itself is not modified.
    pub fn generate_model(&mut self) -> GenerationResult<()> {
        self.mesh = None;
        self.last_transform = None;
        let result = self.run_pipeline();
        let result = self.record(result);
        let (mesh, transform) = result?;

        info!(
            points = mesh.point_count(),
            cells = mesh.cell_count(),
            "Model generated"
        );
        self.dump_mesh(&mesh);
        self.mesh = Some(mesh);
        self.last_transform = Some(transform);
        Ok(())
    }

    fn run_pipeline(&self) -> GenerationResult<(Mesh, AffineTransform)> {
        let volume = self.volume.as_ref().ok_or(GenerationError::NoVolume)?;
        let transform = local_to_ras(volume);
        self.dump_geometry(volume, &transform);

        info!(dimensions = ?volume.dimensions(), "Generating model");

        let apply = self.params.apply_transform_for_nifti;
        let working = if apply {
            Cow::Owned(volume.with_identity_direction())
        } else {
            Cow::Borrowed(volume)
        };

        let mesh = pipeline::run(&working, &self.params)?;
        let mesh = if apply {
            pipeline::transform(&mesh, &transform)?
        } else {
            mesh
        };
        Ok((mesh, transform))
    }

    fn dump_geometry(&self, volume: &Volume, transform: &AffineTransform) {
        let spacing = volume.spacing().as_slice();
        let origin = volume.origin().coords.as_slice();
        let direction = volume.direction().transpose();
        let matrix = transform.matrix().transpose();
        if self.params.debug_print {
            info!(?spacing, ?origin, direction = ?direction.as_slice(), "Volume geometry");
            info!(matrix = ?matrix.as_slice(), "Mesh to RAS transform");
        } else {
            debug!(?spacing, ?origin, direction = ?direction.as_slice(), "Volume geometry");
            debug!(matrix = ?matrix.as_slice(), "Mesh to RAS transform");
        }
    }

    fn dump_mesh(&self, mesh: &Mesh) {
        let bounds = mesh
            .bounding_box()
            .map(|(lo, hi)| [lo.x, hi.x, lo.y, hi.y, lo.z, hi.z]);
        let (points, cells) = (mesh.point_count(), mesh.cell_count());
        if self.params.debug_print {
            info!(points, cells, ?bounds, "Mesh summary");
        } else {
            debug!(points, cells, ?bounds, "Mesh summary");
        }
    }

    // --- Queries

    pub fn model(&self) -> GenerationResult<&Mesh> {
        self.mesh.as_ref().ok_or(GenerationError::NoMesh)
    }

    /// The mesh-local → RAS transform computed by the last successful generation.
    pub const fn last_transform(&self) -> Option<&AffineTransform> {
        self.last_transform.as_ref()
    }

    pub fn number_of_points(&self) -> GenerationResult<usize> {
        self.model().map(Mesh::point_count)
    }

    pub fn number_of_cells(&self) -> GenerationResult<usize> {
        self.model().map(Mesh::cell_count)
    }

    pub fn point_array_size(&self) -> GenerationResult<usize> {
        self.model().map(Mesh::point_array_size)
    }

    pub fn cell_array_size(&self) -> GenerationResult<usize> {
        self.model().map(Mesh::cell_array_size)
    }

    /// Copy `x, y, z` per point into `buffer`; returns the number of values written.
    pub fn extract_points(&self, buffer: &mut [f32]) -> GenerationResult<usize> {
        self.model()?.write_points(buffer)
    }

    /// Copy the length-prefixed cells into `buffer`; returns the number of values written.
    pub fn extract_cells(&self, buffer: &mut [i32]) -> GenerationResult<usize> {
        self.model()?.write_cells(buffer)
    }

    pub fn points(&self) -> GenerationResult<Vec<f32>> {
        Ok(self.model()?.flat_points())
    }

    pub fn cells(&self) -> GenerationResult<Vec<i32>> {
        self.model()?.flat_cells()
    }

    /// Both flat arrays at once. Fails when the mesh has no points or no cells.
    pub fn get_model(&self) -> GenerationResult<(Vec<f32>, Vec<i32>)> {
        let mesh = self.model()?;
        if mesh.point_count() == 0 || mesh.cell_count() == 0 {
            return Err(GenerationError::NoMesh);
        }
        Ok((mesh.flat_points(), mesh.flat_cells()?))
    }

    /// `{"points": [...], "cells": [...]}` of the current mesh.
    pub fn model_json(&self) -> GenerationResult<String> {
        let mesh = self.model()?;
        let points = mesh.flat_points();
        let cells = mesh.flat_cells()?;
        serde_json::to_string(&ModelJson {
            points: &points,
            cells: &cells,
        })
        .map_err(|e| GenerationError::InvalidConfig(e.to_string()))
    }
}
