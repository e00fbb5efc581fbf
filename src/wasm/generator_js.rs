use crate::errors::{GenerationError, STATUS_FAILURE, STATUS_OK, status_of};
use crate::float_types::Real;
use crate::generator::ModelGenerator;
use crate::volume::RawVolume;
use crate::wasm::js_object_to_json;
use js_sys::{Float32Array, Int32Array};
use wasm_bindgen::prelude::*;

/// Handle to one generator. `free()` releases it together with its volume and mesh.
#[wasm_bindgen(js_name = ModelGenerator)]
pub struct ModelGeneratorJs {
    inner: ModelGenerator,
    query_error: Option<String>,
}

impl Default for ModelGeneratorJs {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelGeneratorJs {
    /// Unwrap a query result, remembering the failure and falling back to `fallback`.
    fn query<T>(&mut self, result: Result<T, GenerationError>, fallback: T) -> T {
        match result {
            Ok(value) => {
                self.query_error = None;
                value
            },
            Err(err) => {
                self.query_error = Some(err.to_string());
                fallback
            },
        }
    }
}

#[wasm_bindgen(js_class = ModelGenerator)]
impl ModelGeneratorJs {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            inner: ModelGenerator::new(),
            query_error: None,
        }
    }

    /// Store a volume. Returns 0 on success, 1 when an argument is missing or
    /// `sample_count` does not match the dimensions.
    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(
        &mut self,
        samples: Option<Vec<i16>>,
        sample_count: usize,
        dimensions: Option<Vec<u16>>,
        spacing: Option<Vec<f64>>,
        origin: Option<Vec<f64>>,
        direction: Option<Vec<f64>>,
    ) -> i32 {
        let raw = RawVolume {
            samples: samples.as_deref(),
            sample_count,
            dimensions: dimensions.as_deref(),
            spacing: spacing.as_deref(),
            origin: origin.as_deref(),
            direction: direction.as_deref(),
        };
        self.query_error = None;
        status_of(&self.inner.set_volume(&raw))
    }

    /// Same as `setVolume` for unsigned 16-bit label volumes.
    #[wasm_bindgen(js_name = setLabelVolume)]
    pub fn set_label_volume(
        &mut self,
        samples: Option<Vec<u16>>,
        sample_count: usize,
        dimensions: Option<Vec<u16>>,
        spacing: Option<Vec<f64>>,
        origin: Option<Vec<f64>>,
        direction: Option<Vec<f64>>,
    ) -> i32 {
        let raw = RawVolume {
            samples: samples.as_deref(),
            sample_count,
            dimensions: dimensions.as_deref(),
            spacing: spacing.as_deref(),
            origin: origin.as_deref(),
            direction: direction.as_deref(),
        };
        self.query_error = None;
        status_of(&self.inner.set_volume_u16(&raw))
    }

    /// Replace all parameters from a plain JS object with camelCase keys.
    #[wasm_bindgen(js_name = setParameters)]
    pub fn set_parameters(&mut self, parameters: JsValue) -> i32 {
        self.query_error = None;
        match js_object_to_json(parameters) {
            Ok(json) => status_of(&self.inner.set_parameters_json(&json)),
            Err(err) => {
                self.query_error = Some(err.to_string());
                STATUS_FAILURE
            },
        }
    }

    #[wasm_bindgen(js_name = setIsoValue)]
    pub fn set_iso_value(&mut self, value: f64) {
        self.inner.set_iso_value(value as Real);
    }

    #[wasm_bindgen(js_name = setGaussianSigma)]
    pub fn set_gaussian_sigma(&mut self, sigma: f64) {
        self.inner.set_gaussian_sigma(sigma as Real);
    }

    #[wasm_bindgen(js_name = setMeshSmoothingIterations)]
    pub fn set_mesh_smoothing_iterations(&mut self, iterations: u32) {
        self.inner.set_smoothing_iterations(iterations);
    }

    #[wasm_bindgen(js_name = setMeshSmoothingPassband)]
    pub fn set_mesh_smoothing_passband(&mut self, pass_band: f64) {
        self.inner.set_smoothing_pass_band(pass_band as Real);
    }

    #[wasm_bindgen(js_name = setMeshSmoothingFeatureAngle)]
    pub fn set_mesh_smoothing_feature_angle(&mut self, angle: f64) {
        self.inner.set_smoothing_feature_angle(angle as Real);
    }

    #[wasm_bindgen(js_name = setMeshDecimationTargetReduction)]
    pub fn set_mesh_decimation_target_reduction(&mut self, reduction: f64) {
        self.inner.set_decimation_target_reduction(reduction as Real);
    }

    #[wasm_bindgen(js_name = setFlipNormals)]
    pub fn set_flip_normals(&mut self, flip: bool) {
        self.inner.set_flip_normals(flip);
    }

    #[wasm_bindgen(js_name = setApplyTransformForNifti)]
    pub fn set_apply_transform_for_nifti(&mut self, apply: bool) {
        self.inner.set_apply_transform_for_nifti(apply);
    }

    #[wasm_bindgen(js_name = setPrintDebugInfo)]
    pub fn set_print_debug_info(&mut self, debug_print: bool) {
        self.inner.set_debug_print(debug_print);
    }

    #[wasm_bindgen(js_name = generateModel)]
    pub fn generate_model(&mut self) -> i32 {
        self.query_error = None;
        status_of(&self.inner.generate_model())
    }

    #[wasm_bindgen(js_name = getNumberOfPoints)]
    pub fn get_number_of_points(&mut self) -> usize {
        let result = self.inner.number_of_points();
        self.query(result, 0)
    }

    #[wasm_bindgen(js_name = getNumberOfCells)]
    pub fn get_number_of_cells(&mut self) -> usize {
        let result = self.inner.number_of_cells();
        self.query(result, 0)
    }

    #[wasm_bindgen(js_name = getPointArraySize)]
    pub fn get_point_array_size(&mut self) -> usize {
        let result = self.inner.point_array_size();
        self.query(result, 0)
    }

    #[wasm_bindgen(js_name = getCellArraySize)]
    pub fn get_cell_array_size(&mut self) -> usize {
        let result = self.inner.cell_array_size();
        self.query(result, 0)
    }

    /// Flat `x, y, z` coordinates; empty before a successful `generateModel`.
    #[wasm_bindgen(js_name = getPoints)]
    pub fn get_points(&mut self) -> Float32Array {
        let result = self.inner.points();
        let points = self.query(result, Vec::new());
        Float32Array::from(&points[..])
    }

    /// Length-prefixed cells `[n, i0, .., i(n-1)]*`; empty before a successful `generateModel`.
    #[wasm_bindgen(js_name = getCells)]
    pub fn get_cells(&mut self) -> Int32Array {
        let result = self.inner.cells();
        let cells = self.query(result, Vec::new());
        Int32Array::from(&cells[..])
    }

    /// Mesh → RAS matrix of the last generation, row-major, or empty.
    #[wasm_bindgen(js_name = getTransform)]
    pub fn get_transform(&self) -> Vec<f64> {
        self.inner
            .last_transform()
            .map(|t| t.matrix().transpose().iter().map(|&v| v as f64).collect())
            .unwrap_or_default()
    }

    /// `{"points": [...], "cells": [...]}` or an empty string.
    #[wasm_bindgen(js_name = getModelAsJSON)]
    pub fn get_model_as_json(&mut self) -> String {
        let result = self.inner.model_json();
        self.query(result, String::new())
    }

    /// Message of the most recent failure, if the last call failed.
    #[wasm_bindgen(js_name = lastError)]
    pub fn last_error(&self) -> Option<String> {
        self.query_error
            .clone()
            .or_else(|| self.inner.last_error().map(str::to_string))
    }

    /// 0 when the last mutating call succeeded.
    #[wasm_bindgen(js_name = lastStatus)]
    pub fn last_status(&self) -> i32 {
        if self.last_error().is_some() {
            STATUS_FAILURE
        } else {
            STATUS_OK
        }
    }
}
