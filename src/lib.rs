//! Surface-mesh generation from medical image volumes.
//!
//! A dense 16-bit volume with its spacing, origin and direction is turned into
//! a smoothed, decimated triangle mesh through a fixed pipeline:
//!
//! ```text
//! gaussian pre-smooth → isosurface → triangulate → normals → clean
//!     → windowed-sinc smooth → quadric decimate → smooth again
//! ```
//!
//! The mesh is handed back as two flat arrays: `f32` coordinates
//! `[x0, y0, z0, x1, ..]` and `i32` length-prefixed cells `[n, i0, .., i(n-1), ..]`.
//!
//! ```no_run
//! use volmesh::{ModelGenerator, RawVolume};
//!
//! let samples = vec![0i16; 64];
//! let identity = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
//! let mut generator = ModelGenerator::new();
//! generator
//!     .set_volume(&RawVolume::new(&samples, &[4, 4, 4], &[1.0; 3], &[0.0; 3], &identity))
//!     .unwrap();
//! generator.generate_model().unwrap();
//! let points = generator.points().unwrap();
//! let cells = generator.cells().unwrap();
//! # let _ = (points, cells);
//! ```
//!
//! # Features
//! #### Default
//! - **f64**: use f64 as Real
//! - **hashmap**: use hashbrown for point merging and edge adjacency
//!
//! #### Optional
//! - **f32**: use f32 as Real, this conflicts with f64
//! - **wasm**: `wasm-bindgen` handle API with typed-array results
//! - **console_error_panic_hook**: forward panics to the browser console

#![cfg_attr(not(feature = "wasm"), forbid(unsafe_code))]
#![deny(unused)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod errors;
pub mod float_types;
pub mod generator;
pub mod isosurface;
pub mod mesh;
pub mod params;
pub mod pipeline;
pub mod transform;
pub mod volume;

#[cfg(feature = "wasm")]
pub mod wasm;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use errors::{GenerationError, GenerationResult, STATUS_FAILURE, STATUS_OK, status_of};
pub use float_types::Real;
pub use generator::ModelGenerator;
pub use isosurface::{IsosurfaceOps, SurfaceNetsOps};
pub use mesh::{Mesh, Polygon};
pub use params::{DecimationParams, GenerationParameters, SmoothingParams};
pub use pipeline::Stage;
pub use transform::AffineTransform;
pub use volume::{RawVolume, Volume};
