// main.rs
//
// Runs the generator on a synthetic volume holding a ball of bright voxels and
// prints the size of the resulting mesh for a few decimation targets.

use volmesh::{GenerationParameters, ModelGenerator, RawVolume};

const DIM: u16 = 48;
const IDENTITY: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

fn ball(n: usize, radius: f32) -> Vec<i16> {
    let c = (n as f32 - 1.0) / 2.0;
    let mut samples = Vec::with_capacity(n * n * n);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2) + (z as f32 - c).powi(2))
                    .sqrt();
                samples.push(if d < radius { 1000 } else { -1000 });
            }
        }
    }
    samples
}

fn main() {
    let n = DIM as usize;
    let samples = ball(n, n as f32 / 3.0);
    let dims = [DIM; 3];
    let spacing = [0.8, 0.8, 1.5];
    let origin = [-20.0, -20.0, -35.0];

    for reduction in [0.0, 0.5, 0.9] {
        let params = GenerationParameters {
            decimation_target_reduction: reduction,
            apply_transform_for_nifti: true,
            ..Default::default()
        };
        let mut generator = ModelGenerator::with_parameters(params);
        if let Err(err) =
            generator.set_volume(&RawVolume::new(&samples, &dims, &spacing, &origin, &IDENTITY))
        {
            eprintln!("setVolume failed: {err}");
            return;
        }
        if let Err(err) = generator.generate_model() {
            eprintln!("generateModel failed: {err}");
            return;
        }

        let Ok(mesh) = generator.model() else {
            return;
        };
        let bounds = mesh
            .bounding_box()
            .map(|(min, max)| format!("{:?} .. {:?}", min.coords.as_slice(), max.coords.as_slice()))
            .unwrap_or_else(|| "empty".to_string());
        println!(
            "reduction {reduction:.1}: {} points, {} cells, point array {}, cell array {}, bounds {bounds}",
            mesh.point_count(),
            mesh.cell_count(),
            mesh.point_array_size(),
            mesh.cell_array_size(),
        );
    }
}
