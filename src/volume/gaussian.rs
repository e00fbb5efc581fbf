//! Separable Gaussian smoothing of a volume

use crate::float_types::Real;
use crate::volume::Volume;

/// Half of a symmetric 1D Gaussian kernel: `weights[d]` is the weight at offset `±d`.
///
/// The half-width is `floor(sigma * radius_factor)`, so a small sigma can give a
/// kernel of width 1, which leaves the volume unchanged.
pub fn half_kernel(sigma: Real, radius_factor: Real) -> Vec<f32> {
    if !(sigma > 0.0) || !(radius_factor > 0.0) {
        return vec![1.0];
    }
    let radius = (sigma * radius_factor).floor();
    let radius = if radius.is_finite() { radius as usize } else { 0 };

    let denominator = 2.0 * sigma * sigma;
    (0..=radius)
        .map(|d| {
            let d = d as Real;
            (-(d * d) / denominator).exp() as f32
        })
        .collect()
}

/// Blur `samples` along one axis. Near the border the kernel is truncated
/// and the remaining weights renormalised.
fn smooth_axis(volume: &Volume, samples: &[f32], axis: usize, weights: &[f32]) -> Vec<f32> {
    let shape = volume.shape();
    let dims = volume.dimensions();
    let stride = shape.stride(axis);
    let extent = dims[axis];
    let radius = weights.len() - 1;

    let mut out = vec![0.0_f32; samples.len()];
    for (i, value) in out.iter_mut().enumerate() {
        let c = (i / stride) % extent;
        let lo = c.saturating_sub(radius);
        let hi = (c + radius).min(extent - 1);

        let mut sum = 0.0_f32;
        let mut norm = 0.0_f32;
        for k in lo..=hi {
            let w = weights[k.abs_diff(c)];
            // i - c*stride is the start of this line
            sum += w * samples[i - c * stride + k * stride];
            norm += w;
        }
        *value = sum / norm;
    }
    out
}

impl Volume {
    /// Gaussian-smoothed copy with the same `sigma` (in voxels) on all three axes.
    pub fn gaussian_smoothed(&self, sigma: Real, radius_factor: Real) -> Volume {
        let weights = half_kernel(sigma, radius_factor);
        if weights.len() == 1 {
            return self.clone();
        }

        let mut samples = self.samples().to_vec();
        for axis in 0..3 {
            if self.dimensions()[axis] > 1 {
                samples = smooth_axis(self, &samples, axis, &weights);
            }
        }
        self.with_samples(samples)
    }
}
