//! Filtered back projection (FBP): a direct, non-iterative reconstruction.
//!
//! Every detector row of the sinogram is convolved with a ramp filter, views
//! are filtered in batches and reassembled in view order, and the filtered
//! sinogram is back projected with the adjoint of the forward projector.

/// Spatial-domain ramp (Ram-Lak) filter for a detector with `num_channels`
/// channels, holding the taps for channel offsets `-(n-1) ..= n-1`.
pub fn ramp_filter(num_channels: usize) -> Array1<f32> {
    let n = num_channels as isize;
    (-(n - 1) .. n)
        .map(|offset| match offset {
            0                     => 0.25,
            o if o % 2 == 0       => 0.0,
            o                     => -1.0 / (PI * PI * (o * o) as f32),
        })
        .collect()
}

/// The central `n` samples of the full convolution of `row` (length `n`) with
/// `filter` (length `2n - 1`)
fn convolve_central(row: ArrayView1<f32>, filter: &Array1<f32>, mut out: ArrayViewMut1<f32>) {
    let n = row.len();
    for (i, o) in out.iter_mut().enumerate() {
        *o = row.iter().enumerate()
            .map(|(m, &r)| r * filter[i + n - 1 - m])
            .sum();
    }
}

impl<P: Projector> TomographyModel<P> {

    /// Apply the FBP ramp filter along the channels of every detector row.
    ///
    /// The filter is scaled by `1/Δvoxel²` and the result by `π / num_views`,
    /// so that back projecting it reconstructs voxel values directly.
    pub fn fbp_filter(&self, sinogram: ArrayView3<Intensityf32>) -> Result<Sinogram> {
        let params = self.params();
        check_shape("sinogram [views, rows, channels]", &params.sinogram_shape, sinogram.shape())?;
        let [num_views, rows, channels] = params.sinogram_shape;
        let delta_voxel = params.geometry.delta_voxel;
        let filter = ramp_filter(channels) / (delta_voxel * delta_voxel);

        let execution = self.execution();
        let batches = execution.map_batches(num_views, execution.view_batch_size, |views| {
            let mut filtered = Sinogram::zeros((views.len(), rows, channels));
            let batch = sinogram.slice(s![views, .., ..]);
            Zip::from(filtered.rows_mut())
                .and(batch.rows())
                .for_each(|out, row| convolve_central(row, &filter, out));
            filtered
        });
        let mut filtered = concatenate_batches(0, &batches)?;
        filtered *= PI / num_views as f32;
        Ok(filtered)
    }

    /// Reconstruct `sinogram` by filtered back projection
    pub fn fbp_recon(&self, sinogram: ArrayView3<Intensityf32>) -> Result<Volume> {
        let filtered = self.fbp_filter(sinogram)?;
        self.back_project(filtered.view())
    }
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::f32::consts::PI;

use ndarray::{s, Array1, ArrayView1, ArrayView3, ArrayViewMut1, Zip};

use crate::{
    Result,
    Intensityf32, Sinogram, Volume,
    batch::concatenate_batches,
    error::check_shape,
    model::TomographyModel,
    projector::Projector,
};

// ------------------------------ TESTS ------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};
    use float_eq::assert_float_eq;
    use ndarray::array;
    use rstest::rstest;
    use units::mm;

    use crate::{
        Error,
        batch::{ExecutionContext, Placement},
        geometry::{GeometryParams, ProjectorParams},
    };

    fn model(size: usize, num_views: usize, delta: f32, execution: ExecutionContext) -> TomographyModel {
        let geometry = GeometryParams::new(mm(delta), mm(0.0), mm(delta)).unwrap();
        let params = ProjectorParams::new([num_views, 1, size], [size, size, 1], geometry).unwrap();
        let angles = (0..num_views).map(|v| v as f32 * PI / num_views as f32).collect();
        TomographyModel::new(params, angles, execution).unwrap()
    }

    /// Disc of value 1 and radius `radius` voxels, centred in the grid
    fn disc(size: usize, radius: f32) -> Volume {
        let c = (size as f32 - 1.0) / 2.0;
        Volume::from_shape_fn((size, size, 1), |(i, j, _)| {
            let (y, x) = (i as f32 - c, j as f32 - c);
            if x * x + y * y <= radius * radius { 1.0 } else { 0.0 }
        })
    }

    fn mean_where(volume: &Volume, keep: impl Fn(f32) -> bool) -> f32 {
        let (size, _, _) = volume.dim();
        let c = (size as f32 - 1.0) / 2.0;
        let (sum, count) = volume.indexed_iter()
            .filter(|&((i, j, _), _)| keep(((i as f32 - c).powi(2) + (j as f32 - c).powi(2)).sqrt()))
            .fold((0.0, 0), |(s, n), (_, &v)| (s + v, n + 1));
        sum / count as f32
    }

    #[test]
    fn ramp_filter_taps() {
        let f = ramp_filter(4);
        let a = 1.0 / (PI * PI);
        let expected = array![-a / 9.0, 0.0, -a, 0.25, -a, 0.0, -a / 9.0];
        assert_float_eq!(f.to_vec(), expected.to_vec(), abs_all <= 1e-7);
        // The ramp removes the mean: the taps of a long filter almost cancel
        assert!(ramp_filter(2001).sum().abs() < 2e-4);
    }

    #[test]
    fn convolution_keeps_centre() {
        let row = array![0.0_f32, 1.0, 0.0];
        let filter = array![1.0_f32, 2.0, 3.0, 4.0, 5.0];
        let mut out = Array1::zeros(3);
        convolve_central(row.view(), &filter, out.view_mut());
        // An impulse at the centre reproduces the central taps
        assert_eq!(out, array![2.0, 3.0, 4.0]);
    }

    #[rstest(/**/ delta, case(1.0), case(0.5))]
    fn disc_is_recovered(delta: f32) {
        let size = 48;
        let model = model(size, 96, delta, ExecutionContext::serial());
        let truth = disc(size, 14.0);
        let sinogram = model.forward_project(truth.view()).unwrap();
        let recon = model.fbp_recon(sinogram.view()).unwrap();
        let inside  = mean_where(&recon, |r| r < 9.0);
        let outside = mean_where(&recon, |r| r > 18.0 && r < 22.0);
        assert!((inside - 1.0).abs() < 0.1, "inside: {inside}");
        assert!(outside.abs() < 0.1, "outside: {outside}");
    }

    #[test]
    fn filtering_is_independent_of_batching() {
        let size = 16;
        let truth = disc(size, 5.0);
        let reference = model(size, 10, 1.0, ExecutionContext::serial());
        let sinogram = reference.forward_project(truth.view()).unwrap();
        let filtered = reference.fbp_filter(sinogram.view()).unwrap();
        for placement in [Placement::Serial, Placement::Threads(3)] {
            let batched = model(size, 10, 1.0, ExecutionContext::new(placement, 3, 7).unwrap());
            assert_eq!(batched.fbp_filter(sinogram.view()).unwrap(), filtered);
        }
    }

    #[test]
    fn zero_sinogram_gives_zero_volume() {
        let model = model(8, 4, 1.0, ExecutionContext::serial());
        let recon = model.fbp_recon(Sinogram::zeros((4, 1, 8)).view()).unwrap();
        assert_eq!(recon, Volume::zeros((8, 8, 1)));
    }

    #[test]
    fn wrong_sinogram_shape_is_rejected() {
        let model = model(8, 4, 1.0, ExecutionContext::serial());
        let result = model.fbp_filter(Sinogram::zeros((4, 1, 7)).view());
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }
}
