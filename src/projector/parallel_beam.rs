//! Parallel-beam projector: detector rows are aligned with the slices of the
//! volume, so a voxel cylinder maps slice-by-slice onto detector rows and only
//! the channel coordinate depends on the view angle.

/// Parallel-beam implementation of `Projector`
#[derive(Clone, Copy, Debug, Default)]
pub struct ParallelBeam;

impl Projector for ParallelBeam {

    fn forward_project_pixel_batch_to_one_view(
        voxel_values : ArrayView2<Intensityf32>,
        pixel_indices: &[Index1_u],
        angle        : Anglef32,
        params       : &ProjectorParams,
    ) -> View {
        debug_assert_eq!(voxel_values.nrows(), pixel_indices.len());
        let kernel = ChannelKernel::new(pixel_indices, angle, params);
        let mut view = View::zeros((params.num_det_rows(), params.num_channels()));

        for n_offset in kernel.offsets() {
            for (p, cylinder) in voxel_values.outer_iter().enumerate() {
                if let Some((n, a)) = kernel.coefficient(p, n_offset) {
                    // Rows of the view correspond to slices of the cylinder
                    view.column_mut(n).scaled_add(a, &cylinder);
                }
            }
        }
        view
    }

    fn back_project_one_view_to_pixel_batch(
        view         : ArrayView2<Intensityf32>,
        pixel_indices: &[Index1_u],
        angle        : Anglef32,
        params       : &ProjectorParams,
        coeff_power  : i32,
    ) -> VoxelBatch {
        let kernel = ChannelKernel::new(pixel_indices, angle, params);
        let mut cylinders = VoxelBatch::zeros((pixel_indices.len(), params.num_det_rows()));

        for n_offset in kernel.offsets() {
            for (p, mut cylinder) in cylinders.outer_iter_mut().enumerate() {
                if let Some((n, a)) = kernel.coefficient(p, n_offset) {
                    cylinder.scaled_add(a.powi(coeff_power), &view.column(n));
                }
            }
        }
        cylinders
    }
}

// ----- Imports ------------------------------------------------------------------------------------------
use ndarray::ArrayView2;

use crate::{
    View, VoxelBatch,
    Anglef32, Index1_u, Intensityf32,
    geometry::ProjectorParams,
};
use super::{ChannelKernel, Projector};
