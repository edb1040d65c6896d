//! Whole-sinogram projections built from the single-view projector: views and
//! pixels are processed in batches, under the placement given by an
//! `ExecutionContext`.
//!
//! Reductions happen in a fixed order: a forward projection sums pixel
//! batches in batch order, a back projection sums views in view order, and
//! batches computed concurrently are concatenated in index order.

/// A projector bound to a geometry, a set of view angles and an execution
/// context.
#[derive(Clone, Debug)]
pub struct TomographyModel<P: Projector = ParallelBeam> {
    params: ProjectorParams,
    angles: Vec<Anglef32>,
    execution: ExecutionContext,
    use_ror_mask: bool,
    projector: PhantomData<fn() -> P>,
}

impl<P: Projector> TomographyModel<P> {

    pub fn new(params: ProjectorParams, angles: Vec<Anglef32>, execution: ExecutionContext) -> Result<Self> {
        if angles.len() != params.num_views() {
            return Err(Error::ShapeMismatch {
                what: "number of angles vs sinogram views",
                expected: vec![params.num_views()],
                got: vec![angles.len()],
            });
        }
        if let Some(bad) = angles.iter().find(|a| !a.is_finite()) {
            return Err(Error::InvalidParameter(format!("view angle {bad} is not finite")));
        }
        Ok(Self { params, angles, execution, use_ror_mask: true, projector: PhantomData })
    }

    /// Whether whole-volume projections are restricted to the region of
    /// reconstruction (default: yes)
    pub fn with_ror_mask(mut self, use_ror_mask: bool) -> Self {
        self.use_ror_mask = use_ror_mask;
        self
    }

    pub fn params   (&self) -> &ProjectorParams   { &self.params }
    pub fn angles   (&self) -> &[Anglef32]        { &self.angles }
    pub fn execution(&self) -> &ExecutionContext  { &self.execution }
    pub fn use_ror_mask(&self) -> bool            { self.use_ror_mask }

    /// Project the voxel cylinders `voxel_values[pixel, slice]` at
    /// `pixel_indices` into a full sinogram `[view, row, channel]`.
    pub fn sparse_forward_project(&self, voxel_values: ArrayView2<Intensityf32>, pixel_indices: &[Index1_u]) -> Result<Sinogram> {
        check_shape("voxel values [pixels, slices]",
                    &[pixel_indices.len(), self.params.num_slices()],
                    voxel_values.shape())?;
        self.check_pixel_indices(pixel_indices)?;
        let [_, rows, channels] = self.params.sinogram_shape;
        let pixel_batch_size = self.execution.pixel_batch_size;

        let view_batches = self.execution.map_batches(self.params.num_views(), self.execution.view_batch_size, |views| {
            let mut batch = Sinogram::zeros((views.len(), rows, channels));
            for (mut view, &angle) in batch.outer_iter_mut().zip(&self.angles[views]) {
                for pixels in batch_ranges(pixel_indices.len(), pixel_batch_size) {
                    view += &P::forward_project_pixel_batch_to_one_view(
                        voxel_values.slice(s![pixels.clone(), ..]),
                        &pixel_indices[pixels],
                        angle,
                        &self.params,
                    );
                }
            }
            batch
        });
        concatenate_batches(0, &view_batches)
    }

    /// Back project `sinogram[view, row, channel]` into the voxel cylinders at
    /// `pixel_indices`, returning `[pixel, slice]`. The system matrix
    /// coefficients are raised to `coeff_power`.
    pub fn sparse_back_project(&self, sinogram: ArrayView3<Intensityf32>, pixel_indices: &[Index1_u], coeff_power: i32) -> Result<VoxelBatch> {
        check_shape("sinogram [views, rows, channels]", &self.params.sinogram_shape, sinogram.shape())?;
        self.check_pixel_indices(pixel_indices)?;
        if pixel_indices.is_empty() {
            return Ok(VoxelBatch::zeros((0, self.params.num_slices())));
        }

        let pixel_batches = self.execution.map_batches(pixel_indices.len(), self.execution.pixel_batch_size, |pixels| {
            let indices = &pixel_indices[pixels];
            let mut cylinders = VoxelBatch::zeros((indices.len(), self.params.num_det_rows()));
            for (view, &angle) in sinogram.outer_iter().zip(&self.angles) {
                cylinders += &P::back_project_one_view_to_pixel_batch(view, indices, angle, &self.params, coeff_power);
            }
            cylinders
        });
        concatenate_batches(0, &pixel_batches)
    }

    /// Forward project every pixel of the region of reconstruction of `recon`
    pub fn forward_project(&self, recon: ArrayView3<Intensityf32>) -> Result<Sinogram> {
        check_shape("volume [rows, cols, slices]", &self.params.recon_shape, recon.shape())?;
        let pixel_indices = full_indices(self.params.recon_shape, self.use_ror_mask);
        let voxel_values = get_voxels_at_indices(recon, &pixel_indices)?;
        self.sparse_forward_project(voxel_values.view(), &pixel_indices)
    }

    /// Back project `sinogram` into every pixel of the region of
    /// reconstruction. Pixels outside it are zero.
    pub fn back_project(&self, sinogram: ArrayView3<Intensityf32>) -> Result<Volume> {
        let pixel_indices = full_indices(self.params.recon_shape, self.use_ror_mask);
        let cylinders = self.sparse_back_project(sinogram, &pixel_indices, 1)?;
        let [rows, cols, slices] = self.params.recon_shape;
        let mut recon = Volume::zeros((rows, cols, slices));
        add_voxels_at_indices(recon.view_mut(), &pixel_indices, cylinders.view())?;
        Ok(recon)
    }

    /// Diagonal of the Hessian `AᵀWA` at `pixel_indices`: the back projection
    /// of the sinogram weights with squared coefficients. Without weights,
    /// all sinogram entries weigh 1.
    pub fn compute_hessian_diagonal(&self, weights: Option<ArrayView3<Intensityf32>>, pixel_indices: &[Index1_u]) -> Result<VoxelBatch> {
        match weights {
            Some(weights) => self.sparse_back_project(weights, pixel_indices, 2),
            None => {
                let [views, rows, channels] = self.params.sinogram_shape;
                let ones = Sinogram::ones((views, rows, channels));
                self.sparse_back_project(ones.view(), pixel_indices, 2)
            }
        }
    }

    fn check_pixel_indices(&self, pixel_indices: &[Index1_u]) -> Result<()> {
        check_pixel_indices(pixel_indices, self.params.num_pixels())
    }
}

// ----- Gather / scatter by flat pixel index -----------------------------------------------------

/// The voxel cylinders `[pixel, slice]` of `recon` at `pixel_indices`
pub fn get_voxels_at_indices(recon: ArrayView3<Intensityf32>, pixel_indices: &[Index1_u]) -> Result<VoxelBatch> {
    let (rows, cols, slices) = recon.dim();
    check_pixel_indices(pixel_indices, rows * cols)?;
    let mut cylinders = VoxelBatch::zeros((pixel_indices.len(), slices));
    for (mut cylinder, &pixel) in cylinders.outer_iter_mut().zip(pixel_indices) {
        let [i, j] = index1_to_2(pixel, [rows, cols]);
        cylinder.assign(&recon.slice(s![i, j, ..]));
    }
    Ok(cylinders)
}

/// Add the voxel cylinders `values[pixel, slice]` into `recon` at `pixel_indices`
pub fn add_voxels_at_indices(mut recon: ArrayViewMut3<Intensityf32>, pixel_indices: &[Index1_u], values: ArrayView2<Intensityf32>) -> Result<()> {
    let (rows, cols, slices) = recon.dim();
    check_shape("voxel values [pixels, slices]", &[pixel_indices.len(), slices], values.shape())?;
    check_pixel_indices(pixel_indices, rows * cols)?;
    for (cylinder, &pixel) in values.outer_iter().zip(pixel_indices) {
        let [i, j] = index1_to_2(pixel, [rows, cols]);
        let mut target = recon.slice_mut(s![i, j, ..]);
        target += &cylinder;
    }
    Ok(())
}

fn check_pixel_indices(pixel_indices: &[Index1_u], num_pixels: usize) -> Result<()> {
    match pixel_indices.iter().find(|&&p| p >= num_pixels) {
        Some(p) => Err(Error::InvalidParameter(format!("pixel index {p} outside grid of {num_pixels} pixels"))),
        None    => Ok(()),
    }
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::marker::PhantomData;

use ndarray::{s, ArrayView2, ArrayView3, ArrayViewMut3};

use crate::{
    Error, Result,
    Sinogram, Volume, VoxelBatch,
    Anglef32, Index1_u, Intensityf32,
    batch::{batch_ranges, concatenate_batches, ExecutionContext},
    error::check_shape,
    geometry::ProjectorParams,
    index::index1_to_2,
    partition::full_indices,
    projector::{ParallelBeam, Projector},
};
