//! Forward and back projection between batches of voxel cylinders and single
//! sinogram views.
//!
//! The projection of a voxel cylinder onto the detector is evaluated
//! analytically: a square voxel seen at angle θ casts a trapezoidal footprint
//! whose width, in channel units, is `Δvoxel/Δchannel · max(|cos θ|, |sin θ|)`.
//! The overlap of that footprint with each of the `2R + 1` channels around the
//! nearest one gives the system matrix coefficients, so no ray tracing is
//! needed.
//!
//! Forward and back projection obtain their coefficients from the same
//! `ChannelKernel::coefficient`, which makes them an exact adjoint pair.
//! Both accumulate in the same fixed order: channel offsets from `-R` to `+R`
//! in the outer loop, pixels in batch order in the inner loop.

/// Abstract interface for forward-backward projection implementations
pub trait Projector {

    /// Project the voxel cylinders `voxel_values[pixel, slice]` located at
    /// `pixel_indices` into one view `[detector row, channel]` at `angle`.
    fn forward_project_pixel_batch_to_one_view(
        voxel_values : ArrayView2<Intensityf32>,
        pixel_indices: &[Index1_u],
        angle        : Anglef32,
        params       : &ProjectorParams,
    ) -> View;

    /// Back project one view into the voxel cylinders at `pixel_indices`,
    /// returning `[pixel, detector row]`. The system matrix coefficients are
    /// raised to `coeff_power`: normally 1, but 2 when computing the diagonal
    /// of the Hessian.
    fn back_project_one_view_to_pixel_batch(
        view         : ArrayView2<Intensityf32>,
        pixel_indices: &[Index1_u],
        angle        : Anglef32,
        params       : &ProjectorParams,
        coeff_power  : i32,
    ) -> VoxelBatch;
}

pub mod parallel_beam;
pub use parallel_beam::ParallelBeam;

// ----- Geometric data shared by both projection directions ---------------------------------------

/// Where the centre of one voxel cylinder lands on the detector
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelFootprint {
    /// Fractional detector-channel coordinate
    pub n_p: f32,
    /// Nearest detector channel (may lie outside the detector)
    pub n_p_center: isize,
}

/// The quantities needed to evaluate system matrix coefficients for a batch
/// of pixels in one view.
#[derive(Clone, Debug)]
pub struct ProjData {
    pub footprints: Vec<PixelFootprint>,
    /// Projected voxel width along the channel axis, in channel units
    pub w_p_c: f32,
    /// `max(|cos θ|, |sin θ|)`: converts overlap length into path length
    pub cos_alpha_p_xy: f32,
}

/// Compute the channel footprints of the pixels at `pixel_indices`, at `angle`
pub fn compute_proj_data(pixel_indices: &[Index1_u], angle: Anglef32, params: &ProjectorParams) -> ProjData {
    let gp = &params.geometry;
    let [rows, cols, _] = params.recon_shape;
    let rotation = ViewRotation::new(angle);
    let det_center_channel = (params.num_channels() as f32 - 1.0) / 2.0;

    let footprints = pixel_indices.iter()
        .map(|&pixel| {
            let [i, j] = index1_to_2(pixel, [rows, cols]);
            let x_p = rotation.recon_ij_to_x(i, j, gp.delta_voxel, params.recon_shape);
            let n_p = (x_p + gp.det_channel_offset) / gp.delta_det_channel + det_center_channel;
            PixelFootprint { n_p, n_p_center: n_p.round() as isize }
        })
        .collect();

    let cos_alpha_p_xy = rotation.cosine.abs().max(rotation.sine.abs());
    let w_p_c = (gp.delta_voxel / gp.delta_det_channel) * cos_alpha_p_xy;
    ProjData { footprints, w_p_c, cos_alpha_p_xy }
}

/// System matrix coefficients between a batch of pixels and the detector
/// channels of one view.
pub struct ChannelKernel {
    proj: ProjData,
    delta_voxel: Lengthf32,
    psf_radius: isize,
    num_channels: usize,
    l_max: f32,
}

impl ChannelKernel {

    pub fn new(pixel_indices: &[Index1_u], angle: Anglef32, params: &ProjectorParams) -> Self {
        let proj = compute_proj_data(pixel_indices, angle, params);
        let l_max = proj.w_p_c.min(1.0);
        Self {
            proj,
            delta_voxel : params.geometry.delta_voxel,
            psf_radius  : params.geometry.psf_radius as isize,
            num_channels: params.num_channels(),
            l_max,
        }
    }

    /// Channel offsets, relative to each pixel's nearest channel, which may
    /// receive a contribution. Always iterated in increasing order.
    pub fn offsets(&self) -> RangeInclusive<isize> { -self.psf_radius ..= self.psf_radius }

    pub fn proj_data(&self) -> &ProjData { &self.proj }

    /// The channel hit by `pixel` (position in the batch) at `n_offset` from
    /// its nearest channel, and the corresponding system matrix coefficient.
    /// `None` if that channel lies outside the detector.
    #[inline]
    pub fn coefficient(&self, pixel: usize, n_offset: isize) -> Option<(usize, Weightf32)> {
        let PixelFootprint { n_p, n_p_center } = self.proj.footprints[pixel];
        let n = n_p_center + n_offset;
        if n < 0 || n >= self.num_channels as isize { return None }
        let abs_delta_p_c_n = (n_p - n as f32).abs();
        let l_p_c_n = ((self.proj.w_p_c + 1.0) / 2.0 - abs_delta_p_c_n).clamp(0.0, self.l_max);
        Some((n as usize, self.delta_voxel * l_p_c_n / self.proj.cos_alpha_p_xy))
    }
}

// ----- Checked entry points ----------------------------------------------------------------------

/// Forward project a batch of voxel cylinders into one view, after checking
/// that the shapes are consistent with `params`.
pub fn forward_project_batch<P: Projector>(
    voxel_values : ArrayView2<Intensityf32>,
    pixel_indices: &[Index1_u],
    angle        : Anglef32,
    params       : &ProjectorParams,
) -> Result<View> {
    check_shape("voxel batch [pixels, slices]",
                &[pixel_indices.len(), params.num_slices()],
                voxel_values.shape())?;
    Ok(P::forward_project_pixel_batch_to_one_view(voxel_values, pixel_indices, angle, params))
}

/// Back project one view into a batch of voxel cylinders, after checking that
/// the shapes are consistent with `params`.
pub fn back_project_batch<P: Projector>(
    view         : ArrayView2<Intensityf32>,
    pixel_indices: &[Index1_u],
    angle        : Anglef32,
    params       : &ProjectorParams,
    coeff_power  : i32,
) -> Result<VoxelBatch> {
    check_shape("sinogram view [rows, channels]",
                &[params.num_det_rows(), params.num_channels()],
                view.shape())?;
    Ok(P::back_project_one_view_to_pixel_batch(view, pixel_indices, angle, params, coeff_power))
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::ops::RangeInclusive;

use ndarray::ArrayView2;

use crate::{
    Result, View, VoxelBatch,
    Anglef32, Index1_u, Intensityf32, Lengthf32, Weightf32,
    error::check_shape,
    geometry::{ProjectorParams, ViewRotation},
    index::index1_to_2,
};
