//! Parallel-beam scanner geometry: the immutable parameter record shared by
//! every projection, and the transformation of voxel-grid indices into
//! detector-channel coordinates.

use units::{Length, mm_};

use crate::{Error, Result, Lengthf32, Anglef32, SinoDim_u, VolumeDim_u};

/// Primary geometry parameters of a parallel-beam model, in mm.
///
/// Computed once from the model configuration and never mutated; cheap to copy
/// into every projection call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometryParams {
    pub delta_det_channel : Lengthf32,
    pub det_channel_offset: Lengthf32,
    pub delta_voxel       : Lengthf32,
    /// Maximum number of detector channels on either side of the nearest
    /// channel which can be hit by a single voxel cylinder
    pub psf_radius        : usize,
}

impl GeometryParams {

    pub fn new(delta_det_channel: Length, det_channel_offset: Length, delta_voxel: Length) -> Result<Self> {
        let (delta_det_channel, det_channel_offset, delta_voxel) =
            (mm_(delta_det_channel), mm_(det_channel_offset), mm_(delta_voxel));
        let valid = |d: f32| d > 0.0 && d.is_finite();
        if !valid(delta_det_channel) || !valid(delta_voxel) {
            return Err(Error::InvalidParameter(format!(
                "channel spacing ({delta_det_channel} mm) and voxel spacing ({delta_voxel} mm) must be positive and finite"
            )));
        }
        if !det_channel_offset.is_finite() {
            return Err(Error::InvalidParameter("channel offset must be finite".into()));
        }
        let psf_radius = psf_radius(delta_det_channel, delta_voxel);
        Ok(Self { delta_det_channel, det_channel_offset, delta_voxel, psf_radius })
    }
}

/// Integer radius of the point-spread kernel, in detector channels
pub fn psf_radius(delta_det_channel: Lengthf32, delta_voxel: Lengthf32) -> usize {
    ((delta_voxel / delta_det_channel).ceil() / 2.0).ceil() as usize
}

/// Everything a projector needs to know about the problem, apart from the
/// angle of the view being projected.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectorParams {
    /// `[views, detector rows, detector channels]`
    pub sinogram_shape: SinoDim_u,
    /// `[rows, columns, slices]`
    pub recon_shape: VolumeDim_u,
    pub geometry: GeometryParams,
}

impl ProjectorParams {

    pub fn new(sinogram_shape: SinoDim_u, recon_shape: VolumeDim_u, geometry: GeometryParams) -> Result<Self> {
        if sinogram_shape.contains(&0) || recon_shape.contains(&0) {
            return Err(Error::InvalidParameter(format!(
                "empty shapes are not allowed: sinogram {sinogram_shape:?}, recon {recon_shape:?}"
            )));
        }
        if recon_shape[2] != sinogram_shape[1] {
            return Err(Error::ShapeMismatch {
                what: "recon slices vs sinogram rows",
                expected: vec![sinogram_shape[1]],
                got: vec![recon_shape[2]],
            });
        }
        Ok(Self { sinogram_shape, recon_shape, geometry })
    }

    pub fn num_views   (&self) -> usize { self.sinogram_shape[0] }
    pub fn num_det_rows(&self) -> usize { self.sinogram_shape[1] }
    pub fn num_channels(&self) -> usize { self.sinogram_shape[2] }
    pub fn num_slices  (&self) -> usize { self.recon_shape[2] }
    pub fn num_pixels  (&self) -> usize { self.recon_shape[0] * self.recon_shape[1] }
}

/// Default recon shape: just large enough for the projection of the volume to
/// cover the detector, with one slice per detector row.
pub fn auto_recon_shape(
    [_views, num_det_rows, num_det_channels]: SinoDim_u,
    delta_det_channel: Lengthf32,
    delta_voxel      : Lengthf32,
) -> VolumeDim_u {
    // Magnification is 1 in parallel-beam geometry
    let rows = (num_det_channels as Lengthf32 * delta_det_channel / delta_voxel).ceil() as usize;
    [rows, rows, num_det_rows]
}

/// Cosine and sine of a view angle, computed once per view
#[derive(Clone, Copy, Debug)]
pub struct ViewRotation {
    pub cosine: f32,
    pub sine  : f32,
}

impl ViewRotation {
    pub fn new(angle: Anglef32) -> Self {
        let (sine, cosine) = angle.sin_cos();
        Self { cosine, sine }
    }

    /// Position along the detector-channel axis of the centre of voxel
    /// `(i, j)` (row, column), after rotating the volume by this view's angle.
    #[inline]
    pub fn recon_ij_to_x(&self, i: usize, j: usize, delta_voxel: Lengthf32, [rows, cols, _]: VolumeDim_u) -> Lengthf32 {
        // Note the change in order from (i, j) to (y, x)
        let y_tilde = delta_voxel * (i as f32 - (rows as f32 - 1.0) / 2.0);
        let x_tilde = delta_voxel * (j as f32 - (cols as f32 - 1.0) / 2.0);
        // The rotated y component is irrelevant to a parallel-beam detector
        self.cosine * x_tilde - self.sine * y_tilde
    }
}

/// Convert voxel indices `(i, j)` into the rotated channel-axis coordinate at `angle`
pub fn recon_ij_to_x(i: usize, j: usize, delta_voxel: Lengthf32, recon_shape: VolumeDim_u, angle: Anglef32) -> Lengthf32 {
    ViewRotation::new(angle).recon_ij_to_x(i, j, delta_voxel, recon_shape)
}
