pub use units::todo::{Lengthf32, Anglef32, Weightf32, Intensityf32};

pub use crate::index::{Index1_u, Index2_u, GridDim_u, VolumeDim_u, SinoDim_u};

/// Per-pixel values of a batch of voxel cylinders: `[pixel, slice]`
pub type VoxelBatch = ndarray::Array2<Intensityf32>;

/// One view of the sinogram: `[detector row, detector channel]`
pub type View = ndarray::Array2<Intensityf32>;

/// Sinogram: `[view, detector row, detector channel]`
pub type Sinogram = ndarray::Array3<Intensityf32>;

/// Reconstructed volume: `[row, column, slice]`
pub type Volume = ndarray::Array3<Intensityf32>;
