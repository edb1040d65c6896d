//! Configuration file parser for VCD reconstruction

/// Contents of a reconstruction configuration file
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub geometry: Geometry,

    #[serde(default)]
    pub recon: Recon,

    #[serde(default)]
    pub batching: Batching,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Geometry {

    /// `[views, detector rows, detector channels]`
    pub sinogram_shape: SinoDim_u,

    #[serde(default = "one_mm", deserialize_with = "deserialize_uom")]
    pub delta_det_channel: Length,

    /// Each detector row sees one slice, so this must equal `delta_voxel`
    /// when given
    #[serde(default, deserialize_with = "deserialize_uom_opt")]
    pub delta_det_row: Option<Length>,

    #[serde(default = "zero_mm", deserialize_with = "deserialize_uom")]
    pub det_channel_offset: Length,

    #[serde(default = "one_mm", deserialize_with = "deserialize_uom")]
    pub delta_voxel: Length,

    /// `[rows, columns, slices]`; just large enough to cover the detector if absent
    #[serde(default)]
    pub recon_shape: Option<VolumeDim_u>,

    #[serde(default)]
    pub angles: Angles,
}

/// Equally spaced view angles from `start` (included) to `end` (excluded)
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Angles {
    #[serde(deserialize_with = "deserialize_uom")]
    pub start: Angle,
    #[serde(deserialize_with = "deserialize_uom")]
    pub end: Angle,
}

impl Default for Angles {
    fn default() -> Self { Self { start: degree(0.0), end: degree(180.0) } }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Recon {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Number of subsets in each available partition
    #[serde(default = "default_granularity")]
    pub granularity: Vec<usize>,

    /// Which of the `granularity` partitions to use in each iteration
    #[serde(default = "default_partition_sequence")]
    pub partition_sequence: Vec<usize>,

    #[serde(default)]
    pub strategy: Strategy,

    #[serde(default = "yes")]
    pub positivity: bool,

    #[serde(default = "yes")]
    pub use_ror_mask: bool,

    /// Seed for the random partitions; fresh entropy if absent
    pub seed: Option<u64>,
}

impl Default for Recon {
    fn default() -> Self {
        let VcdParams { max_iterations, granularity, partition_sequence, strategy, positivity, use_ror_mask } = VcdParams::default();
        Self { max_iterations, granularity, partition_sequence, strategy, positivity, use_ror_mask, seed: None }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Batching {
    #[serde(default = "default_view_batch_size")]
    pub view_batch_size: usize,

    #[serde(default = "default_pixel_batch_size")]
    pub pixel_batch_size: usize,

    /// Size of the thread pool; everything runs on the calling thread if absent
    pub threads: Option<usize>,
}

impl Default for Batching {
    fn default() -> Self {
        Self { view_batch_size: default_view_batch_size(), pixel_batch_size: default_pixel_batch_size(), threads: None }
    }
}

fn one_mm () -> Length { mm(1.0) }
fn zero_mm() -> Length { mm(0.0) }
fn yes() -> bool { true }
fn default_max_iterations    () -> usize      { VcdParams::default().max_iterations }
fn default_granularity       () -> Vec<usize> { VcdParams::default().granularity }
fn default_partition_sequence() -> Vec<usize> { VcdParams::default().partition_sequence }
fn default_view_batch_size   () -> usize      { ExecutionContext::default().view_batch_size }
fn default_pixel_batch_size  () -> usize      { ExecutionContext::default().pixel_batch_size }

impl Config {

    /// The validated geometry record. The recon shape is derived from the
    /// detector when not given explicitly.
    pub fn projector_params(&self) -> Result<ProjectorParams> {
        let g = &self.geometry;
        let geometry = GeometryParams::new(g.delta_det_channel, g.det_channel_offset, g.delta_voxel)?;
        if let Some(delta_det_row) = g.delta_det_row.map(mm_) {
            if delta_det_row != geometry.delta_voxel {
                return Err(Error::InvalidParameter(format!(
                    "detector row spacing ({delta_det_row} mm) must equal voxel spacing ({} mm) in parallel-beam geometry",
                    geometry.delta_voxel,
                )));
            }
        }
        let recon_shape = g.recon_shape.unwrap_or_else(|| auto_recon_shape(
            g.sinogram_shape, geometry.delta_det_channel, geometry.delta_voxel,
        ));
        ProjectorParams::new(g.sinogram_shape, recon_shape, geometry)
    }

    /// One angle per view, in radians
    pub fn angles(&self) -> Vec<Anglef32> {
        let Angles { start, end } = self.geometry.angles;
        let (start, end) = (radian_(start), radian_(end));
        let num_views = self.geometry.sinogram_shape[0];
        let step = (end - start) / num_views as f32;
        (0..num_views).map(|v| start + v as f32 * step).collect()
    }

    pub fn vcd_params(&self) -> VcdParams {
        let Recon { max_iterations, ref granularity, ref partition_sequence, strategy, positivity, use_ror_mask, .. } = self.recon;
        VcdParams {
            max_iterations,
            granularity: granularity.clone(),
            partition_sequence: partition_sequence.clone(),
            strategy,
            positivity,
            use_ror_mask,
        }
    }

    /// The execution context described by the `[batching]` table, with the
    /// thread count optionally overridden
    pub fn execution(&self, threads: Option<usize>) -> Result<ExecutionContext> {
        let Batching { view_batch_size, pixel_batch_size, threads: configured } = self.batching;
        let placement = match threads.or(configured) {
            Some(n) => Placement::Threads(n),
            None    => Placement::Serial,
        };
        ExecutionContext::new(placement, view_batch_size, pixel_batch_size)
    }
}

pub fn read_config_file(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)
        .map_err(|source| Error::ConfigFile { path: path.to_owned(), source })?;
    Ok(toml::from_str(&text)?)
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::{fs, path::Path};

use serde::Deserialize;
use units::{Angle, Length, degree, mm, mm_, radian_};

use crate::{
    Error, Result,
    Anglef32, SinoDim_u, VolumeDim_u,
    batch::{ExecutionContext, Placement},
    config::{deserialize_uom, deserialize_uom_opt},
    geometry::{GeometryParams, ProjectorParams, auto_recon_shape},
    partition::Strategy,
    vcd::VcdParams,
};
