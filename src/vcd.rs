//! Vectorized coordinate descent (VCD) reconstruction.
//!
//! Each iteration visits the subsets of one pixel partition in order. For
//! each subset, a diagonally preconditioned Newton step is computed from the
//! weighted error sinogram, its size is chosen by exact line search, and the
//! volume and error sinogram are updated before the next subset is visited.
//! Coarse partitions (few large subsets) make fast early progress; fine
//! partitions converge better, so a typical partition sequence goes from
//! coarse to fine.

/// Reconstruction parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VcdParams {
    pub max_iterations: usize,
    /// Number of subsets of each partition
    pub granularity: Vec<usize>,
    /// Indices into `granularity`: the partition used in each iteration. The
    /// last entry is repeated if there are fewer entries than iterations.
    pub partition_sequence: Vec<usize>,
    pub strategy: Strategy,
    /// Keep voxel values non-negative
    pub positivity: bool,
    pub use_ror_mask: bool,
}

impl Default for VcdParams {
    fn default() -> Self {
        Self {
            max_iterations    : 10,
            granularity       : vec![1, 2, 64, 512],
            partition_sequence: vec![0, 1, 2, 3, 1, 2, 3, 2, 3, 3],
            strategy          : Strategy::Balanced,
            positivity        : true,
            use_ror_mask      : true,
        }
    }
}

/// What happened in one iteration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterationStats {
    pub iteration: usize,
    /// Number of subsets in the partition used
    pub num_subsets: usize,
    /// Weighted cost `½⟨e, We⟩ / N` after the iteration
    pub cost: f32,
}

#[derive(Clone, Debug)]
pub struct Reconstruction {
    pub recon: Volume,
    /// Cost after each iteration
    pub costs: Vec<f32>,
}

/// The state of a reconstruction in progress
pub struct Vcd<'m, P: Projector> {
    model: &'m TomographyModel<P>,
    partitions: Vec<Partition>,
    sequence: Vec<usize>,
    weights: Sinogram,
    /// Diagonal of `AᵀWA`, zero outside the region of reconstruction
    hessian: Volume,
    error: Sinogram,
    recon: Volume,
    positivity: bool,
    iteration: usize,
}

impl<'m, P: Projector> Vcd<'m, P> {

    /// Prepare to reconstruct `sinogram`. Without `weights` every sinogram
    /// entry weighs 1; without `initial` the reconstruction starts from zero.
    pub fn new(
        model   : &'m TomographyModel<P>,
        sinogram: ArrayView3<Intensityf32>,
        weights : Option<ArrayView3<Intensityf32>>,
        initial : Option<Volume>,
        params  : &VcdParams,
        rng     : &mut impl Rng,
    ) -> Result<Self> {
        let mp = model.params();
        check_shape("sinogram [views, rows, channels]", &mp.sinogram_shape, sinogram.shape())?;
        let weights = match weights {
            Some(w) => {
                check_shape("weights [views, rows, channels]", &mp.sinogram_shape, w.shape())?;
                w.to_owned()
            }
            None => Sinogram::ones(sinogram.raw_dim()),
        };
        let [rows, cols, slices] = mp.recon_shape;
        let recon = match initial {
            Some(x) => {
                check_shape("initial volume [rows, cols, slices]", &mp.recon_shape, x.shape())?;
                x
            }
            None => Volume::zeros((rows, cols, slices)),
        };

        let partitions = gen_set_of_pixel_partitions(mp.recon_shape, &params.granularity, params.strategy, params.use_ror_mask, rng)?;
        let sequence = partition_sequence(&params.partition_sequence, params.max_iterations)?;
        if let Some(&index) = sequence.iter().find(|&&i| i >= partitions.len()) {
            return Err(Error::GranularityIndex { index, available: partitions.len() });
        }

        let region = full_indices(mp.recon_shape, params.use_ror_mask);
        let initial_projection = model.sparse_forward_project(get_voxels_at_indices(recon.view(), &region)?.view(), &region)?;
        let error = &sinogram - &initial_projection;

        // The Hessian diagonal depends only on the weights
        let mut hessian = Volume::zeros((rows, cols, slices));
        let region_hessian = model.compute_hessian_diagonal(Some(weights.view()), &region)?;
        add_voxels_at_indices(hessian.view_mut(), &region, region_hessian.view())?;

        Ok(Self { model, partitions, sequence, weights, hessian, error, recon, positivity: params.positivity, iteration: 0 })
    }

    /// Weighted cost `½⟨e, We⟩ / N` of the current reconstruction
    pub fn cost(&self) -> f32 {
        let weighted: f32 = Zip::from(&self.error).and(&self.weights)
            .fold(0.0, |acc, &e, &w| acc + e * w * e);
        0.5 * weighted / self.error.len() as f32
    }

    pub fn recon(&self) -> &Volume { &self.recon }
    pub fn into_recon(self) -> Volume { self.recon }

    /// Current error sinogram `y - Ax`
    pub fn error_sinogram(&self) -> &Sinogram { &self.error }

    pub fn iterations_done(&self) -> usize { self.iteration }

    /// Run one iteration. `None` once all iterations have been run.
    pub fn step(&mut self) -> Result<Option<IterationStats>> {
        let Some(&which) = self.sequence.get(self.iteration) else { return Ok(None) };
        // Take the partition out so that `update_subset` may borrow `self` mutably
        let partition = std::mem::take(&mut self.partitions[which]);
        let result = partition.subsets().try_for_each(|subset| self.update_subset(subset));
        self.partitions[which] = partition;
        result?;

        let stats = IterationStats {
            iteration: self.iteration,
            num_subsets: self.partitions[which].num_subsets(),
            cost: self.cost(),
        };
        info!("Iteration {:3}: {:6} subsets, cost {:.6e}",
              stats.iteration, group_digits(stats.num_subsets), stats.cost);
        self.iteration += 1;
        Ok(Some(stats))
    }

    fn update_subset(&mut self, pixel_indices: &[Index1_u]) -> Result<()> {
        let model = self.model;
        let weighted_error = &self.weights * &self.error;

        // Negative gradient AᵀWe and Hessian diagonal (A∘A)ᵀW
        let neg_gradient = model.sparse_back_project(weighted_error.view(), pixel_indices, 1)?;
        let hessian = get_voxels_at_indices(self.hessian.view(), pixel_indices)?;
        let current = get_voxels_at_indices(self.recon.view(), pixel_indices)?;

        let mut delta = Zip::from(&neg_gradient).and(&hessian)
            .map_collect(|&g, &h| if h > 0.0 { g / h } else { 0.0 });
        if self.positivity {
            Zip::from(&mut delta).and(&current).for_each(|d, &x| *d = d.max(-x));
        }

        let delta_sinogram = model.sparse_forward_project(delta.view(), pixel_indices)?;
        let weighted_delta = &self.weights * &delta_sinogram;
        let numerator  : f32 = Zip::from(&self.error    ).and(&weighted_delta).fold(0.0, |acc, &e, &d| acc + e * d);
        let denominator: f32 = Zip::from(&delta_sinogram).and(&weighted_delta).fold(0.0, |acc, &a, &d| acc + a * d);
        let alpha = if denominator > 0.0 { numerator / denominator } else { 0.0 };
        let alpha = if self.positivity { alpha.clamp(0.0, 1.0) } else { alpha.max(0.0) };
        debug!("{:6} pixels, step size {alpha:.4}", group_digits(pixel_indices.len()));

        delta *= alpha;
        add_voxels_at_indices(self.recon.view_mut(), pixel_indices, delta.view())?;
        self.error.scaled_add(-alpha, &delta_sinogram);
        Ok(())
    }
}

impl<'m, P: Projector> Iterator for Vcd<'m, P> {
    type Item = Result<IterationStats>;
    fn next(&mut self) -> Option<Self::Item> { self.step().transpose() }
}

impl<P: Projector> TomographyModel<P> {

    /// Run all iterations of VCD on `sinogram`
    pub fn recon(
        &self,
        sinogram: ArrayView3<Intensityf32>,
        weights : Option<ArrayView3<Intensityf32>>,
        initial : Option<Volume>,
        params  : &VcdParams,
        rng     : &mut impl Rng,
    ) -> Result<Reconstruction> {
        let mut vcd = Vcd::new(self, sinogram, weights, initial, params, rng)?;
        let costs = vcd.by_ref()
            .map(|stats| stats.map(|s| s.cost))
            .collect::<Result<Vec<_>>>()?;
        Ok(Reconstruction { recon: vcd.into_recon(), costs })
    }
}

// ----- Imports ------------------------------------------------------------------------------------------
use log::{debug, info};
use ndarray::{ArrayView3, Zip};
use rand::Rng;

use crate::{
    Error, Result,
    Index1_u, Intensityf32, Sinogram, Volume,
    error::check_shape,
    model::{TomographyModel, add_voxels_at_indices, get_voxels_at_indices},
    partition::{Partition, Strategy, full_indices, gen_set_of_pixel_partitions, partition_sequence},
    projector::Projector,
    utils::group_digits,
};
