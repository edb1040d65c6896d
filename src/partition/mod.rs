//! Partitions of the voxel grid into subsets of pixel indices, for
//! coordinate-descent sweeps over the volume.
//!
//! A partition with `k` subsets of size `m` covers every pixel of the region
//! of reconstruction (RoR) using only RoR pixels. When the RoR does not divide
//! evenly, some subsets are padded with pixels borrowed from other subsets, so
//! that all subsets have the same size; a pixel never appears twice in the
//! same subset. Indices within each subset are sorted.
//!
//! Three interchangeable strategies are provided:
//!
//! + `Strategy::Balanced`: random shuffle split into equal chunks
//!
//! + `Strategy::Grid`: a randomly labelled `s x s` tile, `s = ceil(sqrt(k))`,
//!   repeated across the grid
//!
//! + `Strategy::BlueNoise`: a tiled ordered-dither (Bayer) rank pattern
//!   thresholded into `k` bands. This stands in for a true blue-noise
//!   pattern: bands are evenly spread, but periodic at power-of-two scales.

pub mod pattern;

/// How pixels are assigned to subsets
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    #[default]
    Balanced,
    Grid,
    /// Thresholded ordered-dither (Bayer) pattern, not void-and-cluster noise
    BlueNoise,
}

/// `num_subsets` subsets of `subset_size` pixel indices each, stored row by row
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Partition {
    indices: Vec<Index1_u>,
    subset_size: usize,
}

impl Partition {

    fn from_subsets(subsets: Vec<Vec<Index1_u>>) -> Self {
        let subset_size = subsets.first().map_or(0, Vec::len);
        debug_assert!(subsets.iter().all(|s| s.len() == subset_size));
        Self { indices: subsets.into_iter().flatten().collect(), subset_size }
    }

    pub fn num_subsets(&self) -> usize {
        if self.subset_size == 0 { 0 } else { self.indices.len() / self.subset_size }
    }

    pub fn subset_size(&self) -> usize { self.subset_size }

    pub fn subset(&self, i: usize) -> &[Index1_u] {
        &self.indices[i * self.subset_size .. (i + 1) * self.subset_size]
    }

    /// Subsets in the order in which they should be visited
    pub fn subsets(&self) -> std::slice::ChunksExact<'_, Index1_u> {
        self.indices.chunks_exact(self.subset_size.max(1))
    }

    /// `[num_subsets, subset_size]` array of pixel indices
    pub fn to_array(&self) -> Array2<Index1_u> {
        let m = self.subset_size;
        Array2::from_shape_fn((self.num_subsets(), m), |(i, j)| self.indices[i * m + j])
    }
}

// ----- Region of reconstruction -----------------------------------------------------------------

/// Mask which is true inside the circle inscribed in the `[rows, cols]` grid
pub fn ror_mask([rows, cols]: GridDim_u) -> Array2<bool> {
    let row_center = (rows as f32 - 1.0) / 2.0;
    let col_center = (cols as f32 - 1.0) / 2.0;
    let radius = row_center.max(col_center);
    let radius_squared = radius * radius;
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        let (y, x) = (i as f32 - row_center, j as f32 - col_center);
        x * x + y * y <= radius_squared
    })
}

/// Mask selecting the pixels that may be reconstructed
pub fn region_mask(recon_shape: VolumeDim_u, use_ror_mask: bool) -> Array2<bool> {
    let grid = [recon_shape[0], recon_shape[1]];
    if use_ror_mask { ror_mask(grid) }
    else            { Array2::from_elem((grid[0], grid[1]), true) }
}

fn masked_indices(mask: &Array2<bool>) -> Vec<Index1_u> {
    let ncols = mask.ncols();
    mask.indexed_iter()
        .filter(|&(_, &inside)| inside)
        .map(|((i, j), _)| index2_to_1([i, j], [mask.nrows(), ncols]))
        .collect()
}

/// All pixel indices in the region of reconstruction, ascending: the
/// degenerate single-subset partition used for whole-volume projections.
pub fn full_indices(recon_shape: VolumeDim_u, use_ror_mask: bool) -> Vec<Index1_u> {
    masked_indices(&region_mask(recon_shape, use_ror_mask))
}

// ----- Partition construction -------------------------------------------------------------------

/// Partition the pixels of `recon_shape`'s grid into `num_subsets` subsets.
///
/// If `num_subsets` exceeds the number of available pixels, a warning is
/// logged and the number of subsets is reduced to the number of pixels.
pub fn partition(
    recon_shape : VolumeDim_u,
    num_subsets : usize,
    strategy    : Strategy,
    use_ror_mask: bool,
    rng         : &mut impl Rng,
) -> Result<Partition> {
    if num_subsets == 0 {
        return Err(Error::InvalidParameter("number of partition subsets must be positive".into()));
    }
    let mask = region_mask(recon_shape, use_ror_mask);
    let region = masked_indices(&mask);
    if region.is_empty() {
        return Err(Error::InvalidParameter(format!("region of reconstruction of {recon_shape:?} is empty")));
    }
    let num_subsets = clamp_num_subsets(num_subsets, region.len());
    Ok(match strategy {
        Strategy::Balanced  => balanced_random(region, num_subsets, rng),
        Strategy::Grid      => grid_tiled(&mask, num_subsets, rng),
        Strategy::BlueNoise => blue_noise(&mask, region, num_subsets, rng),
    })
}

/// One partition for each entry of `granularity` (numbers of subsets)
pub fn gen_set_of_pixel_partitions(
    recon_shape : VolumeDim_u,
    granularity : &[usize],
    strategy    : Strategy,
    use_ror_mask: bool,
    rng         : &mut impl Rng,
) -> Result<Vec<Partition>> {
    granularity.iter()
        .map(|&num_subsets| partition(recon_shape, num_subsets, strategy, use_ror_mask, &mut *rng))
        .collect()
}

/// Extend (or truncate) `granularity_choices` to exactly `iterations` entries
/// by repeating its last element.
///
/// The entries are indices into a set of partitions, not numbers of subsets.
pub fn partition_sequence(granularity_choices: &[usize], iterations: usize) -> Result<Vec<usize>> {
    let &last = granularity_choices.last().ok_or(Error::EmptyPartitionSequence)?;
    Ok(granularity_choices.iter().copied()
       .chain(std::iter::repeat(last))
       .take(iterations)
       .collect())
}

fn clamp_num_subsets(num_subsets: usize, num_pixels: usize) -> usize {
    if num_subsets > num_pixels {
        warn!("The number of partition subsets ({}) is greater than the number of pixels in the region \
               of reconstruction ({}). Reducing the number of subsets to equal the number of pixels.",
              group_digits(num_subsets), group_digits(num_pixels));
        num_pixels
    } else {
        num_subsets
    }
}

/// Shuffle `indices` and split into `k` subsets of equal size.
///
/// The first `n - k(m-1)` subsets receive `m` shuffled indices, the rest
/// `m - 1`, each topped up with one index drawn from outside itself.
fn balanced_random(mut indices: Vec<Index1_u>, k: usize, rng: &mut impl Rng) -> Partition {
    let n = indices.len();
    let m = (n + k - 1) / k;
    let num_full = n - k * (m - 1);
    indices.shuffle(rng);

    let mut subsets = Vec::with_capacity(k);
    let mut start = 0;
    for s in 0..k {
        let len = if s < num_full { m } else { m - 1 };
        let mut subset = indices[start .. start + len].to_vec();
        if len < m {
            // Any position outside [start, start + len)
            let q = rng.gen_range(0 .. n - len);
            let q = if q < start { q } else { q + len };
            subset.push(indices[q]);
        }
        subset.sort_unstable();
        subsets.push(subset);
        start += len;
    }
    Partition::from_subsets(subsets)
}

fn grid_tiled(mask: &Array2<bool>, k: usize, rng: &mut impl Rng) -> Partition {
    let side = (k as f64).sqrt().ceil() as usize;
    let mut labels: Vec<usize> = (0 .. side * side).collect();
    labels.shuffle(rng);
    let label_at = |i: usize, j: usize| labels[(i % side) * side + (j % side)];
    let subsets = subsets_from_labels(mask, side * side, label_at);
    equalize_subset_sizes(subsets.into_iter().filter(|s| !s.is_empty()).collect(), rng)
}

fn blue_noise(mask: &Array2<bool>, region: Vec<Index1_u>, k: usize, rng: &mut impl Rng) -> Partition {
    let pattern = pattern::rank_pattern();
    let band_width = pattern::NUM_RANKS as f64 / k as f64;
    let label_at = |i: usize, j: usize| {
        let rank = pattern[[i % pattern::PATTERN_SIZE, j % pattern::PATTERN_SIZE]];
        ((rank as f64 / band_width).floor() as usize).min(k - 1)
    };
    let subsets = subsets_from_labels(mask, k, label_at);
    if subsets.iter().any(Vec::is_empty) {
        debug!("Blue-noise partition into {k} subsets has an empty subset: using balanced random instead");
        return balanced_random(region, k, rng);
    }
    equalize_subset_sizes(subsets, rng)
}

/// Group the in-mask pixels by `label_at(row, col)`. Each group is ascending.
fn subsets_from_labels(mask: &Array2<bool>, num_labels: usize, label_at: impl Fn(usize, usize) -> usize) -> Vec<Vec<Index1_u>> {
    let grid = [mask.nrows(), mask.ncols()];
    let mut subsets = vec![vec![]; num_labels];
    for ((i, j), &inside) in mask.indexed_iter() {
        if inside { subsets[label_at(i, j)].push(index2_to_1([i, j], grid)) }
    }
    subsets
}

/// Pad every subset up to the size of the largest, with pixels borrowed
/// round-robin from the following subsets. Never pads a subset with one of
/// its own pixels.
fn equalize_subset_sizes(mut subsets: Vec<Vec<Index1_u>>, rng: &mut impl Rng) -> Partition {
    let num = subsets.len();
    let max_points = subsets.iter().map(Vec::len).max().unwrap_or(0);
    let min_points = subsets.iter().map(Vec::len).min().unwrap_or(0);
    if max_points == min_points || min_points == 0 {
        return Partition::from_subsets(subsets);
    }
    let borrow: Vec<usize> = (0 ..= max_points - min_points)
        .map(|_| rng.gen_range(0 .. min_points))
        .collect();
    let originals = subsets.clone();

    for (k, subset) in subsets.iter_mut().enumerate() {
        if subset.len() == max_points { continue }
        let mut taken: HashSet<Index1_u> = subset.iter().copied().collect();
        // The first pass takes one pixel from each following subset; later
        // passes are needed only when the deficit exceeds the number of
        // other subsets.
        'fill: for pass in 0 .. max_points {
            for step in 1 .. num {
                if subset.len() == max_points { break 'fill }
                let source = &originals[(k + step) % num];
                let position = (borrow[(step - 1) % borrow.len()] + pass) % source.len();
                let candidate = source[position];
                if taken.insert(candidate) { subset.push(candidate) }
            }
        }
        subset.sort_unstable();
    }
    Partition::from_subsets(subsets)
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::collections::HashSet;

use log::{debug, warn};
use ndarray::Array2;
use rand::{Rng, seq::SliceRandom};
use serde::Deserialize;

use crate::{
    Error, Result,
    Index1_u, GridDim_u, VolumeDim_u,
    index::index2_to_1,
    utils::group_digits,
};
