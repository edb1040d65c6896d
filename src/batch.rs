//! Splitting long axes into batches, running batches under an explicit
//! placement, and joining the results back together.
//!
//! Results are always reassembled in batch order, whatever the placement, so
//! that every reduction built on top of these helpers is reproducible.

/// Where batches are computed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Placement {
    /// On the calling thread, one batch after another
    #[default]
    Serial,
    /// On a dedicated pool of `n` threads
    Threads(usize),
}

/// Placement and batch-size limits, passed explicitly to every operation
/// that splits work into batches.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub placement: Placement,
    pub view_batch_size: usize,
    pub pixel_batch_size: usize,
    pool: Option<Arc<ThreadPool>>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self { placement: Placement::Serial, view_batch_size: 64, pixel_batch_size: 16_384, pool: None }
    }
}

impl ExecutionContext {

    pub fn new(placement: Placement, view_batch_size: usize, pixel_batch_size: usize) -> Result<Self> {
        if view_batch_size == 0 || pixel_batch_size == 0 {
            return Err(Error::InvalidParameter(format!(
                "batch sizes must be positive (views: {view_batch_size}, pixels: {pixel_batch_size})")));
        }
        let pool = match placement {
            Placement::Serial => None,
            Placement::Threads(0) => return Err(Error::InvalidParameter("thread count must be positive".into())),
            Placement::Threads(n) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| Error::InvalidParameter(e.to_string()))?
            )),
        };
        Ok(Self { placement, view_batch_size, pixel_batch_size, pool })
    }

    pub fn serial() -> Self { Self::default() }

    /// Apply `f` to each batch of `0..len`, returning the results in batch
    /// order. Batches are independent and may be computed concurrently.
    pub fn map_batches<T, F>(&self, len: usize, batch_size: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(Range<usize>) -> T + Sync + Send,
    {
        let ranges = batch_ranges(len, batch_size);
        match &self.pool {
            Some(pool) => pool.install(|| ranges.into_par_iter().map(&f).collect()),
            None       => ranges.into_iter().map(f).collect(),
        }
    }
}

/// Contiguous ranges of at most `batch_size` elements which cover `0..len`
pub fn batch_ranges(len: usize, batch_size: usize) -> Vec<Range<usize>> {
    let batch_size = batch_size.max(1);
    (0..len)
        .step_by(batch_size)
        .map(|start| start .. (start + batch_size).min(len))
        .collect()
}

/// Join `batches` end to end along `axis`
pub fn concatenate_batches<D: RemoveAxis>(axis: usize, batches: &[Array<f32, D>]) -> Result<Array<f32, D>> {
    let views: Vec<_> = batches.iter().map(|b| b.view()).collect();
    Ok(ndarray::concatenate(Axis(axis), &views)?)
}

/// Join `arrays`, which overlap by `overlap` elements along `axis`, replacing
/// each overlap with a linear blend of the two arrays that meet there.
///
/// At position `j` of an overlap of length `L`, the result is
/// `(1 - w) a + w b` with `w = (j + 1) / (L + 1)`, where `a` comes from the
/// end of the earlier array and `b` from the start of the later one. Arrays
/// are joined from left to right.
pub fn stitch<D: RemoveAxis>(arrays: &[Array<f32, D>], overlap: usize, axis: usize) -> Result<Array<f32, D>> {
    if arrays.len() < 2 {
        return Err(Error::TooFewArrays(arrays.len()));
    }
    let first = &arrays[0];
    if axis >= first.ndim() {
        return Err(Error::InvalidParameter(format!(
            "stitching axis {axis} out of range for {}-dimensional arrays", first.ndim())));
    }
    for array in &arrays[1..] {
        let off_axis = |a: &Array<f32, D>| -> Vec<usize> {
            a.shape().iter().enumerate().filter(|&(d, _)| d != axis).map(|(_, &n)| n).collect()
        };
        if array.ndim() != first.ndim() || off_axis(array) != off_axis(first) {
            return Err(Error::ShapeMismatch {
                what: "stitched arrays (off the stitching axis)",
                expected: first.shape().to_vec(),
                got: array.shape().to_vec(),
            });
        }
    }
    let shortest = arrays.iter().map(|a| a.len_of(Axis(axis))).min().unwrap_or(0);
    if overlap > shortest {
        return Err(Error::InvalidOverlap { overlap, shortest });
    }

    let axis = Axis(axis);
    let mut stitched = first.clone();
    for next in &arrays[1..] {
        let end = stitched.len_of(axis);
        let head = stitched.slice_axis(axis, Slice::from(.. end - overlap));
        let tail = next.slice_axis(axis, Slice::from(overlap ..));
        let mut blend = stitched.slice_axis(axis, Slice::from(end - overlap ..)).to_owned();
        let incoming = next.slice_axis(axis, Slice::from(.. overlap));
        for (j, (mut a, b)) in blend.axis_iter_mut(axis).zip(incoming.axis_iter(axis)).enumerate() {
            let w = (j + 1) as f32 / (overlap + 1) as f32;
            a.zip_mut_with(&b, |a, &b| *a = (1.0 - w) * *a + w * b);
        }
        stitched = ndarray::concatenate(axis, &[head, blend.view(), tail])?;
    }
    Ok(stitched)
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::{ops::Range, sync::Arc};

use ndarray::{Array, Axis, RemoveAxis, Slice};
use rayon::{ThreadPool, prelude::*};

use crate::{Error, Result};

// ------------------------------ TESTS ------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};
    use float_eq::assert_float_eq;
    use ndarray::{array, Array1, Array2, Array3};
    use rstest::rstest;

    #[rstest(/**/ len, size, expected,
             case( 0, 4, vec![]),
             case( 3, 4, vec![0..3]),
             case( 8, 4, vec![0..4, 4..8]),
             case(10, 4, vec![0..4, 4..8, 8..10]),
             case( 5, 1, vec![0..1, 1..2, 2..3, 3..4, 4..5]),
    )]
    fn ranges_cover_axis(len: usize, size: usize, expected: Vec<Range<usize>>) {
        assert_eq!(batch_ranges(len, size), expected);
    }

    #[rstest]
    fn batches_come_back_in_order(
        #[values(Placement::Serial, Placement::Threads(1), Placement::Threads(4))] placement: Placement,
    ) {
        let context = ExecutionContext::new(placement, 3, 3).unwrap();
        let starts = context.map_batches(20, 3, |r| r.start);
        assert_eq!(starts, vec![0, 3, 6, 9, 12, 15, 18]);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(ExecutionContext::new(Placement::Serial, 0, 10).is_err());
        assert!(ExecutionContext::new(Placement::Serial, 10, 0).is_err());
        assert!(ExecutionContext::new(Placement::Threads(0), 10, 10).is_err());
    }

    #[test]
    fn batches_run_on_the_pool() {
        let context = ExecutionContext::new(Placement::Threads(2), 1, 1).unwrap();
        assert_eq!(context.map_batches(3, 1, |_| rayon::current_num_threads()), vec![2, 2, 2]);
    }

    #[test]
    fn concatenate_in_order() {
        let batches = vec![array![[1.0, 2.0]], array![[3.0, 4.0], [5.0, 6.0]]];
        let joined = concatenate_batches(0, &batches).unwrap();
        assert_eq!(joined, array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
    }

    // ----- Stitching ---------------------------------------------------------------------
    #[test]
    fn stitch_blends_linearly() {
        let a = Array1::<f32>::zeros(6);
        let b = Array1::<f32>::from_elem(7, 10.0);
        let s = stitch(&[a, b], 4, 0).unwrap();
        assert_eq!(s.len(), 6 + 7 - 4);
        let expected = [0.0_f32, 0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 10.0, 10.0];
        assert_float_eq!(s.to_vec(), expected.to_vec(), ulps_all <= 2);
        // Outside the overlap the inputs are copied exactly
        assert_eq!(s[0], 0.0);
        assert_eq!(s[8], 10.0);
    }

    #[test]
    fn stitch_along_second_axis() {
        let a = Array2::<f32>::zeros((2, 3));
        let b = Array2::<f32>::from_elem((2, 3), 3.0);
        let s = stitch(&[a, b], 2, 1).unwrap();
        assert_eq!(s.dim(), (2, 4));
        for row in s.outer_iter() {
            assert_float_eq!(row.to_vec(), vec![0.0_f32, 1.0, 2.0, 3.0], ulps_all <= 2);
        }
    }

    #[test]
    fn stitch_three_arrays_left_to_right() {
        let arrays = vec![
            Array1::<f32>::from_elem(3, 0.0),
            Array1::<f32>::from_elem(3, 3.0),
            Array1::<f32>::from_elem(3, 6.0),
        ];
        let s = stitch(&arrays, 2, 0).unwrap();
        assert_float_eq!(s.to_vec(), vec![0.0_f32, 1.0, 10.0 / 3.0, 5.0, 6.0], ulps_all <= 4);
        // Same as stitching the first two, then the third
        let first_two = stitch(&arrays[..2], 2, 0).unwrap();
        let again = stitch(&[first_two, arrays[2].clone()], 2, 0).unwrap();
        assert_eq!(s, again);
    }

    #[test]
    fn stitch_without_overlap_concatenates() {
        let s = stitch(&[array![1.0_f32, 2.0], array![3.0, 4.0]], 0, 0).unwrap();
        assert_eq!(s, array![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn stitch_errors() {
        let a = Array3::<f32>::zeros((2, 3, 4));
        let b = Array3::<f32>::zeros((2, 5, 4));
        let c = Array3::<f32>::zeros((2, 3, 1));
        assert!(matches!(stitch(&[a.clone()], 1, 0), Err(Error::TooFewArrays(1))));
        assert!(matches!(stitch(&[a.clone(), c.clone()], 2, 2), Err(Error::InvalidOverlap { overlap: 2, shortest: 1 })));
        assert!(matches!(stitch(&[a.clone(), b.clone()], 1, 0), Err(Error::ShapeMismatch { .. })));
        assert!(matches!(stitch(&[a.clone(), a.clone()], 1, 3), Err(Error::InvalidParameter(_))));
        // Disagreement along the stitching axis itself is fine
        assert_eq!(stitch(&[a, b], 1, 1).unwrap().dim(), (2, 7, 4));
    }
}
