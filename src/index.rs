//! Pixel indices: flattened `(row, column)` locations in the 2D voxel grid.
//!
//! A pixel index identifies a whole voxel cylinder (all slices at one
//! `(row, column)`), which is the unit of work of the parallel-beam projector.
//! Flattening is row-major, so the pixel to the right of `i` is `i + 1`.

#[allow(non_camel_case_types)] pub type Index1_u    = usize;
#[allow(non_camel_case_types)] pub type Index2_u    = [usize; 2];
#[allow(non_camel_case_types)] pub type GridDim_u   = [usize; 2];
#[allow(non_camel_case_types)] pub type VolumeDim_u = [usize; 3];
#[allow(non_camel_case_types)] pub type SinoDim_u   = [usize; 3];

use std::ops::{Add, Div, Mul, Rem};

pub fn index2_to_1<T>([row, col]: [T; 2], [_nrows, ncols]: [T; 2]) -> T
where
    T: Mul<Output = T> + Add<Output = T>
{
    row * ncols + col
}

pub fn index1_to_2<T>(i: T, [_nrows, ncols]: [T; 2]) -> [T; 2]
where
    T: Div<Output = T> + Rem<Output = T> + Copy
{
    [i / ncols, i % ncols]
}

#[cfg(test)]
mod test_index_conversion {
    use super::*;
    use rstest::rstest;

    // -------------------- Some hand-picked examples ------------------------------
    #[rstest(/**/  size  , index2, index1,
             case([ 1, 1], [0,0],   0),
             case([ 1, 9], [0,3],   3),
             case([ 8, 1], [4,0],   4),
             case([ 2, 3], [0,2],   2),
             case([ 2, 3], [1,0],   3),
             case([ 2, 3], [1,2],   5),
             // Relation to decimal
             case([10,10], [3,7],  37),
             case([10,10], [9,0],  90),
    )]
    fn hand_picked(size: GridDim_u, index2: Index2_u, index1: usize) {
        assert_eq!(index2_to_1(index2, size), index1);
        assert_eq!(index1_to_2(index1, size), index2);
    }

    // -------------------- Exhaustive roundtrip testing ------------------------------
    use proptest::prelude::*;

    fn size_and_in_range_index() -> impl Strategy<Value = (GridDim_u, usize)> {
        [1..500_usize, 1..500_usize]
            .prop_flat_map(|i| (Just(i), 0..(i[0] * i[1])))
    }

    proptest! {
        #[test]
        fn index_roundtrip((size, index) in size_and_in_range_index()) {
            let there = index1_to_2(index, size);
            prop_assert!(there[0] < size[0] && there[1] < size[1]);
            let back  = index2_to_1(there, size);
            prop_assert_eq!(back, index)
        }
    }
}
