//! Fixed-size rank pattern used for `Strategy::BlueNoise` partitions.
//!
//! The pattern is a 256 x 256 ordered-dither (Bayer) matrix, not a
//! void-and-cluster blue-noise mask. Each rank in `0..65536` appears exactly
//! once, and thresholding the ranks into `k` equal bands spreads every band
//! evenly over space, but with periodic structure at every power-of-two
//! scale.

/// Side length of the (square) rank pattern
pub const PATTERN_SIZE: usize = 256;

/// Number of distinct ranks in the pattern
pub const NUM_RANKS: usize = PATTERN_SIZE * PATTERN_SIZE;

/// The rank pattern, built on first use
pub fn rank_pattern() -> &'static Array2<u16> {
    static PATTERN: OnceLock<Array2<u16>> = OnceLock::new();
    PATTERN.get_or_init(|| bayer(PATTERN_SIZE.trailing_zeros()))
}

/// Bayer matrix of side `2^order`.
///
/// Doubling step: quadrant `(a, b)` of the larger matrix holds
/// `4 * M + [[0, 2], [3, 1]][a][b]`, so the finest spatial scale carries the
/// most significant bits of the rank.
fn bayer(order: u32) -> Array2<u16> {
    const QUADRANT: [[u32; 2]; 2] = [[0, 2], [3, 1]];
    let mut m = Array2::<u32>::zeros((1, 1));
    for _ in 0..order {
        let n = m.nrows();
        let mut next = Array2::<u32>::zeros((2 * n, 2 * n));
        for ((i, j), &v) in m.indexed_iter() {
            for (a, b) in iproduct!(0..2, 0..2) {
                next[[i + a * n, j + b * n]] = 4 * v + QUADRANT[a][b];
            }
        }
        m = next;
    }
    m.mapv(|v| v as u16)
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::sync::OnceLock;
use itertools::iproduct;
use ndarray::Array2;
