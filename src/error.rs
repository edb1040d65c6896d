//! Errors reported by the projector, partitioning and stitching machinery.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Two arrays (or an array and the geometry) disagree about an extent
    #[error("shape mismatch in {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch { what: &'static str, expected: Vec<usize>, got: Vec<usize> },

    /// Stitching overlap longer than one of the arrays being stitched
    #[error("overlap length {overlap} exceeds shortest array extent {shortest}")]
    InvalidOverlap { overlap: usize, shortest: usize },

    /// Stitching needs at least two arrays
    #[error("stitching requires at least 2 arrays, got {0}")]
    TooFewArrays(usize),

    /// A partition sequence must name at least one granularity
    #[error("partition sequence is empty")]
    EmptyPartitionSequence,

    /// A partition sequence entry does not name an existing partition
    #[error("partition sequence refers to partition {index}, but only {available} exist")]
    GranularityIndex { index: usize, available: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("couldn't read config file `{}`", .path.display())]
    ConfigFile { path: PathBuf, #[source] source: io::Error },

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("array layout: {0}")]
    Layout(#[from] ndarray::ShapeError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fail with `ShapeMismatch` unless `got == expected`
pub(crate) fn check_shape(what: &'static str, expected: &[usize], got: &[usize]) -> Result<()> {
    if expected == got { Ok(()) }
    else {
        Err(Error::ShapeMismatch { what, expected: expected.to_vec(), got: got.to_vec() })
    }
}
