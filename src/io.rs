//! Reading and writing sinograms, weights and volumes.

pub mod raw;
