mod exports;
pub use exports::*;

pub mod error;
pub use error::{Error, Result};

pub mod index;
pub mod geometry;
pub mod projector;
pub mod partition;
pub mod batch;
pub mod model;
pub mod vcd;
pub mod fbp;
pub mod config;
pub mod io;
pub mod utils;
