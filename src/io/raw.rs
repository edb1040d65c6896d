//! Read / write float arrays as raw little-endian binary.
//!
//! Raw files carry no header: the shape of the array must be known from
//! elsewhere (typically the configuration file), and is checked against the
//! length of the file.

pub fn write(data: impl Iterator<Item = f32>, path: &Path) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut buf = BufWriter::new(file);
    for datum in data {
        buf.write_all(&datum.to_le_bytes())?;
    }
    buf.flush()
}

type IORes<T> = std::io::Result<T>;
pub fn read<'a>(path: &Path) -> IORes<impl Iterator<Item = IORes<f32>> + 'a> {
    let file = File::open(path)?;
    let mut buf = BufReader::new(file);
    let mut buffer = [0; 4];

    Ok(std::iter::from_fn(move || {
        use std::io::ErrorKind::UnexpectedEof;
        match buf.read_exact(&mut buffer) {
            Ok(()) => Some(Ok(f32::from_le_bytes(buffer))),
            Err(e) if e.kind() == UnexpectedEof => None,
            Err(e) => Some(Err(e)),
        }
    }))
}

/// Write a 3D array in standard (row-major) order
pub fn write_array3(array: ArrayView3<f32>, path: &Path) -> Result<()> {
    write(array.iter().copied(), path)?;
    Ok(())
}

/// Read a 3D array of the given shape, failing if the file holds a different
/// number of elements
pub fn read_array3(path: &Path, [a, b, c]: [usize; 3]) -> Result<Array3<f32>> {
    let data = read(path)?.collect::<IORes<Vec<f32>>>()?;
    if data.len() != a * b * c {
        return Err(Error::ShapeMismatch {
            what: "raw file elements",
            expected: vec![a, b, c],
            got: vec![data.len()],
        });
    }
    Ok(Array3::from_shape_vec((a, b, c), data)?)
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use ndarray::{Array3, ArrayView3};

use crate::{Error, Result};
