/// Quantities which are plain `f32` aliases rather than `uom` `Quantity`s.
///
/// The projector inner loops work on bare floats (millimetres for lengths,
/// radians for angles) so that `ndarray` can operate on them directly. These
/// aliases leave a clue in signatures as to what each float represents.

pub type Lengthf32    = f32; // mm
pub type Anglef32     = f32; // radians
pub type Weightf32    = f32; // system matrix coefficient, mm
pub type Intensityf32 = f32; // voxel or sinogram value
