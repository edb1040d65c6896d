//! Physical quantities used in the description of scanner geometry.
//!
//! Geometry is specified with explicit units (in configuration files, for
//! example `"0.5 mm"` or `"180 degrees"`) and converted to bare `f32`s in
//! millimetres and radians at the boundary of the numerical code.

pub mod todo;

pub use uom;
pub use uom::si::Quantity;
pub use uom::si::f32::{Angle, Length, Ratio};

mod unit {
  pub use uom::si::{length::{micrometer, millimeter, centimeter},
                    angle ::{radian, degree},
                    ratio ::ratio,
  };
}

/// Generate a function called NAME which returns QUANTITY by interpreting its
/// argument as UNIT
///
/// wrap!(NAME QUANTITY UNIT);
macro_rules! wrap {
  ($name:ident $quantity:ident $unit:ident ) => {
    pub fn $name(x: f32) -> $quantity { $quantity::new::<unit::$unit>(x) }
  };
}

wrap!(um     Length micrometer);
wrap!(mm     Length millimeter);
wrap!(cm     Length centimeter);
wrap!(radian Angle      radian);
wrap!(degree Angle      degree);
wrap!(ratio  Ratio       ratio);

// Reverse direction of the above: extract the bare float in the unit used by
// the projector.
pub fn mm_    (x: Length) -> f32 { x.get::<unit::millimeter>() }
pub fn radian_(x: Angle ) -> f32 { x.get::<unit::radian>() }
pub fn ratio_ (x: Ratio ) -> f32 { x.get::<unit::ratio>() }

#[macro_export]
macro_rules! assert_uom_eq {
  ($unit:ident, $lhs:expr, $rhs:expr, $algo:ident <= $tol:expr) => {
    float_eq::assert_float_eq!($lhs.get::<$unit>(), $rhs.get::<$unit>(), $algo <= $tol)
  };
}
