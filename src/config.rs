//! Configuration files (TOML)

pub mod vcd;

use std::str::FromStr;

use serde::{Deserialize, Deserializer, de};

/// Parse a string such as `"0.5 mm"` or `"90 degrees"` into a `uom` quantity
pub(crate) fn deserialize_uom<'d, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    String::deserialize(deserializer)?
        .parse::<T>()
        .map_err(de::Error::custom)
}

/// As `deserialize_uom`, for fields which may be omitted
pub(crate) fn deserialize_uom_opt<'d, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    Option::<String>::deserialize(deserializer)?
        .map(|text| text.parse::<T>().map_err(de::Error::custom))
        .transpose()
}
