//! Lenient deserializers for loosely typed clients.
//!
//! Ids and page numbers arrive as numbers from most clients and as numeric
//! strings from form-driven ones. Empty strings mean "unset".

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Int(i64),
    Text(String),
}

fn coerce<E: serde::de::Error>(value: Lenient) -> Result<Option<i64>, E> {
    match value {
        Lenient::Int(n) => Ok(Some(n)),
        Lenient::Text(s) if s.trim().is_empty() => Ok(None),
        Lenient::Text(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| E::custom(format!("expected an integer, got {s:?}"))),
    }
}

/// A required integer, accepting numeric strings.
pub fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    coerce::<D::Error>(Lenient::deserialize(deserializer)?)?
        .ok_or_else(|| serde::de::Error::custom("expected an integer, got an empty string"))
}

/// An optional integer-like value. `null` and `""` both mean absent.
pub fn opt_int<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<i64>,
{
    match Option::<Lenient>::deserialize(deserializer)? {
        Some(value) => Ok(coerce::<D::Error>(value)?.map(T::from)),
        None => Ok(None),
    }
}

/// An optional string where `""` means absent.
pub fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}
