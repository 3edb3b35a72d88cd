use serde::{Deserialize, Deserializer};

/// Deserialize a field that may be omitted, explicitly `null`, or set.
///
/// Used with `#[serde(default, deserialize_with = "present")]` on an
/// `Option<Option<T>>`: omitted → `None`, `null` → `Some(None)`,
/// value → `Some(Some(v))`.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
