use std::fmt;
use std::sync::Arc;

use crate::error::TypeError;

/// Separator between the cell component and the key component of an
/// [`ItemId`](crate::ItemId). Item keys must never contain it.
pub const KEY_SEPARATOR: char = ':';

/// Capability set every stored item provides.
///
/// Geostore never inspects an item beyond these three operations. Whether an
/// item is a point, a polyline or a polygon is inferred from the shape of
/// [`position`](Item::position) at match time, never declared.
pub trait Item: Send + Sync + fmt::Debug {
    /// Flattened `(latitude, longitude)` pairs in degrees, in order.
    fn position(&self) -> Vec<f64>;

    /// Key unique within a cell. Must not contain [`KEY_SEPARATOR`].
    fn key(&self) -> &str;

    /// Self-contained byte encoding, read back by a registered decoder.
    fn encode(&self) -> Result<Vec<u8>, TypeError>;
}

/// Shared handle to a stored item. The same item is appended to every cell
/// of its covering.
pub type ItemRef = Arc<dyn Item>;

/// Check the coordinate sequence of an item.
///
/// A valid sequence has an even length of at least two and only finite values.
pub fn validate_position(position: &[f64]) -> Result<(), TypeError> {
    if position.len() < 2 {
        return Err(TypeError::InvalidGeometry(format!(
            "expected at least one lat/lng pair, got {} values",
            position.len()
        )));
    }
    if position.len() % 2 != 0 {
        return Err(TypeError::InvalidGeometry(format!(
            "unbalanced lat/lng pairs: {} values",
            position.len()
        )));
    }
    if let Some(i) = position.iter().position(|v| !v.is_finite()) {
        return Err(TypeError::InvalidGeometry(format!(
            "non-finite coordinate at index {i}"
        )));
    }
    Ok(())
}

/// Check that a key can be embedded in an [`ItemId`](crate::ItemId).
pub fn validate_key(key: &str) -> Result<(), TypeError> {
    if key.is_empty() {
        return Err(TypeError::InvalidKey {
            key: key.to_string(),
            reason: "key must not be empty".into(),
        });
    }
    if key.contains(KEY_SEPARATOR) {
        return Err(TypeError::InvalidKey {
            key: key.to_string(),
            reason: format!("key must not contain {KEY_SEPARATOR:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pair_is_valid() {
        assert!(validate_position(&[40.0, -73.0]).is_ok());
    }

    #[test]
    fn empty_and_odd_sequences_are_rejected() {
        assert!(matches!(
            validate_position(&[]),
            Err(TypeError::InvalidGeometry(_))
        ));
        assert!(matches!(
            validate_position(&[1.0]),
            Err(TypeError::InvalidGeometry(_))
        ));
        assert!(matches!(
            validate_position(&[1.0, 2.0, 3.0]),
            Err(TypeError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let err = validate_position(&[1.0, f64::NAN]).unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn key_with_separator_is_rejected() {
        assert!(validate_key("plain-key").is_ok());
        assert!(matches!(
            validate_key("a:b"),
            Err(TypeError::InvalidKey { .. })
        ));
        assert!(matches!(validate_key(""), Err(TypeError::InvalidKey { .. })));
    }
}
