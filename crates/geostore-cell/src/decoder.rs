use std::sync::Arc;

use geostore_types::{ItemRef, TypeError};
use serde::{Deserialize, Serialize};

/// Turns an item's byte encoding back into an item.
///
/// A decoder is bound to a store instance when it is opened. Any
/// `Fn(&[u8]) -> Result<ItemRef, TypeError>` is a decoder, so
/// `Feature::decode` can be passed directly.
pub trait ItemDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<ItemRef, TypeError>;
}

impl<F> ItemDecoder for F
where
    F: Fn(&[u8]) -> Result<ItemRef, TypeError> + Send + Sync,
{
    fn decode(&self, bytes: &[u8]) -> Result<ItemRef, TypeError> {
        self(bytes)
    }
}

/// Shared handle to a decoder.
pub type SharedDecoder = Arc<dyn ItemDecoder>;

/// What to do with an item blob that fails to decode while a cell is
/// reconstructed from its record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Fail the whole cell decode.
    Reject,
    /// Drop the item, log a warning, and keep going.
    #[default]
    Skip,
    /// Drop the item and record a [`DecodeFailure`] on the cell.
    Collect,
}

/// An item dropped during lossy cell reconstruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeFailure {
    /// Position of the blob in the stored record.
    pub index: usize,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use geostore_types::Feature;

    #[test]
    fn functions_are_decoders() {
        let decoder: SharedDecoder = Arc::new(Feature::decode);
        let bytes = serde_json_bytes();
        let item = decoder.decode(&bytes).unwrap();
        assert_eq!(item.key(), "k");
    }

    #[test]
    fn closures_are_decoders() {
        let decoder: SharedDecoder =
            Arc::new(|_: &[u8]| -> Result<ItemRef, TypeError> { Err(TypeError::Decode("nope".into())) });
        assert!(decoder.decode(b"").is_err());
    }

    #[test]
    fn default_policy_is_skip() {
        assert_eq!(DecodePolicy::default(), DecodePolicy::Skip);
    }

    fn serde_json_bytes() -> Vec<u8> {
        use geostore_types::Item;
        Feature::point("k", 1.0, 2.0).encode().unwrap()
    }
}
