//! Cell record codec.
//!
//! A cell is persisted as a bincode-serialized [`CellRecord`]: the raw cell
//! id, the content hash, and each item's own encoding as an opaque blob.
//! Item encoding is delegated to [`Item::encode`](geostore_types::Item::encode)
//! and item decoding to the decoder bound to the store.

use geostore_crypto::{Digest, KeyDigest};
use geostore_types::CellId;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cell::Cell;
use crate::decoder::{DecodeFailure, DecodePolicy, ItemDecoder};
use crate::error::{CellError, CellResult};

/// On-disk layout of a cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord {
    pub cell_id: u64,
    pub hash: Vec<u8>,
    /// One blob per item, in list order.
    pub items: Vec<Vec<u8>>,
}

impl CellRecord {
    pub fn to_bytes(&self) -> CellResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| CellError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> CellResult<Self> {
        bincode::deserialize(bytes).map_err(|e| CellError::CorruptRecord(e.to_string()))
    }
}

/// Encode a cell into its record bytes.
///
/// An item that fails to encode fails the whole cell; nothing is dropped on
/// the write path.
pub fn encode_cell(cell: &Cell) -> CellResult<Vec<u8>> {
    let items = cell
        .items()
        .iter()
        .map(|item| {
            item.encode().map_err(|e| CellError::ItemEncode {
                key: item.key().to_string(),
                reason: e.to_string(),
            })
        })
        .collect::<CellResult<Vec<_>>>()?;

    CellRecord {
        cell_id: cell.id().raw(),
        hash: cell.hash().to_vec(),
        items,
    }
    .to_bytes()
}

/// Reconstruct a cell from record bytes.
///
/// The cell id and hash come back exactly as stored. Each item blob goes
/// through `decoder`; a blob that fails is handled per `policy`.
pub fn decode_cell(
    bytes: &[u8],
    decoder: &dyn ItemDecoder,
    policy: DecodePolicy,
) -> CellResult<Cell> {
    let record = CellRecord::from_bytes(bytes)?;
    let id = CellId::new(record.cell_id);
    let hash: Digest = record.hash.as_slice().try_into().map_err(|_| {
        CellError::CorruptRecord(format!(
            "cell {id}: expected 32-byte hash, got {} bytes",
            record.hash.len()
        ))
    })?;

    let mut items = Vec::with_capacity(record.items.len());
    let mut failures = Vec::new();
    for (index, blob) in record.items.iter().enumerate() {
        match decoder.decode(blob) {
            Ok(item) => items.push(item),
            Err(e) => match policy {
                DecodePolicy::Reject => {
                    return Err(CellError::ItemDecode {
                        cell: id,
                        index,
                        reason: e.to_string(),
                    });
                }
                DecodePolicy::Skip => {
                    warn!(cell = %id, index, error = %e, "dropping undecodable item");
                }
                DecodePolicy::Collect => failures.push(DecodeFailure {
                    index,
                    reason: e.to_string(),
                }),
            },
        }
    }

    if !failures.is_empty() {
        warn!(
            cell = %id,
            dropped = failures.len(),
            hash = %KeyDigest::short_hex(&hash),
            "cell reconstructed with undecodable items"
        );
    }
    Ok(Cell::from_parts(id, items, hash, failures))
}
