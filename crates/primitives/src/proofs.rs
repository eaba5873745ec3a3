//! Helpers for computing the list commitments embedded in a header.

use alloy_primitives::{keccak256, B256};
use alloy_rlp::Encodable;

/// Computes the commitment for an ordered list of RLP-encodable items.
///
/// The engine layer treats transaction and withdrawal contents as opaque, so
/// the commitment only needs to be a deterministic digest of the list
/// encoding, not a Merkle-Patricia trie root.
pub fn ordered_list_root<T: Encodable>(items: &[T]) -> B256 {
    let mut buf = Vec::new();
    alloy_rlp::encode_list::<T, T>(items, &mut buf);
    keccak256(&buf)
}
