// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use fabric_table_types::{CompressedFabricId, FabricId};
use hkdf::Hkdf;
use sha2::Sha256;

const INFO: &[u8] = b"CompressedFabric";

/// Derives the compressed fabric id from a root public key (the RCAC's uncompressed SEC1 point)
/// and a fabric id: `HKDF-SHA256(ikm = root_public_key, salt = fabric_id.to_be_bytes(), info =
/// "CompressedFabric")`, truncated to its first 8 bytes and read big-endian.
///
/// Stable for the lifetime of the `(root_public_key, fabric_id)` pair; never recomputed once a
/// fabric is installed.
pub fn derive_compressed_fabric_id(
    root_public_key: &[u8],
    fabric_id: FabricId,
) -> CompressedFabricId {
    let salt = fabric_id.to_be_bytes();
    let hk = Hkdf::<Sha256>::new(Some(&salt), root_public_key);
    let mut okm = [0u8; 8];
    hk.expand(INFO, &mut okm)
        .expect("8-byte output is within HKDF-SHA256's maximum expand length");
    CompressedFabricId::from_be_bytes(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        let pk = [0x04u8; 65];
        let a = derive_compressed_fabric_id(&pk, 42);
        let b = derive_compressed_fabric_id(&pk, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn differs_by_fabric_id() {
        let pk = [0x04u8; 65];
        assert_ne!(
            derive_compressed_fabric_id(&pk, 1),
            derive_compressed_fabric_id(&pk, 2)
        );
    }

    #[test]
    fn differs_by_root_key() {
        let a = derive_compressed_fabric_id(&[0x04u8; 65], 42);
        let b = derive_compressed_fabric_id(&[0x05u8; 65], 42);
        assert_ne!(a, b);
    }
}
