// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::StorageError;

/// The only storage interface the fabric table itself needs: opaque bytes under opaque string
/// keys. Everything above this (records, indices, markers) is `bcs`-encoded by the caller.
pub trait PersistentStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage keys used by the fabric table. Centralized here so the table and its tests agree on
/// exact key shapes without string-formatting duplication.
pub mod keys {
    use fabric_table_types::FabricIndex;

    pub fn fabric_metadata(index: FabricIndex) -> String {
        format!("FabricMetadata/{}", index.value())
    }

    pub const FABRIC_INDEX_INFO: &str = "FabricIndexInfo";
    pub const FABRIC_COMMIT_MARKER: &str = "FabricCommitMarker";
    pub const LAST_KNOWN_GOOD_TIME: &str = "FabricLastKnownGoodTime";
}
