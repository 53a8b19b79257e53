// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use fabric_table_types::FabricIndex;

/// Embedder-supplied limits. Constructed explicitly by the caller; there is no on-disk config
/// format in scope here.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FabricTableConfig {
    pub min_valid: FabricIndex,
    pub max_valid: FabricIndex,
    pub max_fabrics: u8,
}

impl Default for FabricTableConfig {
    /// Matches Matter's `CHIP_CONFIG_MAX_FABRICS` default of 32, with the full `[1, 254]` index
    /// range available for allocation.
    fn default() -> Self {
        FabricTableConfig {
            min_valid: FabricIndex::new(1),
            max_valid: FabricIndex::MAX_VALID,
            max_fabrics: 32,
        }
    }
}
