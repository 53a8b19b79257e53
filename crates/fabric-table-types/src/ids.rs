// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a fabric within a device's fabric table. Valid values lie in
/// `[FabricIndex::MIN_VALID, FabricIndex::MAX_VALID]`; zero is the `Undefined` sentinel and is
/// never valid.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize)]
pub struct FabricIndex(u8);

impl FabricIndex {
    /// Never a valid fabric index; used as a "no fabric" sentinel.
    pub const UNDEFINED: FabricIndex = FabricIndex(0);

    /// The protocol never allows indices above this value.
    pub const MAX_VALID: FabricIndex = FabricIndex(254);

    pub const fn new(value: u8) -> Self {
        FabricIndex(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn is_undefined(self) -> bool {
        self.0 == Self::UNDEFINED.0
    }
}

impl fmt::Display for FabricIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<FabricIndex> for u8 {
    fn from(index: FabricIndex) -> u8 {
        index.0
    }
}

/// 64-bit identifier of a fabric, scoped to the root CA that issued it. Not globally unique by
/// itself — `(root_public_key, FabricId)` is the identity key for "the same fabric".
pub type FabricId = u64;

/// 64-bit identifier of a node within its fabric.
pub type NodeId = u64;

/// 64-bit value derived from `(root_public_key, FabricId)`; stable for the lifetime of that pair.
/// See `fabric_table_chain::derive_compressed_fabric_id`.
pub type CompressedFabricId = u64;

/// 16-bit vendor identifier, purely descriptive (no uniqueness constraints are enforced on it).
pub type VendorId = u16;

/// The fabric id value `0` never identifies a real fabric and is used by
/// `AddNewPendingFabric`/`UpdatePendingFabric`'s `expected_fabric_id` parameter to mean "no
/// constraint".
pub const NO_EXPECTED_FABRIC_ID: FabricId = 0;
