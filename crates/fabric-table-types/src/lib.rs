// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core data model shared by every other fabric-table crate: fabric/node identifiers, the
//! [`FabricInfo`] record, and the [`FabricTableError`] taxonomy. Kept dependency-light so that
//! `fabric-table-chain` and `fabric-table-store` can depend on it without pulling in crypto or
//! storage crates transitively.

mod error;
mod fabric_info;
mod ids;

pub use error::{FabricTableError, FabricTableResult};
pub use fabric_info::{FabricInfo, OpKeyBinding, OwnedOpKeypair, MAX_LABEL_BYTES};
pub use ids::{
    CompressedFabricId, FabricId, FabricIndex, NodeId, VendorId, NO_EXPECTED_FABRIC_ID,
};
