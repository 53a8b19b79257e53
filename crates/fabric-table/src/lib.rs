// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The transactional fabric table: pending/commit/revert lifecycle management for operational
//! certificate chains, operational keys, and per-fabric metadata, built on top of
//! `fabric_table_chain` for validation and `fabric_table_store` for the storage/cert-store/
//! key-store interfaces it consumes.

mod commit_marker;
mod config;
mod delegate;
mod error;
mod index_allocator;
mod lkgt;
mod pending;
mod table;

pub use config::FabricTableConfig;
pub use delegate::{DelegateHandle, FabricTableDelegate};
pub use error::{FabricTableError, FabricTableResult};
pub use index_allocator::IndexInfo;
pub use pending::PendingOp;
pub use table::{FabricTable, InitOutcome};

pub use fabric_table_store::{CertElement, OperationalCertificateStore, OperationalKeystore, PersistentStorage};
pub use fabric_table_types::{
    CompressedFabricId, FabricId, FabricIndex, FabricInfo, NodeId, OpKeyBinding, OwnedOpKeypair,
    VendorId, NO_EXPECTED_FABRIC_ID,
};
