// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

pub use fabric_table_types::{FabricTableError, FabricTableResult};

use fabric_table_chain::ChainValidationError;
use fabric_table_store::{StorageError, StoreError};

pub(crate) fn from_chain_error(err: ChainValidationError) -> FabricTableError {
    match err {
        ChainValidationError::UnsupportedCertFormat(msg) => {
            FabricTableError::UnsupportedCertFormat(msg)
        }
        ChainValidationError::FabricMismatchOnIca => FabricTableError::FabricMismatchOnIca,
        ChainValidationError::WrongCertDn => FabricTableError::WrongCertDn,
        ChainValidationError::WrongNodeId => FabricTableError::WrongNodeId,
    }
}

pub(crate) fn from_store_error(err: StoreError) -> FabricTableError {
    match err {
        StoreError::NotFound => FabricTableError::internal("store reported NotFound unexpectedly"),
        StoreError::NoPendingOperation => {
            FabricTableError::incorrect_state("no pending operation in store")
        }
        StoreError::PublicKeyMismatch => FabricTableError::InvalidPublicKey,
        StoreError::Storage(e) => from_storage_error(e),
    }
}

pub(crate) fn from_storage_error(err: StorageError) -> FabricTableError {
    FabricTableError::Storage(err.to_string())
}
