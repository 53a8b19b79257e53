// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors from the raw key/value storage layer.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum StorageError {
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors from the certificate store and key store collaborators. Kept separate from
/// `StorageError` since these carry domain meaning (e.g. "no pending operation") that a raw KV
/// store has no notion of.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum StoreError {
    #[error("no certificate or key material found")]
    NotFound,

    #[error("no pending operation to commit or revert")]
    NoPendingOperation,

    #[error("the provided public key does not match the pending key material")]
    PublicKeyMismatch,

    #[error(transparent)]
    Storage(#[from] StorageError),
}
