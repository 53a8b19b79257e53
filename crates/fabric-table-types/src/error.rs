// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::ids::FabricIndex;
use thiserror::Error;

pub type FabricTableResult<T> = Result<T, FabricTableError>;

/// The full error taxonomy for the fabric table and its collaborators. Storage-adapter and
/// chain-validation errors are wrapped rather than re-derived, so a caller matching on this enum
/// never has to reach into a second crate's error type.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum FabricTableError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("fabric table is not in the expected state for this operation: {0}")]
    IncorrectState(String),

    #[error("fabric index {0} is out of range or not present")]
    InvalidFabricIndex(FabricIndex),

    #[error("a fabric with this (root public key, fabric id) already exists at index {0}")]
    FabricExists(FabricIndex),

    #[error("ICAC fabric id does not match NOC fabric id")]
    FabricMismatchOnIca,

    #[error("RCAC subject does not match NOC fabric id")]
    WrongCertDn,

    #[error("certificate chain could not be parsed or verified: {0}")]
    UnsupportedCertFormat(String),

    #[error("NOC does not belong to the expected fabric or node")]
    WrongNodeId,

    #[error("injected operational public key does not match the NOC's public key")]
    InvalidPublicKey,

    #[error("no operational key available for fabric index {0}")]
    KeyNotFound(FabricIndex),

    #[error("fabric table is full")]
    NoMemory,

    #[error("fabric index {0} was not found")]
    NotFound(FabricIndex),

    #[error("internal inconsistency detected: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl FabricTableError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        FabricTableError::InvalidArgument(msg.into())
    }

    pub fn incorrect_state(msg: impl Into<String>) -> Self {
        FabricTableError::IncorrectState(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        FabricTableError::Internal(msg.into())
    }
}
