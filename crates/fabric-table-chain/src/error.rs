// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors produced while validating a NOC/ICAC/RCAC chain. Deliberately distinct from
/// `fabric_table_types::FabricTableError`; the caller maps these at the boundary so that this
/// crate stays free of any dependency on the orchestration crate.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ChainValidationError {
    #[error("certificate could not be parsed or its signature did not verify: {0}")]
    UnsupportedCertFormat(String),

    #[error("ICAC fabric id does not match NOC fabric id")]
    FabricMismatchOnIca,

    #[error("RCAC subject does not match NOC fabric id")]
    WrongCertDn,

    #[error("the derived fabric id does not match the caller's expectation")]
    WrongNodeId,
}
