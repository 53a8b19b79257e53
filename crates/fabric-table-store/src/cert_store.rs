// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::StoreError;
use fabric_table_types::FabricIndex;

/// Which certificate element a request refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CertElement {
    Rcac,
    Icac,
    Noc,
}

/// Owns the DER-encoded certificate bytes for every fabric, plus at most one pending (uncommitted)
/// change at a time. The fabric table is the sole writer of pending state; committed state may be
/// read by other subsystems.
pub trait OperationalCertificateStore: Send + Sync {
    fn has_certificate_for_fabric(&self, index: FabricIndex, element: CertElement) -> bool;

    fn get_certificate(
        &self,
        index: FabricIndex,
        element: CertElement,
    ) -> Result<Vec<u8>, StoreError>;

    /// Returns the pending (not yet committed) bytes for `index`/`element`, if any are currently
    /// staged. Used by the fabric table to feed chain validation the in-flight chain rather than
    /// whatever is already committed.
    fn get_pending_certificate(
        &self,
        index: FabricIndex,
        element: CertElement,
    ) -> Option<Vec<u8>>;

    /// Installs a new trusted root as the pending root for `index`. Addressable afterwards via
    /// `get_certificate(index, CertElement::Rcac)` even before commit.
    fn add_new_trusted_root_cert_for_fabric(
        &self,
        index: FabricIndex,
        rcac_der: &[u8],
    ) -> Result<(), StoreError>;

    fn add_new_op_certs_for_fabric(
        &self,
        index: FabricIndex,
        noc_der: &[u8],
        icac_der: Option<&[u8]>,
    ) -> Result<(), StoreError>;

    /// Like `add_new_op_certs_for_fabric`, but the previously committed NOC/ICAC remain readable
    /// as "current" until commit, so a failed update can be reverted without data loss.
    fn update_op_certs_for_fabric(
        &self,
        index: FabricIndex,
        noc_der: &[u8],
        icac_der: Option<&[u8]>,
    ) -> Result<(), StoreError>;

    fn commit_op_certs_for_fabric(&self, index: FabricIndex) -> Result<(), StoreError>;

    fn revert_pending_op_certs(&self) -> Result<(), StoreError>;

    /// As `revert_pending_op_certs`, but leaves any pending root cert in place so a failed Add
    /// can be retried without re-installing the root.
    fn revert_pending_op_certs_except_root(&self) -> Result<(), StoreError>;

    fn remove_op_certs_for_fabric(&self, index: FabricIndex) -> Result<(), StoreError>;
}
