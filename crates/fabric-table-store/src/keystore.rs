// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::StoreError;
use fabric_table_types::FabricIndex;

/// Matter devices require CSRs of at least this many bytes of buffer; kept here as the one
/// numeric constant the trait's contract depends on.
pub const MIN_CSR_BUFFER_SIZE: usize = 255;

/// An opaque handle to a CASE-session ephemeral key pair. Not fabric-persistent; included for
/// interface completeness, unused by the fabric table itself.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct EphemeralKeyHandle(pub u64);

/// Owns operational key pairs, one per fabric, plus at most one pending (uncommitted) key.
pub trait OperationalKeystore: Send + Sync {
    fn has_op_keypair_for_fabric(&self, index: FabricIndex) -> bool;

    fn has_pending_op_keypair(&self) -> bool;

    /// Generates a pending key pair for `index` and returns a CSR of at least
    /// `MIN_CSR_BUFFER_SIZE` bytes.
    fn new_op_keypair_for_fabric(&self, index: FabricIndex) -> Result<Vec<u8>, StoreError>;

    /// Binds the pending key pair to `index` after checking its public key matches
    /// `expected_public_key`.
    fn activate_op_keypair_for_fabric(
        &self,
        index: FabricIndex,
        expected_public_key: &[u8],
    ) -> Result<(), StoreError>;

    fn commit_op_keypair_for_fabric(&self, index: FabricIndex) -> Result<(), StoreError>;

    fn revert_pending_keypair(&self) -> Result<(), StoreError>;

    /// Not an error if no key pair was present for `index`.
    fn remove_op_keypair_for_fabric(&self, index: FabricIndex) -> Result<(), StoreError>;

    fn sign_with_op_keypair(
        &self,
        index: FabricIndex,
        message: &[u8],
    ) -> Result<Vec<u8>, StoreError>;

    fn allocate_ephemeral_keypair_for_case(&self) -> Result<EphemeralKeyHandle, StoreError>;

    fn release_ephemeral_keypair(&self, handle: EphemeralKeyHandle);
}
