// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::{FabricTableError, FabricTableResult};
use crate::ids::{CompressedFabricId, FabricId, FabricIndex, NodeId, VendorId};
use serde::{Deserialize, Serialize};

/// A label is purely descriptive and capped at 32 UTF-8 bytes, matching the commissioning
/// protocol's on-the-wire limit for this field.
pub const MAX_LABEL_BYTES: usize = 32;

/// How a `FabricInfo`'s operational key pair is owned.
///
/// The C-style source stores a raw pointer plus an "externally owned" boolean; here ownership is
/// a proper sum type so there is no lifetime to manage and nothing to detach before destruction.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub enum OpKeyBinding {
    /// No key material is reachable for this fabric (e.g. reconstructed from storage without a
    /// live key store, or mid-recovery).
    #[default]
    None,
    /// The key lives behind an `OperationalKeystore`, addressed by this fabric's index. This is
    /// the normal path.
    Keystore,
    /// The key pair is carried directly on the `FabricInfo`, for hosts that supply their own
    /// operational key material at commissioning time rather than routing it through a key store.
    Owned(OwnedOpKeypair),
}

/// A serializable operational key pair for hosts that manage keys themselves rather than through
/// an `OperationalKeystore`. Real signing for the `Keystore` path always goes through
/// `OperationalKeystore::sign_with_op_keypair`; this type carries the raw material for the
/// `Owned` binding instead.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct OwnedOpKeypair {
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
}

/// One fabric slot: either a committed fabric, or (transiently) the pending shadow tracked by
/// `PendingState`.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct FabricInfo {
    pub index: FabricIndex,
    pub node_id: NodeId,
    pub fabric_id: FabricId,
    pub compressed_fabric_id: CompressedFabricId,
    pub root_public_key: Vec<u8>,
    pub vendor_id: VendorId,
    label: String,
    pub advertise_identity: bool,
    pub op_key: OpKeyBinding,
}

impl FabricInfo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: FabricIndex,
        node_id: NodeId,
        fabric_id: FabricId,
        compressed_fabric_id: CompressedFabricId,
        root_public_key: Vec<u8>,
        vendor_id: VendorId,
        advertise_identity: bool,
        op_key: OpKeyBinding,
    ) -> FabricTableResult<Self> {
        if index.is_undefined() {
            return Err(FabricTableError::invalid_argument(
                "FabricInfo cannot be constructed with the Undefined index",
            ));
        }
        if node_id == 0 {
            return Err(FabricTableError::invalid_argument(
                "FabricInfo requires a non-zero node id",
            ));
        }
        Ok(FabricInfo {
            index,
            node_id,
            fabric_id,
            compressed_fabric_id,
            root_public_key,
            vendor_id,
            label: String::new(),
            advertise_identity,
            op_key,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> FabricTableResult<()> {
        let label = label.into();
        if label.len() > MAX_LABEL_BYTES {
            return Err(FabricTableError::invalid_argument(format!(
                "label of {} bytes exceeds the {MAX_LABEL_BYTES}-byte limit",
                label.len()
            )));
        }
        self.label = label;
        Ok(())
    }

    /// Identity key used for collision detection: two fabrics are "the same fabric" iff this
    /// pair is equal.
    pub fn identity_key(&self) -> (&[u8], FabricId) {
        (&self.root_public_key, self.fabric_id)
    }
}
