// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::commit_marker::CommitMarker;
use crate::config::FabricTableConfig;
use crate::delegate::{DelegateHandle, DelegateList, FabricTableDelegate};
use crate::error::{from_chain_error, from_storage_error, from_store_error};
use crate::index_allocator::{IndexAllocator, IndexInfo};
use crate::lkgt::LastKnownGoodTime;
use crate::pending::{PendingOp, PendingState};
use fabric_table_chain::{validate_chain, AcceptAll};
use fabric_table_store::{keys, CertElement, OperationalCertificateStore, OperationalKeystore, PersistentStorage};
use fabric_table_types::{
    CompressedFabricId, FabricId, FabricIndex, FabricInfo, FabricTableError, FabricTableResult,
    NodeId, OpKeyBinding, OwnedOpKeypair, VendorId,
};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
struct FabricMetadata {
    vendor_id: VendorId,
    label: String,
}

/// Outcome of `FabricTable::init`: alongside the table, reports whether a torn commit was found
/// and cleaned up, and which fabric it belonged to.
pub struct InitOutcome {
    pub table: FabricTable,
    pub recovered_fabric: Option<FabricIndex>,
}

/// The transactional fabric table: committed fabric slots, at most one pending operation, and the
/// storage/cert-store/key-store collaborators it orchestrates. All public operations are
/// synchronous — see the crate-level concurrency notes for why.
pub struct FabricTable {
    storage: Arc<dyn PersistentStorage>,
    cert_store: Arc<dyn OperationalCertificateStore>,
    keystore: Option<Arc<dyn OperationalKeystore>>,
    config: FabricTableConfig,
    slots: RwLock<HashMap<FabricIndex, FabricInfo>>,
    index_allocator: RwLock<IndexAllocator>,
    pending: RwLock<PendingState>,
    delegates: DelegateList,
    lkgt: RwLock<LastKnownGoodTime>,
    committing: AtomicBool,
}

impl FabricTable {
    pub fn init(
        storage: Arc<dyn PersistentStorage>,
        cert_store: Arc<dyn OperationalCertificateStore>,
        keystore: Option<Arc<dyn OperationalKeystore>>,
        config: FabricTableConfig,
    ) -> FabricTableResult<InitOutcome> {
        let index_info: IndexInfo = storage
            .get(keys::FABRIC_INDEX_INFO)
            .map_err(from_storage_error)?
            .and_then(|bytes| bcs::from_bytes(&bytes).ok())
            .unwrap_or_default();

        let mut slots = HashMap::new();
        for raw_index in &index_info.in_use {
            let index = FabricIndex::new(*raw_index);
            match Self::reconstruct_fabric(&*storage, &*cert_store, keystore.as_deref(), index) {
                Ok(info) => {
                    slots.insert(index, info);
                }
                Err(e) => {
                    tracing::warn!(fabric_index = %index, error = %e, "skipping fabric that failed to reconstruct on Init");
                }
            }
        }

        let lkgt_bytes = storage
            .get(keys::LAST_KNOWN_GOOD_TIME)
            .map_err(from_storage_error)?;
        let lkgt = LastKnownGoodTime::from_persisted_bytes(lkgt_bytes.as_deref());

        let index_allocator = IndexAllocator::from_index_info(config, &index_info);

        let table = FabricTable {
            storage,
            cert_store,
            keystore,
            config,
            slots: RwLock::new(slots),
            index_allocator: RwLock::new(index_allocator),
            pending: RwLock::new(PendingState::default()),
            delegates: DelegateList::default(),
            lkgt: RwLock::new(lkgt),
            committing: AtomicBool::new(false),
        };

        let marker_bytes = table
            .storage
            .get(keys::FABRIC_COMMIT_MARKER)
            .map_err(from_storage_error)?;
        let recovered_fabric = match marker_bytes.and_then(|b| bcs::from_bytes::<CommitMarker>(&b).ok()) {
            Some(marker) => {
                let index = marker.fabric_index();
                tracing::warn!(fabric_index = %index, "found commit marker on Init, deleting fabric left in an indeterminate state");
                let _ = table.delete_internal(index);
                let _ = table.storage.delete(keys::FABRIC_COMMIT_MARKER);
                Some(index)
            }
            None => None,
        };

        Ok(InitOutcome {
            table,
            recovered_fabric,
        })
    }

    fn reconstruct_fabric(
        storage: &dyn PersistentStorage,
        cert_store: &dyn OperationalCertificateStore,
        keystore: Option<&dyn OperationalKeystore>,
        index: FabricIndex,
    ) -> FabricTableResult<FabricInfo> {
        let metadata_bytes = storage
            .get(&keys::fabric_metadata(index))
            .map_err(from_storage_error)?
            .ok_or_else(|| FabricTableError::internal("missing FabricMetadata"))?;
        let metadata: FabricMetadata = bcs::from_bytes(&metadata_bytes)
            .map_err(|e| FabricTableError::internal(format!("corrupt FabricMetadata: {e}")))?;

        let noc = cert_store
            .get_certificate(index, CertElement::Noc)
            .map_err(from_store_error)?;
        let icac = cert_store.get_certificate(index, CertElement::Icac).ok();
        let rcac = cert_store
            .get_certificate(index, CertElement::Rcac)
            .map_err(from_store_error)?;

        let validated = validate_chain(&noc, icac.as_deref(), &rcac, None, &AcceptAll)
            .map_err(from_chain_error)?;

        let op_key = if keystore.map(|k| k.has_op_keypair_for_fabric(index)).unwrap_or(false) {
            OpKeyBinding::Keystore
        } else {
            OpKeyBinding::None
        };

        let mut info = FabricInfo::new(
            index,
            validated.node_id,
            validated.fabric_id,
            validated.compressed_fabric_id,
            validated.root_public_key,
            metadata.vendor_id,
            false,
            op_key,
        )?;
        info.set_label(metadata.label)?;
        Ok(info)
    }

    pub fn config(&self) -> FabricTableConfig {
        self.config
    }

    pub fn fabric_count(&self) -> usize {
        self.slots.read().len()
    }

    pub fn register_delegate(&self, delegate: Arc<dyn FabricTableDelegate>) -> DelegateHandle {
        self.delegates.register(delegate)
    }

    pub fn unregister_delegate(&self, handle: DelegateHandle) {
        self.delegates.unregister(handle)
    }

    fn in_use_indices(&self) -> BTreeSet<FabricIndex> {
        self.slots.read().keys().copied().collect()
    }

    fn persist_index_info(&self) -> FabricTableResult<()> {
        let in_use = self.in_use_indices();
        let info = self.index_allocator.read().to_index_info(&in_use);
        let bytes = bcs::to_bytes(&info).map_err(|e| FabricTableError::internal(e.to_string()))?;
        self.storage
            .set(keys::FABRIC_INDEX_INFO, &bytes)
            .map_err(from_storage_error)
    }

    pub fn add_new_pending_trusted_root_cert(&self, rcac_der: &[u8]) -> FabricTableResult<()> {
        let mut pending = self.pending.write();
        if !pending.op.is_none() {
            return Err(FabricTableError::incorrect_state(
                "a fabric operation is already pending",
            ));
        }
        if self.slots.read().len() >= self.config.max_fabrics as usize {
            return Err(FabricTableError::NoMemory);
        }
        let index = {
            let mut allocator = self.index_allocator.write();
            allocator
                .allocate(&self.in_use_indices())
                .ok_or(FabricTableError::NoMemory)?
        };
        self.cert_store
            .add_new_trusted_root_cert_for_fabric(index, rcac_der)
            .map_err(from_store_error)?;
        pending.op = PendingOp::RootOnly { index };
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_new_pending_fabric(
        &self,
        noc_der: &[u8],
        icac_der: Option<&[u8]>,
        vendor_id: VendorId,
        injected_op_key: Option<OwnedOpKeypair>,
        advertise_identity: bool,
    ) -> FabricTableResult<FabricIndex> {
        let index = {
            let pending = self.pending.read();
            match &pending.op {
                PendingOp::RootOnly { index } => *index,
                _ => {
                    return Err(FabricTableError::incorrect_state(
                        "AddNewPendingFabric requires a pending trusted root and no other pending operation",
                    ))
                }
            }
        };

        self.cert_store
            .add_new_op_certs_for_fabric(index, noc_der, icac_der)
            .map_err(from_store_error)?;

        let rcac_der = self
            .cert_store
            .get_pending_certificate(index, CertElement::Rcac)
            .ok_or_else(|| FabricTableError::internal("pending root vanished during Add"))?;

        let validated = validate_chain(noc_der, icac_der, &rcac_der, None, &AcceptAll).map_err(|e| {
            let _ = self.cert_store.revert_pending_op_certs_except_root();
            from_chain_error(e)
        })?;

        self.lkgt.write().harvest_pending(validated.latest_not_before);

        let mut pending = self.pending.write();

        let op_key = if let Some(injected) = injected_op_key {
            if injected.public_key != validated.noc_public_key {
                drop(pending);
                let _ = self.cert_store.revert_pending_op_certs_except_root();
                return Err(FabricTableError::InvalidPublicKey);
            }
            OpKeyBinding::Owned(injected)
        } else if let Some(keystore) = &self.keystore {
            if keystore.has_pending_op_keypair() {
                if let Err(e) = keystore.activate_op_keypair_for_fabric(index, &validated.noc_public_key) {
                    drop(pending);
                    let _ = self.cert_store.revert_pending_op_certs_except_root();
                    return Err(from_store_error(e));
                }
                pending.op_key_pending = true;
            } else if !keystore.has_op_keypair_for_fabric(index) {
                drop(pending);
                let _ = self.cert_store.revert_pending_op_certs_except_root();
                return Err(from_store_error(fabric_table_store::StoreError::NotFound));
            }
            OpKeyBinding::Keystore
        } else {
            drop(pending);
            let _ = self.cert_store.revert_pending_op_certs_except_root();
            return Err(FabricTableError::KeyNotFound(index));
        };

        if !pending.ignore_collisions {
            let collision = self
                .slots
                .read()
                .values()
                .any(|f| f.fabric_id == validated.fabric_id && f.root_public_key == validated.root_public_key);
            if collision {
                drop(pending);
                let _ = self.cert_store.revert_pending_op_certs_except_root();
                return Err(FabricTableError::FabricExists(index));
            }
        }

        let info = FabricInfo::new(
            index,
            validated.node_id,
            validated.fabric_id,
            validated.compressed_fabric_id,
            validated.root_public_key,
            vendor_id,
            advertise_identity,
            op_key,
        )?;
        pending.op = PendingOp::Adding {
            index,
            fabric: Box::new(info),
        };
        drop(pending);

        self.delegates.notify_on_updated(self, index);
        Ok(index)
    }

    pub fn update_pending_fabric(
        &self,
        fabric_index: FabricIndex,
        noc_der: &[u8],
        icac_der: Option<&[u8]>,
        injected_op_key: Option<OwnedOpKeypair>,
        advertise_identity: bool,
    ) -> FabricTableResult<()> {
        if !self.pending.read().op.is_none() {
            return Err(FabricTableError::incorrect_state(
                "UpdatePendingFabric requires no other pending operation",
            ));
        }
        let existing = self
            .slots
            .read()
            .get(&fabric_index)
            .cloned()
            .ok_or(FabricTableError::InvalidFabricIndex(fabric_index))?;

        self.cert_store
            .update_op_certs_for_fabric(fabric_index, noc_der, icac_der)
            .map_err(from_store_error)?;

        let rcac_der = self
            .cert_store
            .get_certificate(fabric_index, CertElement::Rcac)
            .map_err(from_store_error)?;

        let validated = validate_chain(
            noc_der,
            icac_der,
            &rcac_der,
            Some(existing.fabric_id),
            &AcceptAll,
        )
        .map_err(|e| {
            let _ = self.cert_store.revert_pending_op_certs_except_root();
            from_chain_error(e)
        })?;

        self.lkgt.write().harvest_pending(validated.latest_not_before);

        let ignore_collisions = self.pending.read().ignore_collisions;
        if !ignore_collisions {
            let other_match = self.slots.read().iter().find(|(idx, f)| {
                **idx != fabric_index
                    && f.fabric_id == validated.fabric_id
                    && f.root_public_key == validated.root_public_key
            });
            if other_match.is_some() {
                let _ = self.cert_store.revert_pending_op_certs_except_root();
                return Err(FabricTableError::InvalidFabricIndex(fabric_index));
            }
        }

        let mut pending = self.pending.write();
        let op_key = if let Some(injected) = injected_op_key {
            if injected.public_key != validated.noc_public_key {
                drop(pending);
                let _ = self.cert_store.revert_pending_op_certs_except_root();
                return Err(FabricTableError::InvalidPublicKey);
            }
            OpKeyBinding::Owned(injected)
        } else if let Some(keystore) = &self.keystore {
            if keystore.has_pending_op_keypair() {
                if let Err(e) = keystore.activate_op_keypair_for_fabric(fabric_index, &validated.noc_public_key) {
                    drop(pending);
                    let _ = self.cert_store.revert_pending_op_certs_except_root();
                    return Err(from_store_error(e));
                }
                pending.op_key_pending = true;
                pending.op_key_for_update = true;
            }
            OpKeyBinding::Keystore
        } else {
            existing.op_key.clone()
        };

        let mut shadow = FabricInfo::new(
            fabric_index,
            validated.node_id,
            validated.fabric_id,
            validated.compressed_fabric_id,
            validated.root_public_key,
            existing.vendor_id,
            advertise_identity,
            op_key,
        )?;
        shadow.set_label(existing.label())?;

        pending.op = PendingOp::Updating {
            index: fabric_index,
            fabric: Box::new(shadow),
        };
        drop(pending);

        self.delegates.notify_on_updated(self, fabric_index);
        Ok(())
    }

    pub fn commit_pending_fabric_data(&self) -> FabricTableResult<()> {
        if self
            .committing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FabricTableError::incorrect_state(
                "CommitPendingFabricData called re-entrantly",
            ));
        }
        let result = self.commit_pending_fabric_data_inner();
        self.committing.store(false, Ordering::Release);
        result
    }

    fn commit_pending_fabric_data_inner(&self) -> FabricTableResult<()> {
        let (index, is_adding, shadow) = {
            let mut pending = self.pending.write();
            match std::mem::take(&mut pending.op) {
                PendingOp::Adding { index, fabric } => (index, true, *fabric),
                PendingOp::Updating { index, fabric } => (index, false, *fabric),
                other => {
                    pending.op = other;
                    pending.clear();
                    return Err(FabricTableError::incorrect_state(
                        "CommitPendingFabricData called with nothing to commit",
                    ));
                }
            }
        };

        let marker = CommitMarker::new(index, is_adding);
        match bcs::to_bytes(&marker) {
            Ok(bytes) => {
                if let Err(e) = self.storage.set(keys::FABRIC_COMMIT_MARKER, &bytes) {
                    tracing::error!(fabric_index = %index, error = %e, "failed to write commit marker, proceeding anyway");
                }
            }
            Err(e) => tracing::error!(fabric_index = %index, error = %e, "failed to encode commit marker, proceeding anyway"),
        }

        let mut sticky_error: Option<FabricTableError> = None;

        let metadata = FabricMetadata {
            vendor_id: shadow.vendor_id,
            label: shadow.label().to_string(),
        };
        match bcs::to_bytes(&metadata).map_err(|e| FabricTableError::internal(e.to_string())) {
            Ok(bytes) => {
                if let Err(e) = self.storage.set(&keys::fabric_metadata(index), &bytes) {
                    sticky_error = Some(from_storage_error(e));
                }
            }
            Err(e) => sticky_error = Some(e),
        }

        if sticky_error.is_none() {
            self.slots.write().insert(index, shadow);
        }

        let op_key_pending = self.pending.read().op_key_pending;
        if sticky_error.is_none() && op_key_pending {
            if let Some(keystore) = &self.keystore {
                if let Err(e) = keystore.commit_op_keypair_for_fabric(index) {
                    let _ = keystore.revert_pending_keypair();
                    sticky_error = Some(from_store_error(e));
                }
            }
        }

        if sticky_error.is_none() {
            if let Err(e) = self.cert_store.commit_op_certs_for_fabric(index) {
                let _ = self.cert_store.revert_pending_op_certs();
                sticky_error = Some(from_store_error(e));
            }
        }

        if let Some(bytes) = self.lkgt.write().commit() {
            if let Err(e) = self.storage.set(keys::LAST_KNOWN_GOOD_TIME, &bytes) {
                tracing::warn!(fabric_index = %index, error = %e, "failed to persist LastKnownGoodTime, not sticky");
            }
        }

        if sticky_error.is_none() && is_adding {
            if let Err(e) = self.persist_index_info() {
                sticky_error = Some(e);
            }
        }

        self.pending.write().clear();

        if let Some(err) = sticky_error {
            let _ = self.cert_store.revert_pending_op_certs();
            if let Some(keystore) = &self.keystore {
                let _ = keystore.revert_pending_keypair();
            }
            let _ = self.delete_internal(index);
            let _ = self.storage.delete(keys::FABRIC_COMMIT_MARKER);
            return Err(err);
        }

        self.delegates.notify_on_committed(self, index);
        let _ = self.storage.delete(keys::FABRIC_COMMIT_MARKER);
        Ok(())
    }

    pub fn revert_pending_fabric_data(&self) -> FabricTableResult<()> {
        let was_adding_index = {
            let pending = self.pending.read();
            match &pending.op {
                PendingOp::Adding { index, .. } => Some(*index),
                _ => None,
            }
        };

        if let Err(e) = self.cert_store.revert_pending_op_certs_except_root() {
            tracing::warn!(error = %e, "failed to revert pending op certs");
        }
        if let Some(keystore) = &self.keystore {
            if let Err(e) = keystore.revert_pending_keypair() {
                tracing::warn!(error = %e, "failed to revert pending op keypair");
            }
        }
        if let Err(e) = self.cert_store.revert_pending_op_certs() {
            tracing::warn!(error = %e, "failed to revert pending root cert");
        }
        self.lkgt.write().revert();

        if let Some(index) = was_adding_index {
            let _ = self.delete_internal(index);
        }

        self.pending.write().clear();
        Ok(())
    }

    fn delete_internal(&self, fabric_index: FabricIndex) -> FabricTableResult<()> {
        let was_initialized = self.slots.write().remove(&fabric_index).is_some();

        if let Err(e) = self.storage.delete(&keys::fabric_metadata(fabric_index)) {
            tracing::warn!(fabric_index = %fabric_index, error = %e, "failed to delete FabricMetadata");
        }
        if let Some(keystore) = &self.keystore {
            if let Err(e) = keystore.remove_op_keypair_for_fabric(fabric_index) {
                tracing::warn!(fabric_index = %fabric_index, error = %e, "failed to remove op keypair");
            }
        }
        if let Err(e) = self.cert_store.remove_op_certs_for_fabric(fabric_index) {
            tracing::warn!(fabric_index = %fabric_index, error = %e, "failed to remove op certs");
        }

        {
            let mut allocator = self.index_allocator.write();
            if allocator.is_full() {
                allocator.note_freed(fabric_index);
            }
        }
        if let Err(e) = self.persist_index_info() {
            tracing::warn!(fabric_index = %fabric_index, error = %e, "failed to persist FabricIndexInfo after delete");
        }

        if was_initialized {
            Ok(())
        } else {
            Err(FabricTableError::NotFound(fabric_index))
        }
    }

    pub fn delete(&self, fabric_index: FabricIndex) -> FabricTableResult<()> {
        if fabric_index.is_undefined() {
            return Err(FabricTableError::invalid_argument(
                "Delete cannot target the Undefined fabric index",
            ));
        }

        self.delegates.notify_will_remove(self, fabric_index);

        if self.pending.read().op.index() == Some(fabric_index) {
            let _ = self.revert_pending_fabric_data();
        }

        let result = self.delete_internal(fabric_index);
        self.delegates.notify_on_removed(self, fabric_index);
        result
    }

    pub fn find_fabric_with_index(&self, fabric_index: FabricIndex) -> Option<FabricInfo> {
        let pending = self.pending.read();
        if pending.op.index() == Some(fabric_index) {
            if let Some(shadow) = pending.op.shadow() {
                return Some(shadow.clone());
            }
        }
        drop(pending);
        self.slots.read().get(&fabric_index).cloned()
    }

    pub fn find_fabric(&self, root_public_key: &[u8], fabric_id: FabricId) -> Option<FabricInfo> {
        let pending = self.pending.read();
        if let Some(shadow) = pending.op.shadow() {
            if shadow.root_public_key == root_public_key && shadow.fabric_id == fabric_id {
                return Some(shadow.clone());
            }
        }
        drop(pending);
        self.slots
            .read()
            .values()
            .find(|f| f.root_public_key == root_public_key && f.fabric_id == fabric_id)
            .cloned()
    }

    pub fn find_identity(
        &self,
        root_public_key: &[u8],
        fabric_id: FabricId,
        node_id: NodeId,
    ) -> Option<FabricInfo> {
        self.find_fabric(root_public_key, fabric_id)
            .filter(|f| f.node_id == node_id)
    }

    pub fn find_fabric_with_compressed_id(
        &self,
        compressed_fabric_id: CompressedFabricId,
    ) -> Option<FabricInfo> {
        let pending = self.pending.read();
        if let Some(shadow) = pending.op.shadow() {
            if shadow.compressed_fabric_id == compressed_fabric_id {
                return Some(shadow.clone());
            }
        }
        drop(pending);
        self.slots
            .read()
            .values()
            .find(|f| f.compressed_fabric_id == compressed_fabric_id)
            .cloned()
    }

    pub fn set_label(&self, fabric_index: FabricIndex, label: impl Into<String>) -> FabricTableResult<()> {
        let mut slots = self.slots.write();
        let fabric = slots
            .get_mut(&fabric_index)
            .ok_or(FabricTableError::InvalidFabricIndex(fabric_index))?;
        fabric.set_label(label)?;
        let metadata = FabricMetadata {
            vendor_id: fabric.vendor_id,
            label: fabric.label().to_string(),
        };
        drop(slots);
        self.persist_metadata(fabric_index, &metadata)
    }

    pub fn set_advertise_identity(&self, fabric_index: FabricIndex, advertise: bool) -> FabricTableResult<()> {
        let mut slots = self.slots.write();
        let fabric = slots
            .get_mut(&fabric_index)
            .ok_or(FabricTableError::InvalidFabricIndex(fabric_index))?;
        fabric.advertise_identity = advertise;
        let metadata = FabricMetadata {
            vendor_id: fabric.vendor_id,
            label: fabric.label().to_string(),
        };
        drop(slots);
        self.persist_metadata(fabric_index, &metadata)
    }

    fn persist_metadata(&self, fabric_index: FabricIndex, metadata: &FabricMetadata) -> FabricTableResult<()> {
        let bytes = bcs::to_bytes(metadata).map_err(|e| FabricTableError::internal(e.to_string()))?;
        self.storage
            .set(&keys::fabric_metadata(fabric_index), &bytes)
            .map_err(from_storage_error)
    }

    pub fn sign_with_op_keypair(&self, fabric_index: FabricIndex, message: &[u8]) -> FabricTableResult<Vec<u8>> {
        let fabric = self
            .slots
            .read()
            .get(&fabric_index)
            .cloned()
            .ok_or(FabricTableError::InvalidFabricIndex(fabric_index))?;

        match &fabric.op_key {
            OpKeyBinding::Owned(keypair) => {
                let signing_key = SigningKey::from_slice(&keypair.private_key)
                    .map_err(|_| FabricTableError::KeyNotFound(fabric_index))?;
                let signature: Signature = signing_key.sign(message);
                Ok(signature.to_der().as_bytes().to_vec())
            }
            OpKeyBinding::Keystore => self
                .keystore
                .as_ref()
                .ok_or(FabricTableError::KeyNotFound(fabric_index))?
                .sign_with_op_keypair(fabric_index, message)
                .map_err(from_store_error),
            OpKeyBinding::None => Err(FabricTableError::KeyNotFound(fabric_index)),
        }
    }
}
