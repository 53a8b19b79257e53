// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use fabric_table::{FabricIndex, FabricTable, FabricTableConfig, FabricTableError};
use fabric_table_store::mem::{MemCertificateStore, MemKeystore, MemStorage};
use fabric_table_testkit::FabricAuthority;
use std::sync::Arc;

fn small_config() -> FabricTableConfig {
    FabricTableConfig {
        min_valid: FabricIndex::new(1),
        max_valid: FabricIndex::new(5),
        max_fabrics: 5,
    }
}

struct Harness {
    table: FabricTable,
    storage: Arc<MemStorage>,
    cert_store: Arc<MemCertificateStore>,
}

fn fresh_harness(config: FabricTableConfig) -> Harness {
    let storage = Arc::new(MemStorage::new());
    let cert_store = Arc::new(MemCertificateStore::new());
    let keystore = Arc::new(MemKeystore::new());
    let outcome = FabricTable::init(storage.clone(), cert_store.clone(), Some(keystore), config)
        .expect("init on empty storage should succeed");
    assert!(outcome.recovered_fabric.is_none());
    Harness {
        table: outcome.table,
        storage,
        cert_store,
    }
}

fn reopen(harness: &Harness, config: FabricTableConfig) -> fabric_table::InitOutcome {
    FabricTable::init(
        harness.storage.clone(),
        harness.cert_store.clone(),
        Some(Arc::new(MemKeystore::new())),
        config,
    )
    .expect("reopen should succeed")
}

fn add_fabric(table: &FabricTable, fabric_id: u64, node_id: u64, vendor_id: u16) -> FabricIndex {
    let authority = FabricAuthority::new(fabric_id);
    let chain = authority.issue_noc(node_id);
    table
        .add_new_pending_trusted_root_cert(&chain.rcac_der)
        .expect("root cert install should succeed");
    let index = table
        .add_new_pending_fabric(
            &chain.noc_der,
            Some(&chain.icac_der),
            vendor_id,
            Some(chain.op_key.clone()),
            true,
        )
        .expect("add should succeed");
    table.commit_pending_fabric_data().expect("commit should succeed");
    index
}

#[test]
fn happy_path_add() {
    let harness = fresh_harness(small_config());
    let authority = FabricAuthority::new(1);
    let chain = authority.issue_noc(42);

    harness
        .table
        .add_new_pending_trusted_root_cert(&chain.rcac_der)
        .unwrap();
    let index = harness
        .table
        .add_new_pending_fabric(
            &chain.noc_der,
            Some(&chain.icac_der),
            0xFFF1,
            Some(chain.op_key.clone()),
            true,
        )
        .unwrap();
    assert_eq!(index, FabricIndex::new(1));

    harness.table.commit_pending_fabric_data().unwrap();

    let found = harness.table.find_fabric_with_index(index).unwrap();
    assert_eq!(found.fabric_id, chain.fabric_id);
    assert_eq!(found.node_id, 42);
}

#[test]
fn update_rotation_visible_before_commit_and_reverted() {
    let harness = fresh_harness(small_config());
    let authority = FabricAuthority::new(9);
    let old_node_id = 100;
    let new_node_id = 200;

    let old_chain = authority.issue_noc(old_node_id);
    harness
        .table
        .add_new_pending_trusted_root_cert(&old_chain.rcac_der)
        .unwrap();
    let index = harness
        .table
        .add_new_pending_fabric(
            &old_chain.noc_der,
            Some(&old_chain.icac_der),
            1,
            Some(old_chain.op_key.clone()),
            true,
        )
        .unwrap();
    harness.table.commit_pending_fabric_data().unwrap();

    let new_chain = authority.issue_noc(new_node_id);
    harness
        .table
        .update_pending_fabric(
            index,
            &new_chain.noc_der,
            Some(&new_chain.icac_der),
            Some(new_chain.op_key.clone()),
            true,
        )
        .unwrap();

    assert_eq!(
        harness.table.find_fabric_with_index(index).unwrap().node_id,
        new_node_id
    );

    harness.table.revert_pending_fabric_data().unwrap();

    assert_eq!(
        harness.table.find_fabric_with_index(index).unwrap().node_id,
        old_node_id
    );
}

#[test]
fn collision_rejection_keeps_pending_root() {
    let harness = fresh_harness(small_config());
    let authority = FabricAuthority::new(77);
    add_fabric_with_authority(&harness.table, &authority, 1, 1);

    let colliding = authority.issue_noc(2);
    harness
        .table
        .add_new_pending_trusted_root_cert(&colliding.rcac_der)
        .unwrap();
    let err = harness
        .table
        .add_new_pending_fabric(
            &colliding.noc_der,
            Some(&colliding.icac_der),
            1,
            Some(colliding.op_key.clone()),
            true,
        )
        .unwrap_err();
    assert_eq!(err, FabricTableError::FabricExists(FabricIndex::new(2)));
}

fn add_fabric_with_authority(
    table: &FabricTable,
    authority: &FabricAuthority,
    node_id: u64,
    vendor_id: u16,
) -> FabricIndex {
    let chain = authority.issue_noc(node_id);
    table
        .add_new_pending_trusted_root_cert(&chain.rcac_der)
        .unwrap();
    let index = table
        .add_new_pending_fabric(
            &chain.noc_der,
            Some(&chain.icac_der),
            vendor_id,
            Some(chain.op_key.clone()),
            true,
        )
        .unwrap();
    table.commit_pending_fabric_data().unwrap();
    index
}

#[test]
fn torn_commit_recovery() {
    let harness = fresh_harness(small_config());

    let marker = TestCommitMarkerBytes::for_index(2, true);
    harness
        .storage
        .set(fabric_table_store::keys::FABRIC_COMMIT_MARKER, &marker.0)
        .unwrap();

    let outcome = reopen(&harness, small_config());
    assert_eq!(outcome.recovered_fabric, Some(FabricIndex::new(2)));
    assert!(outcome.table.find_fabric_with_index(FabricIndex::new(2)).is_none());

    let index = add_fabric(&outcome.table, 55, 1, 1);
    assert!(index.value() >= 2);
}

/// bcs-encodes a `CommitMarker`-shaped record without depending on `fabric_table`'s private type.
struct TestCommitMarkerBytes(Vec<u8>);

impl TestCommitMarkerBytes {
    fn for_index(fabric_index: u8, is_addition: bool) -> Self {
        #[derive(serde::Serialize)]
        struct Marker {
            fabric_index: u8,
            is_addition: bool,
            _reserved: [u64; 2],
        }
        TestCommitMarkerBytes(
            bcs::to_bytes(&Marker {
                fabric_index,
                is_addition,
                _reserved: [0; 2],
            })
            .unwrap(),
        )
    }
}

struct CountingDelegate {
    removed: std::sync::atomic::AtomicUsize,
}

impl fabric_table::FabricTableDelegate for CountingDelegate {
    fn on_removed(&self, _table: &FabricTable, _index: FabricIndex) {
        self.removed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

struct SelfRemovingDelegate {
    handle: std::sync::OnceLock<fabric_table::DelegateHandle>,
}

impl fabric_table::FabricTableDelegate for SelfRemovingDelegate {
    fn on_removed(&self, table: &FabricTable, _index: FabricIndex) {
        if let Some(handle) = self.handle.get() {
            table.unregister_delegate(*handle);
        }
    }
}

#[test]
fn delegate_self_removal_during_notification() {
    let harness = fresh_harness(small_config());
    let index = add_fabric(&harness.table, 3, 3, 1);

    let first = Arc::new(CountingDelegate {
        removed: std::sync::atomic::AtomicUsize::new(0),
    });
    let middle = Arc::new(SelfRemovingDelegate {
        handle: std::sync::OnceLock::new(),
    });
    let third = Arc::new(CountingDelegate {
        removed: std::sync::atomic::AtomicUsize::new(0),
    });

    harness.table.register_delegate(first.clone());
    let middle_handle = harness.table.register_delegate(middle.clone());
    let _ = middle.handle.set(middle_handle);
    harness.table.register_delegate(third.clone());

    harness.table.delete(index).unwrap();

    assert_eq!(first.removed.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(third.removed.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn index_wraps_past_max_valid() {
    let harness = fresh_harness(small_config());
    let mut observed = Vec::new();
    for i in 0..7u64 {
        let index = add_fabric(&harness.table, 100 + i, 1, 1);
        observed.push(index.value());
        harness.table.delete(index).unwrap();
    }
    assert_eq!(observed, vec![1, 2, 3, 4, 5, 1, 2]);
}

#[test]
fn no_memory_when_full() {
    let harness = fresh_harness(small_config());
    for i in 0..5u64 {
        add_fabric(&harness.table, 200 + i, 1, 1);
    }
    let authority = FabricAuthority::new(999);
    let err = harness
        .table
        .add_new_pending_trusted_root_cert(&authority.rcac_der().to_vec())
        .unwrap_err();
    assert_eq!(err, FabricTableError::NoMemory);
}

#[test]
fn delete_undefined_is_invalid_argument() {
    let harness = fresh_harness(small_config());
    let err = harness.table.delete(FabricIndex::UNDEFINED).unwrap_err();
    assert!(matches!(err, FabricTableError::InvalidArgument(_)));
}

#[test]
fn delete_of_uninitialized_index_returns_not_found() {
    let harness = fresh_harness(small_config());
    let err = harness.table.delete(FabricIndex::new(3)).unwrap_err();
    assert_eq!(err, FabricTableError::NotFound(FabricIndex::new(3)));
}

#[test]
fn update_with_wrong_fabric_id_is_rejected() {
    let harness = fresh_harness(small_config());
    let authority = FabricAuthority::new(10);
    let index = add_fabric_with_authority(&harness.table, &authority, 1, 1);

    // Signed by the same root/ICAC that already backs `index`, so the chain itself validates;
    // only the NOC's claimed fabric id has been tampered with.
    let tampered = authority.issue_noc_claiming_fabric_id(2, 999);
    let err = harness
        .table
        .update_pending_fabric(index, &tampered.noc_der, Some(&tampered.icac_der), None, true)
        .unwrap_err();
    assert_eq!(err, FabricTableError::WrongNodeId);
    assert_eq!(harness.table.find_fabric_with_index(index).unwrap().node_id, 1);
}

#[test]
fn add_then_revert_is_observationally_equal() {
    let harness = fresh_harness(small_config());
    let authority = FabricAuthority::new(500);
    let chain = authority.issue_noc(1);

    let before_count = harness.table.fabric_count();

    harness
        .table
        .add_new_pending_trusted_root_cert(&chain.rcac_der)
        .unwrap();
    harness
        .table
        .add_new_pending_fabric(
            &chain.noc_der,
            Some(&chain.icac_der),
            1,
            Some(chain.op_key.clone()),
            true,
        )
        .unwrap();
    harness.table.revert_pending_fabric_data().unwrap();

    assert_eq!(harness.table.fabric_count(), before_count);
}

#[test]
fn add_then_commit_then_delete_is_observationally_equal_modulo_next_available() {
    let harness = fresh_harness(small_config());
    let before_count = harness.table.fabric_count();

    let index = add_fabric(&harness.table, 600, 1, 1);
    harness.table.delete(index).unwrap();

    assert_eq!(harness.table.fabric_count(), before_count);
    assert!(harness.table.find_fabric_with_index(index).is_none());
}

#[test]
fn committed_fabric_survives_a_fresh_init_unchanged() {
    let harness = fresh_harness(small_config());
    let authority = FabricAuthority::new(42);
    let chain = authority.issue_noc(7);

    harness
        .table
        .add_new_pending_trusted_root_cert(&chain.rcac_der)
        .unwrap();
    let index = harness
        .table
        .add_new_pending_fabric(
            &chain.noc_der,
            Some(&chain.icac_der),
            0xABCD,
            Some(chain.op_key.clone()),
            true,
        )
        .unwrap();
    harness.table.commit_pending_fabric_data().unwrap();
    let before = harness.table.find_fabric_with_index(index).unwrap();

    let outcome = reopen(&harness, small_config());
    assert!(outcome.recovered_fabric.is_none());
    let after = outcome.table.find_fabric_with_index(index).unwrap();

    assert_eq!(after.node_id, before.node_id);
    assert_eq!(after.fabric_id, before.fabric_id);
    assert_eq!(after.compressed_fabric_id, before.compressed_fabric_id);
    assert_eq!(after.root_public_key, before.root_public_key);
    assert_eq!(after.vendor_id, before.vendor_id);
}

#[test]
fn set_label_and_advertise_identity_persist_across_init() {
    let harness = fresh_harness(small_config());
    let index = add_fabric(&harness.table, 701, 1, 1);

    harness.table.set_label(index, "kitchen light").unwrap();
    harness.table.set_advertise_identity(index, false).unwrap();

    let outcome = reopen(&harness, small_config());
    let fabric = outcome.table.find_fabric_with_index(index).unwrap();
    assert_eq!(fabric.label(), "kitchen light");
}

#[test]
fn sign_with_owned_op_keypair_produces_a_verifiable_signature() {
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::{Signature, VerifyingKey};

    let harness = fresh_harness(small_config());
    let authority = FabricAuthority::new(800);
    let chain = authority.issue_noc(1);

    harness
        .table
        .add_new_pending_trusted_root_cert(&chain.rcac_der)
        .unwrap();
    let index = harness
        .table
        .add_new_pending_fabric(
            &chain.noc_der,
            Some(&chain.icac_der),
            1,
            Some(chain.op_key.clone()),
            true,
        )
        .unwrap();
    harness.table.commit_pending_fabric_data().unwrap();

    let message = b"CASE sigma1 placeholder";
    let sig_der = harness.table.sign_with_op_keypair(index, message).unwrap();

    let verifying_key = VerifyingKey::from_sec1_bytes(&chain.op_key.public_key).unwrap();
    let signature = Signature::from_der(&sig_der).unwrap();
    assert!(verifying_key.verify(message, &signature).is_ok());
}

#[test]
fn delete_reverts_a_pending_update_on_the_same_index_first() {
    let harness = fresh_harness(small_config());
    let authority = FabricAuthority::new(900);
    let index = add_fabric_with_authority(&harness.table, &authority, 1, 1);

    let new_chain = authority.issue_noc(2);
    harness
        .table
        .update_pending_fabric(
            index,
            &new_chain.noc_der,
            Some(&new_chain.icac_der),
            Some(new_chain.op_key.clone()),
            true,
        )
        .unwrap();
    assert_eq!(harness.table.find_fabric_with_index(index).unwrap().node_id, 2);

    harness.table.delete(index).unwrap();

    assert!(harness.table.find_fabric_with_index(index).is_none());
}
