// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory reference implementations of the three store traits. Useful for tests and for hosts
//! that do not yet have a persistent backend; not suitable for production use since none of this
//! survives a restart.

use crate::cert_store::{CertElement, OperationalCertificateStore};
use crate::error::{StorageError, StoreError};
use crate::keystore::{EphemeralKeyHandle, OperationalKeystore, MIN_CSR_BUFFER_SIZE};
use crate::storage::PersistentStorage;
use fabric_table_types::FabricIndex;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::collections::HashMap;

/// A `PersistentStorage` backed by a `BTreeMap` behind a lock. Nothing is written to disk.
#[derive(Default)]
pub struct MemStorage {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentStorage for MemStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.data.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.data.write().remove(key);
        Ok(())
    }
}

#[derive(Clone)]
struct FabricCerts {
    rcac: Vec<u8>,
    icac: Option<Vec<u8>>,
    noc: Vec<u8>,
}

enum PendingOpCerts {
    Add {
        index: FabricIndex,
        noc: Vec<u8>,
        icac: Option<Vec<u8>>,
    },
    Update {
        index: FabricIndex,
        noc: Vec<u8>,
        icac: Option<Vec<u8>>,
    },
}

/// An `OperationalCertificateStore` backed by in-memory maps, with at most one pending root and
/// one pending op-cert change at a time (mirroring the fabric table's own single-pending-op
/// invariant).
#[derive(Default)]
pub struct MemCertificateStore {
    committed: RwLock<HashMap<FabricIndex, FabricCerts>>,
    pending_root: RwLock<Option<(FabricIndex, Vec<u8>)>>,
    pending_op_certs: RwLock<Option<PendingOpCerts>>,
}

impl MemCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OperationalCertificateStore for MemCertificateStore {
    fn has_certificate_for_fabric(&self, index: FabricIndex, element: CertElement) -> bool {
        if let Some((root_index, _)) = self.pending_root.read().as_ref() {
            if *root_index == index && matches!(element, CertElement::Rcac) {
                return true;
            }
        }
        let committed = self.committed.read();
        match committed.get(&index) {
            Some(certs) => match element {
                CertElement::Rcac => true,
                CertElement::Icac => certs.icac.is_some(),
                CertElement::Noc => true,
            },
            None => false,
        }
    }

    fn get_certificate(
        &self,
        index: FabricIndex,
        element: CertElement,
    ) -> Result<Vec<u8>, StoreError> {
        if matches!(element, CertElement::Rcac) {
            if let Some((root_index, bytes)) = self.pending_root.read().as_ref() {
                if *root_index == index {
                    return Ok(bytes.clone());
                }
            }
        }
        let committed = self.committed.read();
        let certs = committed.get(&index).ok_or(StoreError::NotFound)?;
        match element {
            CertElement::Rcac => Ok(certs.rcac.clone()),
            CertElement::Icac => certs.icac.clone().ok_or(StoreError::NotFound),
            CertElement::Noc => Ok(certs.noc.clone()),
        }
    }

    fn get_pending_certificate(
        &self,
        index: FabricIndex,
        element: CertElement,
    ) -> Option<Vec<u8>> {
        if matches!(element, CertElement::Rcac) {
            if let Some((root_index, bytes)) = self.pending_root.read().as_ref() {
                if *root_index == index {
                    return Some(bytes.clone());
                }
            }
        }
        match self.pending_op_certs.read().as_ref() {
            Some(PendingOpCerts::Add { index: i, noc, icac })
            | Some(PendingOpCerts::Update { index: i, noc, icac })
                if *i == index =>
            {
                match element {
                    CertElement::Noc => Some(noc.clone()),
                    CertElement::Icac => icac.clone(),
                    CertElement::Rcac => None,
                }
            }
            _ => None,
        }
    }

    fn add_new_trusted_root_cert_for_fabric(
        &self,
        index: FabricIndex,
        rcac_der: &[u8],
    ) -> Result<(), StoreError> {
        *self.pending_root.write() = Some((index, rcac_der.to_vec()));
        Ok(())
    }

    fn add_new_op_certs_for_fabric(
        &self,
        index: FabricIndex,
        noc_der: &[u8],
        icac_der: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        *self.pending_op_certs.write() = Some(PendingOpCerts::Add {
            index,
            noc: noc_der.to_vec(),
            icac: icac_der.map(|b| b.to_vec()),
        });
        Ok(())
    }

    fn update_op_certs_for_fabric(
        &self,
        index: FabricIndex,
        noc_der: &[u8],
        icac_der: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        *self.pending_op_certs.write() = Some(PendingOpCerts::Update {
            index,
            noc: noc_der.to_vec(),
            icac: icac_der.map(|b| b.to_vec()),
        });
        Ok(())
    }

    fn commit_op_certs_for_fabric(&self, index: FabricIndex) -> Result<(), StoreError> {
        let pending = self
            .pending_op_certs
            .write()
            .take()
            .ok_or(StoreError::NoPendingOperation)?;
        let (pending_index, noc, icac) = match pending {
            PendingOpCerts::Add { index, noc, icac } => (index, noc, icac),
            PendingOpCerts::Update { index, noc, icac } => (index, noc, icac),
        };
        if pending_index != index {
            *self.pending_op_certs.write() = Some(PendingOpCerts::Add {
                index: pending_index,
                noc,
                icac,
            });
            return Err(StoreError::NotFound);
        }
        let rcac = match self.pending_root.write().take() {
            Some((root_index, bytes)) if root_index == index => bytes,
            Some(other) => {
                let keep = other;
                *self.pending_root.write() = Some(keep);
                self.committed
                    .read()
                    .get(&index)
                    .map(|c| c.rcac.clone())
                    .ok_or(StoreError::NotFound)?
            }
            None => self
                .committed
                .read()
                .get(&index)
                .map(|c| c.rcac.clone())
                .ok_or(StoreError::NotFound)?,
        };
        self.committed
            .write()
            .insert(index, FabricCerts { rcac, icac, noc });
        Ok(())
    }

    fn revert_pending_op_certs(&self) -> Result<(), StoreError> {
        self.pending_op_certs.write().take();
        self.pending_root.write().take();
        Ok(())
    }

    fn revert_pending_op_certs_except_root(&self) -> Result<(), StoreError> {
        self.pending_op_certs.write().take();
        Ok(())
    }

    fn remove_op_certs_for_fabric(&self, index: FabricIndex) -> Result<(), StoreError> {
        self.committed.write().remove(&index);
        Ok(())
    }
}

/// An `OperationalKeystore` backed by real P-256 key pairs held in memory. CSRs are not actually
/// PKCS#10-encoded; they are the raw SEC1 public key bytes padded to `MIN_CSR_BUFFER_SIZE`, which
/// is sufficient for this crate's own validation path (`activate_op_keypair_for_fabric` only ever
/// checks the public key it embeds).
pub struct MemKeystore {
    state: RwLock<HashMap<FabricIndex, SigningKey>>,
    pending: RwLock<Option<(FabricIndex, SigningKey)>>,
}

impl Default for MemKeystore {
    fn default() -> Self {
        MemKeystore {
            state: RwLock::new(HashMap::new()),
            pending: RwLock::new(None),
        }
    }
}

impl MemKeystore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OperationalKeystore for MemKeystore {
    fn has_op_keypair_for_fabric(&self, index: FabricIndex) -> bool {
        self.state.read().contains_key(&index)
    }

    fn has_pending_op_keypair(&self) -> bool {
        self.pending.read().is_some()
    }

    fn new_op_keypair_for_fabric(&self, index: FabricIndex) -> Result<Vec<u8>, StoreError> {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        let public_key = VerifyingKey::from(&signing_key)
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        *self.pending.write() = Some((index, signing_key));
        let mut csr = public_key;
        csr.resize(MIN_CSR_BUFFER_SIZE.max(csr.len()), 0);
        Ok(csr)
    }

    fn activate_op_keypair_for_fabric(
        &self,
        index: FabricIndex,
        expected_public_key: &[u8],
    ) -> Result<(), StoreError> {
        let pending = self.pending.read();
        let (pending_index, signing_key) = pending.as_ref().ok_or(StoreError::NoPendingOperation)?;
        if *pending_index != index {
            return Err(StoreError::NotFound);
        }
        let public_key = VerifyingKey::from(signing_key)
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        if public_key != expected_public_key {
            return Err(StoreError::PublicKeyMismatch);
        }
        Ok(())
    }

    fn commit_op_keypair_for_fabric(&self, index: FabricIndex) -> Result<(), StoreError> {
        let (pending_index, signing_key) =
            self.pending.write().take().ok_or(StoreError::NoPendingOperation)?;
        if pending_index != index {
            *self.pending.write() = Some((pending_index, signing_key));
            return Err(StoreError::NotFound);
        }
        self.state.write().insert(index, signing_key);
        Ok(())
    }

    fn revert_pending_keypair(&self) -> Result<(), StoreError> {
        self.pending.write().take();
        Ok(())
    }

    fn remove_op_keypair_for_fabric(&self, index: FabricIndex) -> Result<(), StoreError> {
        self.state.write().remove(&index);
        Ok(())
    }

    fn sign_with_op_keypair(
        &self,
        index: FabricIndex,
        message: &[u8],
    ) -> Result<Vec<u8>, StoreError> {
        let state = self.state.read();
        let signing_key = state.get(&index).ok_or(StoreError::NotFound)?;
        let signature: Signature = signing_key.sign(message);
        Ok(signature.to_der().as_bytes().to_vec())
    }

    fn allocate_ephemeral_keypair_for_case(&self) -> Result<EphemeralKeyHandle, StoreError> {
        Ok(EphemeralKeyHandle(rand::random()))
    }

    fn release_ephemeral_keypair(&self, _handle: EphemeralKeyHandle) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_and_verifies_a_round_trip() {
        let keystore = MemKeystore::new();
        let index = FabricIndex::new(1);
        let csr = keystore.new_op_keypair_for_fabric(index).unwrap();
        let public_key = &csr[..65];
        keystore
            .activate_op_keypair_for_fabric(index, public_key)
            .unwrap();
        keystore.commit_op_keypair_for_fabric(index).unwrap();

        let message = b"hello fabric";
        let sig_der = keystore.sign_with_op_keypair(index, message).unwrap();
        let verifying_key =
            VerifyingKey::from_sec1_bytes(public_key).expect("valid sec1 point");
        let signature = Signature::from_der(&sig_der).expect("valid der signature");
        assert!(verifying_key.verify(message, &signature).is_ok());
    }
}
