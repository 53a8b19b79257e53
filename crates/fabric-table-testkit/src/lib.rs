// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synthetic certificate fixtures for exercising the fabric table without a real commissioner.
//! Not exported from `fabric-table` itself since production callers bring their own chains.

use fabric_table_chain::dn;
use fabric_table_types::OwnedOpKeypair;
use p256::pkcs8::DecodePrivateKey;
use rcgen::{BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};

fn hex_id(id: u64) -> String {
    format!("{id:016X}")
}

fn matter_dn(node_id: Option<u64>, fabric_id: Option<u64>, cn: &str) -> DistinguishedName {
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, cn);
    if let Some(node_id) = node_id {
        name.push(
            DnType::CustomDnType(dn::OID_MATTER_NODE_ID.to_vec()),
            hex_id(node_id),
        );
    }
    if let Some(fabric_id) = fabric_id {
        name.push(
            DnType::CustomDnType(dn::OID_MATTER_FABRIC_ID.to_vec()),
            hex_id(fabric_id),
        );
    }
    name
}

fn ca_params(dn: DistinguishedName) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Constrained(1));
    params
}

fn leaf_params(dn: DistinguishedName) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
    params.distinguished_name = dn;
    params.is_ca = IsCa::NoCa;
    params
}

/// Generates a fresh P-256 keypair for a leaf cert and hands back both the `rcgen` side (to embed
/// in `CertificateParams`) and an `OwnedOpKeypair` built from the same key material, so tests can
/// inject it as the fabric's operational key without going through keystore CSR negotiation.
fn generate_leaf_keypair() -> (KeyPair, OwnedOpKeypair) {
    let key_pair = KeyPair::generate(&rcgen::PKCS_ECDSA_P256_SHA256).expect("p256 keypair");
    let public_key = key_pair.public_key_raw().to_vec();
    let signing_key = p256::ecdsa::SigningKey::from_pkcs8_der(&key_pair.serialize_der())
        .expect("rcgen pkcs8 decodes as a p256 signing key");
    let private_key = signing_key.to_bytes().to_vec();
    (key_pair, OwnedOpKeypair { public_key, private_key })
}

/// A fully generated, self-consistent operational certificate chain, plus the operational keypair
/// backing the NOC so callers can pass it straight to `AddNewPendingFabric`/`UpdatePendingFabric`.
pub struct FabricChainFixture {
    pub rcac_der: Vec<u8>,
    pub icac_der: Vec<u8>,
    pub noc_der: Vec<u8>,
    pub fabric_id: u64,
    pub node_id: u64,
    pub op_key: OwnedOpKeypair,
}

/// A generated root + intermediate, kept live so multiple NOCs (e.g. before/after a rotation) can
/// be issued under the same fabric identity.
pub struct FabricAuthority {
    rcac: Certificate,
    icac: Certificate,
    rcac_der: Vec<u8>,
    icac_der: Vec<u8>,
    fabric_id: u64,
}

impl FabricAuthority {
    /// Root and intermediate carry no FabricId DN attribute of their own — only the NOC does —
    /// matching the "absence is not an error" path documented for chain validation. This also
    /// means the authority's `fabric_id` is purely a labeling convenience for `issue_noc`; the
    /// actual enforced fabric id for any given chain always comes from the NOC's own subject.
    pub fn new(fabric_id: u64) -> Self {
        let rcac = Certificate::from_params(ca_params(matter_dn(None, None, "root")))
            .expect("rcac params valid");
        let icac = Certificate::from_params(ca_params(matter_dn(None, None, "icac")))
            .expect("icac params valid");
        let rcac_der = rcac.serialize_der().expect("self-signed rcac");
        let icac_der = icac
            .serialize_der_with_signer(&rcac)
            .expect("icac signed by rcac");
        FabricAuthority {
            rcac,
            icac,
            rcac_der,
            icac_der,
            fabric_id,
        }
    }

    pub fn rcac_der(&self) -> &[u8] {
        &self.rcac_der
    }

    /// Issues a NOC for `node_id` under this authority's fabric id.
    pub fn issue_noc(&self, node_id: u64) -> FabricChainFixture {
        self.issue_noc_claiming_fabric_id(node_id, self.fabric_id)
    }

    /// Issues a NOC signed by this authority's ICAC but claiming a fabric id different from the
    /// one this authority's root/intermediate were generated with — a tampered-claim NOC used to
    /// exercise the `expected_fabric_id` check independent of the root/ICAC's own (optional)
    /// FabricId attribute check.
    pub fn issue_noc_claiming_fabric_id(&self, node_id: u64, claimed_fabric_id: u64) -> FabricChainFixture {
        let (key_pair, op_key) = generate_leaf_keypair();
        let mut params = leaf_params(matter_dn(Some(node_id), Some(claimed_fabric_id), "noc"));
        params.key_pair = Some(key_pair);
        let noc = Certificate::from_params(params).expect("noc params valid");
        let noc_der = noc
            .serialize_der_with_signer(&self.icac)
            .expect("noc signed by icac");
        FabricChainFixture {
            rcac_der: self.rcac_der.clone(),
            icac_der: self.icac_der.clone(),
            noc_der,
            fabric_id: claimed_fabric_id,
            node_id,
            op_key,
        }
    }
}

/// Builds a fresh three-tier RCAC/ICAC/NOC chain for the given `(fabric_id, node_id)`. A
/// convenience wrapper around `FabricAuthority` for call sites that only need one NOC.
pub fn new_chain(fabric_id: u64, node_id: u64) -> FabricChainFixture {
    FabricAuthority::new(fabric_id).issue_noc(node_id)
}
