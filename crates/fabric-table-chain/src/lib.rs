// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pure validation of a NOC/ICAC/RCAC operational certificate chain. This crate has no notion of
//! a fabric table, pending state, or storage — it takes DER bytes in and returns typed data or a
//! typed error out, so it can be exercised and fuzzed in isolation.

mod compressed_id;
pub mod dn;
mod error;

pub use compressed_id::derive_compressed_fabric_id;
pub use error::ChainValidationError;

use fabric_table_types::{CompressedFabricId, FabricId, NodeId};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use std::time::{Duration, SystemTime};
use x509_parser::prelude::{FromDer, X509Certificate};

/// Everything recovered from a validated chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidatedChain {
    pub compressed_fabric_id: CompressedFabricId,
    pub fabric_id: FabricId,
    pub node_id: NodeId,
    pub noc_public_key: Vec<u8>,
    pub root_public_key: Vec<u8>,
    pub latest_not_before: Option<SystemTime>,
}

/// Harvests an accept/reject decision for each certificate's `not_before` time, so the caller can
/// fold the latest accepted one into its own notion of "last known good time" without this crate
/// knowing anything about that concept.
pub trait ValidityPolicy {
    fn accept(&self, not_before: SystemTime) -> bool;
}

/// Accepts every `not_before`, used at installation time when the policy is "trust whatever the
/// certificate claims".
pub struct AcceptAll;

impl ValidityPolicy for AcceptAll {
    fn accept(&self, _not_before: SystemTime) -> bool {
        true
    }
}

fn not_before_as_system_time(cert: &X509Certificate<'_>) -> SystemTime {
    let ts = cert.validity().not_before.timestamp();
    if ts >= 0 {
        SystemTime::UNIX_EPOCH + Duration::from_secs(ts as u64)
    } else {
        SystemTime::UNIX_EPOCH - Duration::from_secs((-ts) as u64)
    }
}

fn parse<'a>(der: &'a [u8], what: &'static str) -> Result<X509Certificate<'a>, ChainValidationError> {
    X509Certificate::from_der(der)
        .map(|(_, cert)| cert)
        .map_err(|e| ChainValidationError::UnsupportedCertFormat(format!("{what}: {e}")))
}

fn verify_signed_by(
    subject: &X509Certificate<'_>,
    issuer_public_key: &[u8],
) -> Result<(), ChainValidationError> {
    let verifying_key = VerifyingKey::from_sec1_bytes(issuer_public_key).map_err(|e| {
        ChainValidationError::UnsupportedCertFormat(format!("issuer public key: {e}"))
    })?;
    let sig_bytes = subject.signature_value.as_ref();
    let signature = Signature::from_der(sig_bytes)
        .map_err(|e| ChainValidationError::UnsupportedCertFormat(format!("signature: {e}")))?;
    verifying_key
        .verify(subject.tbs_certificate.as_ref(), &signature)
        .map_err(|e| ChainValidationError::UnsupportedCertFormat(format!("signature verification failed: {e}")))
}

/// Validates a NOC (+ optional ICAC) against an RCAC trust anchor and derives the chain's
/// identity. `expected_fabric_id`, when `Some`, rejects a chain whose derived fabric id does not
/// match (used by `UpdatePendingFabric` to ensure the new chain belongs to the fabric being
/// updated).
pub fn validate_chain(
    noc_der: &[u8],
    icac_der: Option<&[u8]>,
    rcac_der: &[u8],
    expected_fabric_id: Option<FabricId>,
    validity_policy: &dyn ValidityPolicy,
) -> Result<ValidatedChain, ChainValidationError> {
    let rcac = parse(rcac_der, "RCAC")?;
    let icac = icac_der.map(|b| parse(b, "ICAC")).transpose()?;
    let noc = parse(noc_der, "NOC")?;

    let root_public_key = rcac.public_key().raw.to_vec();

    let noc_issuer_key = match &icac {
        Some(icac) => icac.public_key().raw.to_vec(),
        None => root_public_key.clone(),
    };
    verify_signed_by(&noc, &noc_issuer_key)?;
    if let Some(icac) = &icac {
        verify_signed_by(icac, &root_public_key)?;
    }

    let node_id = dn::node_id(noc.subject())
        .ok_or_else(|| ChainValidationError::UnsupportedCertFormat("NOC missing matter-NodeId".into()))?;
    let fabric_id = dn::fabric_id(noc.subject())
        .ok_or_else(|| ChainValidationError::UnsupportedCertFormat("NOC missing matter-FabricId".into()))?;

    if let Some(icac) = &icac {
        if let Some(icac_fabric_id) = dn::fabric_id(icac.subject()) {
            if icac_fabric_id != fabric_id {
                return Err(ChainValidationError::FabricMismatchOnIca);
            }
        }
    }
    if let Some(rcac_fabric_id) = dn::fabric_id(rcac.subject()) {
        if rcac_fabric_id != fabric_id {
            return Err(ChainValidationError::WrongCertDn);
        }
    }

    let compressed_fabric_id = derive_compressed_fabric_id(&root_public_key, fabric_id);

    if let Some(expected) = expected_fabric_id {
        if expected != 0 && fabric_id != expected {
            return Err(ChainValidationError::WrongNodeId);
        }
    }

    let mut latest_not_before = None;
    for cert in [Some(&rcac), icac.as_ref(), Some(&noc)].into_iter().flatten() {
        let not_before = not_before_as_system_time(cert);
        if validity_policy.accept(not_before) {
            latest_not_before = Some(match latest_not_before {
                Some(prev) if prev >= not_before => prev,
                _ => not_before,
            });
        }
    }

    Ok(ValidatedChain {
        compressed_fabric_id,
        fabric_id,
        node_id,
        noc_public_key: noc.public_key().raw.to_vec(),
        root_public_key,
        latest_not_before,
    })
}
