// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Well-known distinguished-name attribute OIDs used by operational certificates. There is no
//! registry crate for these on crates.io, so they are repository-local constants rather than an
//! external dependency.

use x509_parser::der_parser::oid::Oid;
use x509_parser::x509::X509Name;

/// matter-NodeId attribute (1.3.6.1.4.1.37244.1.1).
pub const OID_MATTER_NODE_ID: &[u64] = &[1, 3, 6, 1, 4, 1, 37244, 1, 1];
/// matter-FirmwareSigningId / matter-FabricId attribute (1.3.6.1.4.1.37244.1.5).
pub const OID_MATTER_FABRIC_ID: &[u64] = &[1, 3, 6, 1, 4, 1, 37244, 1, 5];

fn find_attribute_u64(name: &X509Name<'_>, oid_arcs: &[u64]) -> Option<u64> {
    let oid = Oid::from(oid_arcs).ok()?;
    name.iter_attributes()
        .find(|attr| attr.attr_type() == &oid)
        .and_then(|attr| attr.as_str().ok())
        .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
}

/// Extracts the `matter-NodeId` attribute from a certificate subject, if present.
pub fn node_id(name: &X509Name<'_>) -> Option<u64> {
    find_attribute_u64(name, OID_MATTER_NODE_ID)
}

/// Extracts the `matter-FabricId` attribute from a certificate subject, if present.
pub fn fabric_id(name: &X509Name<'_>) -> Option<u64> {
    find_attribute_u64(name, OID_MATTER_FABRIC_ID)
}
