// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Trait interfaces the fabric table consumes for raw storage, operational certificates, and
//! operational keys, plus in-memory reference implementations of each.

mod cert_store;
mod error;
mod keystore;
mod storage;

pub mod mem;

pub use cert_store::{CertElement, OperationalCertificateStore};
pub use error::{StorageError, StoreError};
pub use keystore::{EphemeralKeyHandle, OperationalKeystore, MIN_CSR_BUFFER_SIZE};
pub use storage::{keys, PersistentStorage};
