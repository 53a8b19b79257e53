// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Persisted as seconds since `UNIX_EPOCH` under `keys::LAST_KNOWN_GOOD_TIME`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
struct PersistedLkgt {
    seconds_since_epoch: Option<u64>,
}

/// The latest certificate `not_before` time this device has ever accepted, tracked so the device
/// can reject certificates implying a large time regression even without a trusted clock source.
/// Updates go through the same pending/commit/revert discipline as the rest of the fabric table.
#[derive(Default)]
pub struct LastKnownGoodTime {
    committed: Option<SystemTime>,
    pending: Option<SystemTime>,
}

impl LastKnownGoodTime {
    pub fn from_persisted_bytes(bytes: Option<&[u8]>) -> Self {
        let committed = bytes
            .and_then(|b| bcs::from_bytes::<PersistedLkgt>(b).ok())
            .and_then(|p| p.seconds_since_epoch)
            .map(|s| SystemTime::UNIX_EPOCH + Duration::from_secs(s));
        LastKnownGoodTime {
            committed,
            pending: None,
        }
    }

    pub fn current(&self) -> Option<SystemTime> {
        self.committed
    }

    /// Folds a freshly accepted `not_before` into the pending value, keeping the later of the two.
    pub fn harvest_pending(&mut self, not_before: Option<SystemTime>) {
        let Some(not_before) = not_before else {
            return;
        };
        self.pending = Some(match self.pending {
            Some(existing) if existing >= not_before => existing,
            _ => not_before,
        });
    }

    pub fn commit(&mut self) -> Option<Vec<u8>> {
        let Some(pending) = self.pending.take() else {
            return None;
        };
        self.committed = Some(match self.committed {
            Some(existing) if existing >= pending => existing,
            _ => pending,
        });
        let seconds = self
            .committed
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_secs());
        bcs::to_bytes(&PersistedLkgt {
            seconds_since_epoch: seconds,
        })
        .ok()
    }

    pub fn revert(&mut self) {
        self.pending = None;
    }
}
