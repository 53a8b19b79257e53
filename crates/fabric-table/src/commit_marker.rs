// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use fabric_table_types::FabricIndex;
use serde::{Deserialize, Serialize};

/// Present on disk only between the start of the final commit sequence and its completion.
/// Presence at boot means a previous commit for `fabric_index` was interrupted.
///
/// `_reserved` carries no data; it documents the intent for a future on-disk migration without
/// this crate having any other use for TLV-style reserved fields.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct CommitMarker {
    pub fabric_index: u8,
    pub is_addition: bool,
    #[serde(default)]
    _reserved: [u64; 2],
}

impl CommitMarker {
    pub fn new(fabric_index: FabricIndex, is_addition: bool) -> Self {
        CommitMarker {
            fabric_index: fabric_index.value(),
            is_addition,
            _reserved: [0; 2],
        }
    }

    pub fn fabric_index(&self) -> FabricIndex {
        FabricIndex::new(self.fabric_index)
    }
}
