// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::config::FabricTableConfig;
use fabric_table_types::FabricIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Persisted shape of the index allocator: `bcs`-encoded under `keys::FABRIC_INDEX_INFO`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct IndexInfo {
    pub next_available: Option<u8>,
    pub in_use: Vec<u8>,
}

/// Walks the `[min_valid, max_valid]` cycle to find the next free index. Does not itself track
/// which indices are in use; callers pass the current in-use set each time since that set lives
/// on the `FabricTable`.
pub struct IndexAllocator {
    config: FabricTableConfig,
    next_candidate: Option<FabricIndex>,
}

impl IndexAllocator {
    pub fn new(config: FabricTableConfig) -> Self {
        IndexAllocator {
            config,
            next_candidate: Some(config.min_valid),
        }
    }

    pub fn from_index_info(config: FabricTableConfig, info: &IndexInfo) -> Self {
        IndexAllocator {
            config,
            next_candidate: info.next_available.map(FabricIndex::new),
        }
    }

    /// `current + 1`, wrapping from `max_valid` back to `min_valid`.
    pub fn next_index(&self, current: FabricIndex) -> FabricIndex {
        if current == self.config.max_valid {
            self.config.min_valid
        } else {
            FabricIndex::new(current.value() + 1)
        }
    }

    /// Returns the next available index given the current in-use set, and records it as the new
    /// candidate for subsequent calls. Returns `None` (table full) if the whole cycle is occupied.
    pub fn allocate(&mut self, in_use: &BTreeSet<FabricIndex>) -> Option<FabricIndex> {
        let start = self.next_candidate.unwrap_or(self.config.min_valid);
        let mut candidate = start;
        loop {
            if !in_use.contains(&candidate) {
                self.next_candidate = Some(self.next_index(candidate));
                return Some(candidate);
            }
            candidate = self.next_index(candidate);
            if candidate == start {
                self.next_candidate = None;
                return None;
            }
        }
    }

    pub fn to_index_info(&self, in_use: &BTreeSet<FabricIndex>) -> IndexInfo {
        IndexInfo {
            next_available: self.next_candidate.map(FabricIndex::value),
            in_use: in_use.iter().map(|i| i.value()).collect(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.next_candidate.is_none()
    }

    /// Called after a Delete frees up `index` while the allocator was reporting the table full.
    pub fn note_freed(&mut self, index: FabricIndex) {
        if self.next_candidate.is_none() {
            self.next_candidate = Some(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FabricTableConfig {
        FabricTableConfig {
            min_valid: FabricIndex::new(1),
            max_valid: FabricIndex::new(5),
            max_fabrics: 5,
        }
    }

    #[test]
    fn wraps_past_max_valid() {
        let allocator = IndexAllocator::new(config());
        assert_eq!(allocator.next_index(FabricIndex::new(5)), FabricIndex::new(1));
        assert_eq!(allocator.next_index(FabricIndex::new(3)), FabricIndex::new(4));
    }

    #[test]
    fn allocates_around_a_hole() {
        let mut allocator = IndexAllocator::new(config());
        let mut in_use = BTreeSet::new();
        in_use.insert(FabricIndex::new(1));
        in_use.insert(FabricIndex::new(2));
        assert_eq!(allocator.allocate(&in_use), Some(FabricIndex::new(3)));
    }

    #[test]
    fn reports_full_when_cycle_exhausted() {
        let mut allocator = IndexAllocator::new(config());
        let in_use: BTreeSet<_> = (1..=5).map(FabricIndex::new).collect();
        assert_eq!(allocator.allocate(&in_use), None);
        assert!(allocator.is_full());
    }

    proptest::proptest! {
        /// Whatever subset of `[1, 5]` is already in use, `allocate` either reports the table
        /// full or hands back an index outside that subset.
        #[test]
        fn allocate_never_returns_an_in_use_index(occupied in proptest::collection::vec(1u8..=5, 0..=5)) {
            let in_use: BTreeSet<FabricIndex> = occupied.into_iter().map(FabricIndex::new).collect();
            let mut allocator = IndexAllocator::new(config());
            match allocator.allocate(&in_use) {
                Some(index) => proptest::prop_assert!(!in_use.contains(&index)),
                None => proptest::prop_assert_eq!(in_use.len(), 5),
            }
        }

        /// `next_index` never produces a value outside `[min_valid, max_valid]`.
        #[test]
        fn next_index_stays_within_the_configured_range(current in 1u8..=5) {
            let allocator = IndexAllocator::new(config());
            let next = allocator.next_index(FabricIndex::new(current));
            proptest::prop_assert!(next.value() >= 1 && next.value() <= 5);
        }
    }
}
