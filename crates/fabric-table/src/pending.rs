// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use fabric_table_types::FabricIndex;
use fabric_table_types::FabricInfo;

/// The one piece of state that may be "in flight" at a time. A sum type in place of separate
/// `trusted_root_pending`/`add_pending`/`update_pending` flags plus a shadow `FabricInfo` makes
/// mutual exclusion between RootOnly/Adding/Updating true by construction rather than by
/// convention.
#[derive(Clone, Debug, Default)]
pub enum PendingOp {
    #[default]
    None,
    /// A trusted root has been staged but no op certs yet — addressable as the pending root for
    /// `index`, but not yet a fabric.
    RootOnly { index: FabricIndex },
    /// A brand-new fabric is being added at `index`; `fabric` is the shadow record that will be
    /// promoted into the live slot on commit.
    Adding {
        index: FabricIndex,
        fabric: Box<FabricInfo>,
    },
    /// An existing fabric at `index` is being replaced wholesale; `fabric` is the shadow that
    /// will overwrite the live slot on commit.
    Updating {
        index: FabricIndex,
        fabric: Box<FabricInfo>,
    },
}

impl PendingOp {
    pub fn index(&self) -> Option<FabricIndex> {
        match self {
            PendingOp::None => None,
            PendingOp::RootOnly { index }
            | PendingOp::Adding { index, .. }
            | PendingOp::Updating { index, .. } => Some(*index),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PendingOp::None)
    }

    pub fn is_adding(&self) -> bool {
        matches!(self, PendingOp::Adding { .. })
    }

    pub fn is_updating(&self) -> bool {
        matches!(self, PendingOp::Updating { .. })
    }

    pub fn shadow(&self) -> Option<&FabricInfo> {
        match self {
            PendingOp::Adding { fabric, .. } | PendingOp::Updating { fabric, .. } => Some(fabric),
            _ => None,
        }
    }
}

/// Everything that is "in flight" across a single Add or Update: the sum-typed operation itself,
/// plus the flags orthogonal to which variant is active.
#[derive(Default)]
pub struct PendingState {
    pub op: PendingOp,
    pub op_key_pending: bool,
    pub op_key_for_update: bool,
    pub ignore_collisions: bool,
}

impl PendingState {
    pub fn pending_data_present(&self) -> bool {
        self.op.is_adding() || self.op.is_updating()
    }

    pub fn clear(&mut self) {
        self.op = PendingOp::None;
        self.op_key_pending = false;
        self.op_key_for_update = false;
        self.ignore_collisions = false;
    }
}
