//! Opaque ID newtypes for all netlist entities.
//!
//! Each ID is a thin `u32` wrapper that is `Copy`, `Hash`, and
//! `Serialize`/`Deserialize`. IDs are created by
//! [`Arena::alloc`](crate::arena::Arena::alloc) and used for O(1) lookup.

use crate::arena::ArenaId;
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a wire cell in the simulator.
    WireId
);

define_id!(
    /// Opaque, copyable ID for a named signal.
    SignalId
);

define_id!(
    /// Opaque, copyable ID for a module in the design.
    ModuleId
);

define_id!(
    /// Opaque, copyable ID for a gate primitive.
    GateId
);

define_id!(
    /// Opaque, copyable ID for a combinational always block.
    CombId
);

define_id!(
    /// Opaque, copyable ID for a sequential always block.
    SeqId
);

define_id!(
    /// Opaque, copyable ID for a value-change tap.
    TapId
);

/// Handle to a scheduled action, used for cancellation by identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ActionId(u64);

impl ActionId {
    /// Creates an `ActionId` from a raw `u64` counter value.
    pub fn from_raw(index: u64) -> Self {
        Self(index)
    }

    /// Returns the raw `u64` counter value.
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn id_roundtrip() {
        let id = ModuleId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
    }

    #[test]
    fn id_equality() {
        let a = SignalId::from_raw(7);
        let b = SignalId::from_raw(7);
        let c = SignalId::from_raw(8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn id_hash_in_set() {
        let mut set = HashSet::new();
        set.insert(WireId::from_raw(1));
        set.insert(WireId::from_raw(2));
        set.insert(WireId::from_raw(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn action_id_roundtrip() {
        let id = ActionId::from_raw(99);
        assert_eq!(id.as_raw(), 99);
    }

    #[test]
    fn id_serde_roundtrip() {
        let id = CombId::from_raw(99);
        let json = serde_json::to_string(&id).unwrap();
        let restored: CombId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn all_id_types_construct() {
        let _ = WireId::from_raw(0);
        let _ = SignalId::from_raw(0);
        let _ = ModuleId::from_raw(0);
        let _ = GateId::from_raw(0);
        let _ = CombId::from_raw(0);
        let _ = SeqId::from_raw(0);
        let _ = TapId::from_raw(0);
        let _ = ActionId::from_raw(0);
    }
}
